use std::process::ExitCode;

use tracing::error;

use super::bootstrap::AppWiring;
use super::session::run_session;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    if let Err(err) = run_session(app) {
        error!(error = %err, "session_failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
