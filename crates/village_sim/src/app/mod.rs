mod console;
mod loop_runner;
mod metrics;

pub use console::{CommandParseError, ConsoleCommand, ConsoleCommandRegistry};
pub use loop_runner::{FixedStepLoop, LoopConfig};
pub use metrics::LoopMetricsSnapshot;
