mod compiler;
mod database;
mod hashing;

use tracing::info;

use crate::AppPaths;

pub use compiler::{compile_content_dir, ContentError, ContentErrorCode, SourceLocation};
pub use database::{ContentDatabase, Tuning, BUILTIN_CONTENT_HASH};
pub use hashing::{hash_xml_inputs, ContentHash};

/// Compiles `assets/base`, or falls back to the built-in defs when the
/// directory does not exist.
pub fn load_content(app_paths: &AppPaths) -> Result<ContentDatabase, ContentError> {
    let dir = &app_paths.base_content_dir;
    let database = if dir.is_dir() {
        compile_content_dir(dir)?
    } else {
        ContentDatabase::builtin()
    };
    info!(
        content_dir = %dir.display(),
        item_count = database.items().defs().len(),
        content_hash = %database.content_hash(),
        "content_loaded"
    );
    Ok(database)
}
