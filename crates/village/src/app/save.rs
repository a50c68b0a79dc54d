use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};
use village_sim::{ContentDatabase, Simulation, Snapshot, SnapshotError, World};

#[derive(Debug, Error)]
pub(crate) enum SaveError {
    #[error("read save '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("write save '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("encode save json: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("save '{path}' is not JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("save '{path}' is unusable: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: SnapshotError,
    },
}

/// One save file on disk.
#[derive(Debug, Clone)]
pub(crate) struct SaveSlot {
    path: PathBuf,
}

impl SaveSlot {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub(crate) fn write(&self, sim: &Simulation) -> Result<(), SaveError> {
        let snapshot = sim.snapshot();
        let json = serde_json::to_string_pretty(&snapshot).map_err(SaveError::Encode)?;
        write_text_atomic(&self.path, &json).map_err(|source| SaveError::Write {
            path: self.path.clone(),
            source,
        })?;
        info!(
            path = %self.path.display(),
            sim_time_ms = snapshot.now.as_millis(),
            bytes = json.len(),
            "save_written"
        );
        Ok(())
    }

    /// Reads the slot into a simulation over `world`. A save that no longer
    /// matches the snapshot layout is loaded field by field instead of being
    /// thrown away.
    pub(crate) fn read(
        &self,
        world: World,
        content: ContentDatabase,
    ) -> Result<Simulation, SaveError> {
        let raw = fs::read_to_string(&self.path).map_err(|source| SaveError::Read {
            path: self.path.clone(),
            source,
        })?;

        match parse_snapshot_json(&raw) {
            Ok(snapshot) => {
                info!(path = %self.path.display(), "save_loaded");
                Ok(Simulation::restore(world, content, snapshot))
            }
            Err(detail) => {
                warn!(
                    path = %self.path.display(),
                    detail = %detail,
                    "save_strict_parse_failed"
                );
                let value: Value =
                    serde_json::from_str(&raw).map_err(|source| SaveError::Parse {
                        path: self.path.clone(),
                        source,
                    })?;
                let sim = Simulation::restore_lenient(world, content, &value).map_err(
                    |source| SaveError::Snapshot {
                        path: self.path.clone(),
                        source,
                    },
                )?;
                info!(path = %self.path.display(), "save_loaded_leniently");
                Ok(sim)
            }
        }
    }
}

fn parse_snapshot_json(raw: &str) -> Result<Snapshot, String> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    match serde_path_to_error::deserialize::<_, Snapshot>(&mut deserializer) {
        Ok(snapshot) => Ok(snapshot),
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            if path.is_empty() || path == "." {
                Err(format!("parse save json: {source}"))
            } else {
                Err(format!("parse save json at {path}: {source}"))
            }
        }
    }
}

fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_path_for(path);
    fs::write(&tmp_path, text.as_bytes())?;
    replace_file(&tmp_path, path)
}

fn replace_file(tmp_path: &Path, final_path: &Path) -> io::Result<()> {
    match fs::remove_file(final_path) {
        Ok(_) => {}
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => {
            let _ = fs::remove_file(tmp_path);
            return Err(error);
        }
    }

    if let Err(error) = fs::rename(tmp_path, final_path) {
        let _ = fs::remove_file(tmp_path);
        return Err(error);
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("save.json");
    let tmp_name = format!("{file_name}.tmp");
    match path.parent() {
        Some(parent) => parent.join(tmp_name),
        None => PathBuf::from(tmp_name),
    }
}
