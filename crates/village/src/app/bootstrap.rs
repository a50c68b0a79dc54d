use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use village_sim::{
    build_village, load_content, resolve_app_paths, ContentDatabase, ContentError, LoopConfig,
    Simulation, StartupError, World, WorldError,
};

use super::save::SaveSlot;

const SAVE_FILE_ENV_VAR: &str = "VILLAGE_SAVE_FILE";
const AUTOSAVE_ENV_VAR: &str = "VILLAGE_AUTOSAVE_MS";
const DEFAULT_SAVE_FILE: &str = "save.json";
const DEFAULT_AUTOSAVE_MS: u64 = 5_000;

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("content load failed: {0}")]
    Content(#[from] ContentError),
    #[error("world build failed: {0}")]
    World(#[from] WorldError),
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) sim: Simulation,
    /// Untouched copy of the world that `load` restores onto.
    pub(crate) world: World,
    pub(crate) content: ContentDatabase,
    pub(crate) slot: SaveSlot,
    pub(crate) autosave_every: Option<Duration>,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!(version = env!("CARGO_PKG_VERSION"), "=== Village Startup ===");

    let app_paths = resolve_app_paths()?;
    info!(
        root = %app_paths.root.display(),
        save_dir = %app_paths.save_dir.display(),
        "app_paths_resolved"
    );
    let content = load_content(&app_paths)?;
    let world = build_village()?;

    let slot = SaveSlot::new(app_paths.save_dir.join(save_file_name_from_env()));
    let autosave_every = autosave_interval_from_env();
    info!(
        save_path = %slot.path().display(),
        autosave_ms = autosave_every.map_or(0, |every| every.as_millis() as u64),
        "save_slot_configured"
    );

    let sim = initial_simulation(&slot, &world, &content);

    Ok(AppWiring {
        config: LoopConfig::default(),
        sim,
        world,
        content,
        slot,
        autosave_every,
    })
}

/// Resumes from the save slot when it holds a usable save.
fn initial_simulation(slot: &SaveSlot, world: &World, content: &ContentDatabase) -> Simulation {
    if slot.exists() {
        match slot.read(world.clone(), content.clone()) {
            Ok(sim) => return sim,
            Err(error) => warn!(error = %error, "save_load_failed_starting_new_game"),
        }
    }
    Simulation::new(world.clone(), content.clone())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn save_file_name_from_env() -> String {
    std::env::var(SAVE_FILE_ENV_VAR)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_SAVE_FILE.to_string())
}

fn autosave_interval_from_env() -> Option<Duration> {
    let raw = std::env::var(AUTOSAVE_ENV_VAR).ok();
    parse_autosave_ms(raw.as_deref())
}

/// `0` disables autosave; anything unparsable keeps the default.
fn parse_autosave_ms(raw: Option<&str>) -> Option<Duration> {
    let ms = match raw.map(str::trim) {
        None | Some("") => DEFAULT_AUTOSAVE_MS,
        Some(value) => match value.parse::<u64>() {
            Ok(ms) => ms,
            Err(_) => {
                warn!(
                    var = AUTOSAVE_ENV_VAR,
                    value,
                    default_ms = DEFAULT_AUTOSAVE_MS,
                    "invalid_autosave_interval"
                );
                DEFAULT_AUTOSAVE_MS
            }
        },
    };
    (ms > 0).then(|| Duration::from_millis(ms))
}
