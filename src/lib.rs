pub mod db;
pub mod duration;
pub mod gateway;
pub mod history;
pub mod host;
pub mod inspector;
pub mod models;
pub mod monitor;
pub mod settings;
pub mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use log::{info, warn};

use db::{Database, KeyValueStore, MemoryStore};
use settings::{MonitorSettings, SETTINGS_FILE_NAME};

const DATA_DIR_ENV: &str = "CALLWATCH_DATA_DIR";
const DB_FILE_NAME: &str = "callwatch.sqlite3";

/// Entry point of the native messaging host. Blocks until the extension
/// closes stdin.
pub fn run() -> Result<()> {
    // stdout carries protocol frames, so logs go to stderr (env_logger's default).
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let caller = std::env::args().nth(1).unwrap_or_default();
    info!("Callwatch host starting up (caller: {caller})");

    let data_dir = data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let settings = MonitorSettings::load(&data_dir.join(SETTINGS_FILE_NAME))?;

    let store: Arc<dyn KeyValueStore> = match Database::new(data_dir.join(DB_FILE_NAME)) {
        Ok(database) => Arc::new(database),
        Err(err) => {
            warn!("Falling back to in-memory storage: {err:#}");
            Arc::new(MemoryStore::new())
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(host::serve(
        settings,
        store,
        tokio::io::stdin(),
        tokio::io::stdout(),
    ))?;

    info!("Callwatch host exiting");
    Ok(())
}

fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }

    dirs::data_dir()
        .map(|dir| dir.join("callwatch"))
        .ok_or_else(|| anyhow!("no platform data directory; set {DATA_DIR_ENV}"))
}
