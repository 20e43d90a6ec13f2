#![cfg(not(target_arch = "wasm32"))]

//! Headless run of a customization session against assets on disk.
//!
//! Usage: `pack_studio [config.json]`

use std::panic;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn, LevelFilter};

use pack_studio::{
    GltfAssetLoader, ImageTextureLoader, JsonFileStore, KeyValueStore, MemoryStore, Part,
    Studio, StudioConfig, ViewerSlot,
};

/// Cycle ticks to show before stopping.
const DEMO_TICKS: u32 = 3;

fn main() {
    setup_diagnostics();

    let runtime = match setup_async_runtime() {
        Ok(rt) => rt,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run()) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => StudioConfig::from_path(&path).with_context(|| format!("config {path}"))?,
        None => {
            info!("no config given, using defaults");
            StudioConfig::default()
        }
    };

    let store: Arc<dyn KeyValueStore> = match &config.storage_path {
        Some(path) => Arc::new(JsonFileStore::open(path).context("opening selection store")?),
        None => Arc::new(MemoryStore::new()),
    };

    let studio = Studio::new(
        config.clone(),
        Arc::new(GltfAssetLoader::new(&config.asset_root)),
        Arc::new(ImageTextureLoader::new(&config.asset_root)),
        store,
    );

    // thumbnails for every catalog entry
    for (i, model) in config.models.iter().enumerate() {
        let thumb = studio.add_viewer(ViewerSlot::Thumbnail(i));
        if let Err(e) = studio.load_viewer(&thumb, &model.src).await {
            warn!("thumbnail {} ({}): {:#}", i, model.name, anyhow::Error::from(e));
        }
    }
    studio.select_model(0).await.context("loading first model")?;

    let interval = config.auto_cycle_interval();
    if studio.start_auto_cycle(interval) {
        tokio::time::sleep(interval * DEMO_TICKS + Duration::from_millis(50)).await;
        studio.stop_auto_cycle();
    }

    let selection = studio.selection();
    let main = studio.main_viewer();
    info!(
        "main viewer {}: {:?}, pattern {:?}, lid {:?}, tub {:?}",
        main.id(),
        main.src(),
        selection.pattern_url,
        selection.color(Part::Lid),
        selection.color(Part::Tub),
    );
    for viewer in studio.viewers() {
        info!("  {} {:?} {:?} ({} textures cached)", viewer.id(), viewer.slot(), viewer.load_state(), viewer.cache_len());
    }
    if let Some(stem) = studio.export_file_stem() {
        info!("export name: {}.png", stem);
    }
    Ok(())
}

/// Logging, and panics routed through the logger before the default hook runs.
fn setup_diagnostics() {
    env_logger::Builder::new()
        .filter_level(if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .format_timestamp_millis()
        .format_target(false)
        .parse_default_env()
        .init();

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        error!("panic: {}", info);
        default_hook(info);
    }));
}

fn setup_async_runtime() -> Result<tokio::runtime::Runtime> {
    #[cfg(feature = "tokio_runtime")]
    let mut builder = {
        let mut b = tokio::runtime::Builder::new_multi_thread();
        b.worker_threads(2).thread_name("pack-studio-worker");
        b
    };
    #[cfg(not(feature = "tokio_runtime"))]
    let mut builder = tokio::runtime::Builder::new_current_thread();

    let rt = builder.enable_all().build().context("building tokio runtime")?;
    info!("async runtime started");
    Ok(rt)
}
