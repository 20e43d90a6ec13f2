// src/lib.rs
//! Pattern, logo and color customization for 3D container viewers.
//!
//! A [`Studio`] session owns a main viewer plus any number of thumbnail or
//! export viewers. Textures are decoded once per viewer and cached by URL
//! identity; colors are flat factors written straight into materials. The
//! user's choices persist through a [`KeyValueStore`].

pub mod catalog;
pub mod color;
pub mod config;
pub mod cycle;
pub mod error;
pub mod loader;
pub mod material;
pub mod resolver;
pub mod selection;
pub mod storage;
pub mod studio;
pub mod texture_cache;
pub mod viewer;

#[cfg(test)]
mod testing;

pub use catalog::{ApiResponse, ModelEntry, PatternEntry, PatternRecord};
pub use color::{ColorChoice, PartOptions};
pub use config::StudioConfig;
pub use cycle::{AutoCycle, CycleState, TickControl};
pub use error::{Result, StudioError};
pub use loader::{AssetLoader, DecodedImage, TextureLoader};
pub use material::{AlphaMode, Asset, Material, Texture, WrapMode};
pub use resolver::{MaterialAliases, Part};
pub use selection::SelectionState;
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore};
pub use studio::Studio;
pub use texture_cache::{ApplyOptions, ApplyOutcome, TextureApplier};
pub use viewer::{LoadState, Viewer, ViewerId, ViewerSlot};

#[cfg(not(target_arch = "wasm32"))]
pub use loader::{GltfAssetLoader, ImageTextureLoader};

#[cfg(target_arch = "wasm32")]
pub use storage::LocalStorageStore;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Browser entry: route panics and `log` output to the console.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    std::panic::set_hook(Box::new(console_error_panic_hook::hook));
    let _ = console_log::init_with_level(log::Level::Debug);
    log::info!("pack_studio {} loaded", env!("CARGO_PKG_VERSION"));
}
