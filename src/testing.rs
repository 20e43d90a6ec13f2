// src/testing.rs
//! In-memory loaders shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::error::{Result, StudioError};
use crate::loader::{AssetLoader, DecodedImage, TextureLoader};
use crate::material::{Asset, Material};
use crate::texture_cache::normalize_url;

/// Serves material tables from memory, optionally after a delay.
#[derive(Default)]
pub struct MockAssetLoader {
    assets: HashMap<String, Vec<String>>,
    delay: Option<Duration>,
}

impl MockAssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(mut self, src: &str, materials: &[&str]) -> Self {
        self.assets.insert(
            src.to_string(),
            materials.iter().map(|m| m.to_string()).collect(),
        );
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl AssetLoader for MockAssetLoader {
    fn load<'a>(&'a self, src: &'a str) -> BoxFuture<'a, Result<Asset>> {
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let names = self
                .assets
                .get(src)
                .ok_or_else(|| StudioError::AssetLoad(format!("no such asset {src}")))?;
            Ok(Asset::new(
                src,
                names.iter().map(|n| Material::new(n.as_str())).collect(),
            ))
        })
    }
}

/// Counts texture creations; can fail or stall chosen URLs.
#[derive(Default)]
pub struct MockTextureLoader {
    calls: AtomicUsize,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    created: Mutex<Vec<String>>,
}

impl MockTextureLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(normalize_url(url).to_string());
        self
    }

    pub fn with_delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(normalize_url(url).to_string(), delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> Vec<String> {
        self.created.lock().clone()
    }
}

impl TextureLoader for MockTextureLoader {
    fn create<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<DecodedImage>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let key = normalize_url(url).to_string();
            self.created.lock().push(key.clone());
            if let Some(delay) = self.delays.get(&key) {
                tokio::time::sleep(*delay).await;
            }
            if self.failing.contains(&key) {
                return Err(StudioError::TextureDecode {
                    url: key,
                    reason: "corrupt image".into(),
                });
            }
            Ok(DecodedImage {
                width: 1,
                height: 1,
                pixels: vec![255; 4],
            })
        })
    }
}
