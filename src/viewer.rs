// src/viewer.rs
//! Viewers and the readiness gate.
//!
//! A `Viewer` is one on-screen rendering slot. It is created once and keeps
//! its identity while the bound asset is swapped underneath it. Load progress
//! is published on a `watch` channel so any number of callers can await the
//! same load; every wait is bounded by a timeout.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::{Result, StudioError};
use crate::loader::AssetLoader;
use crate::material::{Asset, TextureRef};
use crate::texture_cache::{CacheKey, TextureCache};

static NEXT_VIEWER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewerId(pub u64);

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where the viewer lives on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewerSlot {
    Main,
    Thumbnail(usize),
    /// Off-screen viewer used to render export cards.
    Export(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded,
    Failed(String),
}

impl LoadState {
    /// Loaded or failed: waiting any longer would not change the answer.
    #[inline]
    pub fn is_settled(&self) -> bool {
        matches!(self, LoadState::Loaded | LoadState::Failed(_))
    }
}

struct ViewerInner {
    src: Option<String>,
    asset: Option<Asset>,
    load_generation: u64,
    cache: TextureCache,
    /// Latest apply token per material name.
    apply_generations: HashMap<String, u64>,
}

pub struct Viewer {
    id: ViewerId,
    slot: ViewerSlot,
    inner: Mutex<ViewerInner>,
    state: watch::Sender<LoadState>,
}

impl fmt::Debug for Viewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Viewer")
            .field("id", &self.id)
            .field("slot", &self.slot)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl Viewer {
    pub fn new(slot: ViewerSlot, cache_capacity: usize) -> Arc<Self> {
        let (state, _) = watch::channel(LoadState::Unloaded);
        Arc::new(Self {
            id: ViewerId(NEXT_VIEWER_ID.fetch_add(1, Ordering::Relaxed)),
            slot,
            inner: Mutex::new(ViewerInner {
                src: None,
                asset: None,
                load_generation: 0,
                cache: TextureCache::new(cache_capacity),
                apply_generations: HashMap::new(),
            }),
            state,
        })
    }

    #[inline]
    pub fn id(&self) -> ViewerId {
        self.id
    }

    #[inline]
    pub fn slot(&self) -> ViewerSlot {
        self.slot
    }

    pub fn load_state(&self) -> LoadState {
        self.state.borrow().clone()
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        matches!(*self.state.borrow(), LoadState::Loaded)
    }

    pub fn src(&self) -> Option<String> {
        self.inner.lock().src.clone()
    }

    // ---------- Asset lifecycle ----------

    /// Point the viewer at a new asset. The old asset is dropped right away;
    /// returns the load generation the caller must hand to `finish_load`.
    pub fn set_source(&self, src: &str) -> u64 {
        let generation = {
            let mut inner = self.inner.lock();
            inner.load_generation += 1;
            inner.src = Some(src.to_string());
            inner.asset = None;
            inner.load_generation
        };
        self.state.send_replace(LoadState::Loading);
        log::debug!("viewer {} loading {}", self.id, src);
        generation
    }

    /// Publish a load result. Results for a superseded source are dropped.
    pub fn finish_load(&self, generation: u64, result: Result<Asset>) -> bool {
        let state = {
            let mut inner = self.inner.lock();
            if inner.load_generation != generation {
                log::debug!(
                    "viewer {} discarding stale load (generation {} < {})",
                    self.id,
                    generation,
                    inner.load_generation
                );
                return false;
            }
            match result {
                Ok(asset) => {
                    log::info!(
                        "viewer {} loaded {} ({} materials)",
                        self.id,
                        asset.src,
                        asset.materials.len()
                    );
                    inner.asset = Some(asset);
                    LoadState::Loaded
                }
                Err(e) => {
                    log::error!("viewer {} failed to load: {}", self.id, e);
                    LoadState::Failed(e.to_string())
                }
            }
        };
        self.state.send_replace(state);
        true
    }

    /// Swap to `src` and load it through `loader`.
    pub async fn load(&self, loader: &dyn AssetLoader, src: &str) -> Result<()> {
        let generation = self.set_source(src);
        let result = loader.load(src).await;
        let failure = result.as_ref().err().map(|e| e.to_string());
        if !self.finish_load(generation, result) {
            return Err(StudioError::AssetLoad(format!("load of {src} was superseded")));
        }
        match failure {
            Some(reason) => Err(StudioError::AssetLoad(reason)),
            None => Ok(()),
        }
    }

    // ---------- Readiness gate ----------

    /// Resolve once the asset is loaded, or fail after `timeout`.
    ///
    /// Already loaded: returns without suspending. A failed load resolves
    /// immediately with `AssetLoad`.
    pub async fn wait_until_loaded(&self, timeout: Duration) -> Result<()> {
        if self.is_loaded() {
            return Ok(());
        }

        let mut rx = self.state.subscribe();
        let waited = tokio::time::timeout(timeout, rx.wait_for(LoadState::is_settled)).await;
        match waited {
            Err(_) => {
                log::warn!("viewer {} not loaded after {:?}", self.id, timeout);
                Err(StudioError::LoadTimeout {
                    viewer: self.id.0,
                    timeout,
                })
            }
            Ok(Err(_)) => Err(StudioError::AssetLoad("viewer closed".into())),
            Ok(Ok(state)) => match &*state {
                LoadState::Failed(reason) => Err(StudioError::AssetLoad(reason.clone())),
                _ => Ok(()),
            },
        }
    }

    // ---------- Asset access ----------

    /// Run `f` against the loaded asset; `None` when nothing is loaded.
    pub fn with_asset<R>(&self, f: impl FnOnce(&Asset) -> R) -> Option<R> {
        self.inner.lock().asset.as_ref().map(f)
    }

    pub fn with_asset_mut<R>(&self, f: impl FnOnce(&mut Asset) -> R) -> Option<R> {
        self.inner.lock().asset.as_mut().map(f)
    }

    // ---------- Texture cache ----------

    pub fn cached_texture(&self, key: &CacheKey) -> Option<TextureRef> {
        self.inner.lock().cache.get(key)
    }

    pub fn store_texture(&self, key: CacheKey, texture: TextureRef) {
        self.inner.lock().cache.insert(key, texture);
    }

    pub fn cache_len(&self) -> usize {
        self.inner.lock().cache.len()
    }

    // ---------- Stale-apply guard ----------

    /// Start an apply on `material`; older in-flight applies become stale.
    pub fn begin_apply(&self, material: &str) -> u64 {
        let mut inner = self.inner.lock();
        let slot = inner
            .apply_generations
            .entry(material.to_string())
            .or_insert(0);
        *slot += 1;
        *slot
    }

    pub fn is_current_apply(&self, material: &str, token: u64) -> bool {
        self.inner.lock().apply_generations.get(material).copied() == Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Material;
    use crate::testing::MockAssetLoader;

    fn asset(src: &str) -> Asset {
        Asset::new(src, vec![Material::new("Bottom")])
    }

    #[tokio::test]
    async fn loaded_viewer_passes_gate_immediately() {
        let viewer = Viewer::new(ViewerSlot::Main, 8);
        let generation = viewer.set_source("a.glb");
        viewer.finish_load(generation, Ok(asset("a.glb")));
        viewer
            .wait_until_loaded(Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(viewer.with_asset(|a| a.src.clone()).as_deref(), Some("a.glb"));
    }

    #[tokio::test(start_paused = true)]
    async fn all_waiters_resume_on_one_load() {
        let viewer = Viewer::new(ViewerSlot::Main, 8);
        let generation = viewer.set_source("a.glb");

        let first = viewer.wait_until_loaded(Duration::from_secs(10));
        let second = viewer.wait_until_loaded(Duration::from_secs(10));
        let finish = async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            viewer.finish_load(generation, Ok(asset("a.glb")));
        };
        let (a, b, _) = tokio::join!(first, second, finish);
        assert!(a.is_ok());
        assert!(b.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn gate_times_out_instead_of_hanging() {
        let viewer = Viewer::new(ViewerSlot::Thumbnail(0), 8);
        viewer.set_source("never.glb");
        let err = viewer
            .wait_until_loaded(Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn failed_load_releases_waiters_with_error() {
        let viewer = Viewer::new(ViewerSlot::Main, 8);
        let loader = MockAssetLoader::new();
        assert!(viewer.load(&loader, "missing.glb").await.is_err());
        assert!(matches!(viewer.load_state(), LoadState::Failed(_)));

        let err = viewer
            .wait_until_loaded(Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::AssetLoad(_)));
    }

    #[test]
    fn stale_load_is_discarded() {
        let viewer = Viewer::new(ViewerSlot::Main, 8);
        let old = viewer.set_source("old.glb");
        let new = viewer.set_source("new.glb");

        assert!(!viewer.finish_load(old, Ok(asset("old.glb"))));
        assert!(!viewer.is_loaded());
        assert!(viewer.finish_load(new, Ok(asset("new.glb"))));
        assert_eq!(viewer.with_asset(|a| a.src.clone()).as_deref(), Some("new.glb"));
    }

    #[test]
    fn newer_apply_supersedes_older() {
        let viewer = Viewer::new(ViewerSlot::Main, 8);
        let first = viewer.begin_apply("Bottom");
        let second = viewer.begin_apply("Bottom");
        let logo = viewer.begin_apply("Logo");
        assert!(!viewer.is_current_apply("Bottom", first));
        assert!(viewer.is_current_apply("Bottom", second));
        assert!(viewer.is_current_apply("Logo", logo));
    }
}
