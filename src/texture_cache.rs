// src/texture_cache.rs
//! Texture Cache
//! - Identity: xxh3 of the query-stripped URL, so cache-busting parameters
//!   neither defeat caching nor grow the cache
//! - Per-viewer LRU keyed by (material, identity)
//! - Idempotent apply: an unchanged identity never re-decodes
//! - Generation tokens drop results of superseded applies
//! - Batch apply over many viewers with join semantics

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use lru::LruCache;
use xxhash_rust::xxh3::xxh3_64;

use crate::loader::TextureLoader;
use crate::material::{SourceKey, Texture, TextureRef};
use crate::resolver::resolve_first;
use crate::viewer::Viewer;

const DATA_LABEL_LEN: usize = 48;

// ---------- URL identity ----------

/// Strip query and fragment. `data:` URLs are their own identity.
pub fn normalize_url(url: &str) -> &str {
    let url = url.trim();
    if url.starts_with("data:") {
        return url;
    }
    match url.find(['?', '#']) {
        Some(cut) => &url[..cut],
        None => url,
    }
}

#[inline]
pub fn source_key(url: &str) -> SourceKey {
    SourceKey(xxh3_64(normalize_url(url).as_bytes()))
}

/// Human-readable name for a texture; data URLs are cut short.
pub fn texture_label(url: &str) -> String {
    let normalized = normalize_url(url);
    if normalized.starts_with("data:") && normalized.len() > DATA_LABEL_LEN {
        let mut end = DATA_LABEL_LEN;
        while !normalized.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &normalized[..end])
    } else {
        normalized.to_string()
    }
}

// ---------- Cache ----------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub material: String,
    pub source: SourceKey,
}

impl CacheKey {
    pub fn new(material: &str, source: SourceKey) -> Self {
        Self {
            material: material.to_string(),
            source,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// One viewer's textures. Evicted entries are released with their last `Arc`.
pub struct TextureCache {
    entries: LruCache<CacheKey, TextureRef>,
    stats: CacheStats,
}

impl TextureCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            stats: CacheStats::default(),
        }
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<TextureRef> {
        match self.entries.get(key) {
            Some(tex) => {
                self.stats.hits += 1;
                Some(Arc::clone(tex))
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Insert or overwrite; returns the entry pushed out by capacity, if any.
    pub fn insert(&mut self, key: CacheKey, texture: TextureRef) -> Option<(CacheKey, TextureRef)> {
        let evicted = self.entries.push(key, texture);
        match evicted {
            // `push` hands back the old value when the key was already present
            Some((old_key, old)) if self.entries.contains(&old_key) => {
                drop(old);
                None
            }
            Some(pair) => {
                self.stats.evictions += 1;
                log::debug!("texture cache evicted {:?}", pair.0);
                Some(pair)
            }
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

// ---------- Apply ----------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Decode again even if the identity is cached or already bound.
    pub force_reload: bool,
    /// Do not wait for the asset; unloaded viewers are skipped.
    pub skip_wait: bool,
}

impl ApplyOptions {
    pub fn forced() -> Self {
        Self {
            force_reload: true,
            ..Self::default()
        }
    }

    pub fn no_wait() -> Self {
        Self {
            skip_wait: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Texture bound; `created` is false when it came from the cache.
    Applied { created: bool },
    /// Same identity already bound.
    Unchanged,
    /// Viewer not loaded and waiting was not requested, or no URL.
    Skipped,
    MaterialNotFound,
    /// A newer apply on the same material started while this one decoded.
    Superseded,
    Failed(String),
}

impl ApplyOutcome {
    pub fn is_bound(&self) -> bool {
        matches!(self, ApplyOutcome::Applied { .. } | ApplyOutcome::Unchanged)
    }
}

/// Applies textures to viewers through one `TextureLoader`.
#[derive(Clone)]
pub struct TextureApplier {
    loader: Arc<dyn TextureLoader>,
    load_timeout: Duration,
}

impl fmt::Debug for TextureApplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureApplier")
            .field("load_timeout", &self.load_timeout)
            .finish_non_exhaustive()
    }
}

impl TextureApplier {
    pub fn new(loader: Arc<dyn TextureLoader>, load_timeout: Duration) -> Self {
        Self {
            loader,
            load_timeout,
        }
    }

    /// Apply `url` to the first material of `aliases` found on `viewer`.
    /// Never fails: problems are logged and reported in the outcome.
    pub async fn apply(
        &self,
        viewer: &Viewer,
        aliases: &[String],
        url: &str,
        opts: ApplyOptions,
    ) -> ApplyOutcome {
        if url.trim().is_empty() {
            return ApplyOutcome::Skipped;
        }

        if opts.skip_wait {
            if !viewer.is_loaded() {
                log::debug!("viewer {} not loaded, skipping {}", viewer.id(), texture_label(url));
                return ApplyOutcome::Skipped;
            }
        } else if let Err(e) = viewer.wait_until_loaded(self.load_timeout).await {
            log::warn!("viewer {}: {}", viewer.id(), e);
            return ApplyOutcome::Failed(e.to_string());
        }

        let key = source_key(url);
        let resolved = viewer.with_asset(|asset| {
            resolve_first(asset, aliases).map(|name| {
                let bound = asset.material(name).and_then(|m| m.bound_source());
                (name.to_string(), bound)
            })
        });
        let (material, bound) = match resolved {
            None => return ApplyOutcome::Skipped,
            Some(None) => {
                log::warn!("viewer {}: none of {:?} on asset", viewer.id(), aliases);
                return ApplyOutcome::MaterialNotFound;
            }
            Some(Some(found)) => found,
        };

        // re-applying the bound texture still supersedes older in-flight applies
        let token = viewer.begin_apply(&material);
        if bound == Some(key) && !opts.force_reload {
            return ApplyOutcome::Unchanged;
        }

        let cache_key = CacheKey::new(&material, key);
        let cached = if opts.force_reload {
            None
        } else {
            viewer.cached_texture(&cache_key)
        };

        let (texture, created) = match cached {
            Some(texture) => (texture, false),
            None => match self.loader.create(url).await {
                Ok(image) => {
                    let texture = Arc::new(Texture {
                        key,
                        label: texture_label(url),
                        width: image.width,
                        height: image.height,
                        pixels: image.pixels,
                    });
                    viewer.store_texture(cache_key, Arc::clone(&texture));
                    (texture, true)
                }
                Err(e) => {
                    log::error!("viewer {}: failed to create texture: {}", viewer.id(), e);
                    return ApplyOutcome::Failed(e.to_string());
                }
            },
        };

        if !viewer.is_current_apply(&material, token) {
            log::debug!(
                "viewer {}: {} superseded on {}",
                viewer.id(),
                texture.label,
                material
            );
            return ApplyOutcome::Superseded;
        }

        let label = texture.label.clone();
        let bound = viewer.with_asset_mut(|asset| match asset.material_mut(&material) {
            Some(mat) => {
                mat.bind_texture(texture);
                true
            }
            None => false,
        });
        match bound {
            Some(true) => {
                log::debug!("viewer {}: {} -> {}", viewer.id(), label, material);
                ApplyOutcome::Applied { created }
            }
            // asset swapped while decoding
            Some(false) => ApplyOutcome::MaterialNotFound,
            None => ApplyOutcome::Skipped,
        }
    }

    /// Apply to every viewer concurrently; completes when all have.
    pub async fn apply_all(
        &self,
        viewers: &[Arc<Viewer>],
        aliases: &[String],
        url: &str,
        opts: ApplyOptions,
    ) -> Vec<ApplyOutcome> {
        join_all(
            viewers
                .iter()
                .map(|viewer| self.apply(viewer, aliases, url, opts)),
        )
        .await
    }
}
