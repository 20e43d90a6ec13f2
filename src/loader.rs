// src/loader.rs
//! Asset and texture loading seams.
//!
//! `AssetLoader` turns an asset source into a material table; `TextureLoader`
//! turns a texture URL into pixels. The file-backed implementations read
//! from an asset root, parse `.glb`/`.gltf` material tables with `gltf` and
//! decode images with `image`. `data:` URLs (uploaded logos) decode inline.

use std::path::{Path, PathBuf};

use base64::Engine as _;
use futures::future::BoxFuture;

use crate::error::{Result, StudioError};
use crate::material::{AlphaMode, Asset, Material};
use crate::texture_cache::normalize_url;

/// Pixels produced by a `TextureLoader`.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// RGBA8
    pub pixels: Vec<u8>,
}

pub trait AssetLoader: Send + Sync {
    fn load<'a>(&'a self, src: &'a str) -> BoxFuture<'a, Result<Asset>>;
}

pub trait TextureLoader: Send + Sync {
    /// Fetch and decode `url`. Called at most once per cache miss.
    fn create<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<DecodedImage>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Decoding helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Material table of a glTF document (`.glb` or `.gltf` JSON).
pub fn parse_gltf_materials(src: &str, bytes: &[u8]) -> Result<Asset> {
    let gltf = gltf::Gltf::from_slice(bytes)
        .map_err(|e| StudioError::AssetLoad(format!("{src}: {e}")))?;

    let materials = gltf
        .materials()
        .enumerate()
        .map(|(i, mat)| {
            let name = mat
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("material_{i}"));
            let alpha_mode = match mat.alpha_mode() {
                gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
                gltf::material::AlphaMode::Mask => AlphaMode::Mask,
                gltf::material::AlphaMode::Blend => AlphaMode::Blend,
            };
            Material {
                name,
                base_color_factor: mat.pbr_metallic_roughness().base_color_factor(),
                base_color_texture: None,
                alpha_mode,
                double_sided: mat.double_sided(),
            }
        })
        .collect();

    Ok(Asset::new(src, materials))
}

/// Decode encoded image bytes (png/jpeg/webp) into RGBA8.
pub fn decode_image(url: &str, bytes: &[u8]) -> Result<DecodedImage> {
    let img = image::load_from_memory(bytes).map_err(|e| StudioError::TextureDecode {
        url: crate::texture_cache::texture_label(url),
        reason: e.to_string(),
    })?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(DecodedImage {
        width,
        height,
        pixels: rgba.into_raw(),
    })
}

/// Payload of a `data:[<mediatype>][;base64],<data>` URL.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let bad = |reason: &str| StudioError::TextureDecode {
        url: crate::texture_cache::texture_label(url),
        reason: reason.to_string(),
    };
    let rest = url.strip_prefix("data:").ok_or_else(|| bad("not a data URL"))?;
    let (header, payload) = rest.split_once(',').ok_or_else(|| bad("missing ','"))?;

    if header.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| bad(&e.to_string()))
    } else {
        Ok(urlencoding::decode_binary(payload.as_bytes()).into_owned())
    }
}

/// File path for an asset-relative URL: query dropped, percent-escapes undone.
pub fn resolve_path(root: &Path, url: &str) -> PathBuf {
    let relative = normalize_url(url).trim_start_matches('/');
    let decoded = urlencoding::decode(relative)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| relative.to_string());
    root.join(decoded)
}

// ─────────────────────────────────────────────────────────────────────────────
// File-backed loaders (native)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(not(target_arch = "wasm32"))]
pub use native::{GltfAssetLoader, ImageTextureLoader};

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use super::*;

    /// Reads glTF assets below `root`.
    #[derive(Debug, Clone)]
    pub struct GltfAssetLoader {
        root: PathBuf,
    }

    impl GltfAssetLoader {
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self { root: root.into() }
        }
    }

    impl AssetLoader for GltfAssetLoader {
        fn load<'a>(&'a self, src: &'a str) -> BoxFuture<'a, Result<Asset>> {
            Box::pin(async move {
                let path = resolve_path(&self.root, src);
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|e| StudioError::from(e).context(format!("reading {}", path.display())))?;
                parse_gltf_materials(src, &bytes)
            })
        }
    }

    /// Reads image files below `root`; `data:` URLs decode in place.
    #[derive(Debug, Clone)]
    pub struct ImageTextureLoader {
        root: PathBuf,
    }

    impl ImageTextureLoader {
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self { root: root.into() }
        }
    }

    impl TextureLoader for ImageTextureLoader {
        fn create<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<DecodedImage>> {
            Box::pin(async move {
                let bytes = if url.starts_with("data:") {
                    decode_data_url(url)?
                } else {
                    let path = resolve_path(&self.root, url);
                    tokio::fs::read(&path).await.map_err(|e| StudioError::TextureDecode {
                        url: url.to_string(),
                        reason: format!("{}: {e}", path.display()),
                    })?
                };
                decode_image(url, &bytes)
            })
        }
    }
}
