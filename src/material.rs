// src/material.rs
//! Material state of a loaded asset.
//!
//! A `Material` is owned by its `Asset`; this crate only mutates it in place
//! (factor, alpha mode, texture slot). Textures are reference counted so a
//! cache entry and a material slot can share one decoded image.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// RGBA multiplier in 0..1.
pub type ColorFactor = [f32; 4];

pub const OPAQUE_WHITE: ColorFactor = [1.0, 1.0, 1.0, 1.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

impl AlphaMode {
    /// Blend whenever the factor is not fully opaque.
    #[inline]
    pub fn for_factor(factor: &ColorFactor) -> Self {
        if factor[3] < 1.0 {
            AlphaMode::Blend
        } else {
            AlphaMode::Opaque
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    #[default]
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

/// Identity of a texture source: xxh3 of the normalized URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceKey(pub u64);

/// A decoded image resource.
#[derive(Debug)]
pub struct Texture {
    pub key: SourceKey,
    /// Normalized URL, shortened for `data:` URLs.
    pub label: String,
    pub width: u32,
    pub height: u32,
    /// RGBA8, row major.
    pub pixels: Vec<u8>,
}

pub type TextureRef = Arc<Texture>;

/// Texture bound to a material's base color channel.
#[derive(Debug, Clone)]
pub struct TextureBinding {
    pub texture: TextureRef,
    pub wrap: WrapMode,
    pub offset: [f32; 2],
    pub scale: [f32; 2],
}

impl TextureBinding {
    pub fn clamped(texture: TextureRef) -> Self {
        Self {
            texture,
            wrap: WrapMode::ClampToEdge,
            offset: [0.0, 0.0],
            scale: [1.0, 1.0],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub base_color_factor: ColorFactor,
    pub base_color_texture: Option<TextureBinding>,
    pub alpha_mode: AlphaMode,
    pub double_sided: bool,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_color_factor: OPAQUE_WHITE,
            base_color_texture: None,
            alpha_mode: AlphaMode::Opaque,
            double_sided: false,
        }
    }

    /// Key of the currently bound texture, if any.
    #[inline]
    pub fn bound_source(&self) -> Option<SourceKey> {
        self.base_color_texture.as_ref().map(|b| b.texture.key)
    }

    /// Bind a texture so it shows untinted: white factor, clamped, opaque.
    pub fn bind_texture(&mut self, texture: TextureRef) {
        self.base_color_texture = Some(TextureBinding::clamped(texture));
        self.base_color_factor = OPAQUE_WHITE;
        self.alpha_mode = AlphaMode::Opaque;
    }

    /// Flat color and texture are exclusive: the texture slot is cleared first.
    pub fn set_flat_color(&mut self, factor: ColorFactor) {
        self.base_color_texture = None;
        self.base_color_factor = factor;
        self.alpha_mode = AlphaMode::for_factor(&factor);
        self.double_sided = true;
    }
}

/// A loaded 3D asset: its source and material table.
#[derive(Clone)]
pub struct Asset {
    pub src: String,
    pub materials: Vec<Material>,
}

impl Asset {
    pub fn new(src: impl Into<String>, materials: Vec<Material>) -> Self {
        Self {
            src: src.into(),
            materials,
        }
    }

    pub fn material(&self, name: &str) -> Option<&Material> {
        self.materials.iter().find(|m| m.name == name)
    }

    pub fn material_mut(&mut self, name: &str) -> Option<&mut Material> {
        self.materials.iter_mut().find(|m| m.name == name)
    }

    pub fn has_material(&self, name: &str) -> bool {
        self.material(name).is_some()
    }
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.materials.iter().map(|m| m.name.as_str()).collect();
        f.debug_struct("Asset")
            .field("src", &self.src)
            .field("materials", &names)
            .finish()
    }
}
