// src/color.rs
//! Color/Factor Applier.
//!
//! Flat colors replace textures on a part's materials. Symbolic colors come
//! from a fixed table; hex colors (`#rrggbb`) are used for export cards.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::material::ColorFactor;
use crate::resolver::{resolve_all, Part};
use crate::viewer::Viewer;

/// Lid tint used when a hex color does not parse.
pub const FALLBACK_HEX: &str = "#f5d2da";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    White,
    Black,
    Transparency,
}

impl ColorChoice {
    pub const ALL: [ColorChoice; 3] = [ColorChoice::White, ColorChoice::Black, ColorChoice::Transparency];

    pub fn factor(&self) -> ColorFactor {
        match self {
            ColorChoice::White => [1.0, 1.0, 1.0, 1.0],
            ColorChoice::Black => [0.0, 0.0, 0.0, 1.0],
            ColorChoice::Transparency => [1.0, 1.0, 1.0, 0.3],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColorChoice::White => "white",
            ColorChoice::Black => "black",
            ColorChoice::Transparency => "transparency",
        }
    }

    /// Case-insensitive lookup in the fixed table.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        ColorChoice::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for ColorChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `#rrggbb` (leading `#` optional) to an opaque factor.
pub fn parse_hex(hex: &str) -> Option<ColorFactor> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |i: usize| {
        u8::from_str_radix(&digits[i..i + 2], 16)
            .ok()
            .map(|v| v as f32 / 255.0)
    };
    Some([channel(0)?, channel(2)?, channel(4)?, 1.0])
}

pub fn hex_or_fallback(hex: &str) -> ColorFactor {
    parse_hex(hex).unwrap_or_else(|| {
        log::warn!("bad hex color {:?}, using {}", hex, FALLBACK_HEX);
        parse_hex(FALLBACK_HEX).unwrap_or([1.0, 1.0, 1.0, 1.0])
    })
}

/// Colors offered per part; the first entry is the part's default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartOptions(BTreeMap<Part, Vec<ColorChoice>>);

impl Default for PartOptions {
    fn default() -> Self {
        let mut options = BTreeMap::new();
        options.insert(Part::Lid, vec![ColorChoice::White, ColorChoice::Transparency]);
        options.insert(
            Part::Tub,
            vec![ColorChoice::White, ColorChoice::Transparency, ColorChoice::Black],
        );
        Self(options)
    }
}

impl PartOptions {
    pub fn colored_parts(&self) -> impl Iterator<Item = Part> + '_ {
        self.0
            .iter()
            .filter(|(_, choices)| !choices.is_empty())
            .map(|(part, _)| *part)
    }

    pub fn choices(&self, part: Part) -> &[ColorChoice] {
        self.0.get(&part).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn allows(&self, part: Part, color: ColorChoice) -> bool {
        self.choices(part).contains(&color)
    }

    pub fn default_for(&self, part: Part) -> Option<ColorChoice> {
        self.choices(part).first().copied()
    }
}

/// Paint every material of `aliases` present on the viewer; returns how many.
pub fn paint(viewer: &Viewer, aliases: &[String], factor: ColorFactor) -> usize {
    let painted = viewer.with_asset_mut(|asset| {
        let names: Vec<String> = resolve_all(asset, aliases)
            .into_iter()
            .map(str::to_string)
            .collect();
        for name in &names {
            if let Some(mat) = asset.material_mut(name) {
                mat.set_flat_color(factor);
            }
        }
        names.len()
    });
    match painted {
        Some(0) => {
            log::warn!("viewer {}: none of {:?} on asset", viewer.id(), aliases);
            0
        }
        Some(n) => n,
        None => 0,
    }
}
