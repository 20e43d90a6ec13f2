// src/resolver.rs
//! Material Resolver.
//!
//! Maps a logical part to the material names it may carry on an asset.
//! Exporters name the same surface differently across model variants
//! (round vs rectangular containers), so each part has an ordered alias list
//! and the first alias present on the asset wins. Matching is exact.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::material::Asset;

/// Customizable region of a container model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Part {
    Lid,
    Tub,
    Pattern,
    Logo,
}

impl Part {
    pub const ALL: [Part; 4] = [Part::Lid, Part::Tub, Part::Pattern, Part::Logo];

    pub fn as_str(&self) -> &'static str {
        match self {
            Part::Lid => "lid",
            Part::Tub => "tub",
            Part::Pattern => "pattern",
            Part::Logo => "logo",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Part::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alias table, kept as configuration data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialAliases(BTreeMap<Part, Vec<String>>);

impl Default for MaterialAliases {
    fn default() -> Self {
        let mut table = BTreeMap::new();
        table.insert(Part::Lid, names(&["Top", "Top.006", "Top1_1"]));
        table.insert(Part::Tub, names(&["Bottom", "Bottom1", "Bottom.006"]));
        table.insert(Part::Pattern, names(&["Bottom", "Bottom.006"]));
        table.insert(Part::Logo, names(&["Logo"]));
        Self(table)
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl MaterialAliases {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, part: Part, aliases: &[&str]) -> Self {
        self.0.insert(part, names(aliases));
        self
    }

    /// Aliases for `part` in resolution order; empty when unconfigured.
    pub fn get(&self, part: Part) -> &[String] {
        self.0.get(&part).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// First alias present on the asset, in list order.
pub fn resolve_first<'a>(asset: &Asset, aliases: &'a [String]) -> Option<&'a str> {
    aliases
        .iter()
        .map(String::as_str)
        .find(|name| asset.has_material(name))
}

/// Every alias present on the asset, in list order.
pub fn resolve_all<'a>(asset: &Asset, aliases: &'a [String]) -> Vec<&'a str> {
    aliases
        .iter()
        .map(String::as_str)
        .filter(|name| asset.has_material(name))
        .collect()
}
