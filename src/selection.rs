// src/selection.rs
//! The user's current choices, restored on startup and written back on change.

use std::collections::BTreeMap;

use crate::color::{ColorChoice, PartOptions};
use crate::error::Result;
use crate::resolver::Part;
use crate::storage::KeyValueStore;

pub const COLORS_KEY: &str = "selectedColors";
pub const PATTERN_KEY: &str = "selectedPattern";
pub const LOGO_KEY: &str = "selectedLogo";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    pub pattern_url: Option<String>,
    /// Uploaded logo as a `data:` URL.
    pub logo_data: Option<String>,
    /// Set once the user picks a pattern; the auto-cycle never resumes after.
    pub manual_pattern: bool,
    pub colors: BTreeMap<Part, ColorChoice>,
}

impl SelectionState {
    /// First option of every colored part.
    pub fn defaults(options: &PartOptions) -> Self {
        let colors = options
            .colored_parts()
            .filter_map(|part| options.default_for(part).map(|c| (part, c)))
            .collect();
        Self {
            colors,
            ..Self::default()
        }
    }

    /// Load from `store`. Missing, unreadable or invalid entries keep defaults.
    pub fn restore(store: &dyn KeyValueStore, options: &PartOptions) -> Self {
        let mut state = Self::defaults(options);

        match store.get(COLORS_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<BTreeMap<Part, ColorChoice>>(&raw) {
                Ok(saved) => {
                    for (part, color) in saved {
                        if options.allows(part, color) {
                            state.colors.insert(part, color);
                        } else {
                            log::warn!("ignoring stored color {} for {}", color, part);
                        }
                    }
                }
                Err(e) => log::warn!("corrupt {} entry, using defaults: {}", COLORS_KEY, e),
            },
            Ok(None) => {}
            Err(e) => log::warn!("could not read {}: {}", COLORS_KEY, e),
        }

        state.pattern_url = read_non_empty(store, PATTERN_KEY);
        state.logo_data = read_non_empty(store, LOGO_KEY);
        log::debug!(
            "restored selection: pattern={:?} logo={} colors={:?}",
            state.pattern_url,
            state.logo_data.is_some(),
            state.colors
        );
        state
    }

    pub fn color(&self, part: Part) -> Option<ColorChoice> {
        self.colors.get(&part).copied()
    }

    pub fn set_color(&mut self, part: Part, color: ColorChoice) {
        self.colors.insert(part, color);
    }

    pub fn persist_colors(&self, store: &dyn KeyValueStore) -> Result<()> {
        let raw = serde_json::to_string(&self.colors)?;
        store.set(COLORS_KEY, &raw)
    }

    pub fn persist_pattern(&self, store: &dyn KeyValueStore) -> Result<()> {
        match &self.pattern_url {
            Some(url) => store.set(PATTERN_KEY, url),
            None => store.remove(PATTERN_KEY),
        }
    }

    pub fn persist_logo(&self, store: &dyn KeyValueStore) -> Result<()> {
        match &self.logo_data {
            Some(data) => store.set(LOGO_KEY, data),
            None => store.remove(LOGO_KEY),
        }
    }
}

fn read_non_empty(store: &dyn KeyValueStore, key: &str) -> Option<String> {
    match store.get(key) {
        Ok(value) => value.filter(|v| !v.trim().is_empty()),
        Err(e) => {
            log::warn!("could not read {}: {}", key, e);
            None
        }
    }
}
