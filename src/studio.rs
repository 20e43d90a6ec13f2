// src/studio.rs
//! The customization session.
//!
//! `Studio` owns the viewers, the selection state, the texture applier and
//! the auto-cycle timer. It is created once per session and shared behind an
//! `Arc`; the auto-cycle holds only a `Weak` to it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::catalog::ModelEntry;
use crate::color::{hex_or_fallback, paint, ColorChoice};
use crate::config::StudioConfig;
use crate::cycle::{AutoCycle, CycleState, TickControl};
use crate::error::{Result, StudioError};
use crate::loader::{AssetLoader, TextureLoader};
use crate::resolver::Part;
use crate::selection::SelectionState;
use crate::storage::KeyValueStore;
use crate::texture_cache::{ApplyOptions, ApplyOutcome, TextureApplier};
use crate::viewer::{Viewer, ViewerSlot};

pub struct Studio {
    config: StudioConfig,
    assets: Arc<dyn AssetLoader>,
    textures: TextureApplier,
    store: Arc<dyn KeyValueStore>,
    selection: Mutex<SelectionState>,
    main: Arc<Viewer>,
    viewers: Mutex<Vec<Arc<Viewer>>>,
    selected_model: AtomicUsize,
    cycle: AutoCycle,
}

impl Studio {
    /// Build a session and restore the persisted selection. The main viewer
    /// exists from the start; nothing is loaded yet.
    pub fn new(
        config: StudioConfig,
        assets: Arc<dyn AssetLoader>,
        textures: Arc<dyn TextureLoader>,
        store: Arc<dyn KeyValueStore>,
    ) -> Arc<Self> {
        let selection = SelectionState::restore(store.as_ref(), &config.part_options);
        let main = Viewer::new(ViewerSlot::Main, config.texture_cache_capacity);
        let textures = TextureApplier::new(textures, config.load_timeout());
        log::info!(
            "studio ready: {} models, {} patterns, main viewer {}",
            config.models.len(),
            config.patterns.len(),
            main.id()
        );
        Arc::new(Self {
            config,
            assets,
            textures,
            store,
            selection: Mutex::new(selection),
            viewers: Mutex::new(vec![Arc::clone(&main)]),
            main,
            selected_model: AtomicUsize::new(0),
            cycle: AutoCycle::new(),
        })
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn selection(&self) -> SelectionState {
        self.selection.lock().clone()
    }

    // ---------- Viewers ----------

    pub fn add_viewer(&self, slot: ViewerSlot) -> Arc<Viewer> {
        let viewer = Viewer::new(slot, self.config.texture_cache_capacity);
        self.viewers.lock().push(Arc::clone(&viewer));
        viewer
    }

    pub fn main_viewer(&self) -> Arc<Viewer> {
        Arc::clone(&self.main)
    }

    /// Every viewer, main first.
    pub fn viewers(&self) -> Vec<Arc<Viewer>> {
        self.viewers.lock().clone()
    }

    /// Load `src` into `viewer`, then reapply the current selection to it.
    pub async fn load_viewer(&self, viewer: &Viewer, src: &str) -> Result<()> {
        viewer.load(self.assets.as_ref(), src).await?;
        self.restore_onto(viewer).await;
        Ok(())
    }

    async fn restore_onto(&self, viewer: &Viewer) {
        let selection = self.selection();

        // colors first: tub colors clear the texture the pattern binds
        for (part, color) in &selection.colors {
            paint(viewer, self.config.aliases.get(*part), color.factor());
        }
        if let Some(url) = &selection.pattern_url {
            self.textures
                .apply(viewer, self.config.aliases.get(Part::Pattern), url, ApplyOptions::default())
                .await;
        }
        if let Some(data) = &selection.logo_data {
            self.textures
                .apply(viewer, self.config.aliases.get(Part::Logo), data, ApplyOptions::default())
                .await;
        }
    }

    // ---------- Models ----------

    pub fn selected_model(&self) -> Option<&ModelEntry> {
        self.config.models.get(self.selected_model.load(Ordering::Relaxed))
    }

    /// Swap the main viewer to catalog entry `index`.
    pub async fn select_model(&self, index: usize) -> Result<()> {
        let entry = self
            .config
            .models
            .get(index)
            .ok_or(StudioError::ModelIndex(index))?;
        self.selected_model.store(index, Ordering::Relaxed);
        log::info!("selected model {}: {}", index, entry.name);
        self.load_viewer(&self.main, &entry.src)
            .await
            .map_err(|e| e.context(format!("loading {}", entry.name)))
    }

    /// Stem for exported files of the current model.
    pub fn export_file_stem(&self) -> Option<String> {
        self.selected_model().map(ModelEntry::export_file_stem)
    }

    // ---------- Patterns & logo ----------

    /// User picked a pattern: it wins over the auto-cycle for good.
    pub async fn select_pattern(&self, url: &str) -> Vec<ApplyOutcome> {
        {
            let mut selection = self.selection.lock();
            selection.manual_pattern = true;
            selection.pattern_url = Some(url.to_string());
            log_persist("pattern", selection.persist_pattern(self.store.as_ref()));
        }
        self.cycle.stop();
        self.apply_to_all(Part::Pattern, url, ApplyOptions::default()).await
    }

    /// Apply `url` to the pattern material of every viewer. The URL becomes
    /// the session's pattern but is not persisted.
    pub async fn apply_pattern_to_all(&self, url: &str, skip_wait: bool) -> Vec<ApplyOutcome> {
        self.selection.lock().pattern_url = Some(url.to_string());
        let opts = ApplyOptions {
            skip_wait,
            ..ApplyOptions::default()
        };
        self.apply_to_all(Part::Pattern, url, opts).await
    }

    /// Apply an uploaded logo, main viewer first. Outcomes are in viewer order.
    pub async fn apply_logo_to_all(&self, data_url: &str) -> Vec<ApplyOutcome> {
        {
            let mut selection = self.selection.lock();
            selection.logo_data = Some(data_url.to_string());
            log_persist("logo", selection.persist_logo(self.store.as_ref()));
        }
        let aliases = self.config.aliases.get(Part::Logo);
        let first = self
            .textures
            .apply(&self.main, aliases, data_url, ApplyOptions::default())
            .await;

        let rest: Vec<Arc<Viewer>> = self
            .viewers()
            .into_iter()
            .filter(|v| v.id() != self.main.id())
            .collect();
        let mut outcomes = vec![first];
        outcomes.extend(
            self.textures
                .apply_all(&rest, aliases, data_url, ApplyOptions::default())
                .await,
        );
        outcomes
    }

    async fn apply_to_all(&self, part: Part, url: &str, opts: ApplyOptions) -> Vec<ApplyOutcome> {
        let viewers = self.viewers();
        let outcomes = self
            .textures
            .apply_all(&viewers, self.config.aliases.get(part), url, opts)
            .await;
        let bound = outcomes.iter().filter(|o| o.is_bound()).count();
        log::debug!("{} {} bound on {}/{} viewers", part, url, bound, viewers.len());
        outcomes
    }

    // ---------- Colors ----------

    /// Set `part` to a named color on every viewer and remember it.
    /// Returns the number of materials painted; names outside the part's
    /// options are logged and ignored.
    pub fn apply_color(&self, part: Part, name: &str) -> usize {
        let color = match ColorChoice::parse(name) {
            Some(color) if self.config.part_options.allows(part, color) => color,
            _ => {
                log::warn!("unknown color {:?} for {}", name, part);
                return 0;
            }
        };
        {
            let mut selection = self.selection.lock();
            selection.set_color(part, color);
            log_persist("colors", selection.persist_colors(self.store.as_ref()));
            // painting clears the pattern's material, so the pattern is no longer shown
            if self.covers_pattern(part) && selection.pattern_url.take().is_some() {
                log_persist("pattern", selection.persist_pattern(self.store.as_ref()));
            }
        }
        self.paint_all(part, color.factor())
    }

    fn covers_pattern(&self, part: Part) -> bool {
        let pattern = self.config.aliases.get(Part::Pattern);
        part != Part::Pattern
            && self
                .config
                .aliases
                .get(part)
                .iter()
                .any(|alias| pattern.contains(alias))
    }

    /// Tint `part` with `#rrggbb`; unparsable input uses the fallback pink.
    /// Not remembered.
    pub fn apply_hex_color(&self, part: Part, hex: &str) -> usize {
        self.paint_all(part, hex_or_fallback(hex))
    }

    fn paint_all(&self, part: Part, factor: [f32; 4]) -> usize {
        let aliases = self.config.aliases.get(part);
        self.viewers()
            .iter()
            .map(|viewer| paint(viewer, aliases, factor))
            .sum()
    }

    // ---------- Auto-cycle ----------

    /// Cycle the configured patterns every `interval` until the user picks
    /// one. Returns false if a pattern was already picked or there is nothing
    /// to cycle.
    pub fn start_auto_cycle(self: &Arc<Self>, interval: Duration) -> bool {
        if self.selection.lock().manual_pattern {
            log::debug!("auto-cycle refused: pattern chosen by user");
            return false;
        }

        let studio: Weak<Studio> = Arc::downgrade(self);
        self.cycle
            .start(self.config.pattern_urls(), interval, move |url| {
                let studio = studio.upgrade();
                async move {
                    let Some(studio) = studio else {
                        return TickControl::Stop;
                    };
                    if studio.selection.lock().manual_pattern {
                        return TickControl::Stop;
                    }
                    studio.apply_pattern_to_all(&url, true).await;
                    TickControl::Continue
                }
            })
    }

    pub fn stop_auto_cycle(&self) -> bool {
        self.cycle.stop()
    }

    pub fn auto_cycle_state(&self) -> CycleState {
        self.cycle.state()
    }
}

fn log_persist(what: &str, result: Result<()>) {
    if let Err(e) = result {
        log::warn!("could not persist {}: {}", what, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::AlphaMode;
    use crate::selection::{COLORS_KEY, LOGO_KEY, PATTERN_KEY};
    use crate::storage::MemoryStore;
    use crate::testing::{MockAssetLoader, MockTextureLoader};
    use crate::texture_cache::source_key;
    use std::collections::BTreeMap;

    fn config() -> StudioConfig {
        StudioConfig {
            models: vec![ModelEntry::new("Round Tub", "a.glb"), ModelEntry::new("Sweet Box", "b.glb")],
            ..StudioConfig::default()
        }
    }

    fn studio(store: Arc<MemoryStore>) -> (Arc<Studio>, Arc<MockTextureLoader>) {
        studio_with(store, MockTextureLoader::new())
    }

    fn studio_with(store: Arc<MemoryStore>, textures: MockTextureLoader) -> (Arc<Studio>, Arc<MockTextureLoader>) {
        let assets = MockAssetLoader::new()
            .with_asset("a.glb", &["Top", "Bottom", "Bottom1", "Logo"])
            .with_asset("b.glb", &["Top.006", "Bottom.006", "Logo"]);
        let textures = Arc::new(textures);
        let studio = Studio::new(config(), Arc::new(assets), textures.clone(), store);
        (studio, textures)
    }

    fn bound(viewer: &Viewer, material: &str) -> Option<crate::material::SourceKey> {
        viewer
            .with_asset(|a| a.material(material).and_then(|m| m.bound_source()))
            .flatten()
    }

    #[tokio::test]
    async fn transparency_on_tub_is_applied_and_remembered() {
        let store = Arc::new(MemoryStore::new());
        let (studio, _) = studio(store.clone());
        studio.select_model(0).await.unwrap();

        assert_eq!(studio.apply_color(Part::Tub, "Transparency"), 2);
        studio
            .main_viewer()
            .with_asset(|a| {
                for name in ["Bottom", "Bottom1"] {
                    let mat = a.material(name).unwrap();
                    assert_eq!(mat.alpha_mode, AlphaMode::Blend);
                    assert_eq!(mat.base_color_factor, [1.0, 1.0, 1.0, 0.3]);
                    assert!(mat.double_sided);
                }
            })
            .unwrap();

        let raw = store.get(COLORS_KEY).unwrap().unwrap();
        let saved: BTreeMap<String, String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(saved.get("tub").map(String::as_str), Some("transparency"));
    }

    #[tokio::test]
    async fn colors_outside_the_table_are_ignored() {
        let store = Arc::new(MemoryStore::new());
        let (studio, _) = studio(store.clone());
        studio.select_model(0).await.unwrap();
        assert_eq!(studio.apply_color(Part::Lid, "magenta"), 0);
        assert_eq!(studio.apply_color(Part::Lid, "black"), 0);
        assert_eq!(studio.selection().color(Part::Lid), Some(ColorChoice::White));
        assert!(store.get(COLORS_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn hex_tint_falls_back_on_bad_input() {
        let (studio, _) = studio(Arc::new(MemoryStore::new()));
        studio.select_model(0).await.unwrap();
        assert_eq!(studio.apply_hex_color(Part::Lid, "#000000"), 1);
        assert_eq!(studio.apply_hex_color(Part::Lid, "pink"), 1);
        let factor = studio
            .main_viewer()
            .with_asset(|a| a.material("Top").unwrap().base_color_factor)
            .unwrap();
        assert_eq!(factor, hex_or_fallback(crate::color::FALLBACK_HEX));
    }

    #[tokio::test]
    async fn switching_models_reapplies_selection() {
        let store = Arc::new(MemoryStore::new());
        let (studio, textures) = studio(store.clone());
        studio.select_model(0).await.unwrap();
        studio.apply_color(Part::Lid, "transparency");
        let outcomes = studio.select_pattern("/assets/pattern/pattern-2.webp?v=1").await;
        assert_eq!(outcomes, vec![ApplyOutcome::Applied { created: true }]);
        assert_eq!(
            store.get(PATTERN_KEY).unwrap().as_deref(),
            Some("/assets/pattern/pattern-2.webp?v=1")
        );

        studio.select_model(1).await.unwrap();
        let main = studio.main_viewer();
        assert_eq!(main.src().as_deref(), Some("b.glb"));
        assert_eq!(bound(&main, "Bottom.006"), Some(source_key("/assets/pattern/pattern-2.webp")));
        let lid_alpha = main.with_asset(|a| a.material("Top.006").unwrap().alpha_mode).unwrap();
        assert_eq!(lid_alpha, AlphaMode::Blend);
        assert_eq!(studio.export_file_stem().as_deref(), Some("Sweet_Box"));
        assert_eq!(textures.calls(), 2);
    }

    #[tokio::test]
    async fn tub_color_after_pattern_survives_model_switch() {
        let store = Arc::new(MemoryStore::new());
        let (studio, _) = studio(store.clone());
        studio.select_model(0).await.unwrap();
        studio.select_pattern("/assets/pattern/pattern-1.webp").await;
        assert_eq!(studio.apply_color(Part::Tub, "black"), 2);

        assert_eq!(studio.selection().pattern_url, None);
        assert!(store.get(PATTERN_KEY).unwrap().is_none());

        studio.select_model(1).await.unwrap();
        let main = studio.main_viewer();
        assert_eq!(bound(&main, "Bottom.006"), None);
        let factor = main
            .with_asset(|a| a.material("Bottom.006").unwrap().base_color_factor)
            .unwrap();
        assert_eq!(factor, [0.0, 0.0, 0.0, 1.0]);
    }

    #[tokio::test]
    async fn lid_color_keeps_the_pattern() {
        let (studio, _) = studio(Arc::new(MemoryStore::new()));
        studio.select_model(0).await.unwrap();
        studio.select_pattern("/assets/pattern/pattern-1.webp").await;
        studio.apply_color(Part::Lid, "transparency");
        assert_eq!(
            studio.selection().pattern_url.as_deref(),
            Some("/assets/pattern/pattern-1.webp")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn manual_pick_of_shown_pattern_beats_pending_tick() {
        let slow = "/assets/pattern/pattern-2.webp";
        let shown = "/assets/pattern/pattern-1.webp";
        let textures = MockTextureLoader::new().with_delay(slow, Duration::from_millis(500));
        let (studio, _) = studio_with(Arc::new(MemoryStore::new()), textures);
        studio.select_model(0).await.unwrap();
        studio.apply_pattern_to_all(shown, true).await;

        let tick = studio.apply_pattern_to_all(slow, true);
        let pick = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            studio.select_pattern(shown).await
        };
        let (tick, pick) = tokio::join!(tick, pick);

        assert_eq!(pick, vec![ApplyOutcome::Unchanged]);
        assert_eq!(tick, vec![ApplyOutcome::Superseded]);
        assert_eq!(bound(&studio.main_viewer(), "Bottom"), Some(source_key(shown)));
        assert_eq!(studio.selection().pattern_url.as_deref(), Some(shown));
    }

    #[tokio::test]
    async fn model_index_is_checked() {
        let (studio, _) = studio(Arc::new(MemoryStore::new()));
        let err = studio.select_model(9).await.unwrap_err();
        assert!(matches!(err, StudioError::ModelIndex(9)));
    }

    #[tokio::test]
    async fn logo_reaches_main_and_thumbnails() {
        let store = Arc::new(MemoryStore::new());
        let (studio, _) = studio(store.clone());
        let thumb = studio.add_viewer(ViewerSlot::Thumbnail(0));
        studio.select_model(0).await.unwrap();
        studio.load_viewer(&thumb, "b.glb").await.unwrap();

        let logo = "data:image/png;base64,iVBORw0KGgo=";
        let outcomes = studio.apply_logo_to_all(logo).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(ApplyOutcome::is_bound));
        assert_eq!(bound(&thumb, "Logo"), Some(source_key(logo)));
        assert_eq!(store.get(LOGO_KEY).unwrap().as_deref(), Some(logo));
    }

    #[tokio::test]
    async fn persisted_selection_is_restored_on_load() {
        let store = Arc::new(MemoryStore::new());
        store.set(COLORS_KEY, r#"{"tub":"black"}"#).unwrap();
        store.set(PATTERN_KEY, "/assets/pattern/pattern-4.webp").unwrap();

        let (studio, _) = studio(store);
        assert_eq!(studio.selection().color(Part::Tub), Some(ColorChoice::Black));
        studio.select_model(0).await.unwrap();

        let main = studio.main_viewer();
        // the pattern goes on top of the restored tub color
        assert_eq!(bound(&main, "Bottom"), Some(source_key("/assets/pattern/pattern-4.webp")));
        let bottom1 = main
            .with_asset(|a| a.material("Bottom1").unwrap().base_color_factor)
            .unwrap();
        assert_eq!(bottom1, [0.0, 0.0, 0.0, 1.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_pick_ends_the_cycle_for_good() {
        let (studio, _) = studio(Arc::new(MemoryStore::new()));
        studio.select_model(0).await.unwrap();
        let main = studio.main_viewer();

        assert!(studio.start_auto_cycle(Duration::from_millis(2000)));
        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(bound(&main, "Bottom"), Some(source_key("/assets/pattern/pattern-1.webp")));
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(bound(&main, "Bottom"), Some(source_key("/assets/pattern/pattern-2.webp")));

        studio.select_pattern("custom.webp").await;
        assert_eq!(studio.auto_cycle_state(), CycleState::Idle);
        assert!(!studio.start_auto_cycle(Duration::from_millis(2000)));

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(bound(&main, "Bottom"), Some(source_key("custom.webp")));
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_the_cycle_keeps_current_pattern() {
        let (studio, _) = studio(Arc::new(MemoryStore::new()));
        studio.select_model(0).await.unwrap();
        assert!(studio.start_auto_cycle(Duration::from_millis(1000)));
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(studio.stop_auto_cycle());
        assert!(!studio.stop_auto_cycle());

        tokio::time::sleep(Duration::from_secs(5)).await;
        let main = studio.main_viewer();
        assert_eq!(bound(&main, "Bottom"), Some(source_key("/assets/pattern/pattern-1.webp")));
        // the cycle never persists what it shows
        assert!(!studio.selection().manual_pattern);
    }
}
