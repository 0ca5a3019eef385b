//! Committed localization snapshots with atomic rebuild.
//!
//! The store owns the latest successfully merged dictionary set and its
//! serialized per-locale text cache. Queries resolve against an immutable
//! snapshot behind an `Arc`; a rebuild assembles a complete replacement
//! snapshot off to the side and commits it with a single reference swap,
//! so concurrent readers always observe either the fully-old or the
//! fully-new state. A failed rebuild leaves the previous snapshot in
//! place and is reported through load events, never through the query
//! path.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, error, info};

use crate::error::{LinguaError, LinguaResult};
use crate::locale::LocaleId;
use crate::merge::{merge, MergedDictionary, RawDictionary};

/// Lifecycle notification for collaborators that must wait for data
/// before serving requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadEvent {
    /// A rebuild committed. `first` marks the initial load.
    Loaded { locales: usize, first: bool },
    /// A rebuild failed; previous state (if any) is still being served.
    Failed { reason: String },
}

/// Registered load-event observer.
pub type LoadHook = Arc<dyn Fn(&LoadEvent) + Send + Sync>;

#[derive(Debug)]
struct Snapshot {
    dictionaries: BTreeMap<LocaleId, Arc<MergedDictionary>>,
    serialized: BTreeMap<LocaleId, Arc<str>>,
}

/// Holds the canonical per-locale dictionaries and serves locale-aware
/// lookups.
pub struct LocalizationStore {
    default_locale: LocaleId,
    committed: RwLock<Option<Arc<Snapshot>>>,
    rebuild_gate: Mutex<()>,
    hooks: RwLock<Vec<LoadHook>>,
}

impl LocalizationStore {
    /// Create an empty store. The default locale identifier is validated
    /// here; an invalid format is a fatal startup error.
    pub fn new(default_locale: &str) -> LinguaResult<Self> {
        Ok(Self {
            default_locale: LocaleId::normalize(default_locale)?,
            committed: RwLock::new(None),
            rebuild_gate: Mutex::new(()),
            hooks: RwLock::new(Vec::new()),
        })
    }

    pub fn default_locale(&self) -> &LocaleId {
        &self.default_locale
    }

    /// Register a load-event hook. Hooks fire on every rebuild outcome.
    pub fn on_load(&self, hook: LoadHook) {
        if let Ok(mut hooks) = self.hooks.write() {
            hooks.push(hook);
        }
    }

    /// Whether an initial load has committed.
    pub fn is_initialized(&self) -> bool {
        self.committed.read().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Locales with a committed merged dictionary.
    pub fn locales(&self) -> Vec<LocaleId> {
        match self.snapshot() {
            Some(snapshot) => snapshot.dictionaries.keys().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Merge `raw` and commit the result atomically.
    ///
    /// On failure the existing snapshot stays in place and the error is
    /// both returned and reported through the `Failed` load event.
    /// Overlapping rebuild requests serialize on an internal gate; queries
    /// never wait on it.
    pub fn rebuild(&self, raw: &[RawDictionary]) -> LinguaResult<()> {
        let _gate = self
            .rebuild_gate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let snapshot = match self.build_snapshot(raw) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                error!(error = %err, "localization rebuild failed; keeping previous state");
                self.fire(&LoadEvent::Failed {
                    reason: err.to_string(),
                });
                return Err(err);
            }
        };

        let locales = snapshot.dictionaries.len();
        let first = {
            let mut committed = self
                .committed
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let first = committed.is_none();
            *committed = Some(Arc::new(snapshot));
            first
        };

        info!(locales, first, "localization snapshot committed");
        self.fire(&LoadEvent::Loaded { locales, first });
        Ok(())
    }

    fn build_snapshot(&self, raw: &[RawDictionary]) -> LinguaResult<Snapshot> {
        let outcome = merge(&self.default_locale, raw)?;
        debug!(
            locales = outcome.dictionaries.len(),
            duplicates = outcome.warnings.len(),
            "merged raw dictionaries"
        );

        let mut dictionaries = BTreeMap::new();
        let mut serialized = BTreeMap::new();
        for (locale, dictionary) in outcome.dictionaries {
            let text = serde_json::to_string(&dictionary).map_err(|err| {
                LinguaError::Serialization {
                    locale: locale.to_string(),
                    reason: err.to_string(),
                }
            })?;
            serialized.insert(locale.clone(), Arc::from(text.as_str()));
            dictionaries.insert(locale, Arc::new(dictionary));
        }

        Ok(Snapshot {
            dictionaries,
            serialized,
        })
    }

    /// Resolve the merged dictionary for a locale.
    ///
    /// An empty input means the default locale. The fallback chain is
    /// walked over the committed dictionaries; a syntactically valid
    /// locale always resolves to something once initialization succeeded
    /// (ultimately the default dictionary).
    pub fn resolve(&self, locale: &str) -> LinguaResult<Arc<MergedDictionary>> {
        let target = self.target_locale(locale)?;
        let snapshot = self.snapshot().ok_or(LinguaError::NotInitialized)?;

        for candidate in target.fallback_chain() {
            if let Some(dictionary) = snapshot.dictionaries.get(&candidate) {
                return Ok(Arc::clone(dictionary));
            }
        }
        snapshot
            .dictionaries
            .get(&self.default_locale)
            .cloned()
            .ok_or(LinguaError::NotInitialized)
    }

    /// The serialized JSON text of the dictionary a locale resolves to.
    pub fn serialized(&self, locale: &str) -> LinguaResult<Arc<str>> {
        let target = self.target_locale(locale)?;
        let snapshot = self.snapshot().ok_or(LinguaError::NotInitialized)?;

        for candidate in target.fallback_chain() {
            if let Some(text) = snapshot.serialized.get(&candidate) {
                return Ok(Arc::clone(text));
            }
        }
        snapshot
            .serialized
            .get(&self.default_locale)
            .cloned()
            .ok_or(LinguaError::NotInitialized)
    }

    fn target_locale(&self, locale: &str) -> LinguaResult<LocaleId> {
        if locale.trim().is_empty() {
            Ok(self.default_locale.clone())
        } else {
            LocaleId::normalize(locale)
        }
    }

    fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.committed
            .read()
            .ok()
            .and_then(|guard| guard.as_ref().map(Arc::clone))
    }

    fn fire(&self, event: &LoadEvent) {
        if let Ok(hooks) = self.hooks.read() {
            for hook in hooks.iter() {
                hook(event);
            }
        }
    }
}

impl std::fmt::Debug for LocalizationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalizationStore")
            .field("default_locale", &self.default_locale)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{TextValue, PLURALIZATION_KEY};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn locale(tag: &str) -> LocaleId {
        LocaleId::normalize(tag).unwrap()
    }

    fn sample_raw() -> Vec<RawDictionary> {
        vec![
            RawDictionary::new(locale("ru"), "root").with("GREETING", "привет"),
            RawDictionary::new(locale("en"), "component").with("GREETING", "hello"),
        ]
    }

    #[test]
    fn invalid_default_locale_is_a_startup_error() {
        assert!(matches!(
            LocalizationStore::new("not a locale"),
            Err(LinguaError::InvalidLocaleName(_))
        ));
    }

    #[test]
    fn resolve_before_first_rebuild_is_not_initialized() {
        let store = LocalizationStore::new("ru").unwrap();
        assert!(!store.is_initialized());
        assert_eq!(store.resolve("en"), Err(LinguaError::NotInitialized));
        assert_eq!(store.serialized("en"), Err(LinguaError::NotInitialized));
        // Malformed input still reports the input error, initialized or not.
        assert!(matches!(
            store.resolve("bad locale"),
            Err(LinguaError::InvalidLocaleName(_))
        ));
    }

    #[test]
    fn resolve_walks_fallback_chain() {
        let store = LocalizationStore::new("ru").unwrap();
        store.rebuild(&sample_raw()).unwrap();

        // en-gb has no dictionary of its own; primary subtag wins.
        let via_region = store.resolve("en-gb").unwrap();
        let direct = store.resolve("en").unwrap();
        assert!(Arc::ptr_eq(&via_region, &direct));

        // Unknown language falls back to the default dictionary.
        let unknown = store.resolve("fi").unwrap();
        let default = store.resolve("").unwrap();
        assert!(Arc::ptr_eq(&unknown, &default));
        assert_eq!(
            default.get("GREETING"),
            Some(&TextValue::One("привет".into()))
        );
    }

    #[test]
    fn empty_locale_means_default() {
        let store = LocalizationStore::new("ru").unwrap();
        store.rebuild(&sample_raw()).unwrap();
        let resolved = store.resolve("  ").unwrap();
        assert_eq!(
            resolved.get("GREETING"),
            Some(&TextValue::One("привет".into()))
        );
    }

    #[test]
    fn case_is_normalized_on_lookup() {
        let store = LocalizationStore::new("ru").unwrap();
        store.rebuild(&sample_raw()).unwrap();
        let upper = store.resolve("EN").unwrap();
        let lower = store.resolve("en").unwrap();
        assert!(Arc::ptr_eq(&upper, &lower));
    }

    #[test]
    fn failed_rebuild_keeps_previous_snapshot() {
        let store = LocalizationStore::new("ru").unwrap();
        store.rebuild(&sample_raw()).unwrap();

        // No default-locale dictionary at all: fatal merge error.
        let bad = vec![RawDictionary::new(locale("en"), "component").with("X", "y")];
        assert!(matches!(
            store.rebuild(&bad),
            Err(LinguaError::MissingDefaultLocale { .. })
        ));

        // The prior state is still served.
        let resolved = store.resolve("en").unwrap();
        assert_eq!(
            resolved.get("GREETING"),
            Some(&TextValue::One("hello".into()))
        );
    }

    #[test]
    fn events_fire_for_loads_and_failures() {
        let store = LocalizationStore::new("ru").unwrap();
        let events: Arc<Mutex<Vec<LoadEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        store.on_load(Arc::new(move |event| {
            sink.lock().unwrap().push(event.clone());
        }));

        store.rebuild(&sample_raw()).unwrap();
        store.rebuild(&sample_raw()).unwrap();
        let _ = store.rebuild(&[]);

        let seen = events.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], LoadEvent::Loaded { locales: 2, first: true });
        assert_eq!(seen[1], LoadEvent::Loaded { locales: 2, first: false });
        assert!(matches!(seen[2], LoadEvent::Failed { .. }));
    }

    #[test]
    fn hooks_observe_initial_load_once() {
        let store = LocalizationStore::new("ru").unwrap();
        let first_loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&first_loads);
        store.on_load(Arc::new(move |event| {
            if matches!(event, LoadEvent::Loaded { first: true, .. }) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));

        store.rebuild(&sample_raw()).unwrap();
        store.rebuild(&sample_raw()).unwrap();
        assert_eq!(first_loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn serialized_cache_matches_resolution() {
        let store = LocalizationStore::new("ru").unwrap();
        store.rebuild(&sample_raw()).unwrap();

        let text = store.serialized("en-us").unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["GREETING"], "hello");
        assert!(parsed[PLURALIZATION_KEY].is_object());
    }

    #[test]
    fn locales_lists_committed_dictionaries() {
        let store = LocalizationStore::new("ru").unwrap();
        assert!(store.locales().is_empty());
        store.rebuild(&sample_raw()).unwrap();
        let locales: Vec<String> = store.locales().into_iter().map(String::from).collect();
        assert_eq!(locales, vec!["en".to_string(), "ru".to_string()]);
    }
}
