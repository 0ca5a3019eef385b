//! Lingua Core Library
//!
//! Localization resolution and pluralization engine: merges raw
//! per-locale dictionaries from an application root and its components
//! into canonical, fallback-complete dictionaries, and selects
//! grammatical plural forms through a small per-locale rule expression
//! language.
//!
//! The engine performs no I/O. An external loader collects raw
//! dictionaries (startup and on every source change) and drives
//! [`LocalizationStore::rebuild`]; HTTP middleware and template helpers
//! consume [`LocalizationProvider`] and the serialized dictionary text.

// Re-export commonly used types and functions
pub use error::{LinguaError, LinguaResult};
pub use locale::LocaleId;
pub use merge::{
    coverage_report, merge, CoverageReport, DuplicateKey, LocaleCoverage, MergeOutcome,
    MergedDictionary, Pluralization, RawDictionary, SourceId, TextValue, PLURALIZATION_KEY,
};
pub use plural::{compile, rule_for, CompiledRule, PluralRuleEngine, IDENTITY_RULE};
pub use provider::{LinguaConfig, LocalizationProvider};
pub use store::{LoadEvent, LoadHook, LocalizationStore};

// Public modules
pub mod error;
pub mod locale;
pub mod merge;
pub mod plural;
pub mod provider;
pub mod store;
