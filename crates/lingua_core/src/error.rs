//! Error taxonomy for the localization engine.
//!
//! Query paths only ever surface [`LinguaError::InvalidLocaleName`] (bad
//! caller input) or [`LinguaError::NotInitialized`] (no snapshot committed
//! yet). Rebuild failures stay on the rebuild path and are reported through
//! the store's load events, never thrown at readers.

use thiserror::Error;

/// Result type for all localization operations
pub type LinguaResult<T> = Result<T, LinguaError>;

/// Main error type for the localization engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinguaError {
    /// Input does not match the `language` / `language-region` grammar.
    /// Always recoverable by the caller.
    #[error("invalid locale name '{0}'")]
    InvalidLocaleName(String),

    /// The default locale's dictionary could not be established after a
    /// merge attempt. Fatal for that rebuild; prior state stays in place.
    #[error("default locale '{locale}' has no non-empty dictionary")]
    MissingDefaultLocale { locale: String },

    /// A plural rule expression is malformed. Scoped to the specific rule;
    /// plain lookups for the locale are unaffected.
    #[error("plural rule compilation failed at offset {offset}: {reason} (in '{expression}')")]
    RuleCompilation {
        expression: String,
        offset: usize,
        reason: String,
    },

    /// A merged dictionary could not be rendered to its serialized form.
    #[error("failed to serialize dictionary for locale '{locale}': {reason}")]
    Serialization { locale: String, reason: String },

    /// Lookup before the first successful rebuild has committed.
    #[error("localization store has not completed an initial load")]
    NotInitialized,
}
