//! Query-facing localization API: plain and pluralized lookups.
//!
//! Built on [`LocalizationStore`] for data and [`PluralRuleEngine`] for
//! plural-category selection. Both operations are pure reads; they never
//! trigger a rebuild. Missing keys and missing plural forms are not
//! errors — they resolve to the configured missing-value policy (empty
//! string, or the literal key when `placeholder_on_missing` is set).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::LinguaResult;
use crate::merge::TextValue;
use crate::plural::PluralRuleEngine;
use crate::store::LocalizationStore;

/// Pass-through configuration for the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinguaConfig {
    /// Required; invalid format is a fatal construction error.
    pub default_locale: String,
    /// Return the literal key instead of an empty string for missing
    /// values. Off by default.
    #[serde(default)]
    pub placeholder_on_missing: bool,
}

/// The query surface over a [`LocalizationStore`].
#[derive(Debug)]
pub struct LocalizationProvider {
    store: Arc<LocalizationStore>,
    rules: PluralRuleEngine,
    placeholder_on_missing: bool,
}

impl LocalizationProvider {
    pub fn new(store: Arc<LocalizationStore>, placeholder_on_missing: bool) -> Self {
        Self {
            store,
            rules: PluralRuleEngine::new(),
            placeholder_on_missing,
        }
    }

    /// Build a store/provider pair from configuration.
    pub fn from_config(config: &LinguaConfig) -> LinguaResult<(Arc<LocalizationStore>, Self)> {
        let store = Arc::new(LocalizationStore::new(&config.default_locale)?);
        let provider = Self::new(Arc::clone(&store), config.placeholder_on_missing);
        Ok((store, provider))
    }

    pub fn store(&self) -> &Arc<LocalizationStore> {
        &self.store
    }

    fn missing(&self, key: &str) -> String {
        if self.placeholder_on_missing {
            key.to_string()
        } else {
            String::new()
        }
    }

    /// Look up a plain value. A plural-form array reads as its first form.
    pub fn get(&self, locale: &str, key: &str) -> LinguaResult<String> {
        let dictionary = self.store.resolve(locale)?;
        Ok(match dictionary.get(key).and_then(TextValue::first) {
            Some(value) => value.to_string(),
            None => self.missing(key),
        })
    }

    /// Look up the plural form of a key for a count.
    ///
    /// Non-array values are returned as-is (the count is irrelevant). For
    /// arrays, the rule is the dictionary's own unless the key was
    /// inherited from the default locale, in which case the default
    /// locale's rule applies. Rule compilation failures, evaluation
    /// failures, and out-of-range indices all degrade to the missing
    /// policy.
    pub fn pluralize(&self, locale: &str, key: &str, count: i64) -> LinguaResult<String> {
        let dictionary = self.store.resolve(locale)?;
        let forms = match dictionary.get(key) {
            None => return Ok(self.missing(key)),
            Some(TextValue::One(value)) => return Ok(value.clone()),
            Some(TextValue::Forms(forms)) => forms,
        };

        let expression = dictionary.rule_for_key(key);
        match self.rules.select(expression, count, forms) {
            Ok(Some(form)) => Ok(form.to_string()),
            Ok(None) => Ok(self.missing(key)),
            Err(err) => {
                error!(error = %err, key, "plural rule unusable; treating as missing form");
                Ok(self.missing(key))
            }
        }
    }

    /// [`get`](Self::get) followed by single-pass `{name}` substitution.
    pub fn get_with_args(
        &self,
        locale: &str,
        key: &str,
        args: &[(&str, &str)],
    ) -> LinguaResult<String> {
        Ok(interpolate(&self.get(locale, key)?, args))
    }

    /// [`pluralize`](Self::pluralize) followed by substitution, with
    /// `{count}` injected automatically.
    pub fn pluralize_with_args(
        &self,
        locale: &str,
        key: &str,
        count: i64,
        args: &[(&str, &str)],
    ) -> LinguaResult<String> {
        let template = self.pluralize(locale, key, count)?;
        let count_text = count.to_string();
        let mut all_args: Vec<(&str, &str)> = vec![("count", &count_text)];
        all_args.extend_from_slice(args);
        Ok(interpolate(&template, &all_args))
    }
}

/// Single-pass `{name}` substitution. Tokens without a matching argument
/// are left as-is; replacement values are never re-expanded.
fn interpolate(template: &str, args: &[(&str, &str)]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut chars = template.chars();

    while let Some(ch) = chars.next() {
        if ch != '{' {
            result.push(ch);
            continue;
        }
        let mut token = String::new();
        let mut closed = false;
        for c in chars.by_ref() {
            if c == '}' {
                closed = true;
                break;
            }
            token.push(c);
        }
        if !closed {
            result.push('{');
            result.push_str(&token);
            break;
        }
        match args.iter().find(|(name, _)| *name == token) {
            Some((_, value)) => result.push_str(value),
            None => {
                result.push('{');
                result.push_str(&token);
                result.push('}');
            }
        }
    }

    result
}
