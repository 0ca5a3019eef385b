//! Multi-source dictionary merge with override precedence and provenance.
//!
//! Raw per-locale dictionaries arrive in source discovery order: the
//! application root first, then each component. Later sources overwrite
//! earlier ones per key; every overwrite is a non-fatal duplicate-key
//! warning. After per-locale combination, every non-default locale is
//! overlaid on top of the default locale's dictionary so merged
//! dictionaries are fallback-complete, and the keys whose plural-form
//! arrays were taken verbatim from the default locale are tracked as
//! `inherited_keys`.
//!
//! The merge is a pure function: the same raw input always produces
//! byte-identical output, and provenance is computed as a value alongside
//! each merged dictionary, never patched in afterward.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use tracing::warn;

use crate::error::{LinguaError, LinguaResult};
use crate::locale::LocaleId;
use crate::plural::rule_for;

/// Identity of one dictionary source (the application root or a component).
pub type SourceId = String;

/// Reserved key: a dictionary may carry its own plural rule expression as
/// data, which takes precedence over the built-in rule table.
pub const PLURALIZATION_KEY: &str = "$pluralization";

/// A dictionary value: a plain string or an ordered plural-form array
/// (index 0 = first form).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextValue {
    One(String),
    Forms(Vec<String>),
}

impl TextValue {
    /// Whether this value is a plural-form array.
    pub fn is_forms(&self) -> bool {
        matches!(self, TextValue::Forms(_))
    }

    /// The canonical singular-ish reading: the string itself, or form 0.
    pub fn first(&self) -> Option<&str> {
        match self {
            TextValue::One(s) => Some(s),
            TextValue::Forms(forms) => forms.first().map(String::as_str),
        }
    }
}

impl From<&str> for TextValue {
    fn from(value: &str) -> Self {
        TextValue::One(value.to_string())
    }
}

impl From<Vec<String>> for TextValue {
    fn from(forms: Vec<String>) -> Self {
        TextValue::Forms(forms)
    }
}

/// One source's key/value mapping for one locale, pre-merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDictionary {
    pub locale: LocaleId,
    pub source: SourceId,
    pub entries: BTreeMap<String, TextValue>,
}

impl RawDictionary {
    pub fn new(locale: LocaleId, source: impl Into<SourceId>) -> Self {
        Self {
            locale,
            source: source.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Insert a value, builder-style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<TextValue>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }
}

/// Plural metadata attached to a merged dictionary.
///
/// The default locale carries only `rule`. Non-default locales additionally
/// carry the default locale's rule and the set of keys whose plural-form
/// arrays were inherited from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pluralization {
    pub rule: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_rule: Option<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub inherited_keys: BTreeSet<String>,
}

/// The fully resolved, fallback-complete dictionary for one locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedDictionary {
    pub entries: BTreeMap<String, TextValue>,
    pub pluralization: Pluralization,
}

impl MergedDictionary {
    pub fn get(&self, key: &str) -> Option<&TextValue> {
        self.entries.get(key)
    }

    /// Whether a key's plural-form array was taken verbatim from the
    /// default locale.
    pub fn is_inherited(&self, key: &str) -> bool {
        self.pluralization.inherited_keys.contains(key)
    }

    /// The rule that applies to a given key: the default locale's rule for
    /// inherited keys, this locale's own rule otherwise.
    pub fn rule_for_key(&self, key: &str) -> &str {
        if self.is_inherited(key) {
            self.pluralization
                .default_rule
                .as_deref()
                .unwrap_or(&self.pluralization.rule)
        } else {
            &self.pluralization.rule
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

// The serialized form is the wire blob an HTTP layer embeds in responses:
// the entries as a flat object plus the descriptor under `$pluralization`.
impl Serialize for MergedDictionary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len() + 1))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry(PLURALIZATION_KEY, &self.pluralization)?;
        map.end()
    }
}

/// Non-fatal merge event: a later source redefined an existing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateKey {
    pub locale: LocaleId,
    pub key: String,
    pub winning_source: SourceId,
}

impl fmt::Display for DuplicateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "duplicate key '{}' in locale '{}' overridden by source '{}'",
            self.key, self.locale, self.winning_source
        )
    }
}

/// Result of a merge: one dictionary per locale present in the input, plus
/// the duplicate-key warnings gathered along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub dictionaries: BTreeMap<LocaleId, MergedDictionary>,
    pub warnings: Vec<DuplicateKey>,
}

/// Combine raw dictionaries into one merged dictionary per locale.
///
/// The default locale's combined dictionary must exist and be non-empty;
/// otherwise the whole merge fails with
/// [`LinguaError::MissingDefaultLocale`] and nothing is produced.
pub fn merge(default_locale: &LocaleId, raw: &[RawDictionary]) -> LinguaResult<MergeOutcome> {
    let mut combined: BTreeMap<LocaleId, BTreeMap<String, TextValue>> = BTreeMap::new();
    let mut warnings = Vec::new();

    // Pass 1: per-locale overlay in source discovery order.
    for dictionary in raw {
        let target = combined.entry(dictionary.locale.clone()).or_default();
        for (key, value) in &dictionary.entries {
            if target.insert(key.clone(), value.clone()).is_some() {
                let event = DuplicateKey {
                    locale: dictionary.locale.clone(),
                    key: key.clone(),
                    winning_source: dictionary.source.clone(),
                };
                warn!(
                    locale = %event.locale,
                    key = %event.key,
                    source = %event.winning_source,
                    "duplicate localization key overridden"
                );
                warnings.push(event);
            }
        }
    }

    let mut base = combined
        .remove(default_locale)
        .ok_or_else(|| LinguaError::MissingDefaultLocale {
            locale: default_locale.to_string(),
        })?;
    let base_rule_override = take_rule_override(&mut base);
    if base.is_empty() {
        return Err(LinguaError::MissingDefaultLocale {
            locale: default_locale.to_string(),
        });
    }

    let default_rule =
        base_rule_override.unwrap_or_else(|| rule_for(default_locale).to_string());

    let mut dictionaries = BTreeMap::new();

    // Pass 2: overlay each non-default locale on top of the default set.
    for (locale, mut own) in combined {
        let rule_override = take_rule_override(&mut own);

        let mut inherited_keys: BTreeSet<String> = base
            .iter()
            .filter(|(_, value)| value.is_forms())
            .map(|(key, _)| key.clone())
            .collect();

        let mut entries = base.clone();
        for (key, value) in own {
            inherited_keys.remove(&key);
            entries.insert(key, value);
        }

        let rule = rule_override.unwrap_or_else(|| rule_for(&locale).to_string());
        dictionaries.insert(
            locale,
            MergedDictionary {
                entries,
                pluralization: Pluralization {
                    rule,
                    default_rule: Some(default_rule.clone()),
                    inherited_keys,
                },
            },
        );
    }

    // The default locale's dictionary is the base itself, never overlaid.
    dictionaries.insert(
        default_locale.clone(),
        MergedDictionary {
            entries: base,
            pluralization: Pluralization {
                rule: default_rule,
                default_rule: None,
                inherited_keys: BTreeSet::new(),
            },
        },
    );

    Ok(MergeOutcome {
        dictionaries,
        warnings,
    })
}

/// Pull a `$pluralization` entry out of a combined dictionary, if the data
/// supplied one. A plural-form array under the reserved key is meaningless
/// and is dropped with a warning.
fn take_rule_override(entries: &mut BTreeMap<String, TextValue>) -> Option<String> {
    match entries.remove(PLURALIZATION_KEY) {
        Some(TextValue::One(expression)) => Some(expression),
        Some(TextValue::Forms(_)) => {
            warn!("ignoring non-string {PLURALIZATION_KEY} entry");
            None
        }
        None => None,
    }
}

/// Per-locale key coverage relative to the default locale, computed over
/// the raw (pre-overlay) input. Missing keys will be served from the
/// default locale after merge; extra keys have no default-locale
/// counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageReport {
    pub total_keys: usize,
    pub locales: BTreeMap<LocaleId, LocaleCoverage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocaleCoverage {
    pub present: usize,
    pub missing: Vec<String>,
    pub extra: Vec<String>,
}

/// Compare each locale's combined key set against the default locale's.
pub fn coverage_report(
    default_locale: &LocaleId,
    raw: &[RawDictionary],
) -> LinguaResult<CoverageReport> {
    let mut combined: BTreeMap<LocaleId, BTreeSet<String>> = BTreeMap::new();
    for dictionary in raw {
        combined
            .entry(dictionary.locale.clone())
            .or_default()
            .extend(
                dictionary
                    .entries
                    .keys()
                    .filter(|key| key.as_str() != PLURALIZATION_KEY)
                    .cloned(),
            );
    }

    let base = combined
        .remove(default_locale)
        .ok_or_else(|| LinguaError::MissingDefaultLocale {
            locale: default_locale.to_string(),
        })?;

    let locales = combined
        .into_iter()
        .map(|(locale, keys)| {
            let missing: Vec<String> = base.difference(&keys).cloned().collect();
            let extra: Vec<String> = keys.difference(&base).cloned().collect();
            let coverage = LocaleCoverage {
                present: base.len() - missing.len(),
                missing,
                extra,
            };
            (locale, coverage)
        })
        .collect();

    Ok(CoverageReport {
        total_keys: base.len(),
        locales,
    })
}
