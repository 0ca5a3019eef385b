//! Locale identifiers and fallback chains.
//!
//! A locale identifier is `language` or `language-region` (e.g. `en`,
//! `en-us`), case-insensitive on input and always stored lowercase. Two
//! identifiers are related when they share a primary subtag.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LinguaError, LinguaResult};

/// A validated, normalized locale identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LocaleId(String);

impl LocaleId {
    /// Normalize and validate a locale string.
    ///
    /// Input is lowercased; the valid form is `^[a-z]{2}(-[a-z]{2})?$`.
    /// Anything else is [`LinguaError::InvalidLocaleName`], never a silent
    /// coercion.
    pub fn normalize(input: &str) -> LinguaResult<Self> {
        let lowered = input.trim().to_ascii_lowercase();
        if is_valid_tag(&lowered) {
            Ok(Self(lowered))
        } else {
            Err(LinguaError::InvalidLocaleName(input.to_string()))
        }
    }

    /// The normalized string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `language` portion of the identifier.
    pub fn primary_subtag(&self) -> &str {
        &self.0[..2]
    }

    /// Whether the identifier carries a region subtag.
    pub fn has_region(&self) -> bool {
        self.0.len() > 2
    }

    /// Lookup order for this identifier: itself, then its primary subtag
    /// when a region is present. Consumers try each element in order and
    /// finally fall back to the configured default locale.
    pub fn fallback_chain(&self) -> Vec<LocaleId> {
        if self.has_region() {
            vec![self.clone(), Self(self.primary_subtag().to_string())]
        } else {
            vec![self.clone()]
        }
    }

    /// Whether two identifiers share the same primary subtag.
    pub fn is_related_to(&self, other: &LocaleId) -> bool {
        self.primary_subtag() == other.primary_subtag()
    }
}

fn is_valid_tag(tag: &str) -> bool {
    let bytes = tag.as_bytes();
    match bytes.len() {
        2 => bytes.iter().all(u8::is_ascii_lowercase),
        5 => {
            bytes[0].is_ascii_lowercase()
                && bytes[1].is_ascii_lowercase()
                && bytes[2] == b'-'
                && bytes[3].is_ascii_lowercase()
                && bytes[4].is_ascii_lowercase()
        }
        _ => false,
    }
}

impl fmt::Display for LocaleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for LocaleId {
    type Error = LinguaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::normalize(&value)
    }
}

impl From<LocaleId> for String {
    fn from(value: LocaleId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_input() {
        assert_eq!(LocaleId::normalize("EN").unwrap().as_str(), "en");
        assert_eq!(LocaleId::normalize("En-Us").unwrap().as_str(), "en-us");
        assert_eq!(LocaleId::normalize("  ru ").unwrap().as_str(), "ru");
    }

    #[test]
    fn normalize_rejects_malformed_input() {
        for bad in ["", "e", "eng", "en_US", "en-", "en-u", "en-usa", "12", "en-4u", "en us"] {
            assert!(
                matches!(LocaleId::normalize(bad), Err(LinguaError::InvalidLocaleName(_))),
                "expected rejection for {bad:?}"
            );
        }
    }

    #[test]
    fn primary_subtag_and_region() {
        let plain = LocaleId::normalize("ru").unwrap();
        assert_eq!(plain.primary_subtag(), "ru");
        assert!(!plain.has_region());

        let regional = LocaleId::normalize("en-gb").unwrap();
        assert_eq!(regional.primary_subtag(), "en");
        assert!(regional.has_region());
    }

    #[test]
    fn fallback_chain_orders_specific_first() {
        let regional = LocaleId::normalize("en-gb").unwrap();
        let chain: Vec<String> = regional
            .fallback_chain()
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(chain, vec!["en-gb", "en"]);

        let plain = LocaleId::normalize("ru").unwrap();
        assert_eq!(plain.fallback_chain(), vec![plain.clone()]);
    }

    #[test]
    fn related_locales_share_language() {
        let us = LocaleId::normalize("en-us").unwrap();
        let gb = LocaleId::normalize("en-gb").unwrap();
        let ru = LocaleId::normalize("ru").unwrap();
        assert!(us.is_related_to(&gb));
        assert!(!us.is_related_to(&ru));
    }

    #[test]
    fn serde_round_trip_normalizes() {
        let id: LocaleId = serde_json::from_str("\"En-Us\"").unwrap();
        assert_eq!(id.as_str(), "en-us");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"en-us\"");
        assert!(serde_json::from_str::<LocaleId>("\"not a locale\"").is_err());
    }
}
