//! End-to-end scenarios over the public API: multi-source merge,
//! inheritance, pluralization, fallback, and the missing-value policy.

use std::sync::Arc;

use lingua_core::{
    compile, LocaleId, LocalizationProvider, LocalizationStore, RawDictionary, TextValue,
};

fn locale(tag: &str) -> LocaleId {
    LocaleId::normalize(tag).unwrap()
}

fn forms(values: &[&str]) -> TextValue {
    TextValue::Forms(values.iter().map(|s| s.to_string()).collect())
}

/// Default `ru` dictionary, with two components both localizing `en`.
/// Component B is discovered after A and wins the collision on FIRST;
/// THIRD reaches `en` by inheritance.
#[test]
fn component_overrides_and_default_inheritance() {
    let store = Arc::new(LocalizationStore::new("ru").unwrap());
    let raw = vec![
        RawDictionary::new(locale("ru"), "root").with("THIRD", "ru third"),
        RawDictionary::new(locale("en"), "component-a").with("FIRST", "en first"),
        RawDictionary::new(locale("en"), "component-b")
            .with("FIRST", "en first B")
            .with("SECOND", "en second"),
    ];
    store.rebuild(&raw).unwrap();

    let provider = LocalizationProvider::new(Arc::clone(&store), false);
    assert_eq!(provider.get("en", "FIRST").unwrap(), "en first B");
    assert_eq!(provider.get("en", "SECOND").unwrap(), "en second");
    assert_eq!(provider.get("en", "THIRD").unwrap(), "ru third");

    let merged_en = store.resolve("en").unwrap();
    assert_eq!(merged_en.len(), 3);
}

/// The canonical Russian one/few/many rule drives form selection for
/// яблоко/яблока/яблок, both standalone and through the full stack.
#[test]
fn russian_apple_pluralization() {
    let reference =
        "(n%10==1 && n%100!=11 ? 0 : n%10>=2 && n%10<=4 && (n%100<10||n%100>=20) ? 1 : 2)";
    let rule = compile(reference).unwrap();
    let apples: Vec<String> = ["яблоко", "яблока", "яблок"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(rule.select(1, &apples), Some("яблоко"));
    assert_eq!(rule.select(2, &apples), Some("яблока"));
    assert_eq!(rule.select(5, &apples), Some("яблок"));

    // The same outcome through the full stack, via the built-in table.
    let store = Arc::new(LocalizationStore::new("ru").unwrap());
    let raw = vec![RawDictionary::new(locale("ru"), "root")
        .with("APPLE", forms(&["яблоко", "яблока", "яблок"]))];
    store.rebuild(&raw).unwrap();
    let provider = LocalizationProvider::new(store, false);
    assert_eq!(provider.pluralize("ru", "APPLE", 1).unwrap(), "яблоко");
    assert_eq!(provider.pluralize("ru", "APPLE", 2).unwrap(), "яблока");
    assert_eq!(provider.pluralize("ru", "APPLE", 5).unwrap(), "яблок");
}

/// Keys inherited from the default locale pluralize under the default
/// locale's rule for every count.
#[test]
fn inherited_keys_pluralize_with_default_rule() {
    let store = Arc::new(LocalizationStore::new("ru").unwrap());
    let raw = vec![
        RawDictionary::new(locale("ru"), "root")
            .with("FILE", forms(&["файл", "файла", "файлов"])),
        RawDictionary::new(locale("en"), "component").with("OTHER", "unrelated"),
    ];
    store.rebuild(&raw).unwrap();
    let provider = LocalizationProvider::new(store, false);

    for n in [1, 2, 5, 11, 21, 22, 25, 100, 101] {
        assert_eq!(
            provider.pluralize("en", "FILE", n).unwrap(),
            provider.pluralize("ru", "FILE", n).unwrap(),
            "count {n}"
        );
    }
}

/// Missing keys follow the configured policy: empty string by default,
/// the literal key with the placeholder flag on.
#[test]
fn missing_value_policy() {
    let store = Arc::new(LocalizationStore::new("ru").unwrap());
    let raw = vec![RawDictionary::new(locale("ru"), "root").with("K", "v")];
    store.rebuild(&raw).unwrap();

    let silent = LocalizationProvider::new(Arc::clone(&store), false);
    assert_eq!(silent.get("en-us", "MISSING_KEY").unwrap(), "");
    let loud = LocalizationProvider::new(store, true);
    assert_eq!(loud.get("en-us", "MISSING_KEY").unwrap(), "MISSING_KEY");
}

/// `en-gb` with only `en` and `ru` merged resolves to the `en`
/// dictionary through the primary-subtag fallback.
#[test]
fn primary_subtag_fallback() {
    let store = Arc::new(LocalizationStore::new("ru").unwrap());
    let raw = vec![
        RawDictionary::new(locale("ru"), "root").with("K", "ru value"),
        RawDictionary::new(locale("en"), "component").with("K", "en value"),
    ];
    store.rebuild(&raw).unwrap();

    let via_region = store.resolve("en-gb").unwrap();
    let direct = store.resolve("en").unwrap();
    assert!(Arc::ptr_eq(&via_region, &direct));
    assert_eq!(store.serialized("en-gb").unwrap(), store.serialized("en").unwrap());

    let provider = LocalizationProvider::new(store, false);
    assert_eq!(provider.get("en-gb", "K").unwrap(), "en value");
}
