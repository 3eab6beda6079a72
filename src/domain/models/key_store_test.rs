use super::KeyStore;

#[test]
fn it_gets_and_sets_keys() {
    let mut keys = KeyStore::new();
    assert_eq!(keys.get("GEMINI_API_KEY"), None);

    assert!(keys.set("GEMINI_API_KEY", "abc"));
    assert_eq!(keys.get("GEMINI_API_KEY"), Some("abc"));
    assert!(keys.contains("GEMINI_API_KEY"));
}

#[test]
fn it_reports_unchanged_values() {
    let mut keys = KeyStore::new();
    assert!(keys.set("GEMINI_API_KEY", "abc"));
    assert!(!keys.set("GEMINI_API_KEY", "abc"));
    assert!(keys.set("GEMINI_API_KEY", "def"));
}

#[test]
fn it_treats_empty_values_as_missing() {
    let mut keys = KeyStore::new();
    keys.set("GEMINI_API_KEY", "");
    assert_eq!(keys.get("GEMINI_API_KEY"), None);
    assert!(!keys.contains("GEMINI_API_KEY"));

    keys.set("OPENAI_COMPATIBLE_API_KEY", "   ");
    assert!(!keys.contains("OPENAI_COMPATIBLE_API_KEY"));
}

#[test]
fn it_formats_display_names() {
    insta::assert_snapshot!(KeyStore::display_name("GEMINI_API_KEY"), @"GEMINI API Key");
    insta::assert_snapshot!(KeyStore::display_name("OPENAI_COMPATIBLE_API_KEY"), @"OPENAI COMPATIBLE API Key");
    insta::assert_snapshot!(KeyStore::display_name("CUSTOM_TOKEN"), @"CUSTOM TOKEN");
}

#[test]
fn it_parses_display_names() {
    assert_eq!(
        KeyStore::key_name_from_display("GEMINI API Key"),
        "GEMINI_API_KEY"
    );
    assert_eq!(
        KeyStore::key_name_from_display("OPENAI   COMPATIBLE API Key"),
        "OPENAI_COMPATIBLE_API_KEY"
    );
    assert_eq!(
        KeyStore::key_name_from_display("GEMINI_API_KEY"),
        "GEMINI_API_KEY"
    );
}
