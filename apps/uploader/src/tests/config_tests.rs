use super::*;

use std::collections::HashMap;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("temp dir");
    let settings = load_settings(&dir.path().join("uploader.toml")).expect("settings");

    assert_eq!(settings.max_concurrent, Settings::default().max_concurrent);
    assert_eq!(
        settings.request_timeout_secs,
        Settings::default().request_timeout_secs
    );
}

#[test]
fn file_values_override_defaults() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("uploader.toml");
    fs::write(
        &path,
        "destination_url = \"http://files.local:9000/inbox/\"\nmax_concurrent = 3\nrequest_timeout_secs = 30\n",
    )
    .expect("write settings");

    let mut settings = Settings::default();
    let file_cfg: FileSettings =
        toml::from_str(&fs::read_to_string(&path).expect("read")).expect("parse");
    apply_file(&mut settings, file_cfg);

    assert_eq!(settings.destination_url, "http://files.local:9000/inbox/");
    assert_eq!(settings.max_concurrent, Some(3));
    assert_eq!(settings.request_timeout_secs, Some(30));
    assert_eq!(settings.log_filter, "info");
}

#[test]
fn unknown_keys_are_rejected() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("uploader.toml");
    fs::write(&path, "destination = \"http://typo/\"\n").expect("write settings");

    let err = load_settings(&path).expect_err("unknown key");
    assert!(err.to_string().contains("invalid settings file"));
}

#[test]
fn env_overrides_take_precedence_and_ignore_garbage() {
    let mut settings = Settings {
        max_concurrent: Some(8),
        ..Settings::default()
    };

    apply_env(
        &mut settings,
        lookup_from(&[
            ("UPLOADER_DESTINATION", "http://first/"),
            ("APP__DESTINATION_URL", "http://second/"),
            ("APP__MAX_CONCURRENT", "many"),
            ("APP__REQUEST_TIMEOUT_SECS", "15"),
            ("RUST_LOG", "upload_core=debug"),
        ]),
    );

    assert_eq!(settings.destination_url, "http://second/");
    assert_eq!(settings.max_concurrent, Some(8));
    assert_eq!(settings.request_timeout_secs, Some(15));
    assert_eq!(settings.log_filter, "upload_core=debug");
}

#[test]
fn destination_must_be_http_with_host() {
    let url = validate_destination(" http://127.0.0.1:8880/docs/ ").expect("valid");
    assert_eq!(url.path(), "/docs/");

    assert!(validate_destination("ftp://example.com/").is_err());
    assert!(validate_destination("mailto:someone@example.com").is_err());
    assert!(validate_destination("not a url").is_err());
}
