use std::{fs, io, path::Path};

use anyhow::{bail, Context};
use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub destination_url: String,
    pub max_concurrent: Option<usize>,
    pub request_timeout_secs: Option<u64>,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            destination_url: "http://127.0.0.1:8880/".into(),
            max_concurrent: None,
            request_timeout_secs: None,
            log_filter: "info".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    destination_url: Option<String>,
    max_concurrent: Option<usize>,
    request_timeout_secs: Option<u64>,
    log_filter: Option<String>,
}

/// Defaults, then the TOML file at `path` if it exists, then the environment.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg: FileSettings = toml::from_str(&raw)
                .with_context(|| format!("invalid settings file '{}'", path.display()))?;
            apply_file(&mut settings, file_cfg);
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.destination_url {
        settings.destination_url = v;
    }
    if let Some(v) = file_cfg.max_concurrent {
        settings.max_concurrent = Some(v);
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = Some(v);
    }
    if let Some(v) = file_cfg.log_filter {
        settings.log_filter = v;
    }
}

pub(crate) fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("UPLOADER_DESTINATION") {
        settings.destination_url = v;
    }
    if let Some(v) = lookup("APP__DESTINATION_URL") {
        settings.destination_url = v;
    }

    if let Some(v) = lookup("APP__MAX_CONCURRENT") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.max_concurrent = Some(parsed);
        }
    }

    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = Some(parsed);
        }
    }

    if let Some(v) = lookup("RUST_LOG") {
        settings.log_filter = v;
    }
}

pub fn validate_destination(raw: &str) -> anyhow::Result<Url> {
    let raw = raw.trim();
    let url = Url::parse(raw).with_context(|| format!("invalid destination url '{raw}'"))?;

    match url.scheme() {
        "http" | "https" => {}
        other => bail!("destination url must use http or https, got '{other}'"),
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        bail!("destination url '{raw}' has no host");
    }

    Ok(url)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
