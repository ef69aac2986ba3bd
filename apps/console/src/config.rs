use std::fs;

use serde::Deserialize;

/// Connection and view defaults for the console. Precedence order:
/// built-in defaults, then `console.toml` in the working directory, then
/// environment variables, then CLI flags (applied by the caller).
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_url: String,
    pub page_size: u32,
    pub debounce_ms: u64,
    pub request_timeout_secs: u64,
    /// Keep the id the backend echoes for a created record. Off by
    /// default: the demo backend answers every create with the same id.
    pub trust_server_ids: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "https://jsonplaceholder.typicode.com".into(),
            page_size: 5,
            debounce_ms: 300,
            request_timeout_secs: 30,
            trust_server_ids: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_url: Option<String>,
    page_size: Option<u32>,
    debounce_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
    trust_server_ids: Option<bool>,
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("console.toml") {
        apply_file_settings(&mut settings, &raw);
    }

    if let Ok(v) = std::env::var("CONSOLE_API_URL") {
        settings.api_url = v;
    }
    if let Ok(v) = std::env::var("APP__API_URL") {
        settings.api_url = v;
    }

    if let Ok(v) = std::env::var("CONSOLE_PAGE_SIZE") {
        if let Ok(parsed) = v.parse::<u32>() {
            settings.page_size = parsed;
        }
    }
    if let Ok(v) = std::env::var("APP__PAGE_SIZE") {
        if let Ok(parsed) = v.parse::<u32>() {
            settings.page_size = parsed;
        }
    }

    if let Ok(v) = std::env::var("CONSOLE_DEBOUNCE_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.debounce_ms = parsed;
        }
    }
    if let Ok(v) = std::env::var("APP__DEBOUNCE_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.debounce_ms = parsed;
        }
    }

    if let Ok(v) = std::env::var("CONSOLE_REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }
    if let Ok(v) = std::env::var("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }

    if let Ok(v) = std::env::var("CONSOLE_TRUST_SERVER_IDS") {
        if let Ok(parsed) = v.parse::<bool>() {
            settings.trust_server_ids = parsed;
        }
    }
    if let Ok(v) = std::env::var("APP__TRUST_SERVER_IDS") {
        if let Ok(parsed) = v.parse::<bool>() {
            settings.trust_server_ids = parsed;
        }
    }

    settings
}

/// Overlays the keys present in a `console.toml` onto `settings`. A file
/// that does not parse is ignored wholesale.
fn apply_file_settings(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<FileSettings>(raw) else {
        return;
    };
    if let Some(v) = file_cfg.api_url {
        settings.api_url = v;
    }
    if let Some(v) = file_cfg.page_size {
        settings.page_size = v;
    }
    if let Some(v) = file_cfg.debounce_ms {
        settings.debounce_ms = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = file_cfg.trust_server_ids {
        settings.trust_server_ids = v;
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
