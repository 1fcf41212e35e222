use std::{fs, sync::Arc, time::Duration};

use client_core::{
    AnonymousAuthenticator, Authenticator, GatewayOptions, QueryOptions,
    StaticCredentialAuthenticator, DEFAULT_API_BASE_URL,
};
use client_core::view::DEFAULT_PAGE_SIZE;
use tracing::warn;

pub const SETTINGS_FILE: &str = "explorer.toml";

const SETTING_KEYS: &[&str] = &[
    "api_base_url",
    "request_timeout_secs",
    "stale_time_secs",
    "retention_secs",
    "page_size",
    "auth_username",
    "auth_password",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    /// Zero disables the timeout.
    pub request_timeout_secs: u64,
    pub stale_time_secs: u64,
    pub retention_secs: u64,
    pub page_size: usize,
    pub auth_username: Option<String>,
    pub auth_password: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            request_timeout_secs: 30,
            stale_time_secs: 15 * 60,
            retention_secs: 15 * 60,
            page_size: DEFAULT_PAGE_SIZE,
            auth_username: None,
            auth_password: None,
        }
    }
}

impl Settings {
    pub fn gateway_options(&self) -> GatewayOptions {
        GatewayOptions {
            base_url: self.api_base_url.clone(),
            request_timeout: (self.request_timeout_secs > 0)
                .then(|| Duration::from_secs(self.request_timeout_secs)),
        }
    }

    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            stale_time: Duration::from_secs(self.stale_time_secs),
            retention: Duration::from_secs(self.retention_secs),
        }
    }

    /// Gate with the configured credentials, or an open gate when none are configured.
    pub fn authenticator(&self) -> Arc<dyn Authenticator> {
        match (&self.auth_username, &self.auth_password) {
            (Some(username), Some(password)) => Arc::new(StaticCredentialAuthenticator::new(
                username.clone(),
                password.clone(),
            )),
            _ => Arc::new(AnonymousAuthenticator),
        }
    }
}

pub fn load_settings() -> Settings {
    let file = fs::read_to_string(SETTINGS_FILE).ok();
    settings_from_sources(file.as_deref(), |name| std::env::var(name).ok())
}

/// Defaults, then the settings file, then `API_BASE_URL` and `APP__*` variables.
pub fn settings_from_sources(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        match toml::from_str::<toml::Table>(raw) {
            Ok(table) => {
                for (key, value) in &table {
                    let value = match value {
                        toml::Value::String(text) => text.clone(),
                        other => other.to_string(),
                    };
                    apply_setting(&mut settings, key, &value);
                }
            }
            Err(err) => warn!("config: ignoring unreadable {SETTINGS_FILE}: {err}"),
        }
    }

    if let Some(v) = env("API_BASE_URL") {
        apply_setting(&mut settings, "api_base_url", &v);
    }
    for key in SETTING_KEYS {
        if let Some(v) = env(&format!("APP__{}", key.to_ascii_uppercase())) {
            apply_setting(&mut settings, key, &v);
        }
    }

    settings
}

fn apply_setting(settings: &mut Settings, key: &str, value: &str) {
    match key {
        "api_base_url" => settings.api_base_url = normalize_base_url(value),
        "request_timeout_secs" => parse_into(&mut settings.request_timeout_secs, key, value),
        "stale_time_secs" => parse_into(&mut settings.stale_time_secs, key, value),
        "retention_secs" => parse_into(&mut settings.retention_secs, key, value),
        "page_size" => {
            let mut page_size = settings.page_size;
            parse_into(&mut page_size, key, value);
            if page_size > 0 {
                settings.page_size = page_size;
            }
        }
        "auth_username" => settings.auth_username = non_empty(value),
        "auth_password" => settings.auth_password = non_empty(value),
        other => warn!("config: unknown setting {other}"),
    }
}

fn parse_into<T: std::str::FromStr>(slot: &mut T, key: &str, value: &str) {
    match value.trim().parse::<T>() {
        Ok(parsed) => *slot = parsed,
        Err(_) => warn!("config: ignoring invalid {key}={value}"),
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

pub fn normalize_base_url(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return Settings::default().api_base_url;
    }
    if raw.contains("://") {
        return raw.trim_end_matches('/').to_string();
    }
    format!("https://{}", raw.trim_end_matches('/'))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
