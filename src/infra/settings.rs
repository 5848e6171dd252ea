//! Usage: User settings (TOML schema, defaults, sanitizing, read helper).

use crate::infra::app_paths;
use crate::oauth::introspect::DEFAULT_TOKENINFO_URL;
use crate::oauth::sso::DEFAULT_SSO_CLI;
use crate::shared::error::AppResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CREDENTIALS_FILENAME: &str = "~/.oauth2l.token";
pub const DEFAULT_FLOW_MAX_ATTEMPTS: u32 = 10;
const MAX_FLOW_MAX_ATTEMPTS: u32 = 100;
const DEFAULT_REFRESH_LEAD_SECONDS: u32 = 0;
const MAX_REFRESH_LEAD_SECONDS: u32 = 300;
const DEFAULT_CALLBACK_TIMEOUT_SECONDS: u32 = 300;
const MAX_CALLBACK_TIMEOUT_SECONDS: u32 = 60 * 60;
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Oauth2lSettings {
    /// Credential cache file; `~` expands to the home directory.
    pub credentials_filename: String,
    pub sso_cli: String,
    pub tokeninfo_url: String,
    pub user_agent: String,
    pub flow_max_attempts: u32,
    // Renew this many seconds before the recorded expiry (0 = only once expired).
    pub refresh_lead_seconds: u32,
    pub use_local_server: bool,
    // 0 picks a free port.
    pub callback_port: u16,
    pub callback_timeout_seconds: u32,
    pub log_filter: String,
}

impl Default for Oauth2lSettings {
    fn default() -> Self {
        Self {
            credentials_filename: DEFAULT_CREDENTIALS_FILENAME.to_string(),
            sso_cli: DEFAULT_SSO_CLI.to_string(),
            tokeninfo_url: DEFAULT_TOKENINFO_URL.to_string(),
            user_agent: default_user_agent(),
            flow_max_attempts: DEFAULT_FLOW_MAX_ATTEMPTS,
            refresh_lead_seconds: DEFAULT_REFRESH_LEAD_SECONDS,
            use_local_server: false,
            callback_port: 0,
            callback_timeout_seconds: DEFAULT_CALLBACK_TIMEOUT_SECONDS,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

fn default_user_agent() -> String {
    format!("oauth2l/{}", env!("CARGO_PKG_VERSION"))
}

fn sanitize_string_field(value: &mut String, default: impl FnOnce() -> String) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        *value = default();
        return true;
    }
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
        return true;
    }
    false
}

fn sanitize_strings(settings: &mut Oauth2lSettings) -> bool {
    let mut changed = false;
    changed |= sanitize_string_field(&mut settings.credentials_filename, || {
        DEFAULT_CREDENTIALS_FILENAME.to_string()
    });
    changed |= sanitize_string_field(&mut settings.sso_cli, || DEFAULT_SSO_CLI.to_string());
    changed |= sanitize_string_field(&mut settings.tokeninfo_url, || {
        DEFAULT_TOKENINFO_URL.to_string()
    });
    changed |= sanitize_string_field(&mut settings.user_agent, default_user_agent);
    changed |= sanitize_string_field(&mut settings.log_filter, || DEFAULT_LOG_FILTER.to_string());
    changed
}

fn sanitize_flow_max_attempts(settings: &mut Oauth2lSettings) -> bool {
    if settings.flow_max_attempts == 0 {
        settings.flow_max_attempts = DEFAULT_FLOW_MAX_ATTEMPTS;
        return true;
    }
    if settings.flow_max_attempts > MAX_FLOW_MAX_ATTEMPTS {
        settings.flow_max_attempts = MAX_FLOW_MAX_ATTEMPTS;
        return true;
    }
    false
}

fn sanitize_timing(settings: &mut Oauth2lSettings) -> bool {
    let mut changed = false;

    if settings.refresh_lead_seconds > MAX_REFRESH_LEAD_SECONDS {
        settings.refresh_lead_seconds = MAX_REFRESH_LEAD_SECONDS;
        changed = true;
    }
    if settings.callback_timeout_seconds == 0 {
        settings.callback_timeout_seconds = DEFAULT_CALLBACK_TIMEOUT_SECONDS;
        changed = true;
    }
    if settings.callback_timeout_seconds > MAX_CALLBACK_TIMEOUT_SECONDS {
        settings.callback_timeout_seconds = MAX_CALLBACK_TIMEOUT_SECONDS;
        changed = true;
    }

    changed
}

pub(crate) fn sanitize(settings: &mut Oauth2lSettings) -> bool {
    let mut repaired = false;
    repaired |= sanitize_strings(settings);
    repaired |= sanitize_flow_max_attempts(settings);
    repaired |= sanitize_timing(settings);
    repaired
}

pub(crate) fn parse_settings_toml(content: &str) -> AppResult<Oauth2lSettings> {
    let mut settings: Oauth2lSettings = toml::from_str(content)
        .map_err(|e| format!("INVALID_INPUT: failed to parse settings: {e}"))?;
    if sanitize(&mut settings) {
        tracing::debug!("settings contained out-of-range values; sanitized");
    }
    Ok(settings)
}

/// Reads settings from `path`; a missing file yields defaults.
pub fn read_from(path: &Path) -> AppResult<Oauth2lSettings> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Oauth2lSettings::default());
        }
        Err(err) => {
            return Err(format!(
                "FILE_ERROR: failed to read settings {}: {err}",
                path.display()
            )
            .into());
        }
    };
    parse_settings_toml(&content)
}

/// Reads settings from `OAUTH2L_CONFIG` or `~/.config/oauth2l/config.toml`.
pub fn read() -> AppResult<Oauth2lSettings> {
    let path = app_paths::settings_path()?;
    read_from(&path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::error::ErrorKind;

    #[test]
    fn empty_document_yields_defaults() {
        let settings = parse_settings_toml("").expect("parse");
        assert_eq!(settings, Oauth2lSettings::default());
        assert_eq!(settings.credentials_filename, "~/.oauth2l.token");
        assert_eq!(settings.flow_max_attempts, 10);
        assert!(settings.user_agent.starts_with("oauth2l/"));
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let settings = parse_settings_toml(
            r#"
credentials_filename = "/tmp/cache.json"
use_local_server = true
"#,
        )
        .expect("parse");
        assert_eq!(settings.credentials_filename, "/tmp/cache.json");
        assert!(settings.use_local_server);
        assert_eq!(settings.sso_cli, DEFAULT_SSO_CLI);
    }

    #[test]
    fn sanitize_resets_zero_attempts_and_clamps_excess() {
        let mut s = Oauth2lSettings {
            flow_max_attempts: 0,
            ..Default::default()
        };
        assert!(sanitize(&mut s));
        assert_eq!(s.flow_max_attempts, DEFAULT_FLOW_MAX_ATTEMPTS);

        s.flow_max_attempts = 1_000;
        assert!(sanitize(&mut s));
        assert_eq!(s.flow_max_attempts, MAX_FLOW_MAX_ATTEMPTS);
    }

    #[test]
    fn sanitize_clamps_refresh_lead_and_callback_timeout() {
        let mut s = Oauth2lSettings {
            refresh_lead_seconds: 10_000,
            callback_timeout_seconds: 0,
            ..Default::default()
        };
        assert!(sanitize(&mut s));
        assert_eq!(s.refresh_lead_seconds, MAX_REFRESH_LEAD_SECONDS);
        assert_eq!(s.callback_timeout_seconds, DEFAULT_CALLBACK_TIMEOUT_SECONDS);
    }

    #[test]
    fn sanitize_restores_blank_strings() {
        let mut s = Oauth2lSettings {
            sso_cli: "   ".to_string(),
            log_filter: " debug ".to_string(),
            ..Default::default()
        };
        assert!(sanitize(&mut s));
        assert_eq!(s.sso_cli, DEFAULT_SSO_CLI);
        assert_eq!(s.log_filter, "debug");
    }

    #[test]
    fn sanitize_no_change_for_defaults() {
        let mut s = Oauth2lSettings::default();
        assert!(!sanitize(&mut s));
    }

    #[test]
    fn malformed_document_is_invalid_input() {
        let err = parse_settings_toml("flow_max_attempts = \"many\"").expect_err("fail");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = read_from(&dir.path().join("config.toml")).expect("defaults");
        assert_eq!(settings, Oauth2lSettings::default());
    }
}
