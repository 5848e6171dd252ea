//! Usage: Resolve user-level paths (home dir, `~` expansion, well-known config locations).

use crate::shared::error::AppResult;
use std::path::{Path, PathBuf};

const ENV_CONFIG_PATH: &str = "OAUTH2L_CONFIG";

pub(crate) fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| "INTERNAL_ERROR: failed to resolve home dir".to_string().into())
}

pub(crate) fn expand_tilde(home: &Path, raw: &str) -> Option<PathBuf> {
    let trimmed = raw.trim();
    if trimmed == "~" {
        return Some(home.to_path_buf());
    }

    let rest = trimmed
        .strip_prefix("~/")
        .or_else(|| trimmed.strip_prefix("~\\"));

    rest.map(|suffix| home.join(suffix))
}

/// `~`-prefixed paths resolve under home; anything else is taken as given.
pub(crate) fn resolve_user_path(raw: &str) -> AppResult<PathBuf> {
    let trimmed = raw.trim();
    if trimmed.starts_with('~') {
        let home = home_dir()?;
        if let Some(p) = expand_tilde(&home, trimmed) {
            return Ok(p);
        }
    }
    Ok(PathBuf::from(trimmed))
}

pub(crate) fn settings_path() -> AppResult<PathBuf> {
    let raw = std::env::var(ENV_CONFIG_PATH)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match raw {
        Some(v) => resolve_user_path(&v),
        None => Ok(home_dir()?.join(".config").join("oauth2l").join("config.toml")),
    }
}

/// gcloud's application-default credentials file.
pub(crate) fn gcloud_adc_path() -> AppResult<PathBuf> {
    if cfg!(windows) {
        if let Some(appdata) = std::env::var_os("APPDATA").filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(appdata)
                .join("gcloud")
                .join("application_default_credentials.json"));
        }
    }
    Ok(home_dir()?
        .join(".config")
        .join("gcloud")
        .join("application_default_credentials.json"))
}
