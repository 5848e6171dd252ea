//! Usage: Parse service-account keys and installed-app client secrets from JSON files.

use crate::shared::error::{AppError, AppResult, ErrorKind};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::path::Path;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub private_key: String,
    pub private_key_id: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("private_key_id", &self.private_key_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstalledClient {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

impl InstalledClient {
    /// Endpoint URLs must be absolute http(s) URLs; anything else is an input error.
    pub fn validate(&self) -> AppResult<()> {
        if self.client_id.trim().is_empty() {
            return Err("INVALID_INPUT: installed client secrets have an empty client_id"
                .to_string()
                .into());
        }
        for (field, value) in [("auth_uri", &self.auth_uri), ("token_uri", &self.token_uri)] {
            let parsed = reqwest::Url::parse(value.trim()).map_err(|e| {
                format!("INVALID_INPUT: invalid {field} in client secrets: {e}")
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(format!(
                    "INVALID_INPUT: {field} in client secrets must be an http(s) url"
                )
                .into());
            }
        }
        Ok(())
    }
}

/// A `--json` file, classified by its `type` field.
#[derive(Debug, Clone)]
pub enum KeyFile {
    ServiceAccount(ServiceAccountKey),
    ClientSecrets(InstalledClient),
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

pub(crate) fn read_json_file(path: &Path) -> AppResult<Value> {
    let bytes = std::fs::read(path).map_err(|e| {
        AppError::new(
            ErrorKind::File,
            format!("Cannot find file: {}", path.display()),
        )
        .with_source(e)
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        AppError::new(
            ErrorKind::File,
            format!("Invalid JSON file: {}", path.display()),
        )
        .with_source(e)
    })
}

pub fn load_key_file(path: &Path) -> AppResult<KeyFile> {
    let contents = read_json_file(path)?;
    classify_key_file(contents)
}

pub(crate) fn classify_key_file(contents: Value) -> AppResult<KeyFile> {
    let is_service_account = contents
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|t| t == "service_account");
    if is_service_account {
        parse_service_account_key(contents).map(KeyFile::ServiceAccount)
    } else {
        parse_client_secrets(contents).map(KeyFile::ClientSecrets)
    }
}

pub fn parse_service_account_key(contents: Value) -> AppResult<ServiceAccountKey> {
    let key: ServiceAccountKey = serde_json::from_value(contents)
        .map_err(|e| format!("KEY_ERROR: invalid service account key: {e}"))?;
    for (field, value) in [
        ("private_key", &key.private_key),
        ("private_key_id", &key.private_key_id),
        ("client_email", &key.client_email),
    ] {
        if value.trim().is_empty() {
            return Err(format!("KEY_ERROR: service account key field `{field}` is empty").into());
        }
    }
    Ok(key)
}

pub fn parse_client_secrets(contents: Value) -> AppResult<InstalledClient> {
    let Some(installed) = contents.get("installed").cloned() else {
        return Err("INVALID_INPUT: Provided client ID must be for an installed app"
            .to_string()
            .into());
    };
    let client: InstalledClient = serde_json::from_value(installed)
        .map_err(|e| format!("INVALID_INPUT: invalid installed client secrets: {e}"))?;
    client.validate()?;
    Ok(client)
}
