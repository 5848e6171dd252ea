//! Usage: Application Default Credentials discovery (env var, then the gcloud well-known file).

use crate::domain::credential::{Credential, RefreshGrant};
use crate::domain::key_files::{
    parse_service_account_key, read_json_file, ServiceAccountKey, DEFAULT_TOKEN_URI,
};
use crate::domain::scopes::is_subset_of;
use crate::infra::app_paths;
use crate::shared::error::AppResult;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

pub(crate) const ENV_APPLICATION_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Broad scopes an ambient service-account credential may be narrowed to.
pub const GCLOUD_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/userinfo.email",
];

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub refresh_token: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Clone)]
pub enum DefaultCredential {
    /// Must be narrowed to explicit scopes before use.
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUser),
}

impl DefaultCredential {
    pub fn requires_scoping(&self) -> bool {
        matches!(self, Self::ServiceAccount(_))
    }

    /// Usable credential for `scopes`, or `None` when a scoped credential cannot cover them.
    pub fn scoped(self, scopes: &[String]) -> Option<Credential> {
        match self {
            Self::AuthorizedUser(user) => Some(Credential::refreshable(
                RefreshGrant::RefreshToken {
                    token_uri: user.token_uri,
                    client_id: user.client_id,
                    client_secret: user.client_secret,
                    refresh_token: user.refresh_token,
                },
                scopes.to_vec(),
            )),
            Self::ServiceAccount(key) => {
                if !is_subset_of(scopes, &GCLOUD_SCOPES) {
                    tracing::info!(
                        requested = scopes.len(),
                        "ambient service account cannot be scoped beyond the gcloud defaults"
                    );
                    return None;
                }
                let scopes = if scopes.is_empty() {
                    GCLOUD_SCOPES.iter().map(|s| s.to_string()).collect()
                } else {
                    scopes.to_vec()
                };
                Some(Credential::refreshable(
                    RefreshGrant::ServiceAccount {
                        token_uri: key.token_uri,
                        client_email: key.client_email,
                        private_key_id: key.private_key_id,
                        private_key: key.private_key,
                    },
                    scopes,
                ))
            }
        }
    }
}

/// Ambient credential lookup; `Ok(None)` means nothing usable was found.
pub trait DefaultCredentialSource: Send + Sync {
    fn find(&self) -> AppResult<Option<DefaultCredential>>;
}

#[derive(Debug, Clone, Default)]
pub struct EnvironmentCredentialSource {
    well_known_path: Option<PathBuf>,
}

impl EnvironmentCredentialSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_well_known_path(path: impl Into<PathBuf>) -> Self {
        Self {
            well_known_path: Some(path.into()),
        }
    }

    fn well_known_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.well_known_path {
            return Some(path.clone());
        }
        app_paths::gcloud_adc_path().ok()
    }
}

impl DefaultCredentialSource for EnvironmentCredentialSource {
    fn find(&self) -> AppResult<Option<DefaultCredential>> {
        let from_env = std::env::var_os(ENV_APPLICATION_CREDENTIALS)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        if let Some(path) = from_env {
            return Ok(load_default_credential(&path));
        }

        Ok(self
            .well_known_path()
            .filter(|path| path.is_file())
            .and_then(|path| load_default_credential(&path)))
    }
}

fn load_default_credential(path: &Path) -> Option<DefaultCredential> {
    let contents = match read_json_file(path) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::debug!(
                path = %path.display(),
                error = %err,
                "no application default credential"
            );
            return None;
        }
    };
    match parse_default_credential(contents) {
        Ok(found) => found,
        Err(err) => {
            tracing::debug!(
                path = %path.display(),
                error = %err,
                "unusable application default credential"
            );
            None
        }
    }
}

pub(crate) fn parse_default_credential(contents: Value) -> AppResult<Option<DefaultCredential>> {
    let kind = contents
        .get("type")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    match kind.as_str() {
        "service_account" => {
            parse_service_account_key(contents)
                .map(|key| Some(DefaultCredential::ServiceAccount(key)))
        }
        "authorized_user" => serde_json::from_value::<AuthorizedUser>(contents)
            .map(|user| Some(DefaultCredential::AuthorizedUser(user)))
            .map_err(|e| format!("KEY_ERROR: invalid authorized_user credential: {e}").into()),
        other => {
            tracing::debug!(kind = other, "unsupported application default credential type");
            Ok(None)
        }
    }
}
