//! Usage: Credential snapshots, refresh grants, and the fingerprint used as cache key.

use crate::domain::scopes::canonical_scope_string;
use crate::shared::security::mask_token;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// Bare bearer token with no way to renew it.
    AccessToken,
    /// Token renewable through a token-endpoint grant.
    #[serde(rename = "oauth2")]
    OAuth2,
    /// Self-signed JWT used directly as the bearer token.
    SignedAssertion,
}

impl CredentialKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::OAuth2 => "oauth2",
            Self::SignedAssertion => "signed_assertion",
        }
    }
}

/// Material needed to obtain a new access token from the token endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RefreshGrant {
    RefreshToken {
        token_uri: String,
        client_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_secret: Option<String>,
        refresh_token: String,
    },
    ServiceAccount {
        token_uri: String,
        client_email: String,
        private_key_id: String,
        private_key: String,
    },
}

impl RefreshGrant {
    pub fn token_uri(&self) -> &str {
        match self {
            Self::RefreshToken { token_uri, .. } | Self::ServiceAccount { token_uri, .. } => {
                token_uri
            }
        }
    }
}

impl fmt::Debug for RefreshGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RefreshToken {
                token_uri,
                client_id,
                refresh_token,
                ..
            } => f
                .debug_struct("RefreshToken")
                .field("token_uri", token_uri)
                .field("client_id", client_id)
                .field("refresh_token", &mask_token(refresh_token))
                .finish_non_exhaustive(),
            Self::ServiceAccount {
                token_uri,
                client_email,
                private_key_id,
                ..
            } => f
                .debug_struct("ServiceAccount")
                .field("token_uri", token_uri)
                .field("client_email", client_email)
                .field("private_key_id", private_key_id)
                .finish_non_exhaustive(),
        }
    }
}

/// Immutable credential snapshot. Renewal produces a new snapshot (see `with_token`).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub kind: CredentialKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Unix seconds; `None` means no known expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant: Option<RefreshGrant>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl Credential {
    pub fn access_token_only(access_token: impl Into<String>, expires_at: Option<i64>) -> Self {
        Self {
            kind: CredentialKind::AccessToken,
            access_token: Some(access_token.into()),
            expires_at,
            grant: None,
            scopes: Vec::new(),
            id_token: None,
        }
    }

    pub fn signed_assertion(assertion: impl Into<String>, expires_at: i64) -> Self {
        Self {
            kind: CredentialKind::SignedAssertion,
            access_token: Some(assertion.into()),
            expires_at: Some(expires_at),
            grant: None,
            scopes: Vec::new(),
            id_token: None,
        }
    }

    /// Refreshable credential without a token yet; the refresher fills it in.
    pub fn refreshable(grant: RefreshGrant, scopes: Vec<String>) -> Self {
        Self {
            kind: CredentialKind::OAuth2,
            access_token: None,
            expires_at: None,
            grant: Some(grant),
            scopes,
            id_token: None,
        }
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn needs_refresh(&self, now_unix: i64, refresh_lead_s: i64) -> bool {
        self.bearer_token().is_none()
            || should_refresh_now(self.expires_at, refresh_lead_s, now_unix)
    }

    /// New snapshot carrying a freshly issued token.
    /// A missing rotated refresh token keeps the old one.
    pub fn with_token(
        &self,
        access_token: String,
        expires_at: Option<i64>,
        rotated_refresh_token: Option<String>,
        id_token: Option<String>,
    ) -> Self {
        let grant = match (&self.grant, rotated_refresh_token) {
            (
                Some(RefreshGrant::RefreshToken {
                    token_uri,
                    client_id,
                    client_secret,
                    ..
                }),
                Some(rotated),
            ) => Some(RefreshGrant::RefreshToken {
                token_uri: token_uri.clone(),
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
                refresh_token: rotated,
            }),
            (grant, _) => grant.clone(),
        };

        Self {
            kind: self.kind,
            access_token: Some(access_token),
            expires_at,
            grant,
            scopes: self.scopes.clone(),
            id_token: id_token.or_else(|| self.id_token.clone()),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("kind", &self.kind)
            .field(
                "access_token",
                &self.access_token.as_deref().map(mask_token),
            )
            .field("expires_at", &self.expires_at)
            .field("grant", &self.grant)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

pub(crate) fn should_refresh_now(
    expires_at: Option<i64>,
    refresh_lead_s: i64,
    now_unix: i64,
) -> bool {
    let Some(expiry) = expires_at else {
        return false;
    };
    let lead = refresh_lead_s.max(0);
    expiry.saturating_sub(lead) <= now_unix
}

/// Cache key: identity (client id or key id) plus the canonical scope string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CredentialFingerprint(String);

impl CredentialFingerprint {
    pub fn new<S: AsRef<str>>(identity: &str, scopes: &[S]) -> Self {
        Self(format!(
            "{}#{}",
            identity.trim(),
            canonical_scope_string(scopes)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredentialFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
