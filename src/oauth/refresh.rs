//! Usage: Refresh decision and execution (`refresh(old) -> new` snapshot transformation).

use crate::domain::credential::{Credential, RefreshGrant};
use crate::domain::key_files::ServiceAccountKey;
use crate::domain::scopes::canonical_scope_string;
use crate::oauth::assertion::{sign_jwt, ASSERTION_LIFETIME_SECS};
use crate::oauth::token_exchange::{
    exchange_jwt_bearer, refresh_access_token, JwtBearerRequest, OAuthTokenSet,
    TokenEndpointError, TokenRefreshRequest,
};
use crate::shared::error::{AppError, ErrorKind};
use crate::shared::security::mask_token;
use serde::Serialize;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RefreshError {
    #[error("credential of type {0} has no refresh protocol")]
    Unsupported(&'static str),
    #[error(transparent)]
    Endpoint(#[from] TokenEndpointError),
    #[error("{0}")]
    Signing(AppError),
}

impl RefreshError {
    pub fn is_grant_rejection(&self) -> bool {
        matches!(self, Self::Endpoint(err) if err.is_grant_rejection())
    }
}

impl From<RefreshError> for AppError {
    fn from(value: RefreshError) -> Self {
        match value {
            RefreshError::Signing(err) => err,
            other => AppError::new(
                ErrorKind::Communication,
                format!("Failed to refresh credential: {other}"),
            ),
        }
    }
}

#[derive(Debug, Serialize)]
struct ServiceAccountGrantClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone)]
pub struct Refresher {
    http: reqwest::Client,
    refresh_lead_secs: i64,
}

impl Refresher {
    pub fn new(http: reqwest::Client, refresh_lead_secs: i64) -> Self {
        Self {
            http,
            refresh_lead_secs: refresh_lead_secs.max(0),
        }
    }

    pub fn needs_refresh(&self, credential: &Credential, now_unix: i64) -> bool {
        credential.needs_refresh(now_unix, self.refresh_lead_secs)
    }

    /// Returns the credential unchanged when its token is live, otherwise a refreshed snapshot.
    /// The flag reports whether a refresh happened.
    pub async fn ensure_fresh(
        &self,
        credential: Credential,
        now_unix: i64,
    ) -> Result<(Credential, bool), RefreshError> {
        if !self.needs_refresh(&credential, now_unix) {
            return Ok((credential, false));
        }
        let refreshed = self.refresh(&credential, now_unix).await?;
        Ok((refreshed, true))
    }

    pub async fn refresh(
        &self,
        credential: &Credential,
        now_unix: i64,
    ) -> Result<Credential, RefreshError> {
        let Some(grant) = credential.grant.as_ref() else {
            return Err(RefreshError::Unsupported(credential.kind.label()));
        };

        let tokens = match grant {
            RefreshGrant::RefreshToken {
                token_uri,
                client_id,
                client_secret,
                refresh_token,
            } => {
                tracing::debug!(
                    client_id = %client_id,
                    refresh_token = %mask_token(refresh_token),
                    "refreshing oauth2 credential"
                );
                let request = TokenRefreshRequest {
                    token_uri: token_uri.clone(),
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                    refresh_token: refresh_token.clone(),
                };
                refresh_access_token(&self.http, &request).await?
            }
            RefreshGrant::ServiceAccount {
                token_uri,
                client_email,
                private_key_id,
                private_key,
            } => {
                tracing::debug!(kid = %private_key_id, "refreshing service account credential");
                let key = ServiceAccountKey {
                    private_key: private_key.clone(),
                    private_key_id: private_key_id.clone(),
                    client_email: client_email.clone(),
                    token_uri: token_uri.clone(),
                };
                let scope = canonical_scope_string(&credential.scopes);
                let claims = ServiceAccountGrantClaims {
                    iss: &key.client_email,
                    scope: &scope,
                    aud: &key.token_uri,
                    iat: now_unix,
                    exp: now_unix + ASSERTION_LIFETIME_SECS,
                };
                let assertion = sign_jwt(&key, &claims).map_err(RefreshError::Signing)?;
                let request = JwtBearerRequest {
                    token_uri: key.token_uri.clone(),
                    assertion,
                };
                exchange_jwt_bearer(&self.http, &request).await?
            }
        };

        Ok(apply_token_set(credential, tokens))
    }
}

fn apply_token_set(credential: &Credential, tokens: OAuthTokenSet) -> Credential {
    credential.with_token(
        tokens.access_token,
        tokens.expires_at,
        tokens.refresh_token,
        tokens.id_token,
    )
}
