//! Usage: Validate bare access tokens against the tokeninfo endpoint.

use crate::domain::token_info::TokenInfo;
use crate::oauth::token_exchange::sanitize_oauth_error_body_snippet;
use crate::shared::error::AppResult;
use crate::shared::security::mask_token;
use reqwest::{StatusCode, Url};

pub const DEFAULT_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

#[derive(Debug, Clone)]
pub struct TokenIntrospector {
    http: reqwest::Client,
    tokeninfo_url: String,
}

impl TokenIntrospector {
    pub fn new(http: reqwest::Client, tokeninfo_url: impl Into<String>) -> Self {
        Self {
            http,
            tokeninfo_url: tokeninfo_url.into(),
        }
    }

    /// 200 yields the parsed mapping, 400 yields an empty mapping (invalid or expired token).
    pub async fn introspect(&self, access_token: &str) -> AppResult<TokenInfo> {
        let token = access_token.trim();
        let url = Url::parse_with_params(&self.tokeninfo_url, &[("access_token", token)])
            .map_err(|e| format!("INVALID_INPUT: invalid tokeninfo url: {e}"))?;

        let response = self.http.get(url).send().await.map_err(|e| {
            format!(
                "COMMUNICATION_ERROR: tokeninfo request failed: {}",
                e.without_url()
            )
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            format!(
                "COMMUNICATION_ERROR: tokeninfo response read failed: {}",
                e.without_url()
            )
        })?;

        match status {
            StatusCode::OK => serde_json::from_str::<TokenInfo>(&body).map_err(|e| {
                format!("COMMUNICATION_ERROR: tokeninfo response json invalid: {e}").into()
            }),
            StatusCode::BAD_REQUEST => {
                tracing::debug!(token = %mask_token(token), "tokeninfo rejected token");
                Ok(TokenInfo::default())
            }
            other => {
                tracing::warn!(status = other.as_u16(), "tokeninfo returned unexpected status");
                Err(format!(
                    "COMMUNICATION_ERROR: tokeninfo endpoint returned status={} body={}",
                    other.as_u16(),
                    sanitize_oauth_error_body_snippet(&body)
                )
                .into())
            }
        }
    }

    pub async fn is_valid(&self, access_token: &str) -> AppResult<bool> {
        Ok(!self.introspect(access_token).await?.is_empty())
    }
}
