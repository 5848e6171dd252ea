//! Usage: OAuth token endpoint helpers (authorization_code, refresh_token and jwt-bearer grants).

use crate::domain::token_info::parse_i64_lossy;
use crate::shared::error::{AppError, ErrorKind};
use crate::shared::security::mask_token;
use serde_json::Value;
use std::collections::HashMap;

pub(crate) const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

const ERROR_SNIPPET_MAX_CHARS: usize = 500;
const ERROR_MESSAGE_MAX_CHARS: usize = 240;

/// Why a token-endpoint round trip failed. Callers branch on the variant (retry vs abort).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenEndpointError {
    #[error("token endpoint request failed: {0}")]
    Transport(String),
    #[error("token endpoint returned status={status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("token endpoint response invalid: {0}")]
    Malformed(String),
}

impl TokenEndpointError {
    /// The endpoint refused the grant itself (bad code, revoked refresh token, bad assertion).
    pub fn is_grant_rejection(&self) -> bool {
        matches!(self, Self::Rejected { status: 400 | 401, .. })
    }
}

impl From<TokenEndpointError> for AppError {
    fn from(value: TokenEndpointError) -> Self {
        AppError::new(ErrorKind::Communication, value.to_string())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TokenExchangeRequest {
    pub(crate) token_uri: String,
    pub(crate) client_id: String,
    pub(crate) client_secret: Option<String>,
    pub(crate) code: String,
    pub(crate) redirect_uri: String,
    pub(crate) code_verifier: String,
}

#[derive(Debug, Clone)]
pub(crate) struct TokenRefreshRequest {
    pub(crate) token_uri: String,
    pub(crate) client_id: String,
    pub(crate) client_secret: Option<String>,
    pub(crate) refresh_token: String,
}

#[derive(Debug, Clone)]
pub(crate) struct JwtBearerRequest {
    pub(crate) token_uri: String,
    pub(crate) assertion: String,
}

#[derive(Debug, Clone)]
pub(crate) struct OAuthTokenSet {
    pub(crate) access_token: String,
    pub(crate) refresh_token: Option<String>,
    pub(crate) expires_at: Option<i64>,
    pub(crate) id_token: Option<String>,
}

pub(crate) async fn exchange_authorization_code(
    client: &reqwest::Client,
    req: &TokenExchangeRequest,
) -> Result<OAuthTokenSet, TokenEndpointError> {
    let mut form: HashMap<&str, String> = HashMap::new();
    form.insert("grant_type", "authorization_code".to_string());
    form.insert("code", req.code.trim().to_string());
    form.insert("redirect_uri", req.redirect_uri.trim().to_string());
    form.insert("client_id", req.client_id.trim().to_string());
    form.insert("code_verifier", req.code_verifier.trim().to_string());
    insert_client_secret(&mut form, req.client_secret.as_deref());

    post_token_form(client, &req.token_uri, &form).await
}

pub(crate) async fn refresh_access_token(
    client: &reqwest::Client,
    req: &TokenRefreshRequest,
) -> Result<OAuthTokenSet, TokenEndpointError> {
    let mut form: HashMap<&str, String> = HashMap::new();
    form.insert("grant_type", "refresh_token".to_string());
    form.insert("refresh_token", req.refresh_token.trim().to_string());
    form.insert("client_id", req.client_id.trim().to_string());
    insert_client_secret(&mut form, req.client_secret.as_deref());

    post_token_form(client, &req.token_uri, &form).await
}

pub(crate) async fn exchange_jwt_bearer(
    client: &reqwest::Client,
    req: &JwtBearerRequest,
) -> Result<OAuthTokenSet, TokenEndpointError> {
    let mut form: HashMap<&str, String> = HashMap::new();
    form.insert("grant_type", JWT_BEARER_GRANT_TYPE.to_string());
    form.insert("assertion", req.assertion.clone());

    post_token_form(client, &req.token_uri, &form).await
}

fn insert_client_secret(form: &mut HashMap<&str, String>, secret: Option<&str>) {
    if let Some(secret) = secret.map(str::trim).filter(|v| !v.is_empty()) {
        form.insert("client_secret", secret.to_string());
    }
}

async fn post_token_form(
    client: &reqwest::Client,
    token_uri: &str,
    form: &HashMap<&str, String>,
) -> Result<OAuthTokenSet, TokenEndpointError> {
    let grant_type = form.get("grant_type").map(String::as_str).unwrap_or_default();
    tracing::debug!(token_uri, grant_type, "posting token request");

    let response = client
        .post(token_uri.trim())
        .form(form)
        .send()
        .await
        .map_err(|e| TokenEndpointError::Transport(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| TokenEndpointError::Transport(format!("response read failed: {e}")))?;

    parse_token_response(
        status.as_u16(),
        &body,
        crate::shared::time::now_unix_seconds(),
    )
}

pub(crate) fn parse_token_response(
    status: u16,
    body: &str,
    now_unix: i64,
) -> Result<OAuthTokenSet, TokenEndpointError> {
    if !(200..300).contains(&status) {
        let (error_code, error_message) = parse_oauth_error_details(body);
        let mut message = String::new();
        if let Some(code) = error_code {
            message.push_str("code=");
            message.push_str(code.as_str());
            message.push(' ');
        }
        if let Some(detail) = error_message {
            message.push_str("message=");
            message.extend(detail.chars().take(ERROR_MESSAGE_MAX_CHARS));
            message.push(' ');
        }
        message.push_str("body=");
        message.push_str(sanitize_oauth_error_body_snippet(body).as_str());
        tracing::warn!(status, "token endpoint rejected request");
        return Err(TokenEndpointError::Rejected { status, message });
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| TokenEndpointError::Malformed(format!("json invalid: {e}")))?;

    let access_token = non_empty_str(&value, "access_token")
        .ok_or_else(|| TokenEndpointError::Malformed("missing access_token".to_string()))?;
    let refresh_token = non_empty_str(&value, "refresh_token");
    let id_token = non_empty_str(&value, "id_token");

    let expires_at = value
        .get("expires_in")
        .and_then(parse_i64_lossy)
        .filter(|v| *v > 0)
        .map(|v| now_unix.saturating_add(v));

    Ok(OAuthTokenSet {
        access_token,
        refresh_token,
        expires_at,
        id_token,
    })
}

fn non_empty_str(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lc = key.trim().to_ascii_lowercase();
    key_lc.contains("token")
        || key_lc.contains("secret")
        || key_lc == "assertion"
        || key_lc == "authorization"
}

fn redact_sensitive_json_fields(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                if is_sensitive_key(key) {
                    if let Some(raw) = nested.as_str() {
                        *nested = Value::String(mask_token(raw));
                        continue;
                    }
                }
                redact_sensitive_json_fields(nested);
            }
        }
        Value::Array(items) => {
            for nested in items {
                redact_sensitive_json_fields(nested);
            }
        }
        _ => {}
    }
}

pub(crate) fn sanitize_oauth_error_body_snippet(body: &str) -> String {
    if let Ok(mut value) = serde_json::from_str::<Value>(body) {
        redact_sensitive_json_fields(&mut value);
        if let Ok(encoded) = serde_json::to_string(&value) {
            return encoded.chars().take(ERROR_SNIPPET_MAX_CHARS).collect();
        }
    }
    body.chars().take(ERROR_SNIPPET_MAX_CHARS).collect()
}

fn parse_oauth_error_details(body: &str) -> (Option<String>, Option<String>) {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return (None, None),
    };

    let mut code = non_empty_str(&value, "code");
    let mut message = non_empty_str(&value, "error_description");

    if let Some(error_value) = value.get("error") {
        if let Some(err_str) = error_value.as_str() {
            if code.is_none() {
                code = Some(err_str.trim().to_string());
            }
        } else if let Some(err_obj) = error_value.as_object() {
            if code.is_none() {
                code = err_obj
                    .get("status")
                    .and_then(Value::as_str)
                    .or_else(|| err_obj.get("code").and_then(Value::as_str))
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string);
            }
            if message.is_none() {
                message = err_obj
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string);
            }
        }
    }

    (code, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[test]
    fn parse_token_response_computes_expiry_from_expires_in() {
        let body = r#"{"access_token":" ya29.a0 ","expires_in":"3599","refresh_token":"1//r","token_type":"Bearer"}"#;
        let set = parse_token_response(200, body, 1_000).expect("token set");
        assert_eq!(set.access_token, "ya29.a0");
        assert_eq!(set.expires_at, Some(4_599));
        assert_eq!(set.refresh_token.as_deref(), Some("1//r"));
        assert!(set.id_token.is_none());
    }

    #[test]
    fn non_positive_expires_in_means_unknown_expiry() {
        let set = parse_token_response(200, r#"{"access_token":"t","expires_in":0}"#, 1_000)
            .expect("token set");
        assert_eq!(set.expires_at, None);
    }

    #[test]
    fn missing_access_token_is_malformed() {
        let err = parse_token_response(200, r#"{"expires_in":3600}"#, 0).expect_err("fail");
        assert!(matches!(err, TokenEndpointError::Malformed(_)));
        let err = parse_token_response(200, "<html>", 0).expect_err("fail");
        assert!(matches!(err, TokenEndpointError::Malformed(_)));
    }

    #[test]
    fn error_status_is_rejected_with_summary() {
        let body = r#"{"error":"invalid_grant","error_description":"Bad Request"}"#;
        let err = parse_token_response(400, body, 0).expect_err("fail");
        assert!(err.is_grant_rejection());
        match &err {
            TokenEndpointError::Rejected { status, message } => {
                assert_eq!(*status, 400);
                assert!(message.contains("code=invalid_grant"));
                assert!(message.contains("message=Bad Request"));
            }
            other => panic!("unexpected: {other:?}"),
        }

        let server_error = parse_token_response(503, "unavailable", 0).expect_err("fail");
        assert!(!server_error.is_grant_rejection());
        let app: AppError = server_error.into();
        assert_eq!(app.kind(), ErrorKind::Communication);
        assert!(app.message().contains("status=503"));
    }

    #[test]
    fn parse_oauth_error_details_supports_nested_error_payload() {
        let payload = r#"{
          "error": {
            "code": 401,
            "message": "Request had invalid authentication credentials.",
            "status": "UNAUTHENTICATED"
          }
        }"#;

        let (code, message) = parse_oauth_error_details(payload);
        assert_eq!(code.as_deref(), Some("UNAUTHENTICATED"));
        assert_eq!(
            message.as_deref(),
            Some("Request had invalid authentication credentials.")
        );
    }

    #[test]
    fn sanitize_oauth_error_body_snippet_masks_token_fields() {
        let raw = r#"{
          "error": {
            "message": "invalid token",
            "refresh_token": "abcd1234xyz9876",
            "nested": {"id_token": "idtokenvalue123456"}
          }
        }"#;
        let snippet = sanitize_oauth_error_body_snippet(raw);
        assert!(snippet.contains(mask_token("abcd1234xyz9876").as_str()));
        assert!(snippet.contains(mask_token("idtokenvalue123456").as_str()));
        assert!(!snippet.contains("abcd1234xyz9876"));
        assert!(!snippet.contains("idtokenvalue123456"));
    }

    #[tokio::test]
    async fn refresh_posts_refresh_token_grant() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "1//refresh".into()),
                Matcher::UrlEncoded("client_id".into(), "cid".into()),
                Matcher::UrlEncoded("client_secret".into(), "sec".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"ya29.fresh","expires_in":3600}"#)
            .create_async()
            .await;

        let set = refresh_access_token(
            &reqwest::Client::new(),
            &TokenRefreshRequest {
                token_uri: format!("{}/token", server.url()),
                client_id: "cid".to_string(),
                client_secret: Some("sec".to_string()),
                refresh_token: "1//refresh".to_string(),
            },
        )
        .await
        .expect("refresh");
        assert_eq!(set.access_token, "ya29.fresh");
        assert!(set.expires_at.is_some());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn jwt_bearer_posts_assertion() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), JWT_BEARER_GRANT_TYPE.into()),
                Matcher::UrlEncoded("assertion".into(), "h.p.s".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"ya29.sa","expires_in":3600}"#)
            .create_async()
            .await;

        let set = exchange_jwt_bearer(
            &reqwest::Client::new(),
            &JwtBearerRequest {
                token_uri: format!("{}/token", server.url()),
                assertion: "h.p.s".to_string(),
            },
        )
        .await
        .expect("exchange");
        assert_eq!(set.access_token, "ya29.sa");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let err = refresh_access_token(
            &reqwest::Client::new(),
            &TokenRefreshRequest {
                token_uri: "http://127.0.0.1:1/token".to_string(),
                client_id: "cid".to_string(),
                client_secret: None,
                refresh_token: "r".to_string(),
            },
        )
        .await
        .expect_err("fail");
        assert!(matches!(err, TokenEndpointError::Transport(_)));
    }
}
