//! Usage: Render credentials and token info for stdout.

use crate::app::cli::{FetchFormat, InfoFormat};
use crate::domain::credential::{Credential, RefreshGrant};
use crate::domain::token_info::TokenInfo;
use crate::shared::error::{AppError, AppResult, ErrorKind};
use crate::shared::time::format_unix_utc;
use serde::Serialize;

/// Public view of a credential. Never carries private key material.
#[derive(Debug, Serialize)]
struct CredentialView<'a> {
    kind: &'static str,
    access_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_expiry: Option<String>,
    #[serde(skip_serializing_if = "no_scopes")]
    scopes: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    token_uri: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
    user_agent: &'a str,
}

fn no_scopes(scopes: &&[String]) -> bool {
    scopes.is_empty()
}

fn credential_view<'a>(credential: &'a Credential, user_agent: &'a str) -> CredentialView<'a> {
    let (client_id, refresh_token) = match &credential.grant {
        Some(RefreshGrant::RefreshToken {
            client_id,
            refresh_token,
            ..
        }) => (Some(client_id.as_str()), Some(refresh_token.as_str())),
        Some(RefreshGrant::ServiceAccount { client_email, .. }) => {
            (Some(client_email.as_str()), None)
        }
        None => (None, None),
    };
    CredentialView {
        kind: credential.kind.label(),
        access_token: credential.bearer_token(),
        token_expiry: credential.expires_at.and_then(format_unix_utc),
        scopes: &credential.scopes,
        token_uri: credential.grant.as_ref().map(RefreshGrant::token_uri),
        client_id,
        refresh_token,
        user_agent,
    }
}

/// Serializes through `Value` so object keys come out sorted.
pub(crate) fn render_json<T: Serialize>(value: &T, pretty: bool) -> AppResult<String> {
    let value = serde_json::to_value(value)
        .map_err(|e| format!("INTERNAL_ERROR: failed to serialize output: {e}"))?;
    if !pretty {
        return Ok(value.to_string());
    }
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| format!("INTERNAL_ERROR: failed to serialize output: {e}"))?;
    String::from_utf8(out).map_err(|e| format!("INTERNAL_ERROR: output is not utf-8: {e}").into())
}

fn require_token(credential: &Credential) -> AppResult<&str> {
    credential
        .bearer_token()
        .ok_or_else(|| AppError::new(ErrorKind::NoCredentials, "Failed to fetch credentials"))
}

pub(crate) fn header_line(token: &str) -> String {
    format!("Authorization: Bearer {token}")
}

pub(crate) fn render_credential(
    credential: &Credential,
    format: FetchFormat,
    user_agent: &str,
) -> AppResult<String> {
    match format {
        FetchFormat::Bare => require_token(credential).map(str::to_string),
        FetchFormat::Header => require_token(credential).map(header_line),
        FetchFormat::Json => render_json(&credential_view(credential, user_agent), true),
        FetchFormat::JsonCompact => render_json(&credential_view(credential, user_agent), false),
        FetchFormat::Pretty => {
            let token = require_token(credential)?;
            Ok(format!(
                "Fetched credentials of type:\n  {}\nAccess token:\n  {token}",
                credential.kind.label()
            ))
        }
    }
}

pub(crate) fn render_token_info(info: &TokenInfo, format: InfoFormat) -> AppResult<String> {
    render_json(info, format == InfoFormat::Json)
}
