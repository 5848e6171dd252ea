//! Usage: Self-signed RS256 bearer assertions built from a service-account key (no network).

use crate::domain::key_files::ServiceAccountKey;
use crate::shared::error::AppResult;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey};
use serde::Serialize;

/// Issued-at is backdated by this much to tolerate clock skew with the verifier.
pub(crate) const CLOCK_SKEW_SECS: i64 = 60;
pub(crate) const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Serialize)]
struct AssertionHeader<'a> {
    alg: &'static str,
    typ: &'static str,
    kid: &'a str,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone)]
pub struct SignedAssertion {
    pub token: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// The single raw value supplied in assertion mode; it is an audience URI, not a scope.
pub(crate) fn audience_from_values(values: &[String]) -> AppResult<&str> {
    let audiences: Vec<&str> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect();
    match audiences.as_slice() {
        [] => Err("INVALID_INPUT: No audience provided".to_string().into()),
        [audience] => Ok(*audience),
        _ => Err("INVALID_INPUT: More than one audience provided"
            .to_string()
            .into()),
    }
}

pub fn build_signed_assertion(
    key: &ServiceAccountKey,
    audience: &str,
    now_unix: i64,
) -> AppResult<SignedAssertion> {
    let issued_at = now_unix - CLOCK_SKEW_SECS;
    let expires_at = issued_at + ASSERTION_LIFETIME_SECS;
    let claims = AssertionClaims {
        iss: &key.client_email,
        sub: &key.client_email,
        aud: audience,
        iat: issued_at,
        exp: expires_at,
    };
    let token = sign_jwt(key, &claims)?;
    tracing::debug!(
        kid = %key.private_key_id,
        aud = audience,
        exp = expires_at,
        "built signed assertion"
    );
    Ok(SignedAssertion {
        token,
        issued_at,
        expires_at,
    })
}

/// `base64url(header).base64url(claims).base64url(RS256 signature)`, all without padding.
pub(crate) fn sign_jwt<C: Serialize>(key: &ServiceAccountKey, claims: &C) -> AppResult<String> {
    let header = AssertionHeader {
        alg: "RS256",
        typ: "JWT",
        kid: &key.private_key_id,
    };
    let header_json = serde_json::to_vec(&header)
        .map_err(|e| format!("INTERNAL_ERROR: assertion header encode failed: {e}"))?;
    let claims_json = serde_json::to_vec(claims)
        .map_err(|e| format!("INTERNAL_ERROR: assertion claims encode failed: {e}"))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_json),
        URL_SAFE_NO_PAD.encode(claims_json)
    );

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| {
            format!("KEY_ERROR: service account private key is not a usable RSA key: {e}")
        })?;
    let signature = jsonwebtoken::crypto::sign(
        signing_input.as_bytes(),
        &encoding_key,
        Algorithm::RS256,
    )
    .map_err(|e| format!("KEY_ERROR: assertion signing failed: {e}"))?;

    Ok(format!("{signing_input}.{signature}"))
}
