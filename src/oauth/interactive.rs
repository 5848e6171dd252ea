//! Usage: Interactive authorization-code (3LO) flow collaborator and its bounded retry loop.

use crate::domain::credential::{Credential, RefreshGrant};
use crate::domain::key_files::InstalledClient;
use crate::domain::scopes::canonical_scope_string;
use crate::oauth::callback_server;
use crate::oauth::pkce;
use crate::oauth::token_exchange::{
    exchange_authorization_code, TokenEndpointError, TokenExchangeRequest,
};
use crate::shared::error::AppResult;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

pub(crate) const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

#[derive(Debug, Clone)]
pub struct FlowRequest {
    pub client: InstalledClient,
    pub scopes: Vec<String>,
    pub user_agent: String,
    pub use_local_server: bool,
}

/// Tagged result of one authorization attempt; the retry loop branches on the tag.
#[derive(Debug, Clone)]
pub enum FlowOutcome {
    Granted(Credential),
    /// The user supplied nothing (empty input, closed stdin, callback timeout).
    NoCredential,
    /// Consent denied or the code exchange was refused; worth another attempt.
    Rejected(String),
    /// Network failure talking to the authorization server; not retried.
    Transport(String),
}

pub type FlowFuture<'a> = Pin<Box<dyn Future<Output = FlowOutcome> + Send + 'a>>;

pub trait AuthorizationCodeFlow: Send + Sync {
    fn authorize<'a>(&'a self, request: &'a FlowRequest) -> FlowFuture<'a>;
}

/// Runs `flow` up to `max_attempts` times. `Ok(None)` once attempts are exhausted.
pub(crate) async fn run_with_retry(
    flow: &dyn AuthorizationCodeFlow,
    request: &FlowRequest,
    max_attempts: u32,
) -> AppResult<Option<Credential>> {
    let max_attempts = max_attempts.max(1);
    for attempt in 1..=max_attempts {
        match flow.authorize(request).await {
            FlowOutcome::Granted(credential) => {
                tracing::debug!(attempt, "authorization flow granted credential");
                return Ok(Some(credential));
            }
            FlowOutcome::NoCredential => {
                tracing::info!(attempt, max_attempts, "authorization flow produced no credential");
            }
            FlowOutcome::Rejected(reason) => {
                tracing::warn!(
                    attempt,
                    max_attempts,
                    reason = %reason,
                    "authorization flow rejected"
                );
            }
            FlowOutcome::Transport(reason) => {
                return Err(format!(
                    "COMMUNICATION_ERROR: Communication error creating credentials: {reason}"
                )
                .into());
            }
        }
    }
    tracing::warn!(max_attempts, "authorization flow attempts exhausted");
    Ok(None)
}

/// Prints the consent URL to stderr and collects the code from stdin or a loopback redirect.
#[derive(Debug, Clone)]
pub struct ConsoleAuthorizationFlow {
    http: reqwest::Client,
    callback_port: u16,
    callback_timeout: Duration,
}

impl ConsoleAuthorizationFlow {
    pub fn new(http: reqwest::Client, callback_port: u16, callback_timeout: Duration) -> Self {
        Self {
            http,
            callback_port,
            callback_timeout,
        }
    }

    async fn run(&self, request: &FlowRequest) -> FlowOutcome {
        let pkce = pkce::generate_pkce_pair();
        let state = pkce::generate_state();

        let (redirect_uri, code) = if request.use_local_server {
            let listener = match callback_server::bind_callback_listener(self.callback_port).await {
                Ok(listener) => listener,
                Err(err) => return FlowOutcome::Transport(err.to_string()),
            };
            let redirect_uri = listener.redirect_uri();
            let auth_url = match build_authorize_url(
                request,
                &redirect_uri,
                &state,
                &pkce.code_challenge,
            ) {
                Ok(url) => url,
                Err(err) => return FlowOutcome::Rejected(err.to_string()),
            };
            eprintln!("Go to the following link in your browser:\n\n    {auth_url}\n");
            eprintln!("Waiting for authorization on port {}...", listener.port());

            let waited =
                callback_server::wait_for_callback(listener, &state, self.callback_timeout).await;
            let payload = match waited {
                Ok(Some(payload)) => payload,
                Ok(None) => return FlowOutcome::NoCredential,
                Err(err) => return FlowOutcome::Rejected(err.to_string()),
            };
            if let Some(error) = payload.error {
                let description = payload.error_description.unwrap_or_default();
                return FlowOutcome::Rejected(format!(
                    "authorization denied: {error} {description}"
                ));
            }
            match payload.code {
                Some(code) => (redirect_uri, code),
                None => return FlowOutcome::NoCredential,
            }
        } else {
            let auth_url = match build_authorize_url(
                request,
                OOB_REDIRECT_URI,
                &state,
                &pkce.code_challenge,
            ) {
                Ok(url) => url,
                Err(err) => return FlowOutcome::Rejected(err.to_string()),
            };
            eprintln!("Go to the following link in your browser:\n\n    {auth_url}\n");
            eprint!("Enter verification code: ");
            let mut stdin = BufReader::new(tokio::io::stdin());
            match read_code(&mut stdin).await {
                Some(code) => (OOB_REDIRECT_URI.to_string(), code),
                None => return FlowOutcome::NoCredential,
            }
        };

        let exchange = TokenExchangeRequest {
            token_uri: request.client.token_uri.clone(),
            client_id: request.client.client_id.clone(),
            client_secret: request.client.client_secret.clone(),
            code,
            redirect_uri,
            code_verifier: pkce.code_verifier,
        };
        match exchange_authorization_code(&self.http, &exchange).await {
            Ok(tokens) => {
                let credential = match tokens.refresh_token {
                    Some(refresh_token) => Credential::refreshable(
                        RefreshGrant::RefreshToken {
                            token_uri: request.client.token_uri.clone(),
                            client_id: request.client.client_id.clone(),
                            client_secret: request.client.client_secret.clone(),
                            refresh_token,
                        },
                        request.scopes.clone(),
                    )
                    .with_token(tokens.access_token, tokens.expires_at, None, tokens.id_token),
                    None => Credential::access_token_only(tokens.access_token, tokens.expires_at),
                };
                FlowOutcome::Granted(credential)
            }
            Err(err) => outcome_for_exchange_error(err),
        }
    }
}

impl AuthorizationCodeFlow for ConsoleAuthorizationFlow {
    fn authorize<'a>(&'a self, request: &'a FlowRequest) -> FlowFuture<'a> {
        Box::pin(self.run(request))
    }
}

fn outcome_for_exchange_error(err: TokenEndpointError) -> FlowOutcome {
    match err {
        TokenEndpointError::Transport(reason) => FlowOutcome::Transport(reason),
        other => FlowOutcome::Rejected(other.to_string()),
    }
}

pub(crate) fn build_authorize_url(
    request: &FlowRequest,
    redirect_uri: &str,
    state: &str,
    code_challenge: &str,
) -> AppResult<String> {
    let mut url = reqwest::Url::parse(request.client.auth_uri.trim())
        .map_err(|e| format!("INVALID_INPUT: invalid auth_uri in client secrets: {e}"))?;
    {
        let scope = canonical_scope_string(&request.scopes);
        let mut query = url.query_pairs_mut();
        query.append_pair("response_type", "code");
        query.append_pair("client_id", request.client.client_id.trim());
        query.append_pair("redirect_uri", redirect_uri);
        query.append_pair("scope", &scope);
        query.append_pair("access_type", "offline");
        query.append_pair("state", state);
        query.append_pair("code_challenge", code_challenge);
        query.append_pair("code_challenge_method", pkce::CHALLENGE_METHOD);
    }
    Ok(url.to_string())
}

/// First non-empty line, trimmed. EOF or a blank line yields `None`.
async fn read_code<R: AsyncBufRead + Unpin>(reader: &mut R) -> Option<String> {
    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(0) => None,
        Ok(_) => Some(line.trim().to_string()).filter(|v| !v.is_empty()),
        Err(err) => {
            tracing::warn!(error = %err, "failed to read verification code");
            None
        }
    }
}
