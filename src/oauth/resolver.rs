//! Usage: Strategy selection and orchestration (SSO, assertion, service account, 3LO, ADC).
//!
//! Precedence is encoded once in `CredentialRequest::from_inputs`; `CredentialResolver`
//! drives the chosen strategy, consulting the store under its lock for cached strategies.

use crate::domain::credential::{Credential, CredentialFingerprint, RefreshGrant};
use crate::domain::key_files::{InstalledClient, KeyFile, ServiceAccountKey};
use crate::domain::scopes::{expand_scopes, require_scopes};
use crate::infra::credential_store::CredentialStore;
use crate::infra::settings::Oauth2lSettings;
use crate::oauth::adc::{DefaultCredentialSource, EnvironmentCredentialSource};
use crate::oauth::assertion::{audience_from_values, build_signed_assertion};
use crate::oauth::interactive::{
    run_with_retry, AuthorizationCodeFlow, ConsoleAuthorizationFlow, FlowRequest,
};
use crate::oauth::refresh::{RefreshError, Refresher};
use crate::oauth::sso::fetch_sso_token;
use crate::shared::error::{AppError, AppResult, ErrorKind};
use crate::shared::time::now_unix_seconds;
use std::time::Duration;

/// Caller inputs before strategy selection. Scopes are raw (unexpanded).
#[derive(Debug, Clone, Default)]
pub struct ResolveInputs {
    pub scopes: Vec<String>,
    pub key_file: Option<KeyFile>,
    pub sso_email: Option<String>,
    pub sso_cli: Option<String>,
    pub jwt: bool,
}

/// One variant per acquisition strategy, in precedence order.
#[derive(Debug, Clone)]
pub enum CredentialRequest {
    Sso {
        email: String,
        cli: String,
        scopes: Vec<String>,
    },
    /// `audiences` holds the raw values; exactly one is required.
    SignedAssertion {
        key: ServiceAccountKey,
        audiences: Vec<String>,
    },
    ServiceAccount {
        key: ServiceAccountKey,
        scopes: Vec<String>,
    },
    InstalledApp {
        client: InstalledClient,
        scopes: Vec<String>,
    },
    ApplicationDefault {
        scopes: Vec<String>,
    },
}

impl CredentialRequest {
    pub fn from_inputs(inputs: ResolveInputs, default_sso_cli: &str) -> Self {
        let ResolveInputs {
            scopes,
            key_file,
            sso_email,
            sso_cli,
            jwt,
        } = inputs;

        if let Some(email) = sso_email.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            let cli = sso_cli
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default_sso_cli.to_string());
            return Self::Sso {
                email,
                cli,
                scopes: expand_scopes(&scopes),
            };
        }

        match key_file {
            Some(KeyFile::ServiceAccount(key)) if jwt => Self::SignedAssertion {
                key,
                audiences: scopes,
            },
            Some(KeyFile::ServiceAccount(key)) => Self::ServiceAccount {
                key,
                scopes: expand_scopes(&scopes),
            },
            Some(KeyFile::ClientSecrets(client)) => {
                if jwt {
                    tracing::warn!("--jwt only applies to service account keys; ignoring");
                }
                Self::InstalledApp {
                    client,
                    scopes: expand_scopes(&scopes),
                }
            }
            None => Self::ApplicationDefault {
                scopes: expand_scopes(&scopes),
            },
        }
    }

    pub fn strategy(&self) -> &'static str {
        match self {
            Self::Sso { .. } => "sso",
            Self::SignedAssertion { .. } => "signed_assertion",
            Self::ServiceAccount { .. } => "service_account",
            Self::InstalledApp { .. } => "installed_app",
            Self::ApplicationDefault { .. } => "application_default",
        }
    }
}

enum Acquisition<'a> {
    ServiceAccount {
        key: &'a ServiceAccountKey,
        scopes: &'a [String],
    },
    Interactive {
        client: &'a InstalledClient,
        scopes: &'a [String],
    },
}

fn no_credentials() -> AppError {
    AppError::new(ErrorKind::NoCredentials, "Failed to fetch credentials")
}

pub struct CredentialResolver {
    store: CredentialStore,
    refresher: Refresher,
    flow: Box<dyn AuthorizationCodeFlow>,
    default_source: Box<dyn DefaultCredentialSource>,
    flow_max_attempts: u32,
    use_local_server: bool,
    user_agent: String,
}

impl CredentialResolver {
    /// Wires the default collaborators (console 3LO flow, environment ADC lookup).
    pub fn new(settings: &Oauth2lSettings, store: CredentialStore) -> AppResult<Self> {
        let http = build_http_client(&settings.user_agent)?;
        let flow = ConsoleAuthorizationFlow::new(
            http.clone(),
            settings.callback_port,
            Duration::from_secs(u64::from(settings.callback_timeout_seconds)),
        );
        Ok(Self {
            store,
            refresher: Refresher::new(http, i64::from(settings.refresh_lead_seconds)),
            flow: Box::new(flow),
            default_source: Box::new(EnvironmentCredentialSource::new()),
            flow_max_attempts: settings.flow_max_attempts,
            use_local_server: settings.use_local_server,
            user_agent: settings.user_agent.clone(),
        })
    }

    pub fn with_flow(mut self, flow: Box<dyn AuthorizationCodeFlow>) -> Self {
        self.flow = flow;
        self
    }

    pub fn with_default_source(mut self, source: Box<dyn DefaultCredentialSource>) -> Self {
        self.default_source = source;
        self
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub async fn resolve(&self, request: &CredentialRequest) -> AppResult<Credential> {
        tracing::debug!(strategy = request.strategy(), "resolving credential");
        match request {
            CredentialRequest::Sso { email, cli, scopes } => {
                fetch_sso_token(cli, email, scopes).await
            }
            CredentialRequest::SignedAssertion { key, audiences } => {
                let audience = audience_from_values(audiences)?;
                let signed = build_signed_assertion(key, audience, now_unix_seconds())?;
                Ok(Credential::signed_assertion(signed.token, signed.expires_at))
            }
            CredentialRequest::ServiceAccount { key, scopes } => {
                require_scopes(scopes)?;
                let fingerprint = CredentialFingerprint::new(&key.private_key_id, scopes);
                self.resolve_cached(fingerprint, Acquisition::ServiceAccount { key, scopes })
                    .await
            }
            CredentialRequest::InstalledApp { client, scopes } => {
                require_scopes(scopes)?;
                client.validate()?;
                let fingerprint = CredentialFingerprint::new(&client.client_id, scopes);
                self.resolve_cached(fingerprint, Acquisition::Interactive { client, scopes })
                    .await
            }
            CredentialRequest::ApplicationDefault { scopes } => {
                self.resolve_application_default(scopes).await
            }
        }
    }

    async fn resolve_application_default(&self, scopes: &[String]) -> AppResult<Credential> {
        let Some(found) = self.default_source.find()? else {
            tracing::info!("no application default credential found");
            return Err(no_credentials());
        };
        let Some(credential) = found.scoped(scopes) else {
            return Err(no_credentials());
        };
        let (credential, _) = self
            .refresher
            .ensure_fresh(credential, now_unix_seconds())
            .await?;
        Ok(credential)
    }

    /// Get, acquire on miss, refresh if stale, put if changed; all under the store lock.
    async fn resolve_cached(
        &self,
        fingerprint: CredentialFingerprint,
        acquisition: Acquisition<'_>,
    ) -> AppResult<Credential> {
        let tx = self.store.begin().await?;

        if let Some(cached) = tx.get(&fingerprint) {
            tracing::debug!(fingerprint = %fingerprint, "credential cache hit");
            match self.refresher.ensure_fresh(cached, now_unix_seconds()).await {
                Ok((credential, refreshed)) => {
                    if refreshed {
                        tx.put(&fingerprint, &credential)?;
                    }
                    return Ok(credential);
                }
                Err(err @ RefreshError::Unsupported(_)) => {
                    tracing::info!(
                        fingerprint = %fingerprint,
                        reason = %err,
                        "cached credential cannot be renewed; acquiring a new one"
                    );
                    tx.remove(&fingerprint)?;
                }
                Err(err) if err.is_grant_rejection() => {
                    tracing::warn!(
                        fingerprint = %fingerprint,
                        error = %err,
                        "refresh rejected; dropping cached credential"
                    );
                    tx.remove(&fingerprint)?;
                    return Err(err.into());
                }
                Err(err) => return Err(err.into()),
            }
        }

        tracing::debug!(fingerprint = %fingerprint, "credential cache miss");
        let Some(acquired) = self.acquire(acquisition).await? else {
            return Err(no_credentials());
        };
        let (credential, _) = self
            .refresher
            .ensure_fresh(acquired, now_unix_seconds())
            .await?;
        tx.put(&fingerprint, &credential)?;
        Ok(credential)
    }

    async fn acquire(&self, acquisition: Acquisition<'_>) -> AppResult<Option<Credential>> {
        match acquisition {
            Acquisition::ServiceAccount { key, scopes } => Ok(Some(Credential::refreshable(
                RefreshGrant::ServiceAccount {
                    token_uri: key.token_uri.clone(),
                    client_email: key.client_email.clone(),
                    private_key_id: key.private_key_id.clone(),
                    private_key: key.private_key.clone(),
                },
                scopes.to_vec(),
            ))),
            Acquisition::Interactive { client, scopes } => {
                let request = FlowRequest {
                    client: client.clone(),
                    scopes: scopes.to_vec(),
                    user_agent: self.user_agent.clone(),
                    use_local_server: self.use_local_server,
                };
                run_with_retry(self.flow.as_ref(), &request, self.flow_max_attempts).await
            }
        }
    }
}

pub(crate) fn build_http_client(user_agent: &str) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent.to_string())
        .connect_timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| format!("INTERNAL_ERROR: failed to build http client: {e}").into())
}
