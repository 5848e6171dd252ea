mod app;
mod commands;
mod domain;
mod infra;
mod oauth;
mod shared;
pub mod test_support;

pub use domain::credential::{Credential, CredentialFingerprint, CredentialKind, RefreshGrant};
pub use domain::key_files::{
    load_key_file, parse_client_secrets, parse_service_account_key, InstalledClient, KeyFile,
    ServiceAccountKey, DEFAULT_AUTH_URI, DEFAULT_TOKEN_URI,
};
pub use domain::scopes::{canonical_scope_string, expand_scope, expand_scopes, SCOPE_PREFIX};
pub use domain::token_info::TokenInfo;
pub use infra::credential_store::{CredentialStore, StoreTransaction};
pub use infra::settings::{read as read_settings, read_from as read_settings_from, Oauth2lSettings};
pub use oauth::adc::{
    AuthorizedUser, DefaultCredential, DefaultCredentialSource, EnvironmentCredentialSource,
    GCLOUD_SCOPES,
};
pub use oauth::assertion::{build_signed_assertion, SignedAssertion};
pub use oauth::interactive::{
    AuthorizationCodeFlow, ConsoleAuthorizationFlow, FlowFuture, FlowOutcome, FlowRequest,
};
pub use oauth::introspect::{TokenIntrospector, DEFAULT_TOKENINFO_URL};
pub use oauth::refresh::{RefreshError, Refresher};
pub use oauth::resolver::{CredentialRequest, CredentialResolver, ResolveInputs};
pub use oauth::sso::{fetch_sso_token, DEFAULT_SSO_CLI};
pub use oauth::token_exchange::TokenEndpointError;
pub use shared::error::{AppError, AppResult, ErrorKind};

use app::cli::Cli;
use clap::Parser;
use std::process::ExitCode;

fn load_settings(cli: &Cli) -> AppResult<Oauth2lSettings> {
    match &cli.config {
        Some(path) => infra::settings::read_from(path),
        None => infra::settings::read(),
    }
}

/// CLI entry point: parse arguments, run one operation, map the outcome to an exit code.
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let operation = commands::operation_name(&cli.command);

    let settings = load_settings(&cli);
    let log_filter = settings
        .as_ref()
        .map(|s| s.log_filter.clone())
        .unwrap_or_default();
    let _log_guard = app::logging::init(&log_filter);

    let settings = match settings {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("Error encountered in {operation} operation: {}", err.message());
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!(error = %err, "failed to start async runtime");
            eprintln!("Error encountered in {operation} operation: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(commands::dispatch(cli.command, &settings)) {
        Ok(output) => {
            if let Some(stdout) = output.stdout {
                println!("{stdout}");
            }
            if output.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            tracing::debug!(operation, kind = err.kind().code(), "operation failed");
            eprintln!("Error encountered in {operation} operation: {}", err.message());
            ExitCode::FAILURE
        }
    }
}
