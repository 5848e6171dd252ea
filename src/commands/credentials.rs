//! Usage: `fetch`, `header`, and `reset` operations.

use crate::app::cli::{CredentialArgs, FetchFormat};
use crate::commands::format::render_credential;
use crate::commands::CommandOutput;
use crate::domain::credential::Credential;
use crate::domain::key_files::load_key_file;
use crate::infra::app_paths::resolve_user_path;
use crate::infra::credential_store::CredentialStore;
use crate::infra::settings::Oauth2lSettings;
use crate::oauth::resolver::{CredentialRequest, CredentialResolver, ResolveInputs};
use crate::shared::blocking;
use crate::shared::error::AppResult;

/// Settings for this invocation with the command-line overrides applied.
pub(crate) fn effective_settings(
    settings: &Oauth2lSettings,
    args: &CredentialArgs,
) -> Oauth2lSettings {
    let mut effective = settings.clone();
    if let Some(filename) = args
        .credentials_filename
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        effective.credentials_filename = filename.to_string();
    }
    if let Some(cli) = args
        .sso_cli
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        effective.sso_cli = cli.to_string();
    }
    if args.local_server {
        effective.use_local_server = true;
    }
    effective
}

pub(crate) fn open_store(credentials_filename: &str) -> AppResult<CredentialStore> {
    Ok(CredentialStore::new(resolve_user_path(credentials_filename)?))
}

pub(crate) async fn build_request(
    settings: &Oauth2lSettings,
    args: &CredentialArgs,
    scopes: Vec<String>,
) -> AppResult<CredentialRequest> {
    let sso_requested = args
        .sso
        .as_deref()
        .map(str::trim)
        .is_some_and(|v| !v.is_empty());
    // SSO outranks key files; never touch `--json` when it is selected.
    let key_file = match args.json.clone().filter(|_| !sso_requested) {
        Some(path) => {
            let path = match path.to_str() {
                Some(raw) => resolve_user_path(raw)?,
                None => path,
            };
            Some(blocking::run("load_key_file", move || load_key_file(&path)).await?)
        }
        None => None,
    };
    let inputs = ResolveInputs {
        scopes,
        key_file,
        sso_email: args.sso.clone(),
        sso_cli: args.sso_cli.clone(),
        jwt: args.jwt,
    };
    Ok(CredentialRequest::from_inputs(inputs, &settings.sso_cli))
}

async fn resolve(
    settings: &Oauth2lSettings,
    args: &CredentialArgs,
    scopes: Vec<String>,
) -> AppResult<(Credential, String)> {
    let settings = effective_settings(settings, args);
    let request = build_request(&settings, args, scopes).await?;
    let resolver = CredentialResolver::new(&settings, open_store(&settings.credentials_filename)?)?;
    let credential = resolver.resolve(&request).await?;
    Ok((credential, resolver.user_agent().to_string()))
}

pub(crate) async fn fetch(
    settings: &Oauth2lSettings,
    args: &CredentialArgs,
    format: FetchFormat,
    scopes: Vec<String>,
) -> AppResult<CommandOutput> {
    let (credential, user_agent) = resolve(settings, args, scopes).await?;
    render_credential(&credential, format, &user_agent).map(CommandOutput::printed)
}

pub(crate) async fn header(
    settings: &Oauth2lSettings,
    args: &CredentialArgs,
    scopes: Vec<String>,
) -> AppResult<CommandOutput> {
    fetch(settings, args, FetchFormat::Header, scopes).await
}

pub(crate) async fn reset(
    settings: &Oauth2lSettings,
    credentials_filename: Option<&str>,
) -> AppResult<CommandOutput> {
    let filename = credentials_filename
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(&settings.credentials_filename);
    let store = open_store(filename)?;
    let removed = store.reset().await?;
    tracing::info!(path = %store.path().display(), removed, "credential cache reset");
    Ok(CommandOutput::silent(true))
}
