//! Usage: Operation handlers behind the CLI subcommands.

pub(crate) mod credentials;
pub(crate) mod format;
pub(crate) mod tokens;

use crate::app::cli::Command;
use crate::infra::settings::Oauth2lSettings;
use crate::shared::error::AppResult;

/// What an operation wants printed, and whether the process should exit 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommandOutput {
    pub stdout: Option<String>,
    pub success: bool,
}

impl CommandOutput {
    pub(crate) fn printed(stdout: String) -> Self {
        Self {
            stdout: Some(stdout),
            success: true,
        }
    }

    pub(crate) fn silent(success: bool) -> Self {
        Self {
            stdout: None,
            success,
        }
    }
}

pub(crate) fn operation_name(command: &Command) -> &'static str {
    match command {
        Command::Fetch { .. } => "fetch",
        Command::Header { .. } => "header",
        Command::Info { .. } => "info",
        Command::Test { .. } => "test",
        Command::Reset { .. } => "reset",
    }
}

pub(crate) async fn dispatch(
    command: Command,
    settings: &Oauth2lSettings,
) -> AppResult<CommandOutput> {
    match command {
        Command::Fetch {
            credentials: args,
            format,
            scopes,
        } => credentials::fetch(settings, &args, format, scopes).await,
        Command::Header {
            credentials: args,
            scopes,
        } => credentials::header(settings, &args, scopes).await,
        Command::Info { format, token } => tokens::info(settings, &token, format).await,
        Command::Test { token } => tokens::test(settings, &token).await,
        Command::Reset {
            credentials_filename,
        } => credentials::reset(settings, credentials_filename.as_deref()).await,
    }
}
