//! Usage: Command-line surface (clap derive); flags override settings per invocation.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Fetch, cache, and inspect OAuth2 access credentials.
#[derive(Debug, Parser)]
#[command(name = "oauth2l", version, about, long_about = None)]
pub(crate) struct Cli {
    /// Settings file (default: $OAUTH2L_CONFIG or ~/.config/oauth2l/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Fetch an access token for the given scopes
    Fetch {
        #[command(flatten)]
        credentials: CredentialArgs,

        /// Output format
        #[arg(
            short = 'f',
            long = "format",
            alias = "credentials_format",
            value_enum,
            default_value_t = FetchFormat::Bare
        )]
        format: FetchFormat,

        /// Scopes (shorthand or full URIs); with --jwt, the single audience
        scopes: Vec<String>,
    },

    /// Print an `Authorization: Bearer` header line
    Header {
        #[command(flatten)]
        credentials: CredentialArgs,

        scopes: Vec<String>,
    },

    /// Print introspection info for an access token
    Info {
        #[arg(
            short = 'f',
            long = "format",
            alias = "credentials_format",
            value_enum,
            default_value_t = InfoFormat::Json
        )]
        format: InfoFormat,

        token: String,
    },

    /// Exit 0 if the access token is valid, 1 otherwise
    Test { token: String },

    /// Delete the credential cache file
    Reset {
        #[arg(long = "credentials_filename", alias = "credentials-filename")]
        credentials_filename: Option<String>,
    },
}

#[derive(Debug, Clone, Default, Args)]
pub(crate) struct CredentialArgs {
    /// Credential cache file
    #[arg(long = "credentials_filename", alias = "credentials-filename")]
    pub credentials_filename: Option<String>,

    /// Service-account key or installed-app client secrets file
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,

    /// Single-sign-on operator email
    #[arg(long, value_name = "EMAIL")]
    pub sso: Option<String>,

    /// Path of the SSO command
    #[arg(long = "sso_cli", alias = "sso-cli", value_name = "PATH")]
    pub sso_cli: Option<String>,

    /// Return a self-signed JWT instead of exchanging it (service accounts only)
    #[arg(long)]
    pub jwt: bool,

    /// Receive the authorization code through a loopback redirect instead of stdin
    #[arg(long = "local_server", alias = "local-server")]
    pub local_server: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum FetchFormat {
    Bare,
    Header,
    Json,
    #[value(name = "json_compact")]
    JsonCompact,
    Pretty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum InfoFormat {
    Json,
    #[value(name = "json_compact")]
    JsonCompact,
}
