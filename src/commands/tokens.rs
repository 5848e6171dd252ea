//! Usage: `info` and `test` operations (token introspection).

use crate::app::cli::InfoFormat;
use crate::commands::format::render_token_info;
use crate::commands::CommandOutput;
use crate::infra::settings::Oauth2lSettings;
use crate::oauth::introspect::TokenIntrospector;
use crate::oauth::resolver::build_http_client;
use crate::shared::error::AppResult;

fn introspector(settings: &Oauth2lSettings) -> AppResult<TokenIntrospector> {
    let http = build_http_client(&settings.user_agent)?;
    Ok(TokenIntrospector::new(http, settings.tokeninfo_url.clone()))
}

pub(crate) async fn info(
    settings: &Oauth2lSettings,
    token: &str,
    format: InfoFormat,
) -> AppResult<CommandOutput> {
    let info = introspector(settings)?.introspect(token).await?;
    if info.is_empty() {
        return Ok(CommandOutput::silent(false));
    }
    render_token_info(&info, format).map(CommandOutput::printed)
}

pub(crate) async fn test(settings: &Oauth2lSettings, token: &str) -> AppResult<CommandOutput> {
    let valid = introspector(settings)?.is_valid(token).await?;
    Ok(CommandOutput::silent(valid))
}
