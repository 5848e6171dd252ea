//! Usage: Fetch a bare access token from an external SSO command.

use crate::domain::credential::Credential;
use crate::shared::error::AppResult;
use crate::shared::security::mask_token;
use std::process::Stdio;
use tokio::process::Command;

pub const DEFAULT_SSO_CLI: &str = "/google/data/ro/teams/oneplatform/sso";

const STDERR_SNIPPET_MAX_CHARS: usize = 300;

/// Runs `<cli> <email> <scope>...`; trimmed stdout is the token. Never cached.
pub async fn fetch_sso_token(cli: &str, email: &str, scopes: &[String]) -> AppResult<Credential> {
    let output = Command::new(cli)
        .arg(email)
        .args(scopes)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| format!("SSO_ERROR: Failed to run SSO command {cli}: {e}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let snippet: String = stderr.trim().chars().take(STDERR_SNIPPET_MAX_CHARS).collect();
        tracing::warn!(
            cli,
            status = %output.status,
            stderr = %snippet,
            "sso command failed"
        );
        return Err(format!(
            "SSO_ERROR: Failed to fetch OAuth token by SSO ({})",
            output.status
        )
        .into());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let token = stdout.trim();
    if token.is_empty() {
        return Err("SSO_ERROR: SSO command produced no token"
            .to_string()
            .into());
    }

    tracing::debug!(email, token = %mask_token(token), "fetched token by sso");
    Ok(Credential::access_token_only(token, None))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::shared::error::ErrorKind;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn write_script(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn stdout_is_trimmed_into_token_and_args_are_forwarded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cli = write_script(dir.path(), "sso", r#"echo "  tok-$1-$#  ""#);
        let credential = fetch_sso_token(
            &cli,
            "me@example.com",
            &["openid".to_string(), "https://www.googleapis.com/auth/drive".to_string()],
        )
        .await
        .expect("token");
        assert_eq!(credential.bearer_token(), Some("tok-me@example.com-3"));
        assert!(credential.grant.is_none());
    }

    #[tokio::test]
    async fn non_zero_exit_is_sso_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cli = write_script(dir.path(), "sso", "echo nope >&2\nexit 3");
        let err = fetch_sso_token(&cli, "me@example.com", &[])
            .await
            .expect_err("fail");
        assert_eq!(err.kind(), ErrorKind::Sso);
    }

    #[tokio::test]
    async fn missing_command_is_sso_error() {
        let err = fetch_sso_token("/definitely/not/a/real/sso", "me@example.com", &[])
            .await
            .expect_err("fail");
        assert_eq!(err.kind(), ErrorKind::Sso);
    }

    #[tokio::test]
    async fn blank_output_is_sso_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cli = write_script(dir.path(), "sso", "echo '   '");
        let err = fetch_sso_token(&cli, "me@example.com", &[])
            .await
            .expect_err("fail");
        assert_eq!(err.kind(), ErrorKind::Sso);
    }
}
