//! Usage: Run blocking work (file locks, file I/O) off the async executor with a stable label.

use crate::shared::error::{AppError, AppResult, ErrorKind};

pub async fn run<T, E>(
    label: &'static str,
    f: impl FnOnce() -> Result<T, E> + Send + 'static,
) -> AppResult<T>
where
    T: Send + 'static,
    E: Into<AppError> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(Into::into),
        Err(join_err) => {
            // Panic payloads may contain file contents; never forward them.
            if join_err.is_panic() {
                tracing::error!(label, "blocking task panicked");
                return Err(AppError::new(
                    ErrorKind::Internal,
                    format!("{label}: task panicked"),
                ));
            }

            tracing::warn!(label, "blocking task cancelled");
            Err(AppError::new(
                ErrorKind::Internal,
                format!("{label}: task cancelled"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_returns_closure_result() {
        let value = run("test_ok", || -> AppResult<u32> { Ok(7) })
            .await
            .expect("ok");
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn run_converts_string_errors() {
        let err = run("test_err", || -> Result<(), String> {
            Err("FILE_ERROR: nope".to_string())
        })
        .await
        .expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::File);
    }
}
