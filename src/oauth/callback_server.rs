//! Usage: One-shot loopback listener that receives the authorization-code redirect.

use crate::shared::error::AppResult;
use crate::shared::security::state_matches;
use reqwest::Url;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub(crate) const CALLBACK_PATH: &str = "/oauth2callback";

const SUCCESS_HTML: &str =
    "<html><body><h1>oauth2l: authorization received</h1><p>You may close this window.</p></body></html>";
const ERROR_HTML: &str =
    "<html><body><h1>oauth2l: authorization failed</h1><p>Return to the terminal for details.</p></body></html>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CallbackPayload {
    pub(crate) code: Option<String>,
    pub(crate) state: Option<String>,
    pub(crate) error: Option<String>,
    pub(crate) error_description: Option<String>,
}

#[derive(Debug)]
pub(crate) struct BoundCallbackListener {
    port: u16,
    listener_v4: Option<TcpListener>,
    listener_v6: Option<TcpListener>,
}

impl BoundCallbackListener {
    pub(crate) fn port(&self) -> u16 {
        self.port
    }

    pub(crate) fn redirect_uri(&self) -> String {
        format!("http://localhost:{}{CALLBACK_PATH}", self.port)
    }
}

pub(crate) async fn bind_callback_listener(
    preferred_port: u16,
) -> AppResult<BoundCallbackListener> {
    match try_bind_on_port(preferred_port).await {
        Ok(bound) => Ok(bound),
        Err(preferred_err) if preferred_port == 0 => Err(format!(
            "COMMUNICATION_ERROR: callback listener bind failed: {preferred_err}"
        )
        .into()),
        Err(preferred_err) => {
            tracing::warn!(
                port = preferred_port,
                error = %preferred_err,
                "preferred callback port unavailable; falling back to a dynamic port"
            );
            try_bind_on_port(0).await.map_err(|fallback_err| {
                format!(
                    "COMMUNICATION_ERROR: callback listener bind failed: {preferred_err}; dynamic port: {fallback_err}"
                )
                .into()
            })
        }
    }
}

async fn try_bind_on_port(port: u16) -> Result<BoundCallbackListener, String> {
    if port == 0 {
        return try_bind_dynamic_port().await;
    }

    let mut bind_errors: Vec<String> = Vec::new();
    let listener_v4 = match TcpListener::bind(("127.0.0.1", port)).await {
        Ok(listener) => Some(listener),
        Err(err) => {
            bind_errors.push(format!("127.0.0.1:{port} ({err})"));
            None
        }
    };
    let listener_v6 = match TcpListener::bind(("::1", port)).await {
        Ok(listener) => Some(listener),
        Err(err) => {
            bind_errors.push(format!("::1:{port} ({err})"));
            None
        }
    };
    if listener_v4.is_none() && listener_v6.is_none() {
        return Err(bind_errors.join("; "));
    }

    Ok(BoundCallbackListener {
        port,
        listener_v4,
        listener_v6,
    })
}

async fn try_bind_dynamic_port() -> Result<BoundCallbackListener, String> {
    let mut bind_errors: Vec<String> = Vec::new();

    match TcpListener::bind(("127.0.0.1", 0)).await {
        Ok(listener_v4) => {
            let port = listener_v4
                .local_addr()
                .map_err(|e| format!("127.0.0.1:0 (local_addr failed: {e})"))?
                .port();
            // Same port on ::1 is best effort; `localhost` may resolve to either family.
            let listener_v6 = TcpListener::bind(("::1", port)).await.ok();
            return Ok(BoundCallbackListener {
                port,
                listener_v4: Some(listener_v4),
                listener_v6,
            });
        }
        Err(err) => bind_errors.push(format!("127.0.0.1:0 ({err})")),
    }

    match TcpListener::bind(("::1", 0)).await {
        Ok(listener_v6) => {
            let port = listener_v6
                .local_addr()
                .map_err(|e| format!("::1:0 (local_addr failed: {e})"))?
                .port();
            return Ok(BoundCallbackListener {
                port,
                listener_v4: None,
                listener_v6: Some(listener_v6),
            });
        }
        Err(err) => bind_errors.push(format!("::1:0 ({err})")),
    }

    Err(bind_errors.join("; "))
}

/// Waits for one redirect. `Ok(None)` means the timeout elapsed with no request.
pub(crate) async fn wait_for_callback(
    mut listener: BoundCallbackListener,
    expected_state: &str,
    timeout: Duration,
) -> AppResult<Option<CallbackPayload>> {
    let accept_future = async {
        match (listener.listener_v4.as_mut(), listener.listener_v6.as_mut()) {
            (Some(v4), Some(v6)) => {
                tokio::select! {
                    result = v4.accept() => result,
                    result = v6.accept() => result,
                }
            }
            (Some(v4), None) => v4.accept().await,
            (None, Some(v6)) => v6.accept().await,
            (None, None) => Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "no callback listener bound",
            )),
        }
    };

    let Ok(accepted) = tokio::time::timeout(timeout, accept_future).await else {
        tracing::warn!(timeout_s = timeout.as_secs(), "authorization callback timed out");
        return Ok(None);
    };
    let (mut socket, _) =
        accepted.map_err(|e| format!("COMMUNICATION_ERROR: callback accept failed: {e}"))?;

    let mut buffer = vec![0u8; 8192];
    let size = socket
        .read(&mut buffer)
        .await
        .map_err(|e| format!("COMMUNICATION_ERROR: callback read failed: {e}"))?;
    if size == 0 {
        return Err("COMMUNICATION_ERROR: callback request is empty"
            .to_string()
            .into());
    }

    let request = String::from_utf8_lossy(&buffer[..size]);
    let parsed = extract_request_target(request.as_ref())
        .and_then(|target| parse_callback_target(target, CALLBACK_PATH))
        .and_then(|payload| validate_state(&payload, expected_state).map(|()| payload));

    let ok = matches!(&parsed, Ok(payload) if payload.error.is_none());
    let body = if ok { SUCCESS_HTML } else { ERROR_HTML };
    let status = if ok {
        "HTTP/1.1 200 OK"
    } else {
        "HTTP/1.1 400 Bad Request"
    };
    let response = format!(
        "{status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;

    parsed.map(Some)
}

fn extract_request_target(request: &str) -> AppResult<&str> {
    let first = request
        .lines()
        .next()
        .ok_or_else(|| "INVALID_INPUT: callback request is malformed".to_string())?;
    let mut parts = first.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();
    if method != "GET" || target.is_empty() {
        return Err("INVALID_INPUT: callback request must be GET"
            .to_string()
            .into());
    }
    Ok(target)
}

pub(crate) fn parse_callback_target(
    target: &str,
    expected_path: &str,
) -> AppResult<CallbackPayload> {
    let url = Url::parse(&format!("http://127.0.0.1{target}"))
        .map_err(|e| format!("INVALID_INPUT: invalid callback target: {e}"))?;

    if url.path() != expected_path {
        return Err(format!("INVALID_INPUT: unexpected callback path {}", url.path()).into());
    }

    let mut payload = CallbackPayload {
        code: None,
        state: None,
        error: None,
        error_description: None,
    };
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => payload.code = Some(value.to_string()),
            "state" => payload.state = Some(value.to_string()),
            "error" => payload.error = Some(value.to_string()),
            "error_description" => payload.error_description = Some(value.to_string()),
            _ => {}
        }
    }

    if payload.code.is_none() && payload.error.is_none() {
        return Err("INVALID_INPUT: callback is missing both code and error"
            .to_string()
            .into());
    }

    Ok(payload)
}

fn validate_state(payload: &CallbackPayload, expected_state: &str) -> AppResult<()> {
    let state = payload
        .state
        .as_deref()
        .ok_or_else(|| "INVALID_INPUT: callback is missing state".to_string())?;
    if !state_matches(expected_state, state) {
        return Err("INVALID_INPUT: callback state mismatch".to_string().into());
    }
    Ok(())
}
