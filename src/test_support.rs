//! Usage: Public test helpers for integration tests (deterministic collaborators).

use crate::oauth::adc::{DefaultCredential, DefaultCredentialSource};
use crate::oauth::interactive::{AuthorizationCodeFlow, FlowFuture, FlowOutcome, FlowRequest};
use crate::shared::error::AppResult;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

// Poisoned locks are recovered; the queued outcomes stay intact.
fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Authorization flow that replays a fixed list of outcomes, then reports `NoCredential`.
#[derive(Debug, Default)]
pub struct ScriptedFlow {
    outcomes: Mutex<VecDeque<FlowOutcome>>,
    requests: Mutex<Vec<FlowRequest>>,
    calls: AtomicU32,
}

impl ScriptedFlow {
    pub fn new(outcomes: impl IntoIterator<Item = FlowOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests seen so far, in call order.
    pub fn requests(&self) -> Vec<FlowRequest> {
        locked(&self.requests).clone()
    }
}

impl AuthorizationCodeFlow for ScriptedFlow {
    fn authorize<'a>(&'a self, request: &'a FlowRequest) -> FlowFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        locked(&self.requests).push(request.clone());
        let next = locked(&self.outcomes)
            .pop_front()
            .unwrap_or(FlowOutcome::NoCredential);
        Box::pin(async move { next })
    }
}

impl AuthorizationCodeFlow for std::sync::Arc<ScriptedFlow> {
    fn authorize<'a>(&'a self, request: &'a FlowRequest) -> FlowFuture<'a> {
        self.as_ref().authorize(request)
    }
}

/// Ambient credential source with a fixed answer.
#[derive(Debug, Clone, Default)]
pub struct StaticDefaultSource {
    credential: Option<DefaultCredential>,
}

impl StaticDefaultSource {
    pub fn new(credential: Option<DefaultCredential>) -> Self {
        Self { credential }
    }
}

impl DefaultCredentialSource for StaticDefaultSource {
    fn find(&self) -> AppResult<Option<DefaultCredential>> {
        Ok(self.credential.clone())
    }
}

/// Parses an ADC-style JSON document the way the environment lookup does.
pub fn parse_default_credential(
    contents: serde_json::Value,
) -> AppResult<Option<DefaultCredential>> {
    crate::oauth::adc::parse_default_credential(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::key_files::InstalledClient;
    use std::sync::Arc;

    #[tokio::test]
    async fn scripted_flow_replays_then_reports_no_credential() {
        let flow = ScriptedFlow::new([FlowOutcome::Rejected("denied".to_string())]);
        let request = FlowRequest {
            client: InstalledClient {
                client_id: "cid".to_string(),
                client_secret: None,
                auth_uri: "https://accounts.example.com/auth".to_string(),
                token_uri: "https://accounts.example.com/token".to_string(),
                redirect_uris: Vec::new(),
            },
            scopes: vec!["openid".to_string()],
            user_agent: "oauth2l".to_string(),
            use_local_server: false,
        };
        assert!(matches!(flow.authorize(&request).await, FlowOutcome::Rejected(_)));
        assert!(matches!(flow.authorize(&request).await, FlowOutcome::NoCredential));
        assert_eq!(flow.calls(), 2);
        assert_eq!(flow.requests().len(), 2);
    }

    #[test]
    fn poisoned_script_is_still_readable() {
        let flow = Arc::new(ScriptedFlow::new([FlowOutcome::NoCredential]));
        let poisoner = Arc::clone(&flow);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.requests.lock().expect("lock");
            panic!("poison the request log");
        })
        .join();

        assert!(flow.requests().is_empty());
    }
}
