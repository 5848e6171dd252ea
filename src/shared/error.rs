//! Usage: Unified error model (typed kind rendered as `CODE: message` strings).

use std::sync::Arc;

pub type AppResult<T> = Result<T, AppError>;

/// Failure taxonomy surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad or missing scopes, ambiguous audience count, malformed client-secrets shape.
    InvalidInput,
    /// Key or secrets file missing or not parseable as JSON.
    File,
    /// Service-account key material missing fields or not a usable RSA key.
    Key,
    /// Transport failure or unexpected status from a network call.
    Communication,
    /// External SSO command failed.
    Sso,
    /// Every applicable strategy came back empty.
    NoCredentials,
    Internal,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::File => "FILE_ERROR",
            Self::Key => "KEY_ERROR",
            Self::Communication => "COMMUNICATION_ERROR",
            Self::Sso => "SSO_ERROR",
            Self::NoCredentials => "NO_CREDENTIALS",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "INVALID_INPUT" => Some(Self::InvalidInput),
            "FILE_ERROR" => Some(Self::File),
            "KEY_ERROR" => Some(Self::Key),
            "COMMUNICATION_ERROR" => Some(Self::Communication),
            "SSO_ERROR" => Some(Self::Sso),
            "NO_CREDENTIALS" => Some(Self::NoCredentials),
            "INTERNAL_ERROR" => Some(Self::Internal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{}: {}", .kind.code(), .message)]
pub struct AppError {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Message without the code prefix.
    pub fn message(&self) -> &str {
        &self.message
    }
}

fn split_code_message(raw: &str) -> Option<(&str, &str)> {
    let msg = raw.trim();
    let msg = msg.strip_prefix("Error:").unwrap_or(msg).trim();
    if msg.is_empty() {
        return None;
    }

    let (maybe_code, rest) = msg.split_once(':')?;
    let code = maybe_code.trim();
    if code.is_empty() {
        return None;
    }
    let mut chars = code.chars();
    let first = chars.next()?;
    if !first.is_ascii_uppercase() {
        return None;
    }
    if !chars.all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch == '_') {
        return None;
    }
    Some((code, rest.trim()))
}

impl From<String> for AppError {
    fn from(value: String) -> Self {
        if let Some((code, rest)) = split_code_message(&value) {
            if let Some(kind) = ErrorKind::from_code(code) {
                let message = if rest.is_empty() { value.trim() } else { rest };
                return AppError::new(kind, message.to_string());
            }
        }
        AppError::new(ErrorKind::Internal, value)
    }
}

impl From<&'static str> for AppError {
    fn from(value: &'static str) -> Self {
        AppError::from(value.to_string())
    }
}

impl From<AppError> for String {
    fn from(value: AppError) -> Self {
        value.to_string()
    }
}
