//! LLM error types.
//!
//! Any error moves the fallback chain on to the next provider; the kind is
//! kept for logs and for the message of the final error.

use thiserror::Error;

/// Failure of one provider call, or of building a chain.
#[derive(Debug, Error)]
pub enum LlmError {
    /// A request reached a provider and failed.
    #[error("{provider}: {kind}{}: {message}", .status_code.map(|c| format!(" (HTTP {})", c)).unwrap_or_default())]
    Request {
        provider: String,
        kind: LlmErrorKind,
        status_code: Option<u16>,
        message: String,
    },

    /// The chain was built without any provider key.
    #[error("No LLM provider configured for '{0}'. Set at least one of ANTHROPIC_API_KEY, OPENROUTER_API_KEY, OPENAI_API_KEY, OLLAMA_MODEL or LOCAL_MODEL_API_BASE + LOCAL_MODEL_NAME")]
    NoProviders(String),
}

impl LlmError {
    /// Non-2xx answer; the body becomes the message.
    pub fn http(provider: &str, status_code: u16, body: &str) -> Self {
        Self::Request {
            provider: provider.to_string(),
            kind: classify_http_status(status_code),
            status_code: Some(status_code),
            message: body.to_string(),
        }
    }

    pub fn network_error(provider: &str, message: String) -> Self {
        Self::Request {
            provider: provider.to_string(),
            kind: LlmErrorKind::NetworkError,
            status_code: None,
            message,
        }
    }

    pub fn parse_error(provider: &str, message: String) -> Self {
        Self::Request {
            provider: provider.to_string(),
            kind: LlmErrorKind::ParseError,
            status_code: None,
            message,
        }
    }

    pub fn kind(&self) -> Option<LlmErrorKind> {
        match self {
            LlmError::Request { kind, .. } => Some(*kind),
            LlmError::NoProviders(_) => None,
        }
    }
}

/// Why a provider call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    RateLimited,
    /// 5xx, including Anthropic's 529 overload
    ServerError,
    /// 4xx other than 429: bad key, unknown model
    ClientError,
    NetworkError,
    /// 2xx with a body we could not read
    ParseError,
}

impl LlmErrorKind {
    /// Transient errors may succeed later with the same provider.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmErrorKind::RateLimited | LlmErrorKind::ServerError | LlmErrorKind::NetworkError
        )
    }
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmErrorKind::RateLimited => write!(f, "Rate limited"),
            LlmErrorKind::ServerError => write!(f, "Server error"),
            LlmErrorKind::ClientError => write!(f, "Client error"),
            LlmErrorKind::NetworkError => write!(f, "Network error"),
            LlmErrorKind::ParseError => write!(f, "Parse error"),
        }
    }
}

pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        429 => LlmErrorKind::RateLimited,
        400..=499 => LlmErrorKind::ClientError,
        _ => LlmErrorKind::ServerError,
    }
}

/// Map a reqwest transport failure to a network error.
pub(crate) fn from_reqwest(provider: &str, e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::network_error(provider, format!("Request timeout: {}", e))
    } else if e.is_connect() {
        LlmError::network_error(provider, format!("Connection failed: {}", e))
    } else {
        LlmError::network_error(provider, format!("Request failed: {}", e))
    }
}
