/// Domain-specific error types for the pricing service.
/// The engine validates eagerly and fails fast: either a full chain is
/// produced or an error says why none was.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("numeric degenerate: {0}")]
    NumericDegenerate(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        EngineError::UpstreamUnavailable(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::UpstreamUnavailable(format!("parse: {e}"))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
