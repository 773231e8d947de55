use crate::model::SourceId;

/// Failure kinds surfaced by a pipeline chain.
///
/// `Network`, `Parse` and `Empty` are terminal for the chain that raised them;
/// nothing is retried internally. `Empty` is a normal business outcome, kept
/// separate from `Parse` so callers can render "nothing found" and "something
/// went wrong" differently.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("failed to extract content from response: {message}")]
    Parse { message: String },

    #[error("source has no matching items")]
    Empty,

    #[error("operation canceled")]
    Canceled,

    #[error("no parser registered for source {id}")]
    UnknownSource { id: SourceId },
}

impl FetchError {
    pub fn network(message: impl Into<String>) -> Self {
        FetchError::Network(message.into().into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        FetchError::Parse {
            message: message.into(),
        }
    }

    pub fn missing_field(field: &str) -> Self {
        FetchError::Parse {
            message: format!("missing field `{field}`"),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Network(Box::new(e))
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Parse {
            message: e.to_string(),
        }
    }
}

impl From<url::ParseError> for FetchError {
    fn from(e: url::ParseError) -> Self {
        FetchError::Parse {
            message: e.to_string(),
        }
    }
}
