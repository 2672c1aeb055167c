use thiserror::Error;

/// Errors surfaced by the bot. Most of these are logged and swallowed by the
/// caller; only configuration and authorization failures end the process.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("authorization failed: {0}")]
    Auth(#[from] AuthError),

    #[error("network call failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat connection failed: {0}")]
    Chat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    InvalidCommand(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("{name} must be an integer, got {value:?}")]
    NotAnInteger { name: &'static str, value: String },

    #[error("{name} has unsupported value {value:?}")]
    Unsupported { name: &'static str, value: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("the user declined the authorization request")]
    Declined,

    #[error("the device code or token has expired")]
    Expired,

    #[error("state parameter did not match the authorization request")]
    StateMismatch,

    #[error("identity service rejected the request: {0}")]
    Rejected(String),
}

pub type BotResult<T> = Result<T, BotError>;
