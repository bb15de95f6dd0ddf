use thiserror::Error;

/// Sign-in/sign-up failure. Callers never learn why; the detail is for logs.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication failed: {0}")]
    Failed(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Failed(err.to_string())
    }
}

impl From<rusqlite::Error> for AuthError {
    fn from(err: rusqlite::Error) -> Self {
        AuthError::Failed(err.to_string())
    }
}

/// Store or storage read/write failure.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("message must carry text or an image")]
    EmptyMessage,

    #[error("message carries both text and an image")]
    TextAndImage,

    #[error("not signed in")]
    Unauthenticated,

    #[error("invalid channel id `{0}`")]
    InvalidChannelId(String),

    #[error("backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("subscription ended by backend: {0}")]
    SubscriptionEnded(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("session error: {0}")]
    Auth(#[from] AuthError),
}

/// Push send or topic subscription failure. Never fatal, only logged.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("service account credentials unavailable: {0}")]
    Credentials(String),

    #[error("failed to sign token assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("push service returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
