// ── Zeus Atoms: Error Types ────────────────────────────────────────────────
// Single canonical error enum for the engine, built with `thiserror`.
//
// Design rules:
//   • Variants are coarse-grained by domain (I/O, DB, network, auth…).
//   • The `#[from]` attribute wires std/external error conversions automatically.
//   • Registry-style modules (conversations, models) never let these escape —
//     they log and surface bool/empty results; the error type is for the
//     paths where the caller genuinely wants the cause (login, uploads, send).
//   • No variant carries secret material (tokens, passwords) in its message.

use thiserror::Error;

// ── Primary error enum ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ClientError {
    /// Filesystem or OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP / network failure (reqwest layer).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// SQLite / rusqlite failure in the durable store.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// WebSocket transport failure (tungstenite layer).
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The backend rejected a request at the API level.
    #[error("API error: {endpoint}: HTTP {status}: {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// Authentication / authorization failure.
    #[error("Auth error: {0}")]
    Auth(String),

    /// Catch-all for errors that do not yet have a dedicated variant.
    /// Prefer adding a specific variant over using this in new code.
    #[error("{0}")]
    Other(String),
}

// ── Convenience constructors ───────────────────────────────────────────────

impl ClientError {
    /// Create an API error with endpoint, status, and body excerpt.
    pub fn api(endpoint: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            endpoint: endpoint.into(),
            status,
            message: message.into(),
        }
    }
}

impl From<String> for ClientError {
    fn from(s: String) -> Self {
        ClientError::Other(s)
    }
}

impl From<&str> for ClientError {
    fn from(s: &str) -> Self {
        ClientError::Other(s.to_string())
    }
}

// ── Convenience alias ──────────────────────────────────────────────────────

/// All engine operations should return this type.
pub type ClientResult<T> = Result<T, ClientError>;

impl From<ClientError> for String {
    fn from(e: ClientError) -> Self {
        e.to_string()
    }
}
