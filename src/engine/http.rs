// ── Zeus Engine: Shared HTTP Client & URL Helpers ──────────────────────────
//
// One reqwest::Client for the whole engine — one connection pool, one TLS
// config. REST calls carry no retry policy: a failed round-trip is surfaced
// to the caller as a negative/empty result and the user acts again.

use std::sync::LazyLock;
use std::time::Duration;

use reqwest::Client;

/// Singleton `reqwest::Client` shared across all engine modules.
static SHARED_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(120))
        .build()
        .expect("Failed to build shared reqwest::Client")
});

/// Get the shared HTTP client. Engine modules call this instead of
/// `Client::builder().build()`.
pub fn shared_client() -> Client {
    SHARED_CLIENT.clone()
}

/// Join an API path onto the configured base URL.
pub fn api_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// Derive the WebSocket base from the HTTP base (`http` → `ws`,
/// `https` → `wss`). A bare host:port is treated as plaintext.
pub fn ws_base(base: &str) -> String {
    let trimmed = base.trim_end_matches('/');
    if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        format!("ws://{}", trimmed)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_joins_without_double_slash() {
        assert_eq!(
            api_url("http://localhost:8000/", "/api/conversations"),
            "http://localhost:8000/api/conversations"
        );
        assert_eq!(
            api_url("http://localhost:8000", "/api/models"),
            "http://localhost:8000/api/models"
        );
    }

    #[test]
    fn ws_base_maps_schemes() {
        assert_eq!(ws_base("http://localhost:8000"), "ws://localhost:8000");
        assert_eq!(ws_base("https://zeus.example"), "wss://zeus.example");
        assert_eq!(ws_base("localhost:8000/"), "ws://localhost:8000");
    }
}
