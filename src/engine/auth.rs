// ── Zeus Engine: Auth Session ──────────────────────────────────────────────
// Bearer token + cached profile over the durable store, plus the three
// remote calls: login, verify, logout. Verification is binary — any
// non-success response or transport failure means "not authenticated" and
// clears the token. No retries anywhere in this module.

use std::sync::Arc;

use log::{debug, info, warn};
use reqwest::header::AUTHORIZATION;
use reqwest::RequestBuilder;

use crate::atoms::constants::{KEY_AUTH_TOKEN, KEY_AUTH_USER};
use crate::atoms::error::{ClientError, ClientResult};
use crate::atoms::types::{LoginRequest, LoginResponse, UserProfile};
use crate::engine::events::{UiEmitter, UiEvent};
use crate::engine::http;
use crate::engine::store::Store;

pub struct AuthSession {
    store: Arc<Store>,
    http: reqwest::Client,
    base_url: String,
    events: UiEmitter,
}

impl AuthSession {
    pub fn new(store: Arc<Store>, base_url: &str, events: UiEmitter) -> Self {
        AuthSession {
            store,
            http: http::shared_client(),
            base_url: base_url.to_string(),
            events,
        }
    }

    // ── Local state ────────────────────────────────────────────────────────

    pub fn token(&self) -> Option<String> {
        self.store.get(KEY_AUTH_TOKEN).ok().flatten()
    }

    pub fn save_token(&self, token: &str) {
        if let Err(e) = self.store.set(KEY_AUTH_TOKEN, token) {
            warn!("[auth] Failed to persist token: {}", e);
        }
    }

    pub fn user(&self) -> Option<UserProfile> {
        let raw = self.store.get(KEY_AUTH_USER).ok().flatten()?;
        serde_json::from_str(&raw).ok()
    }

    pub fn save_user(&self, user: &UserProfile) {
        match serde_json::to_string(user) {
            Ok(json) => {
                if let Err(e) = self.store.set(KEY_AUTH_USER, &json) {
                    warn!("[auth] Failed to persist profile: {}", e);
                }
            }
            Err(e) => warn!("[auth] Failed to encode profile: {}", e),
        }
    }

    /// Remove the token and the cached profile.
    pub fn clear(&self) {
        self.store.remove(KEY_AUTH_TOKEN).ok();
        self.store.remove(KEY_AUTH_USER).ok();
        info!("[auth] Session cleared");
    }

    /// Add `Authorization: Bearer …` when a token is present; otherwise the
    /// builder is returned unchanged.
    pub fn attach_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.token() {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => builder,
        }
    }

    // ── Remote calls ───────────────────────────────────────────────────────

    pub async fn login(&self, username: &str, password: &str) -> ClientResult<LoginResponse> {
        let url = http::api_url(&self.base_url, "/api/auth/login");
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let resp = self.http.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            warn!("[auth] Login rejected: HTTP {}", status);
            let message = resp.text().await.unwrap_or_default();
            return Err(ClientError::api("/api/auth/login", status.as_u16(), message));
        }

        let login: LoginResponse = resp.json().await?;
        self.save_token(&login.access_token);
        self.save_user(&UserProfile {
            username: username.to_string(),
            authenticated: true,
        });
        info!(
            "[auth] Logged in as {} (token valid {}s)",
            username, login.expires_in
        );
        Ok(login)
    }

    /// Check the stored token against the backend. Success refreshes the
    /// cached profile; anything else clears the session and reports false.
    pub async fn verify(&self) -> bool {
        if self.token().is_none() {
            debug!("[auth] Verify skipped, no stored token");
            return false;
        }

        let url = http::api_url(&self.base_url, "/api/auth/verify");
        match self.attach_auth(self.http.get(&url)).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<UserProfile>().await {
                Ok(profile) => {
                    debug!("[auth] Token verified for {}", profile.username);
                    self.save_user(&profile);
                    true
                }
                Err(e) => {
                    warn!("[auth] Verify response unreadable: {}", e);
                    self.expire();
                    false
                }
            },
            Ok(resp) => {
                warn!("[auth] Verify rejected: HTTP {}", resp.status());
                self.expire();
                false
            }
            Err(e) => {
                warn!("[auth] Verify failed: {}", e);
                self.expire();
                false
            }
        }
    }

    /// Best-effort logout: the backend only logs the event, so the request
    /// result is ignored and local state is cleared regardless.
    pub async fn logout(&self) {
        if self.token().is_some() {
            let url = http::api_url(&self.base_url, "/api/auth/logout");
            if let Err(e) = self.attach_auth(self.http.post(&url)).send().await {
                debug!("[auth] Logout request failed (ignored): {}", e);
            }
        }
        self.clear();
    }

    fn expire(&self) {
        self.clear();
        self.events.emit(UiEvent::AuthExpired);
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> AuthSession {
        let (events, _rx) = UiEmitter::channel();
        AuthSession::new(
            Arc::new(Store::open_in_memory().unwrap()),
            "http://127.0.0.1:9",
            events,
        )
    }

    #[test]
    fn attach_auth_adds_bearer_header_when_token_present() {
        let auth = session();
        auth.save_token("tok-123");

        let req = auth
            .attach_auth(auth.http.get("http://localhost/x"))
            .build()
            .unwrap();
        assert_eq!(
            req.headers().get(AUTHORIZATION).unwrap().to_str().unwrap(),
            "Bearer tok-123"
        );
    }

    #[test]
    fn attach_auth_is_identity_without_token() {
        let auth = session();
        let req = auth
            .attach_auth(auth.http.get("http://localhost/x"))
            .build()
            .unwrap();
        assert!(req.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn clear_removes_token_and_profile() {
        let auth = session();
        auth.save_token("tok");
        auth.save_user(&UserProfile {
            username: "victor".into(),
            authenticated: true,
        });
        assert!(auth.token().is_some());
        assert!(auth.user().is_some());

        auth.clear();
        assert!(auth.token().is_none());
        assert!(auth.user().is_none());
    }

    #[tokio::test]
    async fn verify_without_token_is_false_and_offline() {
        // Base URL points nowhere — the short-circuit must answer before
        // any network attempt.
        let auth = session();
        assert!(!auth.verify().await);
    }
}
