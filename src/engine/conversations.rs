// ── Zeus Engine: Conversation Registry ─────────────────────────────────────
// REST CRUD over `/api/conversations` plus the local mirror: a newest-first
// summary cache and the single "active" conversation. Every operation is
// one round-trip followed by an in-memory reconciliation — the cache is
// never re-fetched to observe the effect of a write.
//
// Failure policy: log, hand the caller a bool/empty/None, leave the cache
// exactly as it was. Nothing here panics or retries.

use std::sync::Arc;

use log::{info, warn};
use parking_lot::Mutex;

use crate::atoms::types::{
    Conversation, ConversationSummary, ConversationsListResponse, CreateConversationRequest,
    UpdateConversationRequest,
};
use crate::engine::auth::AuthSession;
use crate::engine::events::{UiEmitter, UiEvent};
use crate::engine::http;
use crate::engine::models::{ModelRegistry, ModelSlot};

pub struct ConversationRegistry {
    http: reqwest::Client,
    base_url: String,
    auth: Arc<AuthSession>,
    models: Arc<ModelRegistry>,
    events: UiEmitter,
    cache: Mutex<Vec<ConversationSummary>>,
    active: Mutex<Option<String>>,
}

impl ConversationRegistry {
    pub fn new(
        auth: Arc<AuthSession>,
        models: Arc<ModelRegistry>,
        base_url: &str,
        events: UiEmitter,
    ) -> Self {
        ConversationRegistry {
            http: http::shared_client(),
            base_url: base_url.to_string(),
            auth,
            models,
            events,
            cache: Mutex::new(Vec::new()),
            active: Mutex::new(None),
        }
    }

    // ── Local mirror ───────────────────────────────────────────────────────

    /// Current cached summaries, newest first.
    pub fn cached(&self) -> Vec<ConversationSummary> {
        self.cache.lock().clone()
    }

    pub fn active_id(&self) -> Option<String> {
        self.active.lock().clone()
    }

    /// Mark a conversation active without a fetch — used when the server
    /// materializes one for a socket opened without an id, and by the send
    /// path right after an implicit create.
    pub fn adopt_active(&self, id: &str) {
        *self.active.lock() = Some(id.to_string());
    }

    // ── REST operations ────────────────────────────────────────────────────

    /// Fetch all conversations and replace the cache wholesale. On failure
    /// the previous cache is left untouched and an empty list is returned —
    /// the caller decides what the UI does with that.
    pub async fn list(&self) -> Vec<ConversationSummary> {
        let url = http::api_url(&self.base_url, "/api/conversations");
        match self.auth.attach_auth(self.http.get(&url)).send().await {
            Ok(resp) if resp.status().is_success() => {
                match resp.json::<ConversationsListResponse>().await {
                    Ok(body) => {
                        info!("[conversations] Listed {} conversation(s)", body.total);
                        *self.cache.lock() = body.conversations.clone();
                        body.conversations
                    }
                    Err(e) => {
                        warn!("[conversations] List response unreadable: {}", e);
                        Vec::new()
                    }
                }
            }
            Ok(resp) => {
                warn!("[conversations] List rejected: HTTP {}", resp.status());
                Vec::new()
            }
            Err(e) => {
                warn!("[conversations] List failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Create a conversation and prepend it locally (newest-first order),
    /// without re-fetching the list.
    pub async fn create(&self, title: &str, model_id: &str) -> Option<Conversation> {
        let url = http::api_url(&self.base_url, "/api/conversations");
        let body = CreateConversationRequest {
            title: Some(title.to_string()),
            model_id: Some(model_id.to_string()),
        };
        match self
            .auth
            .attach_auth(self.http.post(&url))
            .json(&body)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => match resp.json::<Conversation>().await {
                Ok(conv) => {
                    info!("[conversations] Created {} ({})", conv.id, conv.title);
                    self.apply_created(&conv);
                    Some(conv)
                }
                Err(e) => {
                    warn!("[conversations] Create response unreadable: {}", e);
                    None
                }
            },
            Ok(resp) => {
                warn!("[conversations] Create rejected: HTTP {}", resp.status());
                None
            }
            Err(e) => {
                warn!("[conversations] Create failed: {}", e);
                None
            }
        }
    }

    /// Fetch one conversation with its messages. Success makes it the
    /// active conversation and pins the primary model slot to the model
    /// this conversation was using, so subsequent sends stay in context.
    pub async fn get(&self, id: &str) -> Option<Conversation> {
        let url = http::api_url(&self.base_url, &format!("/api/conversations/{}", id));
        match self.auth.attach_auth(self.http.get(&url)).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<Conversation>().await {
                Ok(conv) => {
                    *self.active.lock() = Some(conv.id.clone());
                    self.models.set(ModelSlot::Primary, &conv.model_id);
                    Some(conv)
                }
                Err(e) => {
                    warn!("[conversations] Detail response unreadable: {}", e);
                    None
                }
            },
            Ok(resp) => {
                warn!(
                    "[conversations] Get {} rejected: HTTP {}",
                    id,
                    resp.status()
                );
                None
            }
            Err(e) => {
                warn!("[conversations] Get {} failed: {}", id, e);
                None
            }
        }
    }

    /// Partial update. Success merges the fields into the matching cache
    /// entry in place — list order is preserved.
    pub async fn update(&self, id: &str, fields: UpdateConversationRequest) -> bool {
        let url = http::api_url(&self.base_url, &format!("/api/conversations/{}", id));
        match self
            .auth
            .attach_auth(self.http.put(&url))
            .json(&fields)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                info!("[conversations] Updated {}", id);
                self.apply_update(id, &fields);
                true
            }
            Ok(resp) => {
                warn!(
                    "[conversations] Update {} rejected: HTTP {}",
                    id,
                    resp.status()
                );
                false
            }
            Err(e) => {
                warn!("[conversations] Update {} failed: {}", id, e);
                false
            }
        }
    }

    /// Delete a conversation. If it was the active one, active status is
    /// cleared and the message view is told to reset.
    pub async fn delete(&self, id: &str) -> bool {
        let url = http::api_url(&self.base_url, &format!("/api/conversations/{}", id));
        match self.auth.attach_auth(self.http.delete(&url)).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("[conversations] Deleted {}", id);
                self.apply_delete(id);
                true
            }
            Ok(resp) => {
                warn!(
                    "[conversations] Delete {} rejected: HTTP {}",
                    id,
                    resp.status()
                );
                false
            }
            Err(e) => {
                warn!("[conversations] Delete {} failed: {}", id, e);
                false
            }
        }
    }

    // ── Cache reconciliation ───────────────────────────────────────────────
    // Split out so the merge rules are testable without a live backend.

    pub(crate) fn apply_created(&self, conv: &Conversation) {
        let summary = ConversationSummary {
            id: conv.id.clone(),
            title: conv.title.clone(),
            model_id: conv.model_id.clone(),
            message_count: conv.messages.len() as i64,
            created_at: conv.created_at.clone(),
            updated_at: conv.updated_at.clone(),
        };
        self.cache.lock().insert(0, summary);
    }

    pub(crate) fn apply_update(&self, id: &str, fields: &UpdateConversationRequest) {
        let mut cache = self.cache.lock();
        if let Some(entry) = cache.iter_mut().find(|c| c.id == id) {
            if let Some(title) = &fields.title {
                entry.title = title.clone();
            }
            if let Some(model_id) = &fields.model_id {
                entry.model_id = model_id.clone();
            }
        }
    }

    pub(crate) fn apply_delete(&self, id: &str) {
        self.cache.lock().retain(|c| c.id != id);

        let was_active = {
            let mut active = self.active.lock();
            if active.as_deref() == Some(id) {
                *active = None;
                true
            } else {
                false
            }
        };
        if was_active {
            self.events.emit(UiEvent::ViewReset);
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::store::Store;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn registry() -> (ConversationRegistry, UnboundedReceiver<UiEvent>) {
        let (events, rx) = UiEmitter::channel();
        let store = Arc::new(Store::open_in_memory().unwrap());
        let auth = Arc::new(AuthSession::new(
            store.clone(),
            "http://127.0.0.1:9",
            events.clone(),
        ));
        let models = Arc::new(ModelRegistry::new(store, auth.clone(), "http://127.0.0.1:9"));
        (
            ConversationRegistry::new(auth, models, "http://127.0.0.1:9", events),
            rx,
        )
    }

    fn conv(id: &str, title: &str) -> Conversation {
        Conversation {
            id: id.to_string(),
            title: title.to_string(),
            model_id: "openai/gpt-4".to_string(),
            messages: vec![],
            created_at: "2025-01-01T00:00:00".to_string(),
            updated_at: "2025-01-01T00:00:00".to_string(),
        }
    }

    #[test]
    fn created_conversations_prepend_newest_first() {
        let (registry, _rx) = registry();
        registry.apply_created(&conv("c-1", "first"));
        registry.apply_created(&conv("c-2", "Test"));

        let cached = registry.cached();
        assert_eq!(cached.len(), 2);
        assert_eq!(cached[0].id, "c-2");
        assert_eq!(cached[0].title, "Test");
        assert_eq!(cached[1].id, "c-1");
    }

    #[test]
    fn update_merges_in_place_without_reordering() {
        let (registry, _rx) = registry();
        registry.apply_created(&conv("c-1", "old"));
        registry.apply_created(&conv("c-2", "top"));

        registry.apply_update(
            "c-1",
            &UpdateConversationRequest {
                title: Some("renamed".into()),
                model_id: None,
            },
        );

        let cached = registry.cached();
        assert_eq!(cached[0].id, "c-2"); // order untouched
        assert_eq!(cached[1].title, "renamed");
        assert_eq!(cached[1].model_id, "openai/gpt-4"); // absent field untouched
    }

    #[test]
    fn deleting_the_active_conversation_clears_active_and_resets_view() {
        let (registry, mut rx) = registry();
        registry.apply_created(&conv("c-1", "a"));
        registry.adopt_active("c-1");

        registry.apply_delete("c-1");

        assert!(registry.cached().is_empty());
        assert_eq!(registry.active_id(), None);
        assert_eq!(rx.try_recv().unwrap(), UiEvent::ViewReset);
    }

    #[test]
    fn deleting_an_inactive_conversation_leaves_active_alone() {
        let (registry, mut rx) = registry();
        registry.apply_created(&conv("c-1", "a"));
        registry.apply_created(&conv("c-2", "b"));
        registry.adopt_active("c-2");

        registry.apply_delete("c-1");

        assert_eq!(registry.active_id(), Some("c-2".to_string()));
        assert!(rx.try_recv().is_err()); // no ViewReset
    }
}
