// ── Zeus Engine: Model Selection Registry ──────────────────────────────────
// Three named slots (primary / secondary / tertiary), each bound to one
// model id. Writes persist immediately and notify subscribers over a watch
// channel. The catalog fetch exists for display only — slot values are
// never validated against it; the backend does its own resolution.

use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::atoms::constants::KEY_MODEL_SELECTION;
use crate::atoms::types::{ModelInfo, ModelSelection, ModelsResponse, WireModels};
use crate::engine::auth::AuthSession;
use crate::engine::http;
use crate::engine::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSlot {
    Primary,
    Secondary,
    Tertiary,
}

impl ModelSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSlot::Primary => "primary",
            ModelSlot::Secondary => "secondary",
            ModelSlot::Tertiary => "tertiary",
        }
    }
}

pub struct ModelRegistry {
    store: Arc<Store>,
    auth: Arc<AuthSession>,
    http: reqwest::Client,
    base_url: String,
    selection: Mutex<ModelSelection>,
    watch_tx: watch::Sender<ModelSelection>,
}

impl ModelRegistry {
    pub fn new(store: Arc<Store>, auth: Arc<AuthSession>, base_url: &str) -> Self {
        let initial = ModelSelection::default();
        let (watch_tx, _) = watch::channel(initial.clone());
        ModelRegistry {
            store,
            auth,
            http: http::shared_client(),
            base_url: base_url.to_string(),
            selection: Mutex::new(initial),
            watch_tx,
        }
    }

    /// Restore slots from the durable store. A blob written by an older
    /// build with the legacy third-slot field name loads transparently.
    pub fn load_persisted(&self) {
        match self.store.get(KEY_MODEL_SELECTION) {
            Ok(Some(raw)) => match serde_json::from_str::<ModelSelection>(&raw) {
                Ok(sel) => {
                    info!(
                        "[models] Restored selection: {} / {} / {}",
                        sel.primary, sel.secondary, sel.tertiary
                    );
                    *self.selection.lock() = sel.clone();
                    let _ = self.watch_tx.send(sel);
                }
                Err(e) => warn!("[models] Persisted selection unreadable: {}", e),
            },
            Ok(None) => debug!("[models] No persisted selection, using defaults"),
            Err(e) => warn!("[models] Failed to read persisted selection: {}", e),
        }
    }

    pub fn all(&self) -> ModelSelection {
        self.selection.lock().clone()
    }

    pub fn get(&self, slot: ModelSlot) -> String {
        let sel = self.selection.lock();
        match slot {
            ModelSlot::Primary => sel.primary.clone(),
            ModelSlot::Secondary => sel.secondary.clone(),
            ModelSlot::Tertiary => sel.tertiary.clone(),
        }
    }

    /// Bind a slot, persist the whole set, and notify subscribers.
    pub fn set(&self, slot: ModelSlot, model_id: &str) {
        let sel = {
            let mut sel = self.selection.lock();
            match slot {
                ModelSlot::Primary => sel.primary = model_id.to_string(),
                ModelSlot::Secondary => sel.secondary = model_id.to_string(),
                ModelSlot::Tertiary => sel.tertiary = model_id.to_string(),
            }
            sel.clone()
        };

        match serde_json::to_string(&sel) {
            Ok(json) => {
                if let Err(e) = self.store.set(KEY_MODEL_SELECTION, &json) {
                    warn!("[models] Failed to persist selection: {}", e);
                }
            }
            Err(e) => warn!("[models] Failed to encode selection: {}", e),
        }

        info!("[models] {} slot -> {}", slot.as_str(), model_id);
        let _ = self.watch_tx.send(sel);
    }

    /// Subscribe to selection changes (current value observable immediately).
    pub fn subscribe(&self) -> watch::Receiver<ModelSelection> {
        self.watch_tx.subscribe()
    }

    /// The slot set in the shape outgoing message frames carry.
    pub fn wire_models(&self) -> WireModels {
        WireModels::from(&self.all())
    }

    /// Display-only catalog from the backend. Failures log and return empty.
    pub async fn fetch_catalog(&self, tools_only: bool) -> Vec<ModelInfo> {
        let url = format!(
            "{}?tools_only={}",
            http::api_url(&self.base_url, "/api/models"),
            tools_only
        );
        match self.auth.attach_auth(self.http.get(&url)).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<ModelsResponse>().await {
                Ok(body) => {
                    info!("[models] Catalog: {} model(s)", body.total);
                    body.models
                }
                Err(e) => {
                    warn!("[models] Catalog response unreadable: {}", e);
                    Vec::new()
                }
            },
            Ok(resp) => {
                warn!("[models] Catalog fetch rejected: HTTP {}", resp.status());
                Vec::new()
            }
            Err(e) => {
                warn!("[models] Catalog fetch failed: {}", e);
                Vec::new()
            }
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::events::UiEmitter;

    fn registry_with_store(store: Arc<Store>) -> ModelRegistry {
        let (events, _rx) = UiEmitter::channel();
        let auth = Arc::new(AuthSession::new(store.clone(), "http://127.0.0.1:9", events));
        ModelRegistry::new(store, auth, "http://127.0.0.1:9")
    }

    #[test]
    fn set_then_get_round_trips() {
        let registry = registry_with_store(Arc::new(Store::open_in_memory().unwrap()));
        registry.set(ModelSlot::Secondary, "mistral/mistral-large");
        assert_eq!(registry.get(ModelSlot::Secondary), "mistral/mistral-large");
    }

    #[test]
    fn selection_survives_simulated_reload() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        {
            let registry = registry_with_store(store.clone());
            registry.set(ModelSlot::Primary, "openai/gpt-4");
            registry.set(ModelSlot::Tertiary, "anthropic/claude-3.5-sonnet");
        }
        // Reconstruct from persisted storage only.
        let fresh = registry_with_store(store);
        fresh.load_persisted();
        assert_eq!(fresh.get(ModelSlot::Primary), "openai/gpt-4");
        assert_eq!(
            fresh.get(ModelSlot::Tertiary),
            "anthropic/claude-3.5-sonnet"
        );
    }

    #[test]
    fn load_persisted_accepts_legacy_third_slot_name() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store
            .set(
                KEY_MODEL_SELECTION,
                r#"{"primary": "a", "secondary": "b", "mago": "c"}"#,
            )
            .unwrap();

        let registry = registry_with_store(store);
        registry.load_persisted();
        assert_eq!(registry.get(ModelSlot::Tertiary), "c");
        // And the wire shape re-emits it under the backend's key.
        assert_eq!(registry.wire_models().mago, "c");
    }

    #[test]
    fn set_notifies_subscribers() {
        let registry = registry_with_store(Arc::new(Store::open_in_memory().unwrap()));
        let mut rx = registry.subscribe();
        registry.set(ModelSlot::Primary, "x/y");
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().primary, "x/y");
    }
}
