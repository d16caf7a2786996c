// ── Zeus Engine: Client State ──────────────────────────────────────────────
// One explicitly constructed aggregate instead of ambient globals: every
// registry and the chat controller hang off this struct, created on entry
// and torn down on the way out. Tests build as many independent instances
// as they like (with in-memory stores).

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use crate::atoms::constants::DEFAULT_BASE_URL;
use crate::atoms::error::ClientResult;
use crate::engine::auth::AuthSession;
use crate::engine::chat::ChatController;
use crate::engine::conversations::ConversationRegistry;
use crate::engine::events::{UiEmitter, UiEvent};
use crate::engine::models::ModelRegistry;
use crate::engine::store::Store;
use crate::engine::uploads::UploadClient;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// HTTP base of the backend, e.g. `http://127.0.0.1:8000`.
    pub base_url: String,
    /// Where the durable store lives; `None` means `~/.zeus-client`.
    pub data_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            data_dir: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".zeus-client")
}

pub struct ClientState {
    pub config: ClientConfig,
    pub store: Arc<Store>,
    pub auth: Arc<AuthSession>,
    pub models: Arc<ModelRegistry>,
    pub conversations: Arc<ConversationRegistry>,
    pub uploads: UploadClient,
    pub chat: Arc<ChatController>,
}

impl ClientState {
    /// Build a full client against the configured backend, returning the
    /// UI event stream alongside it.
    pub fn new(config: ClientConfig) -> ClientResult<(Self, UnboundedReceiver<UiEvent>)> {
        let dir = config.data_dir.clone().unwrap_or_else(default_data_dir);
        let store = Arc::new(Store::open(&dir)?);
        Ok(Self::with_store(config, store))
    }

    /// Same, over a caller-provided store. Lets tests run on in-memory
    /// storage and embedders share a store between instances.
    pub fn with_store(config: ClientConfig, store: Arc<Store>) -> (Self, UnboundedReceiver<UiEvent>) {
        let (events, rx) = UiEmitter::channel();
        let base = config.base_url.clone();

        let auth = Arc::new(AuthSession::new(store.clone(), &base, events.clone()));
        let models = Arc::new(ModelRegistry::new(store.clone(), auth.clone(), &base));
        models.load_persisted();
        let conversations = Arc::new(ConversationRegistry::new(
            auth.clone(),
            models.clone(),
            &base,
            events.clone(),
        ));
        let uploads = UploadClient::new(auth.clone(), &base);
        let chat = Arc::new(ChatController::new(
            auth.clone(),
            conversations.clone(),
            models.clone(),
            &base,
            events,
        ));

        (
            ClientState {
                config,
                store,
                auth,
                models,
                conversations,
                uploads,
                chat,
            },
            rx,
        )
    }

    /// Delete a conversation; when it was the one on screen the socket is
    /// also torn down (the registry itself clears active and resets the
    /// view).
    pub async fn delete_conversation(&self, id: &str) -> bool {
        let was_active = self.conversations.active_id().as_deref() == Some(id);
        let ok = self.conversations.delete(id).await;
        if ok && was_active {
            self.chat.disconnect();
        }
        ok
    }

    /// End-of-life: close the socket. Durable state stays on disk.
    pub fn teardown(&self) {
        self.chat.disconnect();
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────
