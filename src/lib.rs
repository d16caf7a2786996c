// Zeus client engine — a native front end for the Zeus chat backend.
//
// The backend is an opaque collaborator reached over REST (`/api/...`) and
// one WebSocket endpoint (`/ws/chat`). This crate owns everything the
// browser page owned: the auth session, the conversation list, the model
// selection slots, and the realtime chat connection with its
// per-conversation processing state. UI toolkits subscribe to the typed
// event stream instead of the engine touching any widget directly.

pub mod atoms;
pub mod engine;

pub use atoms::error::{ClientError, ClientResult};
pub use atoms::types::*;
pub use engine::chat::ChatController;
pub use engine::events::{UiEmitter, UiEvent};
pub use engine::frames::{ClientFrame, ServerFrame};
pub use engine::models::ModelSlot;
pub use engine::state::{ClientConfig, ClientState};
pub use engine::store::Store;
