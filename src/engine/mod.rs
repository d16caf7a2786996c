// Zeus client engine — talks to the Zeus backend over REST and WebSocket
// and exposes typed state + a UI event stream instead of touching widgets.
//
// Module layout:
//   store          — durable key/value store (SQLite), the localStorage stand-in
//   http           — shared HTTP client factory + URL helpers
//   events         — UiEvent tagged union + emitter channel
//   auth           — bearer token + profile session, login/verify/logout
//   models         — model selection slots + display-only catalog fetch
//   conversations  — conversation registry (REST CRUD + local cache + active)
//   uploads        — multipart file upload client
//   frames         — WebSocket frame shapes, both directions
//   chat           — the chat session controller (socket lifecycle, dispatch,
//                    per-conversation processing state)
//   state          — ClientState aggregate with explicit lifecycle

pub mod auth;
pub mod chat;
pub mod conversations;
pub mod events;
pub mod frames;
pub mod http;
pub mod models;
pub mod state;
pub mod store;
pub mod uploads;
