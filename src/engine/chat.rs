// ── Zeus Engine: Chat Session Controller ───────────────────────────────────
//
// Owns the one WebSocket connection to `/ws/chat`, the per-conversation
// processing map, and the inbound frame dispatch. This is the piece that
// lets several conversations run server-side at once while a single view
// restores the right indicators whenever the user switches between them.
//
// Processing map:
//   conversation id → bool, transient, absence == idle.
//   idle → processing on a local send or an inbound task_progress /
//   non-terminal task_status naming that conversation.
//   processing → idle on message / cancelled / error, or a terminal
//   task_status (completed / failed / cancelled).
//   The map alone decides what indicators a conversation shows when it
//   becomes visible — no server round-trip on switch.
//
// Connection:
//   disconnected → connecting → connected → disconnected, one socket at a
//   time. Re-opening against the same target is a no-op, and so is any
//   connect while an attempt is pending (no reconnect storms). There is NO
//   automatic reconnect: an unexpected close flips the state, surfaces a
//   UiEvent, and the next user action re-establishes.
//
// Sends racing the handshake are queued and flushed on the open
// transition instead of polling the socket state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::atoms::constants::{PING_INTERVAL, PROVISIONAL_TITLE_WORDS, TOOL_PANEL_TIMEOUT};
use crate::atoms::error::{ClientError, ClientResult};
use crate::atoms::types::{MessageRole, TaskListResponse, TaskStatus};
use crate::engine::auth::AuthSession;
use crate::engine::conversations::ConversationRegistry;
use crate::engine::events::{UiEmitter, UiEvent};
use crate::engine::frames::{ClientFrame, ServerFrame};
use crate::engine::http;
use crate::engine::models::{ModelRegistry, ModelSlot};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
/// Writer half shared between the send path and the keep-alive task.
type SharedSink = Arc<tokio::sync::Mutex<WsSink>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnPhase {
    Disconnected,
    Connecting,
    Connected,
}

struct Connection {
    phase: ConnPhase,
    /// Conversation the socket is (or will be) pointed at. `None` while
    /// connected for a conversation the server has yet to materialize.
    target: Option<String>,
    writer: Option<SharedSink>,
    /// Frames queued before the socket reported open; flushed in order on
    /// the open transition.
    queued: Vec<ClientFrame>,
    /// Connection generation. Reader and keep-alive tasks carry the epoch
    /// they were spawned under and stand down when it moves on.
    epoch: u64,
}

pub struct ChatController {
    ws_base: String,
    api_base: String,
    http: reqwest::Client,
    auth: Arc<AuthSession>,
    conversations: Arc<ConversationRegistry>,
    models: Arc<ModelRegistry>,
    events: UiEmitter,
    conn: Mutex<Connection>,
    processing: Mutex<HashMap<String, bool>>,
    /// Open execution-trace panels awaiting a result, keyed by tool id.
    open_tools: Mutex<HashMap<String, u64>>,
    tool_gen: AtomicU64,
}

impl ChatController {
    pub fn new(
        auth: Arc<AuthSession>,
        conversations: Arc<ConversationRegistry>,
        models: Arc<ModelRegistry>,
        base_url: &str,
        events: UiEmitter,
    ) -> Self {
        ChatController {
            ws_base: http::ws_base(base_url),
            api_base: base_url.to_string(),
            http: http::shared_client(),
            auth,
            conversations,
            models,
            events,
            conn: Mutex::new(Connection {
                phase: ConnPhase::Disconnected,
                target: None,
                writer: None,
                queued: Vec::new(),
                epoch: 0,
            }),
            processing: Mutex::new(HashMap::new()),
            open_tools: Mutex::new(HashMap::new()),
            tool_gen: AtomicU64::new(0),
        }
    }

    // ── Processing map ─────────────────────────────────────────────────────

    /// Stored flag for a conversation; absence reads as false.
    pub fn processing(&self, conversation_id: &str) -> bool {
        self.processing
            .lock()
            .get(conversation_id)
            .copied()
            .unwrap_or(false)
    }

    /// Flip one conversation's flag. Indicator events only fire when that
    /// conversation is the one on screen — background conversations change
    /// state silently.
    fn set_processing(&self, conversation_id: &str, on: bool) {
        self.processing
            .lock()
            .insert(conversation_id.to_string(), on);
        if self.conversations.active_id().as_deref() == Some(conversation_id) {
            self.events.emit(UiEvent::ProcessingChanged {
                conversation_id: conversation_id.to_string(),
                processing: on,
            });
        }
    }

    /// Re-emit the indicator state stored for a conversation. Called on
    /// every switch so the view lands on exactly what the map says.
    pub fn restore_indicators(&self, conversation_id: &str) {
        self.events.emit(UiEvent::ProcessingChanged {
            conversation_id: conversation_id.to_string(),
            processing: self.processing(conversation_id),
        });
        self.events.emit(UiEvent::Thinking { text: None });
    }

    // ── Connection lifecycle ───────────────────────────────────────────────

    /// Open the socket toward `conversation` (or toward "no conversation
    /// yet"). No-op when an attempt is already pending or the socket is
    /// already pointed at the same target; otherwise the prior connection
    /// is torn down first.
    pub async fn connect(self: &Arc<Self>, conversation: Option<String>) -> ClientResult<()> {
        let token = match self.auth.token() {
            Some(t) => t,
            None => return Err(ClientError::Auth("not logged in".into())),
        };

        let epoch = {
            let mut conn = self.conn.lock();
            match conn.phase {
                ConnPhase::Connecting => {
                    debug!("[chat] Connect ignored, attempt already pending");
                    return Ok(());
                }
                ConnPhase::Connected if conn.target == conversation => return Ok(()),
                _ => {}
            }
            Self::teardown_locked(&mut conn, false);
            conn.phase = ConnPhase::Connecting;
            conn.target = conversation.clone();
            conn.epoch
        };

        let mut url = format!(
            "{}/ws/chat?token={}",
            self.ws_base,
            urlencoding::encode(&token)
        );
        if let Some(id) = &conversation {
            url.push_str("&conversation_id=");
            url.push_str(&urlencoding::encode(id));
        }

        info!(
            "[chat] Connecting (conversation={})",
            conversation.as_deref().unwrap_or("<new>")
        );

        let (stream, _) = match connect_async(url.as_str()).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("[chat] WebSocket connect failed: {}", e);
                let mut conn = self.conn.lock();
                if conn.epoch == epoch {
                    conn.phase = ConnPhase::Disconnected;
                }
                drop(conn);
                self.events.emit(UiEvent::ConnectionChanged { connected: false });
                return Err(e.into());
            }
        };

        let (write, read) = stream.split();
        let writer: SharedSink = Arc::new(tokio::sync::Mutex::new(write));

        let to_flush = {
            let mut conn = self.conn.lock();
            if conn.epoch != epoch {
                // A newer connect superseded this handshake.
                let stale = writer.clone();
                tokio::spawn(async move {
                    let _ = stale.lock().await.close().await;
                });
                return Ok(());
            }
            conn.phase = ConnPhase::Connected;
            conn.writer = Some(writer.clone());
            std::mem::take(&mut conn.queued)
        };

        self.events.emit(UiEvent::ConnectionChanged { connected: true });

        // Open transition: drain everything queued while we were offline.
        let mut pending = to_flush.into_iter();
        while let Some(frame) = pending.next() {
            if let Err(e) = Self::send_on(&writer, &frame).await {
                warn!("[chat] Flush of queued frame failed: {}", e);
                let mut conn = self.conn.lock();
                conn.queued.push(frame);
                conn.queued.extend(pending);
                break;
            }
        }

        let ctrl = Arc::clone(self);
        tokio::spawn(async move { ctrl.read_loop(read, epoch).await });

        let ctrl = Arc::clone(self);
        let ping_writer = writer.clone();
        tokio::spawn(async move { ctrl.ping_loop(ping_writer, epoch).await });

        Ok(())
    }

    /// Close the socket and stop its tasks. Queued frames are dropped —
    /// this is the explicit "navigate away" path.
    pub fn disconnect(&self) {
        let was_connected = {
            let mut conn = self.conn.lock();
            let was = conn.phase != ConnPhase::Disconnected;
            Self::teardown_locked(&mut conn, true);
            was
        };
        if was_connected {
            info!("[chat] Disconnected");
            self.events.emit(UiEvent::ConnectionChanged { connected: false });
        }
    }

    fn teardown_locked(conn: &mut Connection, drop_queued: bool) {
        conn.epoch += 1;
        conn.phase = ConnPhase::Disconnected;
        if let Some(writer) = conn.writer.take() {
            tokio::spawn(async move {
                let _ = writer.lock().await.close().await;
            });
        }
        if drop_queued && !conn.queued.is_empty() {
            warn!(
                "[chat] Dropping {} queued frame(s) on disconnect",
                conn.queued.len()
            );
            conn.queued.clear();
        }
    }

    async fn read_loop(self: Arc<Self>, mut read: WsSource, epoch: u64) {
        while let Some(item) = read.next().await {
            if self.conn.lock().epoch != epoch {
                return; // superseded — a newer connection owns the state
            }
            match item {
                Ok(WsMessage::Text(text)) => self.dispatch(&text),
                Ok(WsMessage::Close(frame)) => {
                    info!("[chat] Server closed the socket ({:?})", frame);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("[chat] WebSocket read error: {}", e);
                    break;
                }
            }
        }

        let ended_current = {
            let mut conn = self.conn.lock();
            if conn.epoch == epoch {
                conn.phase = ConnPhase::Disconnected;
                conn.writer = None;
                true
            } else {
                false
            }
        };
        if ended_current {
            // No automatic reconnect — the next user action re-establishes.
            self.events.emit(UiEvent::ConnectionChanged { connected: false });
        }
    }

    async fn ping_loop(self: Arc<Self>, writer: SharedSink, epoch: u64) {
        loop {
            tokio::time::sleep(PING_INTERVAL).await;
            {
                let conn = self.conn.lock();
                if conn.epoch != epoch || conn.phase != ConnPhase::Connected {
                    return;
                }
            }
            if let Err(e) = Self::send_on(&writer, &ClientFrame::Ping).await {
                debug!("[chat] Keep-alive send failed: {}", e);
                return;
            }
        }
    }

    async fn send_on(writer: &SharedSink, frame: &ClientFrame) -> ClientResult<()> {
        let text = serde_json::to_string(frame)?;
        writer.lock().await.send(WsMessage::Text(text)).await?;
        Ok(())
    }

    // ── Outbound actions ───────────────────────────────────────────────────

    /// Send a user message for the active conversation, creating one first
    /// when none is active. If the socket is not open the frame is queued
    /// and flushed on the open transition — a send is never silently
    /// dropped.
    pub async fn send_message(
        self: &Arc<Self>,
        content: &str,
        background: bool,
        attached_files: Vec<String>,
    ) -> ClientResult<()> {
        if content.trim().is_empty() && attached_files.is_empty() {
            debug!("[chat] Ignoring empty send");
            return Ok(());
        }

        let conversation_id = match self.conversations.active_id() {
            Some(id) => id,
            None => {
                let title = provisional_title(content);
                let model = self.models.get(ModelSlot::Primary);
                match self.conversations.create(&title, &model).await {
                    Some(conv) => {
                        self.conversations.adopt_active(&conv.id);
                        self.events.emit(UiEvent::ConversationsStale);
                        conv.id
                    }
                    None => {
                        return Err(ClientError::Other(
                            "could not create a conversation for the outgoing message".into(),
                        ))
                    }
                }
            }
        };

        self.set_processing(&conversation_id, true);
        self.events.emit(UiEvent::MessageAppended {
            conversation_id: Some(conversation_id.clone()),
            role: MessageRole::User,
            content: content.to_string(),
            tool_calls: None,
        });

        let frame = ClientFrame::Message {
            content: content.to_string(),
            background,
            models: self.models.wire_models(),
            attached_files,
        };

        let direct = {
            let mut conn = self.conn.lock();
            if conn.phase == ConnPhase::Connected
                && conn.target.as_deref() == Some(conversation_id.as_str())
            {
                conn.writer.clone()
            } else {
                conn.queued.push(frame.clone());
                None
            }
        };

        match direct {
            Some(writer) => {
                if let Err(e) = Self::send_on(&writer, &frame).await {
                    warn!("[chat] Send failed, re-queueing: {}", e);
                    {
                        let mut conn = self.conn.lock();
                        Self::teardown_locked(&mut conn, false);
                        conn.queued.push(frame);
                    }
                    self.connect(Some(conversation_id)).await?;
                }
                Ok(())
            }
            None => {
                // Queued — make sure a connection is on its way. A pending
                // attempt absorbs this call as a no-op.
                self.connect(Some(conversation_id)).await
            }
        }
    }

    /// Ask the server to stop the displayed conversation's work. Only sent
    /// when that conversation is actually marked processing; the flag is
    /// cleared by the `cancelled` frame that comes back, not here.
    pub async fn cancel(self: &Arc<Self>) -> ClientResult<()> {
        let active = match self.conversations.active_id() {
            Some(id) => id,
            None => return Ok(()),
        };
        if !self.processing(&active) {
            return Ok(());
        }

        let writer = {
            let conn = self.conn.lock();
            if conn.phase == ConnPhase::Connected {
                conn.writer.clone()
            } else {
                None
            }
        };
        if let Some(writer) = writer {
            self.events.emit(UiEvent::Thinking {
                text: Some("Cancelling...".to_string()),
            });
            if let Err(e) = Self::send_on(&writer, &ClientFrame::Cancel).await {
                warn!("[chat] Cancel send failed: {}", e);
            }
        }
        Ok(())
    }

    /// Switch the view to a conversation: fetch it (which also makes it
    /// active and pins its model), restore its stored indicator state, and
    /// point the socket at it.
    pub async fn open_conversation(self: &Arc<Self>, id: &str) -> bool {
        let conv = match self.conversations.get(id).await {
            Some(c) => c,
            None => return false,
        };
        self.events.emit(UiEvent::ConversationLoaded { conversation: conv });
        self.restore_indicators(id);

        if let Err(e) = self.connect(Some(id.to_string())).await {
            warn!("[chat] Reconnect after switch failed: {}", e);
        }
        self.restore_background_tasks(id).await;
        true
    }

    /// Seed the processing map from the task queue's REST view, so a fresh
    /// session shows the right indicators before any push arrives.
    pub async fn restore_background_tasks(&self, conversation_id: &str) {
        let url = http::api_url(&self.api_base, &format!("/api/tasks/{}", conversation_id));
        let resp = match self.auth.attach_auth(self.http.get(&url)).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                debug!("[chat] Task restore rejected: HTTP {}", resp.status());
                return;
            }
            Err(e) => {
                debug!("[chat] Task restore failed: {}", e);
                return;
            }
        };
        match resp.json::<TaskListResponse>().await {
            Ok(body) => {
                for task in &body.tasks {
                    if !task.status.is_terminal() {
                        info!(
                            "[chat] Conversation {} has task {} still {:?}",
                            task.conversation_id, task.id, task.status
                        );
                        self.set_processing(&task.conversation_id, true);
                    }
                }
            }
            Err(e) => debug!("[chat] Task restore response unreadable: {}", e),
        }
    }

    // ── Inbound dispatch ───────────────────────────────────────────────────

    /// Parse and handle one raw frame. Malformed or unknown frames are
    /// logged and dropped — they never touch the processing map.
    pub fn dispatch(self: &Arc<Self>, raw: &str) {
        let frame: ServerFrame = match serde_json::from_str(raw) {
            Ok(frame) => frame,
            Err(e) => {
                let excerpt: String = raw.chars().take(120).collect();
                warn!("[chat] Dropping unparseable frame: {} ({})", e, excerpt);
                return;
            }
        };
        self.handle_frame(frame);
    }

    fn handle_frame(self: &Arc<Self>, frame: ServerFrame) {
        match frame {
            ServerFrame::ConversationCreated { conversation_id } => {
                info!("[chat] Server materialized conversation {}", conversation_id);
                {
                    let mut conn = self.conn.lock();
                    if conn.target.is_none() {
                        conn.target = Some(conversation_id.clone());
                    }
                }
                if self.conversations.active_id().is_none() {
                    self.conversations.adopt_active(&conversation_id);
                }
                self.events.emit(UiEvent::ConversationsStale);
            }

            ServerFrame::Message {
                role,
                content,
                tool_calls,
                ..
            } => {
                let conversation = self.socket_conversation();
                if let Some(id) = &conversation {
                    self.set_processing(id, false);
                }
                self.events.emit(UiEvent::Thinking { text: None });
                self.events.emit(UiEvent::MessageAppended {
                    conversation_id: conversation,
                    role,
                    content,
                    tool_calls,
                });
            }

            ServerFrame::Cancelled { content } => {
                let conversation = self.socket_conversation();
                if let Some(id) = &conversation {
                    self.set_processing(id, false);
                }
                self.events.emit(UiEvent::Thinking { text: None });
                self.events.emit(UiEvent::MessageAppended {
                    conversation_id: conversation,
                    role: MessageRole::System,
                    content,
                    tool_calls: None,
                });
            }

            ServerFrame::Status { status, content } => {
                if status == "processing" {
                    self.events.emit(UiEvent::Thinking {
                        text: Some(content.unwrap_or_else(|| "Working...".to_string())),
                    });
                } else {
                    self.events.emit(UiEvent::Thinking { text: None });
                }
            }

            ServerFrame::ToolStart { tool, tool_id } => self.open_tool_panel(tool, tool_id),

            ServerFrame::ToolLog {
                tool,
                output,
                is_error,
            } => {
                self.events.emit(UiEvent::ToolPanelLog {
                    tool,
                    output,
                    is_error,
                });
            }

            ServerFrame::ToolResult {
                tool,
                tool_id,
                result,
            } => {
                let key = tool_id.unwrap_or_else(|| tool.clone());
                self.open_tools.lock().remove(&key);
                self.events.emit(UiEvent::ToolPanelClosed {
                    tool,
                    result: Some(result),
                    timed_out: false,
                });
            }

            ServerFrame::Error { content } => {
                let conversation = self.socket_conversation();
                if let Some(id) = &conversation {
                    self.set_processing(id, false);
                }
                self.events.emit(UiEvent::Thinking { text: None });
                self.events.emit(UiEvent::MessageAppended {
                    conversation_id: conversation,
                    role: MessageRole::System,
                    content,
                    tool_calls: None,
                });
            }

            ServerFrame::TaskCreated {
                task_id, message, ..
            } => {
                // The work continues server-side — processing stays up.
                info!("[chat] Background task {} enqueued", task_id);
                self.events.emit(UiEvent::TaskQueued { task_id, message });
            }

            ServerFrame::TaskStatus {
                conversation_id,
                status,
                result,
                error,
                ..
            } => {
                let conversation = match conversation_id.or_else(|| self.socket_conversation()) {
                    Some(id) => id,
                    None => return,
                };
                if status.is_terminal() {
                    self.set_processing(&conversation, false);
                    if self.conversations.active_id().as_deref() == Some(conversation.as_str()) {
                        self.events.emit(UiEvent::Thinking { text: None });
                        match status {
                            TaskStatus::Completed => {
                                if let Some(result) = result {
                                    self.events.emit(UiEvent::MessageAppended {
                                        conversation_id: Some(conversation),
                                        role: MessageRole::Assistant,
                                        content: result,
                                        tool_calls: None,
                                    });
                                }
                            }
                            TaskStatus::Failed => {
                                self.events.emit(UiEvent::SystemNotice {
                                    content: error
                                        .unwrap_or_else(|| "Background task failed".to_string()),
                                });
                            }
                            TaskStatus::Cancelled => {
                                self.events.emit(UiEvent::SystemNotice {
                                    content: "Background task cancelled".to_string(),
                                });
                            }
                            _ => {}
                        }
                    }
                } else {
                    self.set_processing(&conversation, true);
                }
            }

            ServerFrame::TaskProgress {
                conversation_id,
                message,
                ..
            } => {
                self.set_processing(&conversation_id, true);
                if self.conversations.active_id().as_deref() == Some(conversation_id.as_str()) {
                    self.events.emit(UiEvent::Thinking {
                        text: Some(message),
                    });
                }
            }

            ServerFrame::Pong => debug!("[chat] pong"),
        }
    }

    fn open_tool_panel(self: &Arc<Self>, tool: String, tool_id: Option<String>) {
        let key = tool_id.unwrap_or_else(|| tool.clone());
        let generation = self.tool_gen.fetch_add(1, Ordering::Relaxed);
        self.open_tools.lock().insert(key.clone(), generation);
        self.events.emit(UiEvent::ToolPanelOpened { tool: tool.clone() });

        // Safety timeout: if the result never arrives, the panel must not
        // stay open forever.
        let ctrl = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(TOOL_PANEL_TIMEOUT).await;
            let expired = {
                let mut open = ctrl.open_tools.lock();
                if open.get(&key) == Some(&generation) {
                    open.remove(&key);
                    true
                } else {
                    false
                }
            };
            if expired {
                warn!(
                    "[chat] Tool '{}' reported no result within {:?} — closing panel",
                    tool, TOOL_PANEL_TIMEOUT
                );
                ctrl.events.emit(UiEvent::ToolPanelClosed {
                    tool,
                    result: None,
                    timed_out: true,
                });
            }
        });
    }

    /// Conversation the socket currently serves; falls back to the active
    /// conversation for frames that arrive without naming one.
    fn socket_conversation(&self) -> Option<String> {
        self.conn
            .lock()
            .target
            .clone()
            .or_else(|| self.conversations.active_id())
    }

    #[cfg(test)]
    pub(crate) fn queued_frames(&self) -> Vec<ClientFrame> {
        self.conn.lock().queued.clone()
    }
}

/// Title for a conversation created implicitly by a first send: the leading
/// words of the message, elided when it runs longer.
fn provisional_title(content: &str) -> String {
    let words: Vec<&str> = content.split_whitespace().collect();
    if words.is_empty() {
        return "New conversation".to_string();
    }
    let mut title = words
        .iter()
        .take(PROVISIONAL_TITLE_WORDS)
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    if words.len() > PROVISIONAL_TITLE_WORDS {
        title.push_str("...");
    }
    title
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::store::Store;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn controller() -> (Arc<ChatController>, UnboundedReceiver<UiEvent>) {
        // Base URL points at a dead port: every network path fails fast,
        // which is what these tests want.
        let base = "http://127.0.0.1:9";
        let (events, rx) = UiEmitter::channel();
        let store = Arc::new(Store::open_in_memory().unwrap());
        let auth = Arc::new(AuthSession::new(store.clone(), base, events.clone()));
        let models = Arc::new(ModelRegistry::new(store, auth.clone(), base));
        let conversations = Arc::new(ConversationRegistry::new(
            auth.clone(),
            models.clone(),
            base,
            events.clone(),
        ));
        let chat = Arc::new(ChatController::new(
            auth,
            conversations,
            models,
            base,
            events,
        ));
        (chat, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn terminal_task_status_clears_flag_regardless_of_prior_value() {
        let (chat, _rx) = controller();
        for prior in [false, true] {
            chat.processing.lock().insert("c-1".to_string(), prior);
            chat.dispatch(
                r#"{"type": "task_status", "task_id": "t", "conversation_id": "c-1", "status": "completed"}"#,
            );
            assert!(!chat.processing("c-1"), "prior={prior}");
        }
        chat.processing.lock().insert("c-1".to_string(), true);
        chat.dispatch(
            r#"{"type": "task_status", "task_id": "t", "conversation_id": "c-1", "status": "failed"}"#,
        );
        assert!(!chat.processing("c-1"));
    }

    #[tokio::test]
    async fn flags_are_isolated_per_conversation() {
        let (chat, _rx) = controller();
        chat.dispatch(
            r#"{"type": "task_progress", "conversation_id": "c-1", "message": "working"}"#,
        );
        assert!(chat.processing("c-1"));
        assert!(!chat.processing("c-2"));

        chat.dispatch(
            r#"{"type": "task_status", "task_id": "t", "conversation_id": "c-2", "status": "processing"}"#,
        );
        chat.dispatch(
            r#"{"type": "task_status", "task_id": "t", "conversation_id": "c-1", "status": "completed"}"#,
        );
        assert!(!chat.processing("c-1"));
        assert!(chat.processing("c-2"));
    }

    #[tokio::test]
    async fn progress_for_hidden_conversation_changes_no_visible_indicator() {
        let (chat, mut rx) = controller();
        chat.conversations.adopt_active("c-Y");
        drain(&mut rx);

        chat.dispatch(
            r#"{"type": "task_progress", "conversation_id": "c-X", "message": "step 1"}"#,
        );

        assert!(chat.processing("c-X")); // stored flag flipped…
        let events = drain(&mut rx);
        assert!(events.is_empty(), "unexpected visible events: {events:?}"); // …silently
    }

    #[tokio::test]
    async fn progress_for_displayed_conversation_updates_indicators() {
        let (chat, mut rx) = controller();
        chat.conversations.adopt_active("c-1");
        drain(&mut rx);

        chat.dispatch(
            r#"{"type": "task_progress", "conversation_id": "c-1", "message": "step 1"}"#,
        );

        let events = drain(&mut rx);
        assert!(events.contains(&UiEvent::ProcessingChanged {
            conversation_id: "c-1".to_string(),
            processing: true,
        }));
        assert!(events.contains(&UiEvent::Thinking {
            text: Some("step 1".to_string()),
        }));
    }

    #[tokio::test]
    async fn switching_view_restores_exactly_the_stored_flag() {
        let (chat, mut rx) = controller();
        chat.processing.lock().insert("c-busy".to_string(), true);
        chat.processing.lock().insert("c-idle".to_string(), false);

        chat.restore_indicators("c-busy");
        let events = drain(&mut rx);
        assert_eq!(
            events[0],
            UiEvent::ProcessingChanged {
                conversation_id: "c-busy".to_string(),
                processing: true,
            }
        );

        chat.restore_indicators("c-idle");
        let events = drain(&mut rx);
        assert_eq!(
            events[0],
            UiEvent::ProcessingChanged {
                conversation_id: "c-idle".to_string(),
                processing: false,
            }
        );

        // A conversation the map has never seen reads as idle.
        chat.restore_indicators("c-unknown");
        let events = drain(&mut rx);
        assert_eq!(
            events[0],
            UiEvent::ProcessingChanged {
                conversation_id: "c-unknown".to_string(),
                processing: false,
            }
        );
    }

    #[tokio::test]
    async fn assistant_message_clears_processing_and_appends() {
        let (chat, mut rx) = controller();
        chat.conversations.adopt_active("c-1");
        chat.processing.lock().insert("c-1".to_string(), true);
        drain(&mut rx);

        chat.dispatch(r#"{"type": "message", "role": "assistant", "content": "the answer"}"#);

        assert!(!chat.processing("c-1"));
        let events = drain(&mut rx);
        assert!(events.contains(&UiEvent::MessageAppended {
            conversation_id: Some("c-1".to_string()),
            role: MessageRole::Assistant,
            content: "the answer".to_string(),
            tool_calls: None,
        }));
    }

    #[tokio::test]
    async fn cancelled_frame_appends_system_notice_and_clears_processing() {
        let (chat, mut rx) = controller();
        chat.conversations.adopt_active("c-1");
        chat.processing.lock().insert("c-1".to_string(), true);
        drain(&mut rx);

        chat.dispatch(r#"{"type": "cancelled", "content": "stopped"}"#);

        assert!(!chat.processing("c-1"));
        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            UiEvent::MessageAppended {
                role: MessageRole::System,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn malformed_frames_are_dropped_without_state_change() {
        let (chat, mut rx) = controller();
        chat.processing.lock().insert("c-1".to_string(), true);
        drain(&mut rx);

        chat.dispatch("not json at all");
        chat.dispatch(r#"{"type": "chunk", "content": "unknown kind"}"#);
        chat.dispatch(r#"{"no_type": true}"#);

        assert!(chat.processing("c-1"));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn task_created_keeps_processing_up() {
        let (chat, mut rx) = controller();
        chat.conversations.adopt_active("c-1");
        chat.processing.lock().insert("c-1".to_string(), true);
        drain(&mut rx);

        chat.dispatch(r#"{"type": "task_created", "task_id": "t-1", "status": "pending", "message": "queued"}"#);

        assert!(chat.processing("c-1"));
        let events = drain(&mut rx);
        assert!(events.contains(&UiEvent::TaskQueued {
            task_id: "t-1".to_string(),
            message: Some("queued".to_string()),
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn tool_panel_force_closes_when_no_result_arrives() {
        let (chat, mut rx) = controller();
        chat.dispatch(r#"{"type": "tool_start", "tool": "search"}"#);
        assert_eq!(
            drain(&mut rx),
            vec![UiEvent::ToolPanelOpened {
                tool: "search".to_string(),
            }]
        );

        tokio::time::sleep(TOOL_PANEL_TIMEOUT + std::time::Duration::from_secs(1)).await;

        let events = drain(&mut rx);
        assert!(events.contains(&UiEvent::ToolPanelClosed {
            tool: "search".to_string(),
            result: None,
            timed_out: true,
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn tool_result_preempts_the_timeout() {
        let (chat, mut rx) = controller();
        chat.dispatch(r#"{"type": "tool_start", "tool": "search", "tool_id": "t-1"}"#);
        chat.dispatch(
            r#"{"type": "tool_result", "tool": "search", "tool_id": "t-1", "result": "found"}"#,
        );
        drain(&mut rx);

        tokio::time::sleep(TOOL_PANEL_TIMEOUT + std::time::Duration::from_secs(1)).await;

        // The timer fired but found the panel already closed — no late event.
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn send_without_socket_queues_instead_of_dropping() {
        let (chat, mut rx) = controller();
        chat.conversations.adopt_active("c-1");
        drain(&mut rx);

        // No token stored → the connect attempt fails before any I/O, but
        // the frame must survive in the queue.
        let result = chat.send_message("hello there", false, vec![]).await;
        assert!(result.is_err());

        let queued = chat.queued_frames();
        assert_eq!(queued.len(), 1);
        match &queued[0] {
            ClientFrame::Message {
                content,
                background,
                ..
            } => {
                assert_eq!(content, "hello there");
                assert!(!background);
            }
            other => panic!("unexpected queued frame: {other:?}"),
        }

        // The local send still flipped the flag and echoed the message.
        assert!(chat.processing("c-1"));
        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            UiEvent::MessageAppended {
                role: MessageRole::User,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn cancel_is_a_no_op_when_nothing_is_processing() {
        let (chat, mut rx) = controller();
        chat.conversations.adopt_active("c-1");
        drain(&mut rx);

        chat.cancel().await.unwrap();
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn conversation_created_adopts_the_id() {
        let (chat, mut rx) = controller();
        chat.dispatch(r#"{"type": "conversation_created", "conversation_id": "c-new"}"#);

        assert_eq!(chat.conversations.active_id(), Some("c-new".to_string()));
        let events = drain(&mut rx);
        assert!(events.contains(&UiEvent::ConversationsStale));
    }

    #[test]
    fn provisional_titles_take_leading_words() {
        assert_eq!(provisional_title("hello"), "hello");
        assert_eq!(
            provisional_title("one two three four five six seven"),
            "one two three four five six..."
        );
        assert_eq!(provisional_title("   "), "New conversation");
    }
}
