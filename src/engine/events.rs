// ── Zeus Engine: UI Event Stream ───────────────────────────────────────────
// The engine never touches a widget. Everything the original page did to
// the DOM is expressed here as one tagged event, delivered on an unbounded
// channel that the front end (terminal binary, tests, a future GUI) drains.

use log::debug;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::atoms::types::{Conversation, MessageRole};

/// One UI-visible state change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UiEvent {
    /// A message entered the view (user echo, assistant reply, or a
    /// system notice rendered inline).
    MessageAppended {
        conversation_id: Option<String>,
        role: MessageRole,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<serde_json::Value>>,
    },
    /// The processing indicator for a *displayed* conversation flipped.
    /// Never emitted for conversations that are not on screen.
    ProcessingChanged {
        conversation_id: String,
        processing: bool,
    },
    /// Thinking-indicator text; `None` hides the indicator.
    Thinking { text: Option<String> },
    /// Execution-trace panel lifecycle.
    ToolPanelOpened { tool: String },
    ToolPanelLog {
        tool: String,
        output: String,
        is_error: bool,
    },
    ToolPanelClosed {
        tool: String,
        result: Option<String>,
        timed_out: bool,
    },
    /// The sidebar should re-list conversations.
    ConversationsStale,
    /// The view switched to this conversation (full message list included).
    ConversationLoaded { conversation: Conversation },
    /// The message view must clear (active conversation gone).
    ViewReset,
    ConnectionChanged { connected: bool },
    /// Out-of-band notice (background task failures and the like).
    SystemNotice { content: String },
    /// The backend enqueued the last send for background processing.
    TaskQueued {
        task_id: String,
        message: Option<String>,
    },
    /// The stored token was rejected — show the login entry point.
    AuthExpired,
}

/// Cloneable sending half handed to every engine module.
#[derive(Clone)]
pub struct UiEmitter {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl UiEmitter {
    /// Create an emitter and the receiving half the front end drains.
    pub fn channel() -> (UiEmitter, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (UiEmitter { tx }, rx)
    }

    /// Emit one event. A dropped receiver must not wedge the engine, so a
    /// closed channel is logged and ignored.
    pub fn emit(&self, event: UiEvent) {
        if self.tx.send(event).is_err() {
            debug!("[events] UI receiver gone, event dropped");
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────
