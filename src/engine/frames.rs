// ── Zeus Engine: WebSocket Frame Shapes ────────────────────────────────────
// Every frame on the `/ws/chat` socket is a JSON object with a `type`
// discriminator. Both directions are modeled as tagged unions so each kind
// carries exactly the fields it uses — no optional-field soup.
//
// A frame whose `type` the client does not know fails to parse; the
// dispatcher logs and drops it without touching any state.

use serde::{Deserialize, Serialize};

use crate::atoms::types::{MessageRole, TaskStatus, WireModels};

// ── Outbound (client → server) ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// A user message. `background: true` asks the backend to enqueue the
    /// work instead of streaming the reply on this socket. The full slot
    /// set rides along so the backend applies its own fallback ordering.
    Message {
        content: String,
        background: bool,
        models: WireModels,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attached_files: Vec<String>,
    },
    /// Keep-alive; the server answers with `pong`.
    Ping,
    /// Ask the server to stop the in-flight work for this socket's
    /// conversation. Fire-and-forget — the `cancelled` frame that comes
    /// back is what clears local state.
    Cancel,
}

// ── Inbound (server → client) ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// The server materialized a conversation for a socket opened without one.
    ConversationCreated { conversation_id: String },
    /// Final assistant reply for the socket's conversation.
    Message {
        #[serde(default)]
        role: MessageRole,
        content: String,
        #[serde(default)]
        message_id: Option<String>,
        #[serde(default)]
        tool_calls: Option<Vec<serde_json::Value>>,
    },
    /// The server confirmed a user-initiated cancel.
    Cancelled {
        #[serde(default)]
        content: String,
    },
    /// Thinking-indicator toggle: `status` is `processing` or `idle`,
    /// optionally with heartbeat text while a long tool runs.
    Status {
        status: String,
        #[serde(default)]
        content: Option<String>,
    },
    ToolStart {
        tool: String,
        #[serde(default)]
        tool_id: Option<String>,
    },
    ToolLog {
        tool: String,
        output: String,
        #[serde(default)]
        is_error: bool,
    },
    ToolResult {
        tool: String,
        #[serde(default)]
        tool_id: Option<String>,
        result: String,
    },
    Error { content: String },
    /// Background enqueue acknowledged — the task keeps running, so the
    /// processing flag stays up.
    TaskCreated {
        task_id: String,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
    /// Broadcast task update. `conversation_id` is absent only on the
    /// connect-time replay for this socket's own conversation.
    TaskStatus {
        task_id: String,
        #[serde(default)]
        conversation_id: Option<String>,
        status: TaskStatus,
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        execution_time: Option<f64>,
    },
    /// Broadcast progress line; always names its conversation so sidebar
    /// loaders in other conversations can update.
    TaskProgress {
        #[serde(default)]
        task_id: Option<String>,
        conversation_id: String,
        message: String,
        #[serde(default)]
        step_type: Option<String>,
    },
    Pong,
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::types::ModelSelection;

    #[test]
    fn outbound_message_matches_backend_contract() {
        let sel = ModelSelection {
            primary: "openai/gpt-4".into(),
            secondary: "openai/gpt-4o-mini".into(),
            tertiary: "anthropic/claude-3.5-sonnet".into(),
        };
        let frame = ClientFrame::Message {
            content: "hello".into(),
            background: true,
            models: WireModels::from(&sel),
            attached_files: vec!["f1".into()],
        };
        let out: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(out["type"], "message");
        assert_eq!(out["background"], true);
        assert_eq!(out["models"]["mago"], "anthropic/claude-3.5-sonnet");
        assert_eq!(out["attached_files"][0], "f1");
    }

    #[test]
    fn outbound_message_omits_empty_attachments() {
        let frame = ClientFrame::Message {
            content: "hi".into(),
            background: false,
            models: WireModels::from(&ModelSelection::default()),
            attached_files: vec![],
        };
        let out = serde_json::to_value(&frame).unwrap();
        assert!(out.get("attached_files").is_none());
    }

    #[test]
    fn ping_and_cancel_are_bare_frames() {
        assert_eq!(
            serde_json::to_string(&ClientFrame::Ping).unwrap(),
            r#"{"type":"ping"}"#
        );
        assert_eq!(
            serde_json::to_string(&ClientFrame::Cancel).unwrap(),
            r#"{"type":"cancel"}"#
        );
    }

    #[test]
    fn inbound_frames_parse_backend_samples() {
        let samples = [
            r#"{"type": "conversation_created", "conversation_id": "c-9"}"#,
            r#"{"type": "message", "role": "assistant", "content": "done", "message_id": "m-1", "tool_calls": null}"#,
            r#"{"type": "cancelled", "content": "Processamento cancelado pelo usuário."}"#,
            r#"{"type": "status", "status": "processing"}"#,
            r#"{"type": "status", "status": "idle"}"#,
            r#"{"type": "tool_start", "tool": "web_search", "tool_id": "t-1"}"#,
            r#"{"type": "tool_log", "tool": "execute_shell", "output": "ok", "is_error": false}"#,
            r#"{"type": "tool_result", "tool": "web_search", "tool_id": "t-1", "result": "…"}"#,
            r#"{"type": "error", "content": "boom"}"#,
            r#"{"type": "task_created", "task_id": "t-1", "status": "pending", "message": "queued"}"#,
            r#"{"type": "task_status", "task_id": "t-1", "conversation_id": "c-1", "status": "completed", "result": "answer", "execution_time": 12.5}"#,
            r#"{"type": "task_progress", "task_id": "t-1", "conversation_id": "c-1", "message": "step 2", "step_type": "info"}"#,
            r#"{"type": "pong"}"#,
        ];
        for raw in samples {
            serde_json::from_str::<ServerFrame>(raw)
                .unwrap_or_else(|e| panic!("frame failed to parse: {raw}: {e}"));
        }
    }

    #[test]
    fn connect_time_task_replay_parses_without_conversation_id() {
        // The replay the server sends right after accept has no
        // conversation_id and carries a truncated user_message.
        let raw = r#"{"type": "task_status", "task_id": "t-1", "status": "processing", "user_message": "do the thing"}"#;
        let frame: ServerFrame = serde_json::from_str(raw).unwrap();
        match frame {
            ServerFrame::TaskStatus {
                conversation_id,
                status,
                ..
            } => {
                assert_eq!(conversation_id, None);
                assert_eq!(status, TaskStatus::Processing);
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn unknown_frame_type_is_a_parse_error() {
        assert!(serde_json::from_str::<ServerFrame>(r#"{"type": "chunk", "content": "x"}"#).is_err());
    }
}
