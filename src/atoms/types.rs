// ── Zeus Atoms: Pure Data Types ────────────────────────────────────────────
// Plain struct/enum definitions mirroring the backend's JSON shapes.
// Atoms layer rule: no I/O, no side effects, no imports from engine/.

use serde::{Deserialize, Serialize};

use crate::atoms::constants::{DEFAULT_PRIMARY_MODEL, DEFAULT_SECONDARY_MODEL};

// ── Auth ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Seconds until the token expires.
    pub expires_in: i64,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// The profile the backend returns from `/api/auth/verify`, cached locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    #[serde(default = "default_true")]
    pub authenticated: bool,
}

fn default_true() -> bool {
    true
}

// ── Conversations ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl Default for MessageRole {
    fn default() -> Self {
        MessageRole::Assistant
    }
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }
}

/// One chat message as stored by the backend. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
    /// Structured tool-invocation records; the client treats them as opaque.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Upload ids referenced by this message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attached_files: Option<Vec<String>>,
}

/// Full conversation as returned by the detail endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub model_id: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub created_at: String,
    pub updated_at: String,
}

/// List-endpoint entry — no message bodies, just the count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub model_id: String,
    pub message_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationsListResponse {
    pub conversations: Vec<ConversationSummary>,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
}

/// Partial update body for PUT — absent fields are left untouched server-side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateConversationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
}

// ── Model selection ────────────────────────────────────────────────────────

/// The three named model slots, persisted as one JSON blob.
///
/// Earlier deployments persisted the third slot under the field name `mago`;
/// the alias keeps those blobs loading. New writes always use `tertiary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSelection {
    pub primary: String,
    pub secondary: String,
    #[serde(alias = "mago")]
    pub tertiary: String,
}

impl Default for ModelSelection {
    fn default() -> Self {
        ModelSelection {
            primary: DEFAULT_PRIMARY_MODEL.to_string(),
            secondary: DEFAULT_SECONDARY_MODEL.to_string(),
            tertiary: DEFAULT_SECONDARY_MODEL.to_string(),
        }
    }
}

/// The slot set as it travels inside an outgoing `message` frame.
/// The deployed backend reads the third slot as `mago`, so the wire shape
/// keeps that key even though the client names the slot `tertiary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireModels {
    pub primary: String,
    pub secondary: String,
    pub mago: String,
}

impl From<&ModelSelection> for WireModels {
    fn from(sel: &ModelSelection) -> Self {
        WireModels {
            primary: sel.primary.clone(),
            secondary: sel.secondary.clone(),
            mago: sel.tertiary.clone(),
        }
    }
}

// ── Model catalog (display only) ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per input token, as the catalog reports it (string-typed).
    pub prompt: String,
    pub completion: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub context_length: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<ModelPricing>,
    #[serde(default)]
    pub supports_tools: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
    pub total: i64,
}

// ── Uploads ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    pub filename: String,
    pub original_name: String,
    pub size: i64,
    pub extension: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub files: Vec<UploadedFile>,
    #[serde(default)]
    pub errors: Vec<String>,
}

// ── Background tasks ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Terminal states clear the owning conversation's processing flag.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// Task entry from `/api/tasks/{conversation_id}` — consumed on conversation
/// open to restore processing indicators without waiting for a push.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
    pub id: String,
    pub conversation_id: String,
    #[serde(default)]
    pub user_message: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskInfo>,
    pub total: i64,
}

// ── Tests ──────────────────────────────────────────────────────────────────
