// ── Zeus Atoms: Constants ──────────────────────────────────────────────────
// All named constants for the crate live here.

use std::time::Duration;

// ── Backend location ───────────────────────────────────────────────────────
// Overridable through `ClientConfig`; this is the development default the
// backend binds to.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

// ── Durable store keys ─────────────────────────────────────────────────────
// The client_config table is keyed on these strings. Changing one orphans
// whatever a previous build persisted — treat as stable identifiers.
pub(crate) const KEY_AUTH_TOKEN: &str = "auth_token";
pub(crate) const KEY_AUTH_USER: &str = "auth_user";
pub(crate) const KEY_MODEL_SELECTION: &str = "model_selection";

// ── Database file ──────────────────────────────────────────────────────────
pub(crate) const CLIENT_DB_FILE: &str = "client.db";

// ── Model slot defaults ────────────────────────────────────────────────────
// Used until the user picks their own slots. The tertiary slot defaults to
// the secondary model, mirroring how the backend falls back when the third
// slot is absent from an incoming message frame.
pub const DEFAULT_PRIMARY_MODEL: &str = "openai/gpt-4";
pub const DEFAULT_SECONDARY_MODEL: &str = "openai/gpt-4o-mini";

// ── Chat connection timing ─────────────────────────────────────────────────
/// Keep-alive ping cadence while the socket is connected.
pub const PING_INTERVAL: Duration = Duration::from_secs(30);

/// The execution-trace panel force-closes if a tool reports no result
/// within this window.
pub const TOOL_PANEL_TIMEOUT: Duration = Duration::from_secs(60);

// ── Outgoing message titling ───────────────────────────────────────────────
// A conversation created implicitly by the first send gets a provisional
// title from the leading words of that message; the backend re-titles on
// the same rule once the message lands.
pub(crate) const PROVISIONAL_TITLE_WORDS: usize = 6;
