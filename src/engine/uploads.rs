// ── Zeus Engine: Upload Client ─────────────────────────────────────────────
// Multipart POST of local files to `/api/uploads/`. The backend validates
// extension and size per file and reports per-file failures inside the
// response envelope, so a partially-successful batch still returns Ok.

use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};
use reqwest::multipart::{Form, Part};

use crate::atoms::error::{ClientError, ClientResult};
use crate::atoms::types::UploadResponse;
use crate::engine::auth::AuthSession;
use crate::engine::http;

pub struct UploadClient {
    http: reqwest::Client,
    base_url: String,
    auth: Arc<AuthSession>,
}

impl UploadClient {
    pub fn new(auth: Arc<AuthSession>, base_url: &str) -> Self {
        UploadClient {
            http: http::shared_client(),
            base_url: base_url.to_string(),
            auth,
        }
    }

    /// Upload one or more files; the returned ids go into the next
    /// message frame's `attached_files`.
    pub async fn upload(&self, paths: &[PathBuf]) -> ClientResult<UploadResponse> {
        let mut form = Form::new();
        for path in paths {
            let bytes = tokio::fs::read(path).await?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "file".to_string());
            form = form.part("files", Part::bytes(bytes).file_name(name));
        }

        let url = http::api_url(&self.base_url, "/api/uploads/");
        let resp = self
            .auth
            .attach_auth(self.http.post(&url))
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ClientError::api("/api/uploads/", status.as_u16(), message));
        }

        let body: UploadResponse = resp.json().await?;
        for err in &body.errors {
            warn!("[uploads] {}", err);
        }
        info!("[uploads] Stored {} file(s)", body.files.len());
        Ok(body)
    }
}
