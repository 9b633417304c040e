use std::path::Path;

use reqwest::{multipart, Client, Method};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::types::{
    CsvUploadSummary, DataKind, IndexStats, OutcomeStats, Role, SessionHistory, SessionList,
};

/// Longest name the backend accepts for a chat session.
pub const MAX_SESSION_NAME_LEN: usize = 100;

/// Thin wrapper over the PawBond REST API. One attempt per call, no retry.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let base = Url::parse(&config.api_url)
            .map_err(|e| ApiError::InvalidRequest(format!("invalid API URL: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidRequest(format!(
                "API URL cannot be used as a base: {}",
                config.api_url
            )));
        }
        let http = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("pawbond-client/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, base })
    }

    /// Joins path segments onto the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Sends one request and decodes the JSON body into `T`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&Value>,
    ) -> Result<T, ApiError> {
        let url = self.url(segments);
        debug!(%method, %url, "api request");
        let mut builder = self.http.request(method, url.clone());
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder.send().await?;
        self.decode(&url, response).await
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        url: &Url,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            warn!(%url, %status, "api request failed");
            return Err(ApiError::from_status(status, &text));
        }
        // Some endpoints answer 2xx with an empty body.
        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(text).map_err(|source| ApiError::Decode {
            endpoint: url.path().to_string(),
            source,
        })
    }

    async fn upload<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<T, ApiError> {
        let url = self.url(segments);
        debug!(%url, filename, size = bytes.len(), "api upload");
        let part = multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("text/csv")?;
        let form = multipart::Form::new().part("file", part);
        let response = self.http.post(url.clone()).multipart(form).send().await?;
        self.decode(&url, response).await
    }

    // ─── Chat ──────────────────────────────────────────────────────────────

    /// `GET /health`, used once at startup to surface an unreachable backend.
    pub async fn health(&self) -> Result<Value, ApiError> {
        self.request(Method::GET, &["health"], None).await
    }

    /// `POST /chat/message`. The raw body is returned for the normalizer.
    pub async fn send_chat_message(
        &self,
        message: &str,
        session_id: Option<&str>,
    ) -> Result<Value, ApiError> {
        let mut body = json!({ "message": message });
        if let Some(id) = session_id {
            body["context"] = json!({ "session_id": id });
        }
        self.request(Method::POST, &["chat", "message"], Some(&body)).await
    }

    pub async fn analyze_application(&self, application_text: &str) -> Result<Value, ApiError> {
        let body = json!({ "application_text": application_text });
        self.request(Method::POST, &["chat", "analyze-application"], Some(&body))
            .await
    }

    // ─── Data management ───────────────────────────────────────────────────

    /// Lists a collection. Bare arrays and `{documents|items|results: [...]}`
    /// envelopes are both accepted.
    pub async fn list_records(&self, kind: DataKind) -> Result<Vec<Value>, ApiError> {
        let body: Value = self.request(Method::GET, &[kind.path()], None).await?;
        Ok(unwrap_collection(body))
    }

    pub async fn get_dog(&self, dog_id: &str) -> Result<Value, ApiError> {
        require_id(dog_id)?;
        self.request(Method::GET, &["dogs", dog_id], None).await
    }

    pub async fn upload_csv(
        &self,
        kind: DataKind,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<CsvUploadSummary, ApiError> {
        if !kind.supports_csv() {
            return Err(ApiError::InvalidRequest(format!(
                "{} cannot be imported from CSV",
                kind.path()
            )));
        }
        self.upload(&[kind.path(), "csv", "upload"], filename, bytes)
            .await
    }

    /// Reads `path` and uploads it as `kind` records.
    pub async fn upload_csv_file(
        &self,
        kind: DataKind,
        path: &Path,
    ) -> Result<CsvUploadSummary, ApiError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ApiError::InvalidRequest(format!("cannot read {}: {e}", path.display()))
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("{}.csv", kind.path()));
        self.upload_csv(kind, &filename, bytes).await
    }

    pub async fn validate_applications_csv(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<Value, ApiError> {
        self.upload(&["applications", "csv", "validate"], filename, bytes)
            .await
    }

    pub async fn preview_applications_csv(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<Value, ApiError> {
        self.upload(&["applications", "csv", "preview"], filename, bytes)
            .await
    }

    // ─── Analytics ─────────────────────────────────────────────────────────

    pub async fn index_stats(&self) -> Result<IndexStats, ApiError> {
        self.request(Method::GET, &["analytics", "index-stats"], None)
            .await
    }

    pub async fn dashboard(&self) -> Result<Value, ApiError> {
        self.request(Method::GET, &["analytics", "dashboard"], None)
            .await
    }

    pub async fn outcome_stats(&self) -> Result<OutcomeStats, ApiError> {
        self.request(Method::GET, &["outcomes", "stats"], None).await
    }

    // ─── Chat history ──────────────────────────────────────────────────────

    pub async fn list_sessions(&self, limit: usize) -> Result<SessionList, ApiError> {
        let mut url = self.url(&["chat-history", "sessions"]);
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());
        debug!(%url, "api request");
        let response = self.http.get(url.clone()).send().await?;
        self.decode(&url, response).await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<SessionHistory, ApiError> {
        require_id(session_id)?;
        self.request(Method::GET, &["chat-history", session_id], None)
            .await
    }

    pub async fn rename_session(&self, session_id: &str, name: &str) -> Result<Value, ApiError> {
        require_id(session_id)?;
        let name = validate_session_name(name)?;
        let body = json!({ "name": name });
        self.request(Method::PATCH, &["chat-history", session_id, "name"], Some(&body))
            .await
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<Value, ApiError> {
        require_id(session_id)?;
        self.request(Method::DELETE, &["chat-history", session_id], None)
            .await
    }

    /// Asks the backend for a fresh session id.
    pub async fn new_session(&self) -> Result<String, ApiError> {
        let body: Value = self
            .request(Method::POST, &["chat-history", "new"], None)
            .await?;
        body.get("session_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ApiError::InvalidRequest("server did not return a session id".into()))
    }

    pub async fn save_message(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
        intent: Option<&str>,
        metadata: Option<&Value>,
    ) -> Result<Value, ApiError> {
        require_id(session_id)?;
        let body = json!({
            "session_id": session_id,
            "role": role,
            "content": content,
            "intent": intent,
            "metadata": metadata,
        });
        self.request(Method::POST, &["chat-history", "save"], Some(&body))
            .await
    }
}

fn require_id(id: &str) -> Result<(), ApiError> {
    if id.trim().is_empty() {
        return Err(ApiError::InvalidRequest("id cannot be empty".into()));
    }
    Ok(())
}

/// Trims and checks a session name against the backend's 1..=100 rule.
pub fn validate_session_name(name: &str) -> Result<&str, ApiError> {
    let name = name.trim();
    let len = name.chars().count();
    if len == 0 || len > MAX_SESSION_NAME_LEN {
        return Err(ApiError::InvalidRequest(format!(
            "Chat name must be between 1 and {MAX_SESSION_NAME_LEN} characters"
        )));
    }
    Ok(name)
}

fn unwrap_collection(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => ["documents", "items", "results", "data"]
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}
