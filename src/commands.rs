use std::path::PathBuf;

use serde_json::Value;
use tauri::{Emitter, Manager};
use tauri_plugin_dialog::DialogExt;
use tracing::warn;

use crate::context::{SearchAction, SearchState};
use crate::types::{
    ChatSessionSummary, CsvUploadSummary, DataKind, IndexStats, Message, Notice, OutcomeStats,
};
use crate::AppState;

pub const CONVERSATION_UPDATED: &str = "conversation-updated";
pub const SESSIONS_UPDATED: &str = "sessions-updated";

// ─── Chat ──────────────────────────────────────────────────────────────────────

/// Runs one chat turn. Progress arrives through `conversation-updated`
/// events; the return value is the id of the reply message (None for blank input).
#[tauri::command]
pub async fn send_message(
    text: String,
    state: tauri::State<'_, AppState>,
    app: tauri::AppHandle,
) -> Result<Option<u64>, String> {
    let reply_id = state.chat.send(&text).await;
    // A first message opens a backend session; show it in the sidebar right away.
    if reply_id.is_some() && !state.config.demo_mode {
        if let Ok(sessions) = state.sessions.refresh().await {
            let _ = app.emit(SESSIONS_UPDATED, &sessions);
        }
    }
    Ok(reply_id)
}

#[tauri::command]
pub async fn get_conversation(state: tauri::State<'_, AppState>) -> Result<Vec<Message>, String> {
    Ok(state.chat.snapshot().await)
}

#[tauri::command]
pub async fn new_chat(state: tauri::State<'_, AppState>) -> Result<(), String> {
    state.new_chat().await;
    Ok(())
}

/// Drains queued toasts.
#[tauri::command]
pub async fn take_notices(state: tauri::State<'_, AppState>) -> Result<Vec<Notice>, String> {
    Ok(state.chat.take_notices().await)
}

// ─── Sessions ──────────────────────────────────────────────────────────────────

/// Cached sidebar list, or a fresh one when `refresh` is set.
#[tauri::command]
pub async fn list_sessions(
    refresh: Option<bool>,
    state: tauri::State<'_, AppState>,
) -> Result<Vec<ChatSessionSummary>, String> {
    if refresh.unwrap_or(false) {
        state.sessions.refresh().await.map_err(|e| e.user_message())
    } else {
        Ok(state.sessions.sessions().await)
    }
}

#[tauri::command]
pub async fn load_session(
    session_id: String,
    state: tauri::State<'_, AppState>,
) -> Result<Vec<Message>, String> {
    state
        .load_session(&session_id)
        .await
        .map_err(|e| e.user_message())
}

#[tauri::command]
pub async fn rename_session(
    session_id: String,
    name: String,
    state: tauri::State<'_, AppState>,
    app: tauri::AppHandle,
) -> Result<Vec<ChatSessionSummary>, String> {
    let sessions = state
        .sessions
        .rename(&session_id, &name)
        .await
        .map_err(|e| e.user_message())?;
    let _ = app.emit(SESSIONS_UPDATED, &sessions);
    Ok(sessions)
}

#[tauri::command]
pub async fn delete_session(
    session_id: String,
    state: tauri::State<'_, AppState>,
    app: tauri::AppHandle,
) -> Result<Vec<ChatSessionSummary>, String> {
    let sessions = state
        .delete_session(&session_id)
        .await
        .map_err(|e| e.user_message())?;
    let _ = app.emit(SESSIONS_UPDATED, &sessions);
    Ok(sessions)
}

// ─── Search context ────────────────────────────────────────────────────────────

#[tauri::command]
pub async fn dispatch_search(
    action: SearchAction,
    state: tauri::State<'_, AppState>,
) -> Result<SearchState, String> {
    let mut search = state.search.lock().await;
    search.dispatch(action);
    Ok(search.clone())
}

#[tauri::command]
pub async fn get_search_state(state: tauri::State<'_, AppState>) -> Result<SearchState, String> {
    Ok(state.search.lock().await.clone())
}

// ─── Data management ───────────────────────────────────────────────────────────

#[tauri::command]
pub async fn list_records(
    kind: DataKind,
    state: tauri::State<'_, AppState>,
) -> Result<Vec<Value>, String> {
    state
        .api
        .list_records(kind)
        .await
        .map_err(|e| e.user_message())
}

#[tauri::command]
pub async fn get_dog(dog_id: String, state: tauri::State<'_, AppState>) -> Result<Value, String> {
    state.api.get_dog(&dog_id).await.map_err(|e| e.user_message())
}

/// Uploads a CSV of `kind`. Without `path` a file picker is shown; None
/// means the user cancelled it.
#[tauri::command]
pub async fn upload_csv(
    kind: DataKind,
    path: Option<String>,
    state: tauri::State<'_, AppState>,
    app: tauri::AppHandle,
) -> Result<Option<CsvUploadSummary>, String> {
    let path = match path {
        Some(path) => PathBuf::from(path),
        None => match pick_csv(&app).await? {
            Some(path) => path,
            None => return Ok(None),
        },
    };
    let summary = state
        .upload_csv(kind, &path)
        .await
        .map_err(|e| e.user_message())?;
    Ok(Some(summary))
}

/// Checks an applications CSV against the backend's required columns and
/// returns the validation report plus a preview of the first rows.
#[tauri::command]
pub async fn check_applications_csv(
    path: Option<String>,
    state: tauri::State<'_, AppState>,
    app: tauri::AppHandle,
) -> Result<Option<Value>, String> {
    let path = match path {
        Some(path) => PathBuf::from(path),
        None => match pick_csv(&app).await? {
            Some(path) => path,
            None => return Ok(None),
        },
    };
    let bytes = tokio::fs::read(&path).await.map_err(|e| e.to_string())?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "applications.csv".to_string());
    let validation = state
        .api
        .validate_applications_csv(&filename, bytes.clone())
        .await
        .map_err(|e| e.user_message())?;
    let preview = state
        .api
        .preview_applications_csv(&filename, bytes)
        .await
        .map_err(|e| e.user_message())?;
    Ok(Some(serde_json::json!({ "validation": validation, "preview": preview })))
}

/// Asks where to save the sample CSV for `kind` and writes it there.
/// Returns the chosen path, or None when cancelled.
#[tauri::command]
pub async fn save_csv_template(
    kind: DataKind,
    app: tauri::AppHandle,
) -> Result<Option<String>, String> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    app.dialog()
        .file()
        .add_filter("CSV", &["csv"])
        .set_file_name(crate::templates::file_name(kind))
        .save_file(move |path| {
            let _ = tx.send(path);
        });
    let Some(path) = rx.await.map_err(|e| e.to_string())? else {
        return Ok(None);
    };
    let path = path.into_path().map_err(|e| e.to_string())?;
    crate::templates::write_template(kind, &path)
        .await
        .map_err(|e| format!("{e:#}"))?;
    Ok(Some(path.to_string_lossy().to_string()))
}

async fn pick_csv(app: &tauri::AppHandle) -> Result<Option<PathBuf>, String> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    app.dialog()
        .file()
        .add_filter("CSV", &["csv"])
        .pick_file(move |path| {
            let _ = tx.send(path);
        });
    match rx.await.map_err(|e| e.to_string())? {
        Some(path) => path.into_path().map(Some).map_err(|e| e.to_string()),
        None => Ok(None),
    }
}

// ─── Analytics ─────────────────────────────────────────────────────────────────

#[tauri::command]
pub async fn get_index_stats(state: tauri::State<'_, AppState>) -> Result<IndexStats, String> {
    state.api.index_stats().await.map_err(|e| e.user_message())
}

#[tauri::command]
pub async fn get_dashboard(state: tauri::State<'_, AppState>) -> Result<Value, String> {
    state.api.dashboard().await.map_err(|e| e.user_message())
}

#[tauri::command]
pub async fn get_outcome_stats(state: tauri::State<'_, AppState>) -> Result<OutcomeStats, String> {
    state.api.outcome_stats().await.map_err(|e| e.user_message())
}

// ─── Misc ──────────────────────────────────────────────────────────────────────

/// Sanitized HTML for a chat bubble.
#[tauri::command]
pub fn render_markdown(text: String) -> String {
    crate::markdown::render_markdown(&text)
}

/// Opens a link from a chat bubble in the system browser / mail client.
#[tauri::command]
pub async fn open_external_url(url: String) -> Result<(), String> {
    let parsed = url::Url::parse(&url).map_err(|e| e.to_string())?;
    if !matches!(parsed.scheme(), "http" | "https" | "mailto") {
        return Err("unsupported_url_scheme".to_string());
    }
    open::that_detached(parsed.as_str()).map_err(|e| e.to_string())
}

// ─── Internal helpers ──────────────────────────────────────────────────────────

/// Called once on startup: checks the backend, then starts the
/// recent-sessions refresh loop, which emits `sessions-updated` after every
/// successful fetch.
pub async fn startup_init(app: tauri::AppHandle) {
    let emitter = app.clone();
    let state = app.state::<AppState>();
    if !state.check_backend().await {
        warn!(api_url = %state.config.api_url, "backend unavailable at startup");
    }
    state
        .start_session_polling(move |sessions| {
            let _ = emitter.emit(SESSIONS_UPDATED, &sessions);
        })
        .await;
}
