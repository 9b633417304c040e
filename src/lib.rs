pub mod api;
pub mod chat;
#[cfg(feature = "desktop")]
pub mod commands;
pub mod config;
pub mod context;
pub mod demo;
pub mod error;
pub mod markdown;
pub mod normalize;
pub mod router;
pub mod sessions;
pub mod templates;
pub mod types;
pub mod watcher;

use std::path::Path;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::chat::{ChatService, ConversationObserver, Responder};
use crate::config::ClientConfig;
use crate::context::{SearchAction, SearchState};
use crate::demo::DemoResponder;
use crate::error::ApiError;
use crate::router::Router;
use crate::sessions::SessionStore;
use crate::types::{ChatSessionSummary, CsvUploadSummary, DataKind, Message, Notice};
use crate::watcher::Poller;

/// All runtime state shared across desktop commands.
pub struct AppState {
    pub config: ClientConfig,
    pub api: ApiClient,
    pub chat: ChatService,
    pub sessions: SessionStore,
    /// Search/trace/loaded-session state driven by [`SearchAction`]s.
    pub search: Mutex<SearchState>,
    /// Recent-sessions refresh task. Replaced (and the old one stopped) on restart.
    poller: Mutex<Option<Poller>>,
}

impl AppState {
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        let api = ApiClient::new(&config)?;
        let responder = if config.demo_mode {
            Responder::Demo(DemoResponder::default())
        } else {
            Responder::Live(api.clone())
        };
        info!(api_url = %config.api_url, demo_mode = config.demo_mode, "client state initialised");
        Ok(Self {
            chat: ChatService::new(Router::default(), responder),
            sessions: SessionStore::new(api.clone(), config.session_limit),
            search: Mutex::new(SearchState::default()),
            poller: Mutex::new(None),
            api,
            config,
        })
    }

    pub fn with_chat_observer(mut self, observer: ConversationObserver) -> Self {
        self.chat = self.chat.with_observer(observer);
        self
    }

    /// Pings the backend once. An unreachable or failing server is reported
    /// as an error notice. Always true in demo mode.
    pub async fn check_backend(&self) -> bool {
        if self.config.demo_mode {
            return true;
        }
        match self.api.health().await {
            Ok(_) => true,
            Err(error) => {
                warn!(%error, "backend health check failed");
                self.chat.push_notice(Notice::error(error.user_message())).await;
                false
            }
        }
    }

    /// Uploads a CSV file and queues a success notice with the backend's summary.
    pub async fn upload_csv(
        &self,
        kind: DataKind,
        path: &Path,
    ) -> Result<CsvUploadSummary, ApiError> {
        let summary = self.api.upload_csv_file(kind, path).await?;
        info!(
            kind = kind.path(),
            indexed = summary.indexed_count,
            failed = summary.failed_count,
            "CSV uploaded"
        );
        let text = if summary.message.is_empty() {
            format!("Imported {} of {} rows", summary.indexed_count, summary.total_rows)
        } else {
            summary.message.clone()
        };
        self.chat.push_notice(Notice::success(text)).await;
        Ok(summary)
    }

    /// Fetches a stored session and makes it the active conversation.
    pub async fn load_session(&self, session_id: &str) -> Result<Vec<Message>, ApiError> {
        let history = self.sessions.load(session_id).await?;
        self.chat.load_history(&history).await;
        let messages = self.chat.snapshot().await;
        self.search.lock().await.dispatch(SearchAction::LoadSession {
            session_id: history.session_id,
            messages: messages.clone(),
        });
        Ok(messages)
    }

    pub async fn new_chat(&self) {
        self.chat.new_chat().await;
        self.search.lock().await.dispatch(SearchAction::ClearSession);
    }

    /// Deletes a session; if it is the one on screen, a fresh chat is started.
    pub async fn delete_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<ChatSessionSummary>, ApiError> {
        let sessions = self.sessions.delete(session_id).await?;
        let active = {
            let conversation = self.chat.conversation();
            let conversation = conversation.lock().await;
            conversation.session_id() == Some(session_id)
        };
        if active {
            self.new_chat().await;
        }
        Ok(sessions)
    }

    /// Starts refreshing the recent-sessions list every configured interval.
    /// No-op in demo mode, where there is no backend to poll.
    pub async fn start_session_polling<F>(&self, on_refresh: F)
    where
        F: Fn(Vec<ChatSessionSummary>) + Send + Sync + 'static,
    {
        if self.config.demo_mode {
            return;
        }
        let store = self.sessions.clone();
        let on_refresh = std::sync::Arc::new(on_refresh);
        let poller = Poller::start(self.config.session_poll_interval(), move || {
            let store = store.clone();
            let on_refresh = on_refresh.clone();
            async move {
                match store.refresh().await {
                    Ok(sessions) => on_refresh(sessions),
                    Err(error) => tracing::warn!(%error, "session refresh failed"),
                }
            }
        });
        *self.poller.lock().await = Some(poller);
    }

    pub async fn stop_session_polling(&self) {
        self.poller.lock().await.take();
    }
}

#[cfg(feature = "desktop")]
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    // Only log WARN and above in production to avoid leaking chat content.
    let default_level = if cfg!(debug_assertions) { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use std::sync::Arc;
    use tauri::{Emitter, Manager};

    use crate::chat::Conversation;

    let _ = dotenvy::dotenv();
    init_tracing();
    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(error = %format!("{error:#}"), "invalid configuration, using defaults");
            ClientConfig::default()
        }
    };

    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .invoke_handler(tauri::generate_handler![
            commands::send_message,
            commands::get_conversation,
            commands::new_chat,
            commands::take_notices,
            commands::list_sessions,
            commands::load_session,
            commands::rename_session,
            commands::delete_session,
            commands::dispatch_search,
            commands::get_search_state,
            commands::list_records,
            commands::get_dog,
            commands::upload_csv,
            commands::check_applications_csv,
            commands::save_csv_template,
            commands::get_index_stats,
            commands::get_dashboard,
            commands::get_outcome_stats,
            commands::render_markdown,
            commands::open_external_url,
        ])
        .setup(move |app| {
            let handle = app.handle().clone();
            let observer: ConversationObserver = Arc::new(move |conversation: &Conversation| {
                let _ = handle.emit(commands::CONVERSATION_UPDATED, conversation.messages());
            });
            let state = AppState::new(config)
                .map_err(|e| format!("{e:#}"))?
                .with_chat_observer(observer);
            app.manage(state);

            let handle = app.handle().clone();
            tauri::async_runtime::spawn(async move {
                commands::startup_init(handle).await;
            });
            Ok(())
        })
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
