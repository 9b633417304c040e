use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::demo::DemoResponder;
use crate::error::ApiError;
use crate::normalize::{normalize_analysis_response, normalize_chat_response, AssistantReply};
use crate::router::{ChatRoute, Router};
use crate::sessions::reconcile_history;
use crate::types::{Attachments, Message, MessageStatus, Notice, Role, SessionHistory};

/// Monotonic message id source. Ids are never reused within a conversation,
/// even across "new chat" and session loads.
#[derive(Debug, Default)]
pub struct MessageIds {
    next: u64,
}

impl MessageIds {
    pub fn next_id(&mut self) -> u64 {
        self.next += 1;
        self.next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Loading,
}

/// A turn that has been started but not yet answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub user_id: u64,
    pub reply_id: u64,
    pub route: ChatRoute,
    pub text: String,
    pub session_id: Option<String>,
}

/// Messages of the chat page plus the toasts waiting to be shown.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    ids: MessageIds,
    session_id: Option<String>,
    notices: Vec<Notice>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn set_session_id(&mut self, session_id: Option<String>) {
        self.session_id = session_id;
    }

    /// Loading while any reply placeholder is still pending.
    pub fn phase(&self) -> Phase {
        if self
            .messages
            .iter()
            .any(|m| m.status == MessageStatus::Pending)
        {
            Phase::Loading
        } else {
            Phase::Idle
        }
    }

    /// Appends the user message and its reply placeholder together, so the
    /// reply keeps its slot however late it arrives. Blank input is ignored.
    pub fn begin_turn(&mut self, text: &str, route: ChatRoute) -> Option<Turn> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let user_id = self.ids.next_id();
        let reply_id = self.ids.next_id();
        let now = Utc::now();
        self.messages.push(Message {
            id: user_id,
            role: Role::User,
            content: text.to_string(),
            timestamp: now,
            status: MessageStatus::Complete,
            intent: None,
            attachments: Attachments::default(),
        });
        self.messages.push(Message {
            id: reply_id,
            role: Role::Assistant,
            content: String::new(),
            timestamp: now,
            status: MessageStatus::Pending,
            intent: None,
            attachments: Attachments::default(),
        });
        Some(Turn {
            user_id,
            reply_id,
            route,
            text: text.to_string(),
            session_id: self.session_id.clone(),
        })
    }

    fn pending_mut(&mut self, reply_id: u64) -> Option<&mut Message> {
        self.messages
            .iter_mut()
            .find(|m| m.id == reply_id && m.status == MessageStatus::Pending)
    }

    /// Rewrites a still-pending placeholder (intermediate pipeline stage).
    pub fn update_pending(
        &mut self,
        reply_id: u64,
        content: &str,
        attachments: Attachments,
    ) -> bool {
        match self.pending_mut(reply_id) {
            Some(message) => {
                message.content = content.to_string();
                message.attachments = attachments;
                true
            }
            None => false,
        }
    }

    /// Fills the placeholder with the final reply. Returns false when the
    /// placeholder is gone (new chat or another session loaded meanwhile).
    pub fn complete_turn(&mut self, reply_id: u64, reply: AssistantReply) -> bool {
        match self.pending_mut(reply_id) {
            Some(message) => {
                message.content = reply.content;
                message.intent = reply.intent;
                message.attachments = reply.attachments;
                message.status = MessageStatus::Complete;
                message.timestamp = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Turns the placeholder into a visible error bubble and queues a toast.
    pub fn fail_turn(&mut self, reply_id: u64, error: &ApiError) -> bool {
        let text = error.user_message();
        let filled = match self.pending_mut(reply_id) {
            Some(message) => {
                message.content = format!("Sorry, I couldn't process that request. {text}");
                message.status = MessageStatus::Error;
                message.timestamp = Utc::now();
                true
            }
            None => false,
        };
        self.notices.push(Notice::error(text));
        filled
    }

    /// Starts a fresh chat. Ids keep counting up.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.session_id = None;
    }

    /// Replaces the visible messages with a persisted session.
    pub fn load_history(&mut self, history: &SessionHistory) {
        self.messages = reconcile_history(history, &mut self.ids);
        self.session_id = Some(history.session_id.clone());
    }

    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

/// Called after every change to the conversation (the desktop shell emits
/// an event from it).
pub type ConversationObserver = Arc<dyn Fn(&Conversation) + Send + Sync>;

/// Produces assistant replies.
#[derive(Clone)]
pub enum Responder {
    Live(ApiClient),
    Demo(DemoResponder),
}

/// Drives chat turns against a [`Responder`].
#[derive(Clone)]
pub struct ChatService {
    conversation: Arc<Mutex<Conversation>>,
    router: Router,
    responder: Responder,
    observer: Option<ConversationObserver>,
}

impl ChatService {
    pub fn new(router: Router, responder: Responder) -> Self {
        Self {
            conversation: Arc::new(Mutex::new(Conversation::new())),
            router,
            responder,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: ConversationObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn conversation(&self) -> Arc<Mutex<Conversation>> {
        self.conversation.clone()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    fn notify(&self, conversation: &Conversation) {
        if let Some(observer) = &self.observer {
            observer(conversation);
        }
    }

    pub async fn snapshot(&self) -> Vec<Message> {
        self.conversation.lock().await.messages().to_vec()
    }

    pub async fn new_chat(&self) {
        let mut conversation = self.conversation.lock().await;
        conversation.reset();
        self.notify(&conversation);
    }

    pub async fn load_history(&self, history: &SessionHistory) {
        let mut conversation = self.conversation.lock().await;
        conversation.load_history(history);
        info!(
            session_id = %history.session_id,
            count = conversation.messages().len(),
            "session loaded"
        );
        self.notify(&conversation);
    }

    /// Queues a toast that is not tied to a chat turn.
    pub async fn push_notice(&self, notice: Notice) {
        self.conversation.lock().await.push_notice(notice);
    }

    pub async fn take_notices(&self) -> Vec<Notice> {
        self.conversation.lock().await.take_notices()
    }

    /// Runs one chat turn to completion and returns the reply message id,
    /// or `None` for blank input. Transport failures end up in the
    /// conversation as an error bubble plus a notice, never as `Err`.
    pub async fn send(&self, text: &str) -> Option<u64> {
        let route = self.router.classify(text);
        let turn = {
            let mut conversation = self.conversation.lock().await;
            let turn = conversation.begin_turn(text, route)?;
            self.notify(&conversation);
            turn
        };
        debug!(route = ?turn.route, reply_id = turn.reply_id, "chat turn started");

        match &self.responder {
            Responder::Live(api) => self.answer_live(api, &turn).await,
            Responder::Demo(demo) => self.answer_demo(demo, &turn).await,
        }
        Some(turn.reply_id)
    }

    async fn answer_live(&self, api: &ApiClient, turn: &Turn) {
        let session_id = match &turn.session_id {
            Some(id) => Some(id.clone()),
            None => self.open_session(api).await,
        };

        let result = match turn.route {
            ChatRoute::ApplicationAnalysis => api
                .analyze_application(&turn.text)
                .await
                .map(|body| normalize_analysis_response(&body)),
            _ => api
                .send_chat_message(&turn.text, session_id.as_deref())
                .await
                .map(|body| normalize_chat_response(&body)),
        };

        let persisted = {
            let mut conversation = self.conversation.lock().await;
            let persisted = match result {
                Ok(reply) => {
                    let saved = reply.clone();
                    conversation
                        .complete_turn(turn.reply_id, reply)
                        .then_some(saved)
                }
                Err(error) => {
                    warn!(%error, "chat request failed");
                    conversation.fail_turn(turn.reply_id, &error);
                    None
                }
            };
            self.notify(&conversation);
            persisted
        };

        if let (Some(reply), Some(session_id)) = (persisted, session_id) {
            persist_turn(api, &session_id, &turn.text, &reply).await;
        }
    }

    /// Asks the backend for a session id the first time a chat is used.
    /// Persistence is best effort: without an id the chat still works.
    async fn open_session(&self, api: &ApiClient) -> Option<String> {
        match api.new_session().await {
            Ok(id) => {
                let mut conversation = self.conversation.lock().await;
                if conversation.session_id().is_none() {
                    conversation.set_session_id(Some(id));
                }
                conversation.session_id().map(str::to_string)
            }
            Err(error) => {
                warn!(%error, "could not open a chat session; history will not be saved");
                None
            }
        }
    }

    async fn answer_demo(&self, demo: &DemoResponder, turn: &Turn) {
        let stages = demo.stages(turn.route, &turn.text);
        let last = stages.len().saturating_sub(1);
        for (i, stage) in stages.into_iter().enumerate() {
            tokio::time::sleep(stage.delay).await;
            let mut conversation = self.conversation.lock().await;
            let applied = if i == last {
                conversation.complete_turn(
                    turn.reply_id,
                    AssistantReply {
                        content: stage.content,
                        intent: Some(demo_intent(turn.route).to_string()),
                        attachments: stage.attachments,
                    },
                )
            } else {
                conversation.update_pending(turn.reply_id, &stage.content, stage.attachments)
            };
            self.notify(&conversation);
            if !applied {
                debug!(reply_id = turn.reply_id, "demo turn abandoned");
                return;
            }
        }
    }
}

fn demo_intent(route: ChatRoute) -> &'static str {
    match route {
        ChatRoute::BehavioralAnxiety | ChatRoute::MultiCriteria => "find_adopters",
        ChatRoute::ApplicationAnalysis => "analyze_application",
        ChatRoute::FosterReport => "foster_report",
        ChatRoute::Similarity => "find_similar",
        ChatRoute::General => "general",
    }
}

/// Saves both sides of a finished turn so the session can be reloaded.
async fn persist_turn(api: &ApiClient, session_id: &str, user_text: &str, reply: &AssistantReply) {
    let metadata = if reply.attachments.is_empty() {
        None
    } else {
        serde_json::to_value(&reply.attachments).ok()
    };
    let user = api
        .save_message(session_id, Role::User, user_text, None, None)
        .await;
    let assistant = api
        .save_message(
            session_id,
            Role::Assistant,
            &reply.content,
            reply.intent.as_deref(),
            metadata.as_ref(),
        )
        .await;
    if let Err(error) = user.and(assistant) {
        warn!(%error, session_id, "failed to save chat turn");
    }
}
