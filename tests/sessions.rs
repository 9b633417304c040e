use std::time::Duration;

use anyhow::Result;
use pawbond_client::config::ClientConfig;
use pawbond_client::types::{MessageStatus, Role};
use pawbond_client::AppState;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn state_for(server: &MockServer, session_limit: usize) -> AppState {
    let config = ClientConfig {
        api_url: format!("{}/api/v1", server.uri()),
        session_limit,
        ..ClientConfig::default()
    };
    AppState::new(config).unwrap()
}

fn session(id: &str, name: Option<&str>) -> serde_json::Value {
    json!({
        "session_id": id,
        "created_at": "2025-03-01T10:00:00",
        "updated_at": "2025-03-01T10:05:00",
        "message_count": 2,
        "preview": format!("Preview of {id}"),
        "name": name
    })
}

async fn mount_history(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/chat-history/s-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session_id": "s-1",
            "created_at": "2025-03-01T10:00:00",
            "updated_at": "2025-03-01T10:05:00",
            "message_count": 4,
            "messages": [
                {"role": "user", "content": "Find adopters with a yard", "timestamp": "2025-03-01T10:00:00"},
                {"role": "assistant", "content": "Two applicants fit", "intent": "find_adopters",
                 "timestamp": "2025-03-01T10:00:05",
                 "metadata": {"matches": [
                     {"_id": "a1", "_score": 0.7, "_source": {"applicant_name": "Priya"}},
                     {"_id": "a2", "_score": 6.5, "_source": {"applicant_name": "Tom"}}
                 ]}},
                {"role": "user", "content": "Thanks", "timestamp": "2025-03-01T10:01:00"},
                {"role": "assistant", "content": "You're welcome", "timestamp": "2025-03-01T10:01:02"}
            ]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn loading_a_session_replaces_the_conversation() -> Result<()> {
    let server = MockServer::start().await;
    mount_history(&server).await;
    let state = state_for(&server, 20);

    let messages = state.load_session("s-1").await?;
    assert_eq!(messages.len(), 4);
    let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, [Role::User, Role::Assistant, Role::User, Role::Assistant]);
    assert!(messages.iter().all(|m| m.status == MessageStatus::Complete));

    let with_cards: Vec<usize> = messages
        .iter()
        .enumerate()
        .filter(|(_, m)| !m.attachments.is_empty())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(with_cards, [1]);
    let scores: Vec<u8> = messages[1]
        .attachments
        .matches
        .as_ref()
        .unwrap()
        .iter()
        .map(|m| m.score)
        .collect();
    assert_eq!(scores, [70, 65]);

    assert_eq!(state.chat.snapshot().await.len(), 4);
    let search = state.search.lock().await.clone();
    assert_eq!(search.loaded_session.map(|s| s.session_id).as_deref(), Some("s-1"));
    Ok(())
}

#[tokio::test]
async fn missing_session_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/chat-history/gone"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"detail": "Session not found"})),
        )
        .mount(&server)
        .await;
    let state = state_for(&server, 20);

    let err = state.load_session("gone").await.unwrap_err();
    assert_eq!(err.user_message(), "Session not found");
    assert!(state.chat.snapshot().await.is_empty());
}

#[tokio::test]
async fn refresh_respects_limit() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/chat-history/sessions"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sessions": [session("s-1", None), session("s-2", Some("Yard search")), session("s-3", None)],
            "total": 3
        })))
        .expect(1)
        .mount(&server)
        .await;
    let state = state_for(&server, 2);

    let sessions = state.sessions.refresh().await?;
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[1].title(), "Yard search");
    assert_eq!(state.sessions.sessions().await.len(), 2);
    Ok(())
}

#[tokio::test]
async fn rename_then_refresh() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/v1/chat-history/s-1/name"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/chat-history/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sessions": [session("s-1", Some("Bella's adopters"))],
            "total": 1
        })))
        .mount(&server)
        .await;
    let state = state_for(&server, 20);

    let sessions = state.sessions.rename("s-1", "Bella's adopters").await?;
    assert_eq!(sessions[0].title(), "Bella's adopters");
    Ok(())
}

#[tokio::test]
async fn deleting_the_open_session_starts_a_new_chat() -> Result<()> {
    let server = MockServer::start().await;
    mount_history(&server).await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/chat-history/s-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/chat-history/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sessions": [session("s-2", None)],
            "total": 1
        })))
        .mount(&server)
        .await;
    let state = state_for(&server, 20);

    state.load_session("s-1").await?;
    let sessions = state.delete_session("s-1").await?;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].session_id, "s-2");
    assert!(state.chat.snapshot().await.is_empty());
    assert!(state.search.lock().await.loaded_session.is_none());
    Ok(())
}

#[tokio::test]
async fn failed_refresh_after_delete_keeps_local_list() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/chat-history/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sessions": [session("s-1", None), session("s-2", None)],
            "total": 2
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/chat-history/sessions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/chat-history/s-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&server)
        .await;
    let state = state_for(&server, 20);

    state.sessions.refresh().await?;
    let sessions = state.sessions.delete("s-1").await?;
    let ids: Vec<&str> = sessions.iter().map(|s| s.session_id.as_str()).collect();
    assert_eq!(ids, ["s-2"]);
    Ok(())
}

#[tokio::test]
async fn polling_publishes_refreshed_sessions() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/chat-history/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sessions": [session("s-1", None)],
            "total": 1
        })))
        .mount(&server)
        .await;
    let state = state_for(&server, 20);

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    state
        .start_session_polling(move |sessions| {
            let _ = tx.send(sessions);
        })
        .await;

    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await?
        .expect("poller published a list");
    assert_eq!(first[0].session_id, "s-1");
    state.stop_session_polling().await;
    Ok(())
}

#[tokio::test]
async fn demo_mode_does_not_poll() {
    let config = ClientConfig {
        api_url: "http://127.0.0.1:1/api/v1".to_string(),
        demo_mode: true,
        ..ClientConfig::default()
    };
    let state = AppState::new(config).unwrap();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<usize>();
    state
        .start_session_polling(move |sessions| {
            let _ = tx.send(sessions.len());
        })
        .await;
    // The callback (and with it the sender) was dropped without being run.
    assert!(rx.recv().await.is_none());
}
