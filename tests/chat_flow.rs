use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use anyhow::Result;
use pawbond_client::api::ApiClient;
use pawbond_client::chat::{ChatService, Conversation, ConversationObserver, Phase, Responder};
use pawbond_client::config::ClientConfig;
use pawbond_client::demo::DemoResponder;
use pawbond_client::router::{ChatRoute, Router};
use pawbond_client::types::{MessageStatus, NoticeLevel, Role};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ANXIETY_QUERY: &str = "Find adopters who can handle a dog with separation anxiety";

fn live_service(server: &MockServer) -> ChatService {
    let config = ClientConfig {
        api_url: format!("{}/api/v1", server.uri()),
        ..ClientConfig::default()
    };
    let api = ApiClient::new(&config).unwrap();
    ChatService::new(Router::default(), Responder::Live(api))
}

/// Records the phase seen by every observer notification.
fn phase_recorder() -> (ConversationObserver, Arc<StdMutex<Vec<Phase>>>) {
    let phases = Arc::new(StdMutex::new(Vec::new()));
    let seen = phases.clone();
    let observer: ConversationObserver = Arc::new(move |conversation: &Conversation| {
        seen.lock().unwrap().push(conversation.phase());
    });
    (observer, phases)
}

async fn mount_session_endpoints(server: &MockServer, saves: u64) {
    Mock::given(method("POST"))
        .and(path("/api/v1/chat-history/new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"session_id": "s-42"})))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat-history/save"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(saves)
        .mount(server)
        .await;
}

#[tokio::test]
async fn anxiety_query_yields_match_cards() -> Result<()> {
    let server = MockServer::start().await;
    mount_session_endpoints(&server, 2).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/message"))
        .and(body_partial_json(json!({
            "message": ANXIETY_QUERY,
            "context": {"session_id": "s-42"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "intent": "find_adopters",
            "response": {
                "message": "I found 3 adopters",
                "matches": [
                    {"_id": "a1", "_score": 0.91, "_source": {
                        "applicant_name": "Sarah Chen", "housing_type": "House",
                        "experience_level": "Experienced", "has_yard": true
                    }},
                    {"_id": "a2", "_score": 8.2, "_source": {"applicant_name": "Marcus"}},
                    {"id": "a3", "score": 42, "data": {}}
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (observer, phases) = phase_recorder();
    let service = live_service(&server).with_observer(observer);
    assert_eq!(service.router().classify(ANXIETY_QUERY), ChatRoute::BehavioralAnxiety);

    let reply_id = service.send(ANXIETY_QUERY).await.unwrap();
    let messages = service.snapshot().await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);

    let reply = &messages[1];
    assert_eq!(reply.id, reply_id);
    assert_eq!(reply.status, MessageStatus::Complete);
    assert_eq!(reply.intent.as_deref(), Some("find_adopters"));
    assert_eq!(reply.content, "I found 3 adopters");

    let matches = reply.attachments.matches.as_ref().unwrap();
    let scores: Vec<u8> = matches.iter().map(|m| m.score).collect();
    assert_eq!(scores, [91, 82, 42]);
    assert!(scores.iter().all(|s| *s <= 100));
    assert_eq!(matches[0].housing, "House");
    assert_eq!(matches[2].name, "Unknown Applicant");
    assert_eq!(matches[2].experience, "Not specified");

    let phases = phases.lock().unwrap().clone();
    assert_eq!(phases.first(), Some(&Phase::Loading));
    assert_eq!(phases.last(), Some(&Phase::Idle));

    let conversation = service.conversation();
    assert_eq!(conversation.lock().await.session_id(), Some("s-42"));
    Ok(())
}

#[tokio::test]
async fn backend_failure_becomes_error_bubble() -> Result<()> {
    let server = MockServer::start().await;
    mount_session_endpoints(&server, 0).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/message"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({"detail": "Search backend unavailable"})),
        )
        .mount(&server)
        .await;

    let service = live_service(&server);
    service.send("hello there").await.unwrap();

    let messages = service.snapshot().await;
    let reply = &messages[1];
    assert_eq!(reply.status, MessageStatus::Error);
    assert!(reply.content.contains("Search backend unavailable"));

    let notices = service.take_notices().await;
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    Ok(())
}

#[tokio::test]
async fn chat_still_works_when_session_cannot_be_opened() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat-history/new"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/message"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true, "intent": "general", "response": "Hello!"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = live_service(&server);
    service.send("hi").await.unwrap();
    let messages = service.snapshot().await;
    assert_eq!(messages[1].content, "Hello!");
    assert_eq!(service.conversation().lock().await.session_id(), None);
    Ok(())
}

#[tokio::test]
async fn application_review_goes_to_analysis_endpoint() -> Result<()> {
    let server = MockServer::start().await;
    mount_session_endpoints(&server, 2).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/analyze-application"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "analysis": {
                "summary": "Strong, well-prepared applicant",
                "recommendation": "approve",
                "sentiment": {"score": 0.8},
                "commitment_assessment": {"commitment_level": "High"}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = live_service(&server);
    service
        .send("Please review this application: we have a big garden and work from home")
        .await
        .unwrap();

    let messages = service.snapshot().await;
    let reply = &messages[1];
    assert_eq!(reply.content, "Strong, well-prepared applicant");
    let card = reply.attachments.application_analysis.as_ref().unwrap();
    assert_eq!(card.recommendation.as_deref(), Some("approve"));
    assert_eq!(card.commitment_level.as_deref(), Some("High"));
    assert_eq!(card.sentiment_score, Some(0.8));
    Ok(())
}

#[tokio::test]
async fn markup_in_replies_is_escaped_when_rendered() -> Result<()> {
    let server = MockServer::start().await;
    mount_session_endpoints(&server, 2).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/message"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "intent": "general",
            "response": "<script>alert(1)</script> **ok**"
        })))
        .mount(&server)
        .await;

    let service = live_service(&server);
    service.send("hi").await.unwrap();
    let messages = service.snapshot().await;
    let html = pawbond_client::markdown::render_markdown(&messages[1].content);
    assert!(!html.contains("<script>"));
    assert!(html.contains("<strong>ok</strong>"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn demo_pipeline_streams_stages() {
    let (observer, phases) = phase_recorder();
    let service = ChatService::new(
        Router::default(),
        Responder::Demo(DemoResponder::new(Duration::from_millis(800))),
    )
    .with_observer(observer);

    let started = tokio::time::Instant::now();
    service.send(ANXIETY_QUERY).await.unwrap();
    // Four running stages plus the answer.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(800 * 5), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(800 * 5 + 100), "{elapsed:?}");

    let messages = service.snapshot().await;
    let reply = &messages[1];
    assert_eq!(reply.status, MessageStatus::Complete);
    assert_eq!(reply.intent.as_deref(), Some("find_adopters"));
    let matches = reply.attachments.matches.as_ref().unwrap();
    assert!(!matches.is_empty());
    assert!(matches.iter().all(|m| m.score <= 100));

    let phases = phases.lock().unwrap().clone();
    // begin_turn, four intermediate stages, final answer.
    assert_eq!(phases.len(), 6);
    assert!(phases[..5].iter().all(|p| *p == Phase::Loading));
    assert_eq!(phases[5], Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn overlapping_demo_turns_keep_order() {
    let service = ChatService::new(
        Router::default(),
        Responder::Demo(DemoResponder::new(Duration::from_millis(100))),
    );

    // The general reply has one stage, so it finishes long before the first one.
    let (first, second) = tokio::join!(service.send(ANXIETY_QUERY), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        service.send("hello").await
    });
    assert!(first.unwrap() < second.unwrap());

    let messages = service.snapshot().await;
    let contents: Vec<(Role, &str)> = messages
        .iter()
        .map(|m| (m.role, m.content.as_str()))
        .collect();
    assert_eq!(contents.len(), 4);
    assert_eq!(contents[0], (Role::User, ANXIETY_QUERY));
    assert_eq!(contents[1].0, Role::Assistant);
    assert!(contents[1].1.contains("separation anxiety"));
    assert_eq!(contents[2], (Role::User, "hello"));
    assert!(messages.iter().all(|m| m.status == MessageStatus::Complete));
}

#[tokio::test(start_paused = true)]
async fn new_chat_abandons_demo_turn() {
    let service = ChatService::new(
        Router::default(),
        Responder::Demo(DemoResponder::new(Duration::from_millis(100))),
    );

    let (_, _) = tokio::join!(service.send(ANXIETY_QUERY), async {
        tokio::time::sleep(Duration::from_millis(150)).await;
        service.new_chat().await;
    });
    assert!(service.snapshot().await.is_empty());
}
