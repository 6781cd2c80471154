// Integration tests for the agent server router
//
// The agent runs on the in-memory EchoChatClient, so every test drives the
// full HTTP stack without reaching Azure.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use docagent_core::memory::EchoChatClient;
use docagent_core::{
    documentation_agent, AgentDefinition, ChatAgent, ChatClient, CleanupPolicy, PersistenceMode,
    RemoteAgent, Result, RunOutput, RunRequest,
};
use docagent_server::protocol::ResponseObject;
use docagent_server::{AgentServer, ServerSettings};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn server_with(client: Arc<EchoChatClient>, settings: ServerSettings) -> AgentServer {
    let agent = ChatAgent::new(client, documentation_agent(), CleanupPolicy::Keep);
    AgentServer::new(agent).with_settings(settings)
}

fn app(client: Arc<EchoChatClient>) -> Router {
    server_with(client, ServerSettings::default()).router()
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Vec<u8>) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_response_from_text_input() {
    let client = Arc::new(EchoChatClient::new("gpt-test"));
    let app = app(client.clone());

    let (status, body) = post_json(&app, "/responses", json!({ "input": "What is Azure?" })).await;

    assert_eq!(status, StatusCode::OK);
    let response: ResponseObject = serde_json::from_slice(&body).unwrap();
    assert_eq!(response.object, "response");
    assert!(response.id.starts_with("resp_"));
    assert!(response.conversation.id.starts_with("conv_"));
    assert_eq!(response.model.as_deref(), Some("gpt-test"));
    assert_eq!(response.output_text(), "Echo: What is Azure?");
    assert_eq!(response.output[0].role, "assistant");
    assert_eq!(client.agents_created(), 1);
}

#[tokio::test]
async fn test_response_from_message_items() {
    let client = Arc::new(EchoChatClient::new("gpt-test"));
    let app = app(client);

    let (status, body) = post_json(
        &app,
        "/responses",
        json!({
            "input": [
                { "role": "user", "content": [{ "type": "input_text", "text": "List Azure regions" }] }
            ],
            "metadata": { "source": "test" }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let response: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(response["status"], "completed");
    assert_eq!(response["output"][0]["type"], "message");
    assert_eq!(response["output"][0]["content"][0]["type"], "output_text");
    assert_eq!(
        response["output"][0]["content"][0]["text"],
        "Echo: List Azure regions"
    );
    assert_eq!(response["metadata"]["source"], "test");
}

#[tokio::test]
async fn test_conversation_reuses_service_thread() {
    let client = Arc::new(EchoChatClient::new("gpt-test"));
    let app = app(client.clone());

    let request = |text: &str| json!({ "input": text, "conversation": "conv_docs" });
    let (status, _) = post_json(&app, "/responses", request("first")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = post_json(&app, "/responses", request("second")).await;
    assert_eq!(status, StatusCode::OK);

    let response: ResponseObject = serde_json::from_slice(&body).unwrap();
    assert_eq!(response.conversation.id, "conv_docs");
    assert_eq!(client.thread_count().await, 1);
    assert_eq!(client.thread_messages("thread_echo_1").await.len(), 4);
    // Keep policy registers the agent once for the whole conversation
    assert_eq!(client.agents_created(), 1);
}

#[tokio::test]
async fn test_stateless_mode_starts_fresh_threads() {
    let client = Arc::new(EchoChatClient::new("gpt-test"));
    let app = server_with(client.clone(), ServerSettings::default())
        .with_persistence(PersistenceMode::Stateless)
        .router();

    let request = |text: &str| json!({ "input": text, "conversation": { "id": "conv_docs" } });
    let (status, _) = post_json(&app, "/responses", request("first")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = post_json(&app, "/responses", request("second")).await;
    assert_eq!(status, StatusCode::OK);
    post_json(&app, "/responses", request("third")).await;

    // Every turn ran on its own thread, and each was deleted afterwards
    assert_eq!(client.runs(), 3);
    assert_eq!(client.thread_count().await, 0);
}

#[tokio::test]
async fn test_stateless_stream_deletes_thread() {
    let client = Arc::new(EchoChatClient::new("gpt-test"));
    let app = server_with(client.clone(), ServerSettings::default())
        .with_persistence(PersistenceMode::Stateless)
        .router();

    let (status, body) = post_json(
        &app,
        "/responses",
        json!({ "input": "stream me", "stream": true }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("response.completed"));
    assert_eq!(client.runs(), 1);
    assert_eq!(client.thread_count().await, 0);
}

/// Echo client that yields to the scheduler inside every remote call, so
/// concurrent turns interleave at each await
struct YieldingChatClient {
    inner: Arc<EchoChatClient>,
}

#[async_trait]
impl ChatClient for YieldingChatClient {
    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn create_agent(&self, definition: &AgentDefinition) -> Result<RemoteAgent> {
        self.inner.create_agent(definition).await
    }

    async fn create_thread(&self) -> Result<String> {
        tokio::task::yield_now().await;
        self.inner.create_thread().await
    }

    async fn run(&self, request: RunRequest<'_>) -> Result<RunOutput> {
        tokio::task::yield_now().await;
        let output = self.inner.run(request).await;
        tokio::task::yield_now().await;
        output
    }

    async fn delete_agent(&self, agent_id: &str) -> Result<()> {
        self.inner.delete_agent(agent_id).await
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        self.inner.delete_thread(thread_id).await
    }
}

#[tokio::test]
async fn test_concurrent_turns_share_one_thread() {
    let echo = Arc::new(EchoChatClient::new("gpt-test"));
    let client = Arc::new(YieldingChatClient {
        inner: echo.clone(),
    });
    let agent = ChatAgent::new(client, documentation_agent(), CleanupPolicy::Keep);
    let app = AgentServer::new(agent).router();

    let request = |text: &str| json!({ "input": text, "conversation": "conv_same" });
    let (first, second) = tokio::join!(
        post_json(&app, "/responses", request("first")),
        post_json(&app, "/responses", request("second")),
    );
    assert_eq!(first.0, StatusCode::OK);
    assert_eq!(second.0, StatusCode::OK);

    let (status, _) = post_json(&app, "/responses", request("third")).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(echo.thread_count().await, 1);
    assert_eq!(echo.thread_messages("thread_echo_1").await.len(), 6);
}

#[tokio::test]
async fn test_empty_input_rejected() {
    let client = Arc::new(EchoChatClient::new("gpt-test"));
    let app = app(client.clone());

    let (status, body) = post_json(&app, "/responses", json!({ "input": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert!(error["error"].as_str().unwrap().contains("input"));

    let (status, _) = post_json(&app, "/responses", json!({ "input": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(client.runs(), 0);
}

#[tokio::test]
async fn test_runs_alias() {
    let client = Arc::new(EchoChatClient::new("gpt-test"));
    let app = app(client);

    let (status, body) = post_json(&app, "/runs", json!({ "input": "hello" })).await;

    assert_eq!(status, StatusCode::OK);
    let response: ResponseObject = serde_json::from_slice(&body).unwrap();
    assert_eq!(response.output_text(), "Echo: hello");
}

#[tokio::test]
async fn test_stream_emits_lifecycle_events() {
    let client = Arc::new(EchoChatClient::new("gpt-test"));
    let app = app(client);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/responses")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "input": "stream me", "stream": true }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/event-stream"));

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();

    let created = text.find("event: response.created").unwrap();
    let delta = text.find("event: response.output_text.delta").unwrap();
    let done = text.find("event: response.output_text.done").unwrap();
    let completed = text.find("event: response.completed").unwrap();
    assert!(created < delta && delta < done && done < completed);
    assert!(text.contains("Echo: stream me"));
    assert!(!text.contains("response.failed"));
}

#[tokio::test]
async fn test_stream_reports_failure_as_event() {
    let client = Arc::new(EchoChatClient::failing("gpt-test", 500));
    let app = app(client);

    let (status, body) = post_json(
        &app,
        "/responses",
        json!({ "input": "stream me", "stream": true }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("event: response.created"));
    assert!(text.contains("event: response.failed"));
    assert!(text.contains("server_error"));
}

#[tokio::test]
async fn test_remote_failure_maps_to_bad_gateway() {
    let client = Arc::new(EchoChatClient::failing("gpt-test", 500));
    let app = app(client);

    let (status, body) = post_json(&app, "/responses", json!({ "input": "hello" })).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert!(error["error"].as_str().unwrap().contains("500"));
}

#[tokio::test]
async fn test_health_endpoints() {
    let client = Arc::new(EchoChatClient::new("gpt-test"));
    let app = app(client);

    let (status, body) = get(&app, "/liveness").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");

    let (status, body) = get(&app, "/readiness").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");

    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["agent"], "Microsoft Documentation Agent");
    assert_eq!(body["model"], "gpt-test");
}

#[tokio::test]
async fn test_readiness_without_model() {
    let client = Arc::new(EchoChatClient::new(""));
    let app = app(client);

    let (status, body) = get(&app, "/readiness").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "not_configured");
}

#[tokio::test]
async fn test_api_prefix_applies_to_protocol_routes_only() {
    let client = Arc::new(EchoChatClient::new("gpt-test"));
    let settings = ServerSettings {
        api_prefix: "/agent".to_string(),
        ..ServerSettings::default()
    };
    let app = server_with(client, settings).router();

    let (status, _) = post_json(&app, "/agent/responses", json!({ "input": "hi" })).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post_json(&app, "/responses", json!({ "input": "hi" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&app, "/liveness").await;
    assert_eq!(status, StatusCode::OK);
}
