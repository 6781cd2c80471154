// Agent run HTTP routes
//
// POST /responses runs the agent on the request's input and answers with a
// response object, or a server-sent event stream when `stream` is set.
// POST /runs is the same handler under the older name.
//
// The conversation id maps to a thread through the ThreadRepository; the
// thread is stored back after every run, successful or not. Turns on the
// same conversation run one at a time. When the repository discards threads
// the service-side thread is deleted after the turn.

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::post,
    Json, Router,
};
use docagent_core::{AgentError, ChatAgent, ChatMessage, ThreadRepository};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, OwnedMutexGuard};
use tokio_stream::wrappers::ReceiverStream;
use utoipa::ToSchema;

use crate::protocol::{
    self, message_id, response_id, CreateResponseRequest, ResponseObject, StreamEvent,
};

// ============================================
// Error response
// ============================================

/// Standard error response for API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message describing what went wrong.
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Handler error: an agent error rendered as status + ErrorResponse
#[derive(Debug)]
pub struct ApiError(pub AgentError);

impl From<AgentError> for ApiError {
    fn from(error: AgentError) -> Self {
        ApiError(error)
    }
}

/// HTTP status for an agent error
pub fn status_for(error: &AgentError) -> StatusCode {
    match error {
        AgentError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        AgentError::ApprovalRequired(_) => StatusCode::CONFLICT,
        AgentError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        AgentError::Authentication(_)
        | AgentError::Remote { .. }
        | AgentError::Transport(_)
        | AgentError::RunFailed { .. } => StatusCode::BAD_GATEWAY,
        AgentError::Configuration(_) | AgentError::ThreadStore(_) | AgentError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Machine-readable code for a failed streamed response
fn error_code(error: &AgentError) -> &'static str {
    match error {
        AgentError::InvalidRequest(_) => "invalid_request",
        AgentError::ApprovalRequired(_) => "approval_required",
        AgentError::Timeout(_) => "timeout",
        AgentError::Configuration(_) => "configuration_error",
        AgentError::Authentication(_) => "authentication_error",
        _ => "server_error",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Agent request failed");
        } else {
            tracing::warn!(error = %self.0, "Agent request rejected");
        }
        (status, Json(ErrorResponse::new(self.0.to_string()))).into_response()
    }
}

// ============================================
// App State and Routes
// ============================================

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<ChatAgent>,
    pub threads: Arc<dyn ThreadRepository>,
    pub conversations: ConversationLocks,
}

impl AppState {
    pub fn new(agent: Arc<ChatAgent>, threads: Arc<dyn ThreadRepository>) -> Self {
        Self {
            agent,
            threads,
            conversations: ConversationLocks::default(),
        }
    }
}

type LockMap = HashMap<String, Arc<tokio::sync::Mutex<()>>>;

/// One async lock per conversation id
///
/// Entries live only while a turn holds or waits for them.
#[derive(Clone, Default)]
pub struct ConversationLocks {
    locks: Arc<Mutex<LockMap>>,
}

impl ConversationLocks {
    /// Wait until no other turn holds `conversation_id`
    pub async fn acquire(&self, conversation_id: &str) -> ConversationGuard {
        let lock = self
            .map()
            .entry(conversation_id.to_string())
            .or_default()
            .clone();
        ConversationGuard {
            conversation_id: conversation_id.to_string(),
            locks: self.clone(),
            guard: lock.lock_owned().await,
        }
    }

    /// Number of conversations with a turn running or waiting
    pub fn active(&self) -> usize {
        self.map().len()
    }

    fn map(&self) -> MutexGuard<'_, LockMap> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Held for the whole of one turn
pub struct ConversationGuard {
    conversation_id: String,
    locks: ConversationLocks,
    guard: OwnedMutexGuard<()>,
}

impl Drop for ConversationGuard {
    fn drop(&mut self) {
        let mut locks = self.locks.map();
        let idle = locks.get(&self.conversation_id).is_some_and(|lock| {
            // Only the map and this guard refer to it
            Arc::ptr_eq(lock, OwnedMutexGuard::mutex(&self.guard)) && Arc::strong_count(lock) == 2
        });
        if idle {
            locks.remove(&self.conversation_id);
        }
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/responses", post(create_response))
        .route("/runs", post(create_response))
        .with_state(state)
}

// ============================================
// HTTP Handlers
// ============================================

/// POST /responses - Run the agent
#[utoipa::path(
    post,
    path = "/responses",
    request_body = CreateResponseRequest,
    responses(
        (status = 200, description = "Agent response, or an event stream when `stream` is true", content(
            (ResponseObject = "application/json"),
            (StreamEvent = "text/event-stream")
        )),
        (status = 400, description = "Empty or invalid input", body = ErrorResponse),
        (status = 409, description = "A tool call needs approval", body = ErrorResponse),
        (status = 502, description = "Agents service or identity provider failed", body = ErrorResponse),
        (status = 504, description = "Run timed out", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "responses"
)]
pub async fn create_response(
    State(state): State<AppState>,
    Json(request): Json<CreateResponseRequest>,
) -> Result<Response, ApiError> {
    let messages = request
        .input
        .to_messages()
        .map_err(AgentError::invalid)?;
    if messages.is_empty() {
        return Err(AgentError::invalid("input must contain at least one non-empty message").into());
    }

    let conversation_id = request
        .conversation
        .as_ref()
        .map(|conversation| conversation.id().to_string())
        .unwrap_or_else(protocol::conversation_id);

    let model = Some(state.agent.model().to_string()).filter(|model| !model.is_empty());
    let response = ResponseObject::in_progress(
        response_id(),
        conversation_id.clone(),
        model,
        request.metadata,
    );

    tracing::info!(
        response_id = %response.id,
        conversation_id = %conversation_id,
        messages = messages.len(),
        stream = request.stream,
        "Running agent"
    );

    if request.stream {
        return Ok(stream_response(state, conversation_id, messages, response).into_response());
    }

    let answer = run_turn(&state, &conversation_id, messages).await?;
    Ok(Json(response.complete(message_id(), answer)).into_response())
}

/// Load the conversation's thread, run the agent, store the thread back
async fn run_turn(
    state: &AppState,
    conversation_id: &str,
    messages: Vec<ChatMessage>,
) -> Result<docagent_core::AgentResponse, AgentError> {
    let _turn = state.conversations.acquire(conversation_id).await;

    let mut thread = match state.threads.get(conversation_id).await? {
        Some(thread) => thread,
        None => state.agent.get_new_thread(),
    };

    let result = state.agent.run(messages, &mut thread).await;

    if !state.threads.retains_threads() {
        if let Err(e) = state.agent.release_thread(&mut thread).await {
            tracing::warn!(
                conversation_id = %conversation_id,
                error = %e,
                "Failed to delete service thread"
            );
        }
    }

    if !thread.is_blank() {
        state.threads.set(conversation_id, thread).await?;
    }
    result
}

/// Run the turn in the background and stream its lifecycle as SSE
fn stream_response(
    state: AppState,
    conversation_id: String,
    messages: Vec<ChatMessage>,
    response: ResponseObject,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let (tx, rx) = mpsc::channel::<StreamEvent>(8);

    tokio::spawn(async move {
        let mut sequence = 0u64;
        let mut next = || {
            sequence += 1;
            sequence
        };

        let created = StreamEvent::Created {
            sequence_number: next(),
            response: response.clone(),
        };
        if tx.send(created).await.is_err() {
            return;
        }

        let events = match run_turn(&state, &conversation_id, messages).await {
            Ok(answer) => {
                let item_id = message_id();
                let text = answer.text.clone();
                vec![
                    StreamEvent::OutputTextDelta {
                        sequence_number: next(),
                        item_id: item_id.clone(),
                        output_index: 0,
                        content_index: 0,
                        delta: text.clone(),
                    },
                    StreamEvent::OutputTextDone {
                        sequence_number: next(),
                        item_id: item_id.clone(),
                        output_index: 0,
                        content_index: 0,
                        text,
                    },
                    StreamEvent::Completed {
                        sequence_number: next(),
                        response: response.complete(item_id, answer),
                    },
                ]
            }
            Err(e) => {
                tracing::error!(error = %e, "Streamed agent run failed");
                vec![StreamEvent::Failed {
                    sequence_number: next(),
                    response: response.fail(error_code(&e), e.to_string()),
                }]
            }
        };

        for event in events {
            if tx.send(event).await.is_err() {
                tracing::debug!("Client disconnected from response stream");
                return;
            }
        }
    });

    let stream = futures::StreamExt::map(ReceiverStream::new(rx), |event| {
        let json = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok(SseEvent::default().event(event.event_type()).data(json))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
