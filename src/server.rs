//! HTTP surface.
//!
//! JSON endpoints over a cookie-identified session. Each request locks its
//! session's conversations for its whole duration.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::WithRejection;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;
use crate::chat::ChatService;
use crate::config::AppConfig;
use crate::conversation::{Conversation, ConversationList};
use crate::error::ChatError;
use crate::llm::build_provider;
use crate::session::{Session, SessionStore};

/// Shown to the client when the AI backend fails; details go to the log.
pub const PROVIDER_ERROR_MESSAGE: &str =
    "Sorry, I encountered an error while generating a response.";

/// Start the server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let settings = config.llm_settings().context("invalid LLM configuration")?;
    let provider = build_provider(settings).context("failed to build response provider")?;

    let sessions = SessionStore::new(config.session.idle_timeout());
    let sweeper = sessions.spawn_sweeper(config.session.sweep_interval());

    let state = AppState::new(
        Arc::new(ChatService::new(provider)),
        sessions,
        config.session.cookie_name.clone(),
    );
    let app = router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    info!(
        name: "server.started",
        address = %address,
        backend = %config.llm.backend,
        "Server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    sweeper.abort();
    info!(name: "server.stopped", "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/send_message", post(send_message))
        .route("/api/create_conversation", post(create_conversation))
        .route("/api/switch_conversation", post(switch_conversation))
        .route("/api/delete_conversation", post(delete_conversation))
        .route("/api/clear_conversation", post(clear_conversation))
        .route("/api/conversations", get(list_conversations))
        .route("/api/conversations/{id}", get(get_conversation))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Error reply: a status code and `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Report an unknown conversation as 400 rather than 404.
    fn with_missing_as_bad_request(err: ChatError) -> Self {
        let mut api = Self::from(err);
        if api.status == StatusCode::NOT_FOUND {
            api.status = StatusCode::BAD_REQUEST;
        }
        api
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::InvalidInput(message) => Self {
                status: StatusCode::BAD_REQUEST,
                message,
            },
            ChatError::NotFound(id) => {
                tracing::debug!(conversation_id = %id, "Unknown conversation");
                Self {
                    status: StatusCode::NOT_FOUND,
                    message: "Invalid conversation ID".to_string(),
                }
            }
            ChatError::Provider(e) => {
                tracing::error!(error = %e, "Provider error surfaced to client");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: PROVIDER_ERROR_MESSAGE.to_string(),
                }
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "Rejected request body");
        Self {
            status: StatusCode::BAD_REQUEST,
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ─────────────────────────────────────────────────────────────────────────────
// Session cookie
// ─────────────────────────────────────────────────────────────────────────────

/// Find the caller's session, creating one (and its cookie) when needed.
fn resolve_session(state: &AppState, jar: CookieJar) -> (Session, CookieJar) {
    let cookie_id = jar.get(&state.cookie_name).map(|c| c.value().to_string());
    let (session, created) = state.sessions.resolve(cookie_id.as_deref());
    if !created {
        return (session, jar);
    }

    tracing::debug!(session_id = %session.id(), "Issuing session cookie");
    let cookie = Cookie::build((state.cookie_name.clone(), session.id().to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    (session, jar.add(cookie))
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for sending a message.
#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    /// User message content.
    #[serde(default)]
    message: String,
    /// Target conversation; the active one if absent or empty.
    #[serde(default)]
    conversation_id: Option<String>,
}

/// Request body naming a conversation.
#[derive(Debug, Deserialize)]
struct ConversationIdRequest {
    #[serde(default)]
    conversation_id: String,
}

#[derive(Debug, Serialize)]
struct SendMessageResponse {
    status: &'static str,
    response: String,
    conversation: Conversation,
}

#[derive(Debug, Serialize)]
struct CreateConversationResponse {
    status: &'static str,
    conversation_id: String,
    conversation: Conversation,
}

#[derive(Debug, Serialize)]
struct ConversationResponse {
    status: &'static str,
    conversation: Conversation,
}

#[derive(Debug, Serialize)]
struct ConversationListResponse {
    status: &'static str,
    #[serde(flatten)]
    list: ConversationList,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    backend: &'static str,
    sessions: usize,
}

/// GET /health - Liveness and backend name.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        backend: state.chat.provider_name(),
        sessions: state.sessions.len(),
    })
}

/// POST /api/send_message - Append a message and return the assistant reply.
async fn send_message(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(req), _): WithRejection<Json<SendMessageRequest>, ApiError>,
) -> (CookieJar, ApiResult<SendMessageResponse>) {
    let (session, jar) = resolve_session(&state, jar);
    let conversation_id = req.conversation_id.as_deref().filter(|id| !id.is_empty());

    tracing::info!(
        session_id = %session.id(),
        conversation_id = ?conversation_id,
        message_length = req.message.len(),
        "Received message"
    );

    let mut conversations = session.conversations().await;
    let result = state
        .chat
        .send_message(&mut conversations, conversation_id, &req.message)
        .await
        .map(|reply| {
            Json(SendMessageResponse {
                status: "success",
                response: reply.response,
                conversation: reply.conversation,
            })
        })
        .map_err(ApiError::with_missing_as_bad_request);

    (jar, result)
}

/// POST /api/create_conversation - Start a new, active conversation.
async fn create_conversation(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<CreateConversationResponse>) {
    let (session, jar) = resolve_session(&state, jar);
    let conversation = session.conversations().await.create_conversation().clone();

    tracing::info!(
        session_id = %session.id(),
        conversation_id = %conversation.id,
        "Conversation created"
    );

    (
        jar,
        Json(CreateConversationResponse {
            status: "success",
            conversation_id: conversation.id.clone(),
            conversation,
        }),
    )
}

/// POST /api/switch_conversation - Change the active conversation.
async fn switch_conversation(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(req), _): WithRejection<Json<ConversationIdRequest>, ApiError>,
) -> (CookieJar, ApiResult<ConversationResponse>) {
    let (session, jar) = resolve_session(&state, jar);
    let result = session
        .conversations()
        .await
        .switch_active(&req.conversation_id)
        .map(|conversation| {
            Json(ConversationResponse {
                status: "success",
                conversation: conversation.clone(),
            })
        })
        .map_err(ApiError::with_missing_as_bad_request);

    (jar, result)
}

/// POST /api/delete_conversation - Remove a conversation.
async fn delete_conversation(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(req), _): WithRejection<Json<ConversationIdRequest>, ApiError>,
) -> (CookieJar, ApiResult<ConversationListResponse>) {
    let (session, jar) = resolve_session(&state, jar);
    let result = session
        .conversations()
        .await
        .delete_conversation(&req.conversation_id)
        .map(|list| {
            tracing::info!(
                session_id = %session.id(),
                conversation_id = %req.conversation_id,
                remaining = list.conversations.len(),
                "Conversation deleted"
            );
            Json(ConversationListResponse {
                status: "success",
                list,
            })
        })
        .map_err(ApiError::from);

    (jar, result)
}

/// POST /api/clear_conversation - Drop a conversation's messages.
async fn clear_conversation(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(req), _): WithRejection<Json<ConversationIdRequest>, ApiError>,
) -> (CookieJar, ApiResult<ConversationResponse>) {
    let (session, jar) = resolve_session(&state, jar);
    let result = session
        .conversations()
        .await
        .clear_conversation(&req.conversation_id)
        .map(|conversation| {
            Json(ConversationResponse {
                status: "success",
                conversation: conversation.clone(),
            })
        })
        .map_err(ApiError::from);

    (jar, result)
}

/// GET /api/conversations - All conversations and the active one.
async fn list_conversations(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<ConversationListResponse>) {
    let (session, jar) = resolve_session(&state, jar);
    let list = session.conversations().await.list_all();

    (
        jar,
        Json(ConversationListResponse {
            status: "success",
            list,
        }),
    )
}

/// GET /api/conversations/{id} - One conversation.
async fn get_conversation(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> (CookieJar, ApiResult<ConversationResponse>) {
    let (session, jar) = resolve_session(&state, jar);
    let result = session
        .conversations()
        .await
        .get(&id)
        .map(|conversation| {
            Json(ConversationResponse {
                status: "success",
                conversation: conversation.clone(),
            })
        })
        .map_err(ApiError::from);

    (jar, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ProviderError;

    #[test]
    fn test_error_statuses() {
        let invalid = ApiError::from(ChatError::InvalidInput("empty".into()));
        assert_eq!(invalid.status, StatusCode::BAD_REQUEST);

        let missing = ApiError::from(ChatError::NotFound("x".into()));
        assert_eq!(missing.status, StatusCode::NOT_FOUND);

        let lenient = ApiError::with_missing_as_bad_request(ChatError::NotFound("x".into()));
        assert_eq!(lenient.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_provider_error_is_generic() {
        let err = ApiError::from(ChatError::Provider(ProviderError::Api {
            status: 401,
            message: "Incorrect API key provided: sk-abc".into(),
        }));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.message,
            "Sorry, I encountered an error while generating a response."
        );
        assert!(!err.message.contains("sk-abc"));
    }
}
