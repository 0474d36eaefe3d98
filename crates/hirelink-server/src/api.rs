//! REST API for the message store.
//!
//! Every successful mutation also attempts a real-time push through the
//! delivery façade so an online counterpart sees the change without
//! polling. A missed push is never an error: the persisted state is
//! authoritative and the peer catches up on its next fetch.

use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::{Extension, Path, State},
    http::{Method, StatusCode},
    middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use hirelink_shared::auth::TokenAuth;
use hirelink_shared::protocol::{MessagePush, ServerEvent};
use hirelink_shared::types::{JobId, MessageId, UserId};
use hirelink_store::{ConversationSummary, Database, Message};

use crate::auth::{self, CurrentUser};
use crate::config::ServerConfig;
use crate::delivery::Delivery;
use crate::error::ServerError;
use crate::gateway;
use crate::presence::PresenceRegistry;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub presence: Arc<PresenceRegistry>,
    pub delivery: Delivery,
    pub auth: Arc<TokenAuth>,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Lock the store for a short synchronous critical section. Never hold
    /// the guard across an await point.
    pub fn store(&self) -> Result<MutexGuard<'_, Database>, ServerError> {
        self.db
            .lock()
            .map_err(|_| ServerError::Internal("store lock poisoned".into()))
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let messages = Router::new()
        .route("/", post(send_message))
        .route("/conversations", get(list_conversations))
        .route("/unread/count", get(unread_count))
        .route("/conversation/{user_id}", get(conversation_with))
        .route("/job/{job_id}", get(job_messages))
        .route("/read/{message_id}", put(mark_read))
        .route("/read/user/{user_id}", put(mark_all_read))
        .route("/{message_id}", delete(delete_message))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(gateway::ws_handler))
        .nest("/api/messages", messages)
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the listener fails or the process is stopped.
pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "HTTP API + gateway listening");
    // ConnectInfo feeds the per-IP rate limiter.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub receiver_id: UserId,
    pub content: String,
    #[serde(default)]
    pub job_id: Option<JobId>,
    /// Set by the status-update-via-chat path; ordinary sends omit it.
    #[serde(default)]
    pub is_system: bool,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct UnreadCountResponse {
    unread_count: i64,
}

#[derive(Serialize)]
struct ModifiedCountResponse {
    modified_count: usize,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn send_message(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ServerError> {
    let message = state.store()?.send_message(
        user.id,
        body.receiver_id,
        &body.content,
        body.job_id,
        body.is_system,
    )?;

    let delivered = state
        .delivery
        .push_to_user(
            message.receiver,
            ServerEvent::ReceiveMessage(MessagePush {
                message_id: message.id,
                sender_id: message.sender,
                sender_name: user.name.clone(),
                receiver_id: message.receiver,
                content: message.content.clone(),
                job_id: message.job,
                is_system: message.is_system,
                timestamp: message.created_at,
            }),
        )
        .await;
    if !delivered {
        debug!(message = %message.id, "receiver offline, message will arrive on next fetch");
    }

    Ok((StatusCode::CREATED, Json(message)))
}

async fn conversation_with(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(peer_id): Path<UserId>,
) -> Result<Json<Vec<Message>>, ServerError> {
    let store = state.store()?;
    store.user_by_id(peer_id)?;
    let messages = store.conversation_between(user.id, peer_id)?;
    Ok(Json(messages))
}

async fn job_messages(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(job_id): Path<JobId>,
) -> Result<Json<Vec<Message>>, ServerError> {
    let messages = state.store()?.job_conversation(job_id, user.id)?;
    Ok(Json(messages))
}

async fn list_conversations(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<ConversationSummary>>, ServerError> {
    let summaries = state.store()?.conversations_for(user.id)?;
    Ok(Json(summaries))
}

async fn unread_count(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<UnreadCountResponse>, ServerError> {
    let count = state.store()?.unread_count(user.id)?;
    Ok(Json(UnreadCountResponse {
        unread_count: count,
    }))
}

async fn mark_read(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(message_id): Path<MessageId>,
) -> Result<Json<Message>, ServerError> {
    let message = state.store()?.mark_read(message_id, user.id)?;

    state
        .delivery
        .push_to_user(
            message.sender,
            ServerEvent::MessageReadReceipt {
                message_id: message.id,
                read_by: user.id,
                read_at: Utc::now(),
            },
        )
        .await;

    Ok(Json(message))
}

async fn mark_all_read(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(from_user): Path<UserId>,
) -> Result<Json<ModifiedCountResponse>, ServerError> {
    let modified = state.store()?.mark_conversation_read(from_user, user.id)?;

    if modified > 0 {
        state
            .delivery
            .push_to_user(
                from_user,
                ServerEvent::MessagesRead {
                    read_by: user.id,
                    count: modified as u64,
                    read_at: Utc::now(),
                },
            )
            .await;
    }

    Ok(Json(ModifiedCountResponse {
        modified_count: modified,
    }))
}

async fn delete_message(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(message_id): Path<MessageId>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let deleted = state.store()?.delete_message(message_id, user.id)?;

    state
        .delivery
        .push_to_user(
            deleted.receiver,
            ServerEvent::MessageDeleted {
                message_id: deleted.id,
                deleted_by: user.id,
            },
        )
        .await;

    Ok(Json(serde_json::json!({ "deleted": true })))
}
