use std::sync::Arc;

use axum::{
    extract::State,
    http::Method,
    middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use huddle_core::contacts::{ChatSummary, Contact};
use huddle_core::groups::{GroupSummary, RemovalOutcome};
use huddle_core::ChatService;
use huddle_shared::{ChatError, ChatId, ChatResult, GroupId, MessageId, NotificationId, UserId};
use huddle_store::{
    DirectChat, DirectMessage, GroupChat, GroupMessage, Notification, StoreHandle, User,
};

use crate::auth::Caller;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::extract::{ApiJson, ApiPath};
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::sse::{event_stream, EventStream};

#[derive(Clone)]
pub struct AppState {
    pub chat: ChatService,
    pub store: StoreHandle,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(store: StoreHandle, config: ServerConfig) -> Self {
        Self {
            chat: ChatService::new(store.clone(), config.stream_buffer),
            store,
            rate_limiter: RateLimiter::new(config.rate_limit_per_sec, config.rate_limit_burst),
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/users/:id", put(upsert_profile))
        .route("/contacts", get(list_contacts).post(add_contact))
        .route("/chats", get(list_chats).post(open_chat))
        .route("/chats/:id/messages", get(chat_messages).post(send_message))
        .route("/chats/:id/stream", get(chat_stream))
        .route("/chats/:id/read", post(mark_chat_read))
        .route("/chats/:id/unread", get(chat_unread))
        .route("/messages/:id", delete(delete_message))
        .route("/groups", get(list_groups).post(create_group))
        .route("/groups/:id", get(get_group).patch(rename_group))
        .route("/groups/:id/members", post(add_member))
        .route("/groups/:id/members/:user_id", delete(remove_member))
        .route("/groups/:id/messages", get(group_messages).post(send_group_message))
        .route("/groups/:id/stream", get(group_stream))
        .route("/groups/:id/read", post(mark_group_read))
        .route("/groups/:id/unread", get(group_unread))
        .route("/notifications", get(list_notifications))
        .route("/notifications/:id/read", post(mark_notification_read))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(middleware::from_fn_with_state(
                    state.rate_limiter.clone(),
                    rate_limit_middleware,
                )),
        )
        .with_state(state)
}

// ─── Request / response bodies ───

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
}

#[derive(Deserialize)]
struct ProfileRequest {
    username: String,
    display_name: Option<String>,
    avatar_ref: Option<String>,
}

#[derive(Deserialize)]
struct AddContactRequest {
    username: String,
}

#[derive(Deserialize)]
struct OpenChatRequest {
    peer_id: UserId,
}

#[derive(Deserialize)]
struct SendMessageRequest {
    text: String,
    /// Group messages only; defaults to the sender's member name.
    #[serde(default)]
    sender_name: Option<String>,
}

#[derive(Deserialize)]
struct CreateGroupRequest {
    name: String,
    member_ids: Vec<UserId>,
}

#[derive(Deserialize)]
struct RenameGroupRequest {
    name: String,
}

#[derive(Deserialize)]
struct AddMemberRequest {
    user_id: UserId,
}

#[derive(Serialize)]
struct MarkedResponse {
    marked: usize,
}

#[derive(Serialize)]
struct UnreadResponse {
    unread: u64,
}

// ─── Service ───

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ─── Identity ───

/// Create or update the caller's own profile, standing in for the auth
/// provider's profile sync.
async fn upsert_profile(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(id): ApiPath<UserId>,
    ApiJson(req): ApiJson<ProfileRequest>,
) -> Result<Json<User>, ServerError> {
    if caller != id {
        return Err(ChatError::forbidden("you can only update your own profile").into());
    }
    let username = req.username.trim().to_string();
    if username.is_empty() {
        return Err(ChatError::invalid("username is empty").into());
    }

    let user: ChatResult<User> = state
        .store
        .call(move |db| {
            if let Some(other) = db.find_user_by_username(&username)? {
                if other.id != id {
                    return Err(ChatError::AlreadyExists(format!(
                        "username {username} is taken"
                    )));
                }
            }

            let now = chrono::Utc::now();
            let created_at = db.find_user(&id)?.map(|u| u.created_at).unwrap_or(now);
            db.upsert_user(&User {
                id: id.clone(),
                username,
                display_name: req.display_name.filter(|n| !n.trim().is_empty()),
                avatar_ref: req.avatar_ref,
                created_at,
                updated_at: now,
            })?;
            Ok(db.get_user(&id)?)
        })
        .await;

    let user = user?;
    info!(user = %user.id, username = %user.username, "Profile updated");
    Ok(Json(user))
}

// ─── Contacts & direct chats ───

async fn list_contacts(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<Vec<Contact>>, ServerError> {
    Ok(Json(state.chat.contacts.list_contacts(&caller).await?))
}

async fn add_contact(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiJson(req): ApiJson<AddContactRequest>,
) -> Result<Json<Contact>, ServerError> {
    Ok(Json(
        state.chat.contacts.add_contact(&caller, &req.username).await?,
    ))
}

async fn list_chats(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<Vec<ChatSummary>>, ServerError> {
    Ok(Json(state.chat.contacts.list_chats(&caller).await?))
}

async fn open_chat(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiJson(req): ApiJson<OpenChatRequest>,
) -> Result<Json<DirectChat>, ServerError> {
    let chat_id = state
        .chat
        .direct
        .resolve_or_create_chat(&caller, &req.peer_id)
        .await?;
    Ok(Json(state.chat.direct.get_chat(chat_id, &caller).await?))
}

async fn chat_messages(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(chat_id): ApiPath<ChatId>,
) -> Result<Json<Vec<DirectMessage>>, ServerError> {
    Ok(Json(
        state.chat.messages.list_messages(chat_id, &caller).await?,
    ))
}

async fn send_message(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(chat_id): ApiPath<ChatId>,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> Result<Json<DirectMessage>, ServerError> {
    Ok(Json(
        state.chat.messages.append(chat_id, &caller, &req.text).await?,
    ))
}

async fn chat_stream(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(chat_id): ApiPath<ChatId>,
) -> Result<EventStream, ServerError> {
    let subscription = state.chat.messages.subscribe(chat_id, &caller).await?;
    info!(chat = %chat_id, user = %caller, "Live stream opened");
    Ok(event_stream(subscription))
}

async fn mark_chat_read(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(chat_id): ApiPath<ChatId>,
) -> Result<Json<MarkedResponse>, ServerError> {
    let marked = state.chat.messages.mark_read(chat_id, &caller).await?;
    Ok(Json(MarkedResponse { marked }))
}

async fn chat_unread(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(chat_id): ApiPath<ChatId>,
) -> Result<Json<UnreadResponse>, ServerError> {
    let unread = state.chat.unread.unread_count(chat_id, &caller).await?;
    Ok(Json(UnreadResponse { unread }))
}

async fn delete_message(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(message_id): ApiPath<MessageId>,
) -> Result<Json<serde_json::Value>, ServerError> {
    state.chat.messages.delete(message_id, &caller).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ─── Groups ───

async fn list_groups(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<Vec<GroupSummary>>, ServerError> {
    Ok(Json(state.chat.groups.list_groups(&caller).await?))
}

async fn create_group(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiJson(req): ApiJson<CreateGroupRequest>,
) -> Result<Json<GroupChat>, ServerError> {
    Ok(Json(
        state
            .chat
            .groups
            .create_group(&caller, &req.name, &req.member_ids)
            .await?,
    ))
}

async fn get_group(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(group_id): ApiPath<GroupId>,
) -> Result<Json<GroupChat>, ServerError> {
    Ok(Json(state.chat.groups.get_group(group_id, &caller).await?))
}

async fn rename_group(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(group_id): ApiPath<GroupId>,
    ApiJson(req): ApiJson<RenameGroupRequest>,
) -> Result<Json<GroupChat>, ServerError> {
    Ok(Json(
        state
            .chat
            .groups
            .rename_group(group_id, &req.name, &caller)
            .await?,
    ))
}

async fn add_member(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(group_id): ApiPath<GroupId>,
    ApiJson(req): ApiJson<AddMemberRequest>,
) -> Result<Json<GroupChat>, ServerError> {
    let group = state.chat.groups.add_member(group_id, &req.user_id).await?;
    info!(group = %group_id, by = %caller, user = %req.user_id, "Member invited");
    Ok(Json(group))
}

async fn remove_member(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath((group_id, target)): ApiPath<(GroupId, UserId)>,
) -> Result<Json<RemovalOutcome>, ServerError> {
    Ok(Json(
        state
            .chat
            .groups
            .remove_member(group_id, &target, &caller)
            .await?,
    ))
}

async fn group_messages(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(group_id): ApiPath<GroupId>,
) -> Result<Json<Vec<GroupMessage>>, ServerError> {
    Ok(Json(
        state
            .chat
            .messages
            .list_group_messages(group_id, &caller)
            .await?,
    ))
}

async fn send_group_message(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(group_id): ApiPath<GroupId>,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> Result<Json<GroupMessage>, ServerError> {
    let sender_name = req.sender_name.unwrap_or_default();
    Ok(Json(
        state
            .chat
            .messages
            .append_group(group_id, &caller, &sender_name, &req.text)
            .await?,
    ))
}

async fn group_stream(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(group_id): ApiPath<GroupId>,
) -> Result<EventStream, ServerError> {
    let subscription = state
        .chat
        .messages
        .subscribe_group(group_id, &caller)
        .await?;
    info!(group = %group_id, user = %caller, "Live stream opened");
    Ok(event_stream(subscription))
}

async fn mark_group_read(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(group_id): ApiPath<GroupId>,
) -> Result<Json<MarkedResponse>, ServerError> {
    let marked = state.chat.messages.mark_group_read(group_id, &caller).await?;
    Ok(Json(MarkedResponse { marked }))
}

async fn group_unread(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(group_id): ApiPath<GroupId>,
) -> Result<Json<UnreadResponse>, ServerError> {
    let unread = state
        .chat
        .unread
        .group_unread_count(group_id, &caller)
        .await?;
    Ok(Json(UnreadResponse { unread }))
}

// ─── Notifications ───

async fn list_notifications(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<Vec<Notification>>, ServerError> {
    Ok(Json(state.chat.notifications.list(&caller).await?))
}

async fn mark_notification_read(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(id): ApiPath<NotificationId>,
) -> Result<Json<serde_json::Value>, ServerError> {
    state.chat.notifications.mark_read(id, &caller).await?;
    Ok(Json(serde_json::json!({ "read": true })))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
