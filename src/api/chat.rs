//! 邻里私信。

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::response::{ApiResponse, ApiResult};
use crate::auth::middleware::AuthExtractor;
use crate::database::models::DbChatMessage;
use crate::database::repositories::ConversationSummary;
use crate::error::LinliError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub recipient_id: Uuid,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ConversationParams {
    pub peer: Uuid,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/chat/messages", post(send_message).get(conversation))
        .route("/api/chat/conversations", get(conversations))
}

/// 发私信
async fn send_message(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<DbChatMessage> {
    if request.content.is_empty() || request.content.len() > 2000 {
        return Err(LinliError::validation("消息长度应在 1 到 2000 之间"));
    }
    if request.recipient_id == auth.0.user_id {
        return Err(LinliError::validation("不能给自己发消息"));
    }

    let recipient = state
        .users()
        .find_by_id(request.recipient_id)
        .await?
        .ok_or_else(|| LinliError::not_found("收件人不存在"))?;
    if !recipient.is_active {
        return Err(LinliError::conflict("收件人账号已停用"));
    }

    let message = DbChatMessage {
        id: Uuid::new_v4().to_string(),
        sender_id: auth.0.user_id.to_string(),
        recipient_id: request.recipient_id.to_string(),
        content: request.content,
        is_read: false,
        created_at: Utc::now(),
    };
    state.chat().insert(&message).await?;

    Ok(ApiResponse::ok(message))
}

/// 与某人的聊天记录，读取即回执已读
async fn conversation(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Query(params): Query<ConversationParams>,
) -> ApiResult<Vec<DbChatMessage>> {
    let chat = state.chat();
    let messages = chat
        .conversation(
            auth.0.user_id,
            params.peer,
            params.page.unwrap_or(1),
            params.page_size.unwrap_or(50).min(200),
        )
        .await?;

    chat.mark_read(auth.0.user_id, params.peer).await?;

    Ok(ApiResponse::ok(messages))
}

/// 会话列表
async fn conversations(
    State(state): State<AppState>,
    auth: AuthExtractor,
) -> ApiResult<Vec<ConversationSummary>> {
    let summaries = state.chat().conversations(auth.0.user_id).await?;
    Ok(ApiResponse::ok(summaries))
}
