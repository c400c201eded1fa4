//! 社区公告：物业发布，住户浏览。

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::api::response::{ApiResponse, ApiResult};
use crate::auth::middleware::AuthExtractor;
use crate::auth::models::Permission;
use crate::database::models::DbAnnouncement;
use crate::error::LinliError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct AnnouncementRequest {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub published: bool,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// 公开浏览路由
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/api/announcements", get(list_published))
        .route("/api/announcements/{id}", get(get_announcement))
}

/// 管理路由
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/announcements",
            post(create_announcement).get(list_all),
        )
        .route(
            "/api/admin/announcements/{id}",
            axum::routing::put(update_announcement).delete(delete_announcement),
        )
        .route("/api/admin/announcements/{id}/publish", post(set_published))
}

fn validate(request: &AnnouncementRequest) -> Result<(), LinliError> {
    if request.title.is_empty() || request.title.len() > 128 {
        return Err(LinliError::validation("标题长度应在 1 到 128 之间"));
    }
    if request.content.is_empty() {
        return Err(LinliError::validation("正文不能为空"));
    }
    Ok(())
}

async fn create_announcement(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Json(request): Json<AnnouncementRequest>,
) -> ApiResult<DbAnnouncement> {
    auth.0.ensure(Permission::AnnouncementManage)?;
    validate(&request)?;

    let now = Utc::now();
    let announcement = DbAnnouncement {
        id: Uuid::new_v4().to_string(),
        title: request.title,
        content: request.content,
        author_id: auth.0.user_id.to_string(),
        published: false,
        created_at: now,
        updated_at: now,
    };
    state.announcements().create(&announcement).await?;

    Ok(ApiResponse::ok_with("公告已创建", announcement))
}

async fn update_announcement(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
    Json(request): Json<AnnouncementRequest>,
) -> ApiResult<serde_json::Value> {
    auth.0.ensure(Permission::AnnouncementManage)?;
    validate(&request)?;

    if !state
        .announcements()
        .update(id, &request.title, &request.content)
        .await?
    {
        return Err(LinliError::not_found("公告不存在"));
    }
    Ok(ApiResponse::message("公告已更新"))
}

async fn set_published(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
    Json(request): Json<PublishRequest>,
) -> ApiResult<serde_json::Value> {
    auth.0.ensure(Permission::AnnouncementManage)?;

    if !state
        .announcements()
        .set_published(id, request.published)
        .await?
    {
        return Err(LinliError::not_found("公告不存在"));
    }

    info!(
        "Announcement {} {} by {}",
        id,
        if request.published { "published" } else { "unpublished" },
        auth.0.username
    );
    Ok(ApiResponse::message(if request.published {
        "公告已发布"
    } else {
        "公告已下线"
    }))
}

async fn delete_announcement(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    auth.0.ensure(Permission::AnnouncementManage)?;

    if !state.announcements().delete(id).await? {
        return Err(LinliError::not_found("公告不存在"));
    }
    Ok(ApiResponse::message("公告已删除"))
}

async fn list_all(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Query(params): Query<PageParams>,
) -> ApiResult<Vec<DbAnnouncement>> {
    auth.0.ensure(Permission::AnnouncementManage)?;

    let announcements = state
        .announcements()
        .list_all(
            params.page.unwrap_or(1),
            params.page_size.unwrap_or(20).min(100),
        )
        .await?;
    Ok(ApiResponse::ok(announcements))
}

/// 已发布公告列表
async fn list_published(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Vec<DbAnnouncement>> {
    let announcements = state
        .announcements()
        .list_published(
            params.page.unwrap_or(1),
            params.page_size.unwrap_or(20).min(100),
        )
        .await?;
    Ok(ApiResponse::ok(announcements))
}

/// 公告详情，未发布的不可见
async fn get_announcement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<DbAnnouncement> {
    let announcement = state
        .announcements()
        .find_by_id(id)
        .await?
        .filter(|a| a.published)
        .ok_or_else(|| LinliError::not_found("公告不存在"))?;

    Ok(ApiResponse::ok(announcement))
}
