//! 社区活动：物业创建，住户限额报名。

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::api::response::{ApiResponse, ApiResult};
use crate::auth::middleware::AuthExtractor;
use crate::auth::models::Permission;
use crate::database::models::{ActivityStatus, DbActivity, DbActivityRegistration};
use crate::error::LinliError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct ActivityRequest {
    pub title: String,
    pub content: String,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub capacity: i64,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/activities", get(list_activities))
        .route("/api/activities/{id}", get(get_activity))
        .route("/api/activities/{id}/register", post(register))
        .route("/api/activities/{id}/cancel", post(cancel_registration))
        .route("/api/staff/activities", post(create_activity))
        .route("/api/staff/activities/{id}", axum::routing::put(update_activity))
        .route("/api/staff/activities/{id}/close", post(close_activity))
        .route(
            "/api/staff/activities/{id}/registrations",
            get(list_registrations),
        )
}

fn validate(request: &ActivityRequest) -> Result<(), LinliError> {
    if request.title.is_empty() || request.title.len() > 128 {
        return Err(LinliError::validation("标题长度应在 1 到 128 之间"));
    }
    if request.location.is_empty() {
        return Err(LinliError::validation("活动地点不能为空"));
    }
    if request.ends_at <= request.starts_at {
        return Err(LinliError::validation("结束时间应晚于开始时间"));
    }
    if request.capacity <= 0 {
        return Err(LinliError::validation("名额必须为正数"));
    }
    Ok(())
}

async fn create_activity(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Json(request): Json<ActivityRequest>,
) -> ApiResult<DbActivity> {
    auth.0.ensure(Permission::ActivityManage)?;
    validate(&request)?;

    let activity = DbActivity {
        id: Uuid::new_v4().to_string(),
        title: request.title,
        content: request.content,
        location: request.location,
        starts_at: request.starts_at,
        ends_at: request.ends_at,
        capacity: request.capacity,
        participant_count: 0,
        status: ActivityStatus::Open.as_str().to_string(),
        created_at: Utc::now(),
    };
    state.activities().create(&activity).await?;

    info!("Activity created by {}: {}", auth.0.username, activity.title);
    Ok(ApiResponse::ok_with("活动已创建", activity))
}

async fn update_activity(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
    Json(request): Json<ActivityRequest>,
) -> ApiResult<serde_json::Value> {
    auth.0.ensure(Permission::ActivityManage)?;
    validate(&request)?;

    let activities = state.activities();
    let activity = activities
        .find_by_id(id)
        .await?
        .ok_or_else(|| LinliError::not_found("活动不存在"))?;

    // 名额不能压到已报名人数之下
    if request.capacity < activity.participant_count {
        return Err(LinliError::conflict("名额不能低于当前报名人数"));
    }

    activities
        .update(
            id,
            &request.title,
            &request.content,
            &request.location,
            request.starts_at,
            request.ends_at,
            request.capacity,
        )
        .await?;
    Ok(ApiResponse::message("活动已更新"))
}

async fn close_activity(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    auth.0.ensure(Permission::ActivityManage)?;

    if !state.activities().close(id).await? {
        return Err(LinliError::conflict("活动不存在或已关闭"));
    }
    Ok(ApiResponse::message("活动已关闭"))
}

async fn list_activities(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Vec<DbActivity>> {
    let activities = state
        .activities()
        .list(
            params.page.unwrap_or(1),
            params.page_size.unwrap_or(20).min(100),
        )
        .await?;
    Ok(ApiResponse::ok(activities))
}

async fn get_activity(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<DbActivity> {
    let activity = state
        .activities()
        .find_by_id(id)
        .await?
        .ok_or_else(|| LinliError::not_found("活动不存在"))?;
    Ok(ApiResponse::ok(activity))
}

/// 报名：名额守卫在数据库侧原子判定
async fn register(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    let activities = state.activities();
    activities
        .find_by_id(id)
        .await?
        .ok_or_else(|| LinliError::not_found("活动不存在"))?;

    let registered = activities
        .register(id, auth.0.user_id, Utc::now())
        .await
        .map_err(|e| match e {
            crate::database::DatabaseError::Duplicate => LinliError::conflict("您已报名该活动"),
            other => other.into(),
        })?;

    if !registered {
        return Err(LinliError::conflict("报名失败：名额已满或活动已开始"));
    }

    info!("Activity {} registered by {}", id, auth.0.username);
    Ok(ApiResponse::message("报名成功"))
}

/// 取消报名
async fn cancel_registration(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    if !state
        .activities()
        .cancel_registration(id, auth.0.user_id)
        .await?
    {
        return Err(LinliError::not_found("未报名该活动"));
    }
    Ok(ApiResponse::message("已取消报名"))
}

/// 报名名单（物业侧）
async fn list_registrations(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<DbActivityRegistration>> {
    auth.0.ensure(Permission::ActivityManage)?;

    let registrations = state.activities().list_registrations(id).await?;
    Ok(ApiResponse::ok(registrations))
}
