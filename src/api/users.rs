//! 管理端用户管理。

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::api::auth::UserInfo;
use crate::api::response::{ApiResponse, ApiResult};
use crate::auth::middleware::AuthExtractor;
use crate::auth::models::{Permission, Role};
use crate::error::LinliError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct ListUsersParams {
    pub role: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub is_active: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/{id}/role", put(set_role))
        .route("/api/admin/users/{id}/status", put(set_status))
}

/// 用户列表
async fn list_users(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Query(params): Query<ListUsersParams>,
) -> ApiResult<Vec<UserInfo>> {
    auth.0.ensure(Permission::UserManage)?;

    let page = params.page.unwrap_or(1);
    let page_size = params.page_size.unwrap_or(20).min(100);

    let users = state
        .users()
        .list(params.role.as_deref(), page, page_size)
        .await?;

    let mut infos = Vec::with_capacity(users.len());
    for stored in &users {
        infos.push(UserInfo::from(&stored.to_domain()?));
    }
    Ok(ApiResponse::ok(infos))
}

/// 调整用户角色
async fn set_role(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
    Json(request): Json<SetRoleRequest>,
) -> ApiResult<serde_json::Value> {
    auth.0.ensure(Permission::UserManage)?;

    let role: Role = request
        .role
        .parse()
        .map_err(|_| LinliError::validation("未知角色"))?;

    if id == auth.0.user_id {
        return Err(LinliError::conflict("不能调整自己的角色"));
    }

    if !state.users().set_role(id, role.as_str()).await? {
        return Err(LinliError::not_found("用户不存在"));
    }

    info!("User {} role set to {} by {}", id, role.as_str(), auth.0.username);
    Ok(ApiResponse::message("角色已调整"))
}

/// 启用/停用账号
async fn set_status(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
    Json(request): Json<SetStatusRequest>,
) -> ApiResult<serde_json::Value> {
    auth.0.ensure(Permission::UserManage)?;

    if id == auth.0.user_id {
        return Err(LinliError::conflict("不能停用自己的账号"));
    }

    if !state.users().set_active(id, request.is_active).await? {
        return Err(LinliError::not_found("用户不存在"));
    }

    info!(
        "User {} {} by {}",
        id,
        if request.is_active { "activated" } else { "deactivated" },
        auth.0.username
    );
    Ok(ApiResponse::message(if request.is_active {
        "账号已启用"
    } else {
        "账号已停用"
    }))
}
