//! 报修工单：住户报修，物业派单、处理、完工，住户评价。

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::api::auth::UploadRequest;
use crate::api::response::{ApiResponse, ApiResult};
use crate::auth::middleware::AuthExtractor;
use crate::auth::models::{Permission, Role};
use crate::codes;
use crate::database::models::{DbRepairOrder, RepairStatus};
use crate::error::LinliError;
use crate::server::AppState;

const CATEGORIES: &[&str] = &["Plumbing", "Electrical", "Appliance", "Public", "Other"];

#[derive(Debug, Deserialize)]
pub struct CreateRepairRequest {
    pub location: String,
    pub category: String,
    pub description: String,
    /// base64 图片，可选
    #[serde(default)]
    pub photos: Vec<UploadRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ListRepairsParams {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub assignee_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub rating: i64,
    pub comment: Option<String>,
}

/// 工单视图，photos 解开成数组
#[derive(Debug, Serialize)]
pub struct RepairView {
    pub id: String,
    pub no: String,
    pub reporter_id: String,
    pub location: String,
    pub category: String,
    pub description: String,
    pub photos: Vec<String>,
    pub status: String,
    pub assignee_id: Option<String>,
    pub rating: Option<i64>,
    pub rating_comment: Option<String>,
    pub created_at: String,
    pub assigned_at: Option<String>,
    pub completed_at: Option<String>,
}

impl From<&DbRepairOrder> for RepairView {
    fn from(order: &DbRepairOrder) -> Self {
        Self {
            id: order.id.clone(),
            no: order.no.clone(),
            reporter_id: order.reporter_id.clone(),
            location: order.location.clone(),
            category: order.category.clone(),
            description: order.description.clone(),
            photos: order.photo_list(),
            status: order.status.clone(),
            assignee_id: order.assignee_id.clone(),
            rating: order.rating,
            rating_comment: order.rating_comment.clone(),
            created_at: order.created_at.to_rfc3339(),
            assigned_at: order.assigned_at.map(|dt| dt.to_rfc3339()),
            completed_at: order.completed_at.map(|dt| dt.to_rfc3339()),
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/repairs", post(create_repair))
        .route("/api/repairs/mine", get(my_repairs))
        .route("/api/repairs/{id}/cancel", post(cancel_repair))
        .route("/api/repairs/{id}/rate", post(rate_repair))
        .route("/api/staff/repairs", get(list_repairs))
        .route("/api/staff/repairs/{id}/assign", post(assign_repair))
        .route("/api/staff/repairs/{id}/start", post(start_repair))
        .route("/api/staff/repairs/{id}/complete", post(complete_repair))
}

/// 住户报修
async fn create_repair(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Json(request): Json<CreateRepairRequest>,
) -> ApiResult<RepairView> {
    if request.location.is_empty() {
        return Err(LinliError::validation("报修位置不能为空"));
    }
    if !CATEGORIES.contains(&request.category.as_str()) {
        return Err(LinliError::validation("未知报修类别"));
    }
    if request.description.is_empty() {
        return Err(LinliError::validation("问题描述不能为空"));
    }
    if request.photos.len() > 6 {
        return Err(LinliError::validation("最多上传 6 张照片"));
    }

    let mut photo_paths = Vec::with_capacity(request.photos.len());
    for photo in &request.photos {
        let path = state
            .media
            .save_image("repair", &photo.file_name, &photo.content)
            .await?;
        photo_paths.push(path);
    }

    let order = DbRepairOrder {
        id: Uuid::new_v4().to_string(),
        no: codes::business_no("RO"),
        reporter_id: auth.0.user_id.to_string(),
        location: request.location,
        category: request.category,
        description: request.description,
        photos: serde_json::to_string(&photo_paths)?,
        status: RepairStatus::Pending.as_str().to_string(),
        assignee_id: None,
        rating: None,
        rating_comment: None,
        created_at: Utc::now(),
        assigned_at: None,
        completed_at: None,
    };
    state.repairs().create(&order).await?;

    info!("Repair order {} created by {}", order.no, auth.0.username);
    Ok(ApiResponse::ok_with("报修已提交", RepairView::from(&order)))
}

/// 我的工单
async fn my_repairs(State(state): State<AppState>, auth: AuthExtractor) -> ApiResult<Vec<RepairView>> {
    let orders = state.repairs().list_by_reporter(auth.0.user_id).await?;
    Ok(ApiResponse::ok(orders.iter().map(RepairView::from).collect()))
}

/// 撤单：仅待处理状态
async fn cancel_repair(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    if !state.repairs().cancel(id, auth.0.user_id).await? {
        return Err(LinliError::conflict("工单不可撤销"));
    }
    Ok(ApiResponse::message("工单已撤销"))
}

/// 完工评价，一次有效
async fn rate_repair(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
    Json(request): Json<RateRequest>,
) -> ApiResult<serde_json::Value> {
    if !(1..=5).contains(&request.rating) {
        return Err(LinliError::validation("评分应在 1 到 5 之间"));
    }

    let rated = state
        .repairs()
        .rate(id, auth.0.user_id, request.rating, request.comment.as_deref())
        .await?;

    if !rated {
        return Err(LinliError::conflict("仅可对已完工工单评价一次"));
    }
    Ok(ApiResponse::message("评价已提交"))
}

/// 工单列表（物业侧）
async fn list_repairs(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Query(params): Query<ListRepairsParams>,
) -> ApiResult<Vec<RepairView>> {
    auth.0.ensure(Permission::RepairManage)?;

    let status = match params.status.as_deref() {
        Some(s) => Some(
            s.parse::<RepairStatus>()
                .map_err(|_| LinliError::validation("未知工单状态"))?,
        ),
        None => None,
    };

    let orders = state
        .repairs()
        .list(
            status,
            params.page.unwrap_or(1),
            params.page_size.unwrap_or(20).min(100),
        )
        .await?;
    Ok(ApiResponse::ok(orders.iter().map(RepairView::from).collect()))
}

/// 派单给物业员工
async fn assign_repair(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignRequest>,
) -> ApiResult<serde_json::Value> {
    auth.0.ensure(Permission::RepairManage)?;

    let assignee = state
        .users()
        .find_by_id(request.assignee_id)
        .await?
        .ok_or_else(|| LinliError::not_found("维修人员不存在"))?;

    if assignee.role != Role::Staff.as_str() {
        return Err(LinliError::validation("只能指派给物业员工"));
    }

    if !state.repairs().assign(id, request.assignee_id).await? {
        return Err(LinliError::conflict("仅待处理工单可派单"));
    }

    info!("Repair {} assigned to {} by {}", id, assignee.username, auth.0.username);
    Ok(ApiResponse::message("已派单"))
}

/// 开始处理
async fn start_repair(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    auth.0.ensure(Permission::RepairManage)?;

    if !state.repairs().start(id, auth.0.user_id).await? {
        return Err(LinliError::conflict("仅本人名下已派单工单可开工"));
    }
    Ok(ApiResponse::message("已开始处理"))
}

/// 完工
async fn complete_repair(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    auth.0.ensure(Permission::RepairManage)?;

    if !state.repairs().complete(id, auth.0.user_id).await? {
        return Err(LinliError::conflict("仅本人名下处理中工单可完工"));
    }
    Ok(ApiResponse::message("工单已完工"))
}
