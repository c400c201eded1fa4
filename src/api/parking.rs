//! 车位台账与车位绑定流程，与房屋绑定同构。

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::api::response::{ApiResponse, ApiResult};
use crate::auth::middleware::AuthExtractor;
use crate::auth::models::Permission;
use crate::database::models::{
    ApplicationStatus, AssetStatus, DbParkingBinding, DbParkingBindingApplication, DbParkingSpace,
};
use crate::error::LinliError;
use crate::server::AppState;

const SPACE_KINDS: &[&str] = &["Fixed", "Temporary"];

#[derive(Debug, Deserialize)]
pub struct SpaceRequest {
    pub zone: String,
    pub number: String,
    pub kind: String,
    pub monthly_fee_cents: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListSpacesParams {
    pub zone: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub space_id: Uuid,
    pub plate: String,
}

#[derive(Debug, Deserialize)]
pub struct ListApplicationsParams {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct MyParkingResponse {
    pub applications: Vec<DbParkingBindingApplication>,
    pub bindings: Vec<DbParkingBinding>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/parking", post(create_space).get(list_spaces))
        .route(
            "/api/admin/parking/{id}",
            axum::routing::put(update_space).delete(delete_space),
        )
        .route("/api/parking/bindings/apply", post(apply_binding))
        .route("/api/parking/bindings/mine", get(my_parking))
        .route(
            "/api/admin/parking/bindings/applications",
            get(list_applications),
        )
        .route(
            "/api/admin/parking/bindings/applications/{id}/approve",
            post(approve_application),
        )
        .route(
            "/api/admin/parking/bindings/applications/{id}/reject",
            post(reject_application),
        )
        .route("/api/admin/parking/bindings/{id}", delete(unbind))
}

fn validate_space(request: &SpaceRequest) -> Result<(), LinliError> {
    if request.zone.is_empty() || request.number.is_empty() {
        return Err(LinliError::validation("区域、编号不能为空"));
    }
    if !SPACE_KINDS.contains(&request.kind.as_str()) {
        return Err(LinliError::validation("车位类型应为固定或临时"));
    }
    if request.monthly_fee_cents < 0 {
        return Err(LinliError::validation("月租金不能为负数"));
    }
    Ok(())
}

async fn create_space(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Json(request): Json<SpaceRequest>,
) -> ApiResult<DbParkingSpace> {
    auth.0.ensure(Permission::AssetManage)?;
    validate_space(&request)?;

    let space = DbParkingSpace {
        id: Uuid::new_v4().to_string(),
        zone: request.zone,
        number: request.number,
        kind: request.kind,
        monthly_fee_cents: request.monthly_fee_cents,
        status: AssetStatus::Vacant.as_str().to_string(),
        created_at: Utc::now(),
    };

    state.parking().create(&space).await.map_err(|e| match e {
        crate::database::DatabaseError::Duplicate => LinliError::conflict("该车位已登记"),
        other => other.into(),
    })?;

    Ok(ApiResponse::ok_with("车位已登记", space))
}

async fn list_spaces(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Query(params): Query<ListSpacesParams>,
) -> ApiResult<Vec<DbParkingSpace>> {
    auth.0.ensure(Permission::AssetManage)?;

    let spaces = state
        .parking()
        .list(
            params.zone.as_deref(),
            params.page.unwrap_or(1),
            params.page_size.unwrap_or(20).min(100),
        )
        .await?;
    Ok(ApiResponse::ok(spaces))
}

async fn update_space(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
    Json(request): Json<SpaceRequest>,
) -> ApiResult<serde_json::Value> {
    auth.0.ensure(Permission::AssetManage)?;
    validate_space(&request)?;

    let updated = state
        .parking()
        .update(
            id,
            &request.zone,
            &request.number,
            &request.kind,
            request.monthly_fee_cents,
        )
        .await?;

    if !updated {
        return Err(LinliError::not_found("车位不存在"));
    }
    Ok(ApiResponse::message("车位信息已更新"))
}

async fn delete_space(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    auth.0.ensure(Permission::AssetManage)?;

    let parking = state.parking();
    parking
        .find_by_id(id)
        .await?
        .ok_or_else(|| LinliError::not_found("车位不存在"))?;

    if !parking.delete_vacant(id).await? {
        return Err(LinliError::conflict("使用中的车位不可删除"));
    }
    Ok(ApiResponse::message("车位已删除"))
}

async fn apply_binding(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Json(request): Json<ApplyRequest>,
) -> ApiResult<DbParkingBindingApplication> {
    if request.plate.is_empty() || request.plate.len() > 10 {
        return Err(LinliError::validation("车牌号格式不正确"));
    }

    let parking = state.parking();
    parking
        .find_by_id(request.space_id)
        .await?
        .ok_or_else(|| LinliError::not_found("车位不存在"))?;

    if parking
        .binding_exists(request.space_id, auth.0.user_id)
        .await?
    {
        return Err(LinliError::conflict("您已绑定该车位"));
    }
    if parking
        .has_pending_application(request.space_id, auth.0.user_id)
        .await?
    {
        return Err(LinliError::conflict("已有待审核的申请"));
    }

    let application = DbParkingBindingApplication {
        id: Uuid::new_v4().to_string(),
        space_id: request.space_id.to_string(),
        applicant_id: auth.0.user_id.to_string(),
        plate: request.plate,
        status: ApplicationStatus::Pending.as_str().to_string(),
        reject_reason: None,
        reviewer_id: None,
        created_at: Utc::now(),
        reviewed_at: None,
    };
    parking.create_application(&application).await?;

    info!("Parking binding applied: {} by {}", application.space_id, auth.0.username);
    Ok(ApiResponse::ok_with("申请已提交，等待审核", application))
}

async fn my_parking(
    State(state): State<AppState>,
    auth: AuthExtractor,
) -> ApiResult<MyParkingResponse> {
    let parking = state.parking();
    let applications = parking.list_applications_by_user(auth.0.user_id).await?;
    let bindings = parking.list_bindings_by_user(auth.0.user_id).await?;

    Ok(ApiResponse::ok(MyParkingResponse {
        applications,
        bindings,
    }))
}

async fn list_applications(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Query(params): Query<ListApplicationsParams>,
) -> ApiResult<Vec<DbParkingBindingApplication>> {
    auth.0.ensure(Permission::BindingReview)?;

    let status = match params.status.as_deref() {
        Some(s) => Some(
            s.parse::<ApplicationStatus>()
                .map_err(|_| LinliError::validation("未知申请状态"))?,
        ),
        None => None,
    };

    let applications = state
        .parking()
        .list_applications(
            status,
            params.page.unwrap_or(1),
            params.page_size.unwrap_or(20).min(100),
        )
        .await?;
    Ok(ApiResponse::ok(applications))
}

async fn approve_application(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<DbParkingBinding> {
    auth.0.ensure(Permission::BindingReview)?;

    let parking = state.parking();
    let application = parking
        .find_application(id)
        .await?
        .ok_or_else(|| LinliError::not_found("申请不存在"))?;

    let space_id = Uuid::parse_str(&application.space_id)
        .map_err(|_| LinliError::internal("申请记录损坏"))?;
    let applicant_id = Uuid::parse_str(&application.applicant_id)
        .map_err(|_| LinliError::internal("申请记录损坏"))?;

    if parking.binding_exists(space_id, applicant_id).await? {
        return Err(LinliError::conflict("申请人已绑定该车位"));
    }

    if !parking
        .review_application(id, ApplicationStatus::Approved, auth.0.user_id, None)
        .await?
    {
        return Err(LinliError::conflict("该申请已处理"));
    }

    let binding = DbParkingBinding {
        id: Uuid::new_v4().to_string(),
        space_id: application.space_id.clone(),
        user_id: application.applicant_id.clone(),
        plate: application.plate.clone(),
        created_at: Utc::now(),
    };
    parking.create_binding(&binding).await?;
    parking.set_status(space_id, AssetStatus::Occupied).await?;

    info!("Parking binding approved: {} by {}", id, auth.0.username);
    Ok(ApiResponse::ok_with("已批准", binding))
}

async fn reject_application(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
    Json(request): Json<RejectRequest>,
) -> ApiResult<serde_json::Value> {
    auth.0.ensure(Permission::BindingReview)?;

    if request.reason.is_empty() {
        return Err(LinliError::validation("驳回原因不能为空"));
    }

    let parking = state.parking();
    parking
        .find_application(id)
        .await?
        .ok_or_else(|| LinliError::not_found("申请不存在"))?;

    if !parking
        .review_application(
            id,
            ApplicationStatus::Rejected,
            auth.0.user_id,
            Some(&request.reason),
        )
        .await?
    {
        return Err(LinliError::conflict("该申请已处理"));
    }

    Ok(ApiResponse::message("已驳回"))
}

async fn unbind(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    auth.0.ensure(Permission::BindingReview)?;

    let parking = state.parking();
    let binding = parking
        .find_binding(id)
        .await?
        .ok_or_else(|| LinliError::not_found("绑定不存在"))?;

    parking.delete_binding(id).await?;

    let space_id = Uuid::parse_str(&binding.space_id)
        .map_err(|_| LinliError::internal("绑定记录损坏"))?;
    if parking.count_bindings_for_space(space_id).await? == 0 {
        parking.set_status(space_id, AssetStatus::Vacant).await?;
    }

    Ok(ApiResponse::ok(json!({ "space_id": binding.space_id })))
}
