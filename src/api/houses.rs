//! 房屋台账与房屋绑定两段式流程：住户提交申请，物业审核后生成绑定。

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
    ApplicationStatus, AssetStatus, DbHouse, DbHouseBinding, DbHouseBindingApplication,
};
use crate::error::LinliError;
use crate::server::AppState;

const RELATIONS: &[&str] = &["Owner", "Family", "Tenant"];

#[derive(Debug, Deserialize)]
pub struct HouseRequest {
    pub building: String,
    pub unit: String,
    pub number: String,
    pub area_m2: f64,
}

#[derive(Debug, Deserialize)]
pub struct ListHousesParams {
    pub building: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub house_id: Uuid,
    pub relation: String,
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

/// 我的房产：申请记录与生效绑定
#[derive(Debug, Serialize)]
pub struct MyHousesResponse {
    pub applications: Vec<DbHouseBindingApplication>,
    pub bindings: Vec<DbHouseBinding>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        // 台账管理
        .route("/api/admin/houses", post(create_house).get(list_houses))
        .route("/api/admin/houses/{id}", axum::routing::put(update_house).delete(delete_house))
        // 绑定流程
        .route("/api/houses/bindings/apply", post(apply_binding))
        .route("/api/houses/bindings/mine", get(my_houses))
        .route(
            "/api/admin/houses/bindings/applications",
            get(list_applications),
        )
        .route(
            "/api/admin/houses/bindings/applications/{id}/approve",
            post(approve_application),
        )
        .route(
            "/api/admin/houses/bindings/applications/{id}/reject",
            post(reject_application),
        )
        .route("/api/admin/houses/bindings/{id}", delete(unbind))
}

fn validate_house(request: &HouseRequest) -> Result<(), LinliError> {
    if request.building.is_empty() || request.unit.is_empty() || request.number.is_empty() {
        return Err(LinliError::validation("楼栋、单元、门牌号不能为空"));
    }
    if request.area_m2 <= 0.0 {
        return Err(LinliError::validation("建筑面积必须为正数"));
    }
    Ok(())
}

/// 新增房屋
async fn create_house(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Json(request): Json<HouseRequest>,
) -> ApiResult<DbHouse> {
    auth.0.ensure(Permission::AssetManage)?;
    validate_house(&request)?;

    let house = DbHouse {
        id: Uuid::new_v4().to_string(),
        building: request.building,
        unit: request.unit,
        number: request.number,
        area_m2: request.area_m2,
        status: AssetStatus::Vacant.as_str().to_string(),
        created_at: Utc::now(),
    };

    state.houses().create(&house).await.map_err(|e| match e {
        crate::database::DatabaseError::Duplicate => LinliError::conflict("该房屋已登记"),
        other => other.into(),
    })?;

    Ok(ApiResponse::ok_with("房屋已登记", house))
}

async fn list_houses(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Query(params): Query<ListHousesParams>,
) -> ApiResult<Vec<DbHouse>> {
    auth.0.ensure(Permission::AssetManage)?;

    let houses = state
        .houses()
        .list(
            params.building.as_deref(),
            params.page.unwrap_or(1),
            params.page_size.unwrap_or(20).min(100),
        )
        .await?;
    Ok(ApiResponse::ok(houses))
}

async fn update_house(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
    Json(request): Json<HouseRequest>,
) -> ApiResult<serde_json::Value> {
    auth.0.ensure(Permission::AssetManage)?;
    validate_house(&request)?;

    let updated = state
        .houses()
        .update(
            id,
            &request.building,
            &request.unit,
            &request.number,
            request.area_m2,
        )
        .await?;

    if !updated {
        return Err(LinliError::not_found("房屋不存在"));
    }
    Ok(ApiResponse::message("房屋信息已更新"))
}

/// 删除房屋，入住中的房屋不可删除
async fn delete_house(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    auth.0.ensure(Permission::AssetManage)?;

    let houses = state.houses();
    let house = houses
        .find_by_id(id)
        .await?
        .ok_or_else(|| LinliError::not_found("房屋不存在"))?;

    if house.status == AssetStatus::Occupied.as_str() {
        return Err(LinliError::conflict("入住中的房屋不可删除"));
    }

    if !houses.delete_vacant(id).await? {
        return Err(LinliError::conflict("入住中的房屋不可删除"));
    }
    Ok(ApiResponse::message("房屋已删除"))
}

/// 提交绑定申请
async fn apply_binding(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Json(request): Json<ApplyRequest>,
) -> ApiResult<DbHouseBindingApplication> {
    if !RELATIONS.contains(&request.relation.as_str()) {
        return Err(LinliError::validation("与房屋的关系应为业主、家属或租客"));
    }

    let houses = state.houses();
    houses
        .find_by_id(request.house_id)
        .await?
        .ok_or_else(|| LinliError::not_found("房屋不存在"))?;

    if houses
        .binding_exists(request.house_id, auth.0.user_id)
        .await?
    {
        return Err(LinliError::conflict("您已绑定该房屋"));
    }
    if houses
        .has_pending_application(request.house_id, auth.0.user_id)
        .await?
    {
        return Err(LinliError::conflict("已有待审核的申请"));
    }

    let application = DbHouseBindingApplication {
        id: Uuid::new_v4().to_string(),
        house_id: request.house_id.to_string(),
        applicant_id: auth.0.user_id.to_string(),
        relation: request.relation,
        status: ApplicationStatus::Pending.as_str().to_string(),
        reject_reason: None,
        reviewer_id: None,
        created_at: Utc::now(),
        reviewed_at: None,
    };
    houses.create_application(&application).await?;

    info!("House binding applied: {} by {}", application.house_id, auth.0.username);
    Ok(ApiResponse::ok_with("申请已提交，等待审核", application))
}

/// 我的房产
async fn my_houses(State(state): State<AppState>, auth: AuthExtractor) -> ApiResult<MyHousesResponse> {
    let houses = state.houses();
    let applications = houses.list_applications_by_user(auth.0.user_id).await?;
    let bindings = houses.list_bindings_by_user(auth.0.user_id).await?;

    Ok(ApiResponse::ok(MyHousesResponse {
        applications,
        bindings,
    }))
}

async fn list_applications(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Query(params): Query<ListApplicationsParams>,
) -> ApiResult<Vec<DbHouseBindingApplication>> {
    auth.0.ensure(Permission::BindingReview)?;

    let status = match params.status.as_deref() {
        Some(s) => Some(
            s.parse::<ApplicationStatus>()
                .map_err(|_| LinliError::validation("未知申请状态"))?,
        ),
        None => None,
    };

    let applications = state
        .houses()
        .list_applications(
            status,
            params.page.unwrap_or(1),
            params.page_size.unwrap_or(20).min(100),
        )
        .await?;
    Ok(ApiResponse::ok(applications))
}

/// 审核通过：生成绑定关系并将房屋置为入住
async fn approve_application(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<DbHouseBinding> {
    auth.0.ensure(Permission::BindingReview)?;

    let houses = state.houses();
    let application = houses
        .find_application(id)
        .await?
        .ok_or_else(|| LinliError::not_found("申请不存在"))?;

    let house_id = Uuid::parse_str(&application.house_id)
        .map_err(|_| LinliError::internal("申请记录损坏"))?;
    let applicant_id = Uuid::parse_str(&application.applicant_id)
        .map_err(|_| LinliError::internal("申请记录损坏"))?;

    if houses.binding_exists(house_id, applicant_id).await? {
        return Err(LinliError::conflict("申请人已绑定该房屋"));
    }

    // 条件更新保证同一申请只被批准一次
    if !houses
        .review_application(id, ApplicationStatus::Approved, auth.0.user_id, None)
        .await?
    {
        return Err(LinliError::conflict("该申请已处理"));
    }

    let binding = DbHouseBinding {
        id: Uuid::new_v4().to_string(),
        house_id: application.house_id.clone(),
        user_id: application.applicant_id.clone(),
        relation: application.relation.clone(),
        created_at: Utc::now(),
    };
    houses.create_binding(&binding).await?;
    houses.set_status(house_id, AssetStatus::Occupied).await?;

    info!("House binding approved: {} by {}", id, auth.0.username);
    Ok(ApiResponse::ok_with("已批准", binding))
}

/// 驳回申请
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

    let houses = state.houses();
    houses
        .find_application(id)
        .await?
        .ok_or_else(|| LinliError::not_found("申请不存在"))?;

    if !houses
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

/// 解除绑定，最后一个绑定解除后房屋回到空置
async fn unbind(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    auth.0.ensure(Permission::BindingReview)?;

    let houses = state.houses();
    let binding = houses
        .find_binding(id)
        .await?
        .ok_or_else(|| LinliError::not_found("绑定不存在"))?;

    houses.delete_binding(id).await?;

    let house_id = Uuid::parse_str(&binding.house_id)
        .map_err(|_| LinliError::internal("绑定记录损坏"))?;
    if houses.count_bindings_for_house(house_id).await? == 0 {
        houses.set_status(house_id, AssetStatus::Vacant).await?;
    }

    Ok(ApiResponse::ok(json!({ "house_id": binding.house_id })))
}
