//! 访客登记与通行码核验。

use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::api::response::{ApiResponse, ApiResult};
use crate::auth::middleware::AuthExtractor;
use crate::auth::models::Permission;
use crate::codes;
use crate::database::models::{DbVisitorPass, PassStatus};
use crate::error::LinliError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePassRequest {
    pub visitor_name: String,
    pub visitor_phone: String,
    pub plate: Option<String>,
    /// 来访日期，YYYY-MM-DD
    pub visit_date: chrono::NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub code: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/visitors", post(create_pass).get(my_passes))
        .route("/api/staff/visitors/verify", post(verify_pass))
}

/// 登记访客，签发通行码
async fn create_pass(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Json(request): Json<CreatePassRequest>,
) -> ApiResult<DbVisitorPass> {
    if request.visitor_name.is_empty() {
        return Err(LinliError::validation("访客姓名不能为空"));
    }
    if request.visit_date < Utc::now().date_naive() {
        return Err(LinliError::validation("来访日期不能早于今天"));
    }

    let pass = DbVisitorPass {
        id: Uuid::new_v4().to_string(),
        host_id: auth.0.user_id.to_string(),
        visitor_name: request.visitor_name,
        visitor_phone: request.visitor_phone,
        plate: request.plate,
        visit_date: request.visit_date,
        code: codes::visitor_code(),
        status: PassStatus::Active.as_str().to_string(),
        created_at: Utc::now(),
        used_at: None,
    };
    state.visitors().create(&pass).await?;

    info!("Visitor pass {} issued by {}", pass.code, auth.0.username);
    Ok(ApiResponse::ok_with("访客已登记", pass))
}

/// 我登记的访客
async fn my_passes(
    State(state): State<AppState>,
    auth: AuthExtractor,
) -> ApiResult<Vec<DbVisitorPass>> {
    let passes = state.visitors().list_by_host(auth.0.user_id).await?;
    Ok(ApiResponse::ok(passes))
}

/// 门岗核验通行码：当日有效，一码一次
async fn verify_pass(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Json(request): Json<VerifyRequest>,
) -> ApiResult<serde_json::Value> {
    auth.0.ensure(Permission::VisitorVerify)?;

    let visitors = state.visitors();
    let pass = visitors
        .find_by_code(&request.code)
        .await?
        .ok_or_else(|| LinliError::not_found("通行码不存在"))?;

    let today = Utc::now().date_naive();
    if !visitors.mark_used(&request.code, today).await? {
        if pass.status == PassStatus::Used.as_str() {
            return Err(LinliError::conflict("通行码已使用"));
        }
        return Err(LinliError::conflict("通行码不在有效期内"));
    }

    info!("Visitor pass {} verified by {}", request.code, auth.0.username);
    Ok(ApiResponse::ok(json!({
        "visitor_name": pass.visitor_name,
        "visitor_phone": pass.visitor_phone,
        "plate": pass.plate,
        "visit_date": pass.visit_date,
    })))
}
