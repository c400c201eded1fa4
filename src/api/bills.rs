//! 账单：按期批量生成物业费，住户线上缴费。

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use rust_decimal::prelude::*;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::api::response::{ApiResponse, ApiResult};
use crate::auth::middleware::AuthExtractor;
use crate::auth::models::Permission;
use crate::codes;
use crate::database::models::{BillStatus, DbBill};
use crate::error::LinliError;
use crate::server::AppState;

const BILL_KINDS: &[&str] = &["Property", "Parking", "Water", "Electricity"];
const PAYMENT_METHODS: &[&str] = &["Wechat", "Alipay", "Cash"];

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// 账期，YYYY-MM
    pub period: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateBillRequest {
    pub house_id: Option<Uuid>,
    pub user_id: Uuid,
    pub kind: String,
    pub period: String,
    pub amount_cents: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListBillsParams {
    pub status: Option<String>,
    pub period: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct MyBillsParams {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PayRequest {
    pub payment_method: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/bills/generate", post(generate_bills))
        .route("/api/admin/bills", post(create_bill).get(list_bills))
        .route("/api/bills/mine", get(my_bills))
        .route("/api/bills/{id}/pay", post(pay_bill))
}

fn validate_period(period: &str) -> Result<(), LinliError> {
    let valid = period.len() == 7
        && period.as_bytes()[4] == b'-'
        && period[..4].chars().all(|c| c.is_ascii_digit())
        && period[5..]
            .parse::<u8>()
            .map(|month| (1..=12).contains(&month))
            .unwrap_or(false);
    if !valid {
        return Err(LinliError::validation("账期格式应为 YYYY-MM"));
    }
    Ok(())
}

/// 物业费金额：面积 × 单价，四舍五入到分
fn property_fee_cents(area_m2: f64, rate_cents_per_m2: i64) -> i64 {
    let area = Decimal::from_f64(area_m2).unwrap_or_default();
    let rate = Decimal::from(rate_cents_per_m2);
    (area * rate)
        .round()
        .to_i64()
        .unwrap_or(0)
}

/// 按期为所有入住房屋生成物业费账单。可重复执行，已生成的房屋跳过。
async fn generate_bills(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<serde_json::Value> {
    auth.0.ensure(Permission::BillManage)?;
    validate_period(&request.period)?;

    let houses = state.houses();
    let bills = state.bills();
    let rate = state.config.billing.property_fee_cents_per_m2;

    let mut created = 0u32;
    let mut skipped = 0u32;

    for house in houses.list_occupied().await? {
        let house_id = Uuid::parse_str(&house.id)
            .map_err(|_| LinliError::internal("房屋记录损坏"))?;

        // 账单挂在最早绑定的住户名下
        let Some(binding) = houses.primary_binding_for_house(house_id).await? else {
            skipped += 1;
            continue;
        };

        let bill = DbBill {
            id: Uuid::new_v4().to_string(),
            no: codes::business_no("BL"),
            house_id: Some(house.id.clone()),
            user_id: binding.user_id.clone(),
            kind: "Property".to_string(),
            period: request.period.clone(),
            amount_cents: property_fee_cents(house.area_m2, rate),
            status: BillStatus::Unpaid.as_str().to_string(),
            paid_at: None,
            payment_method: None,
            created_at: Utc::now(),
        };

        if bills.create_if_absent(&bill).await? {
            created += 1;
        } else {
            skipped += 1;
        }
    }

    info!(
        "Bills generated for {}: created={} skipped={}",
        request.period, created, skipped
    );
    Ok(ApiResponse::ok(json!({
        "period": request.period,
        "created": created,
        "skipped": skipped,
    })))
}

/// 手工开单
async fn create_bill(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Json(request): Json<CreateBillRequest>,
) -> ApiResult<DbBill> {
    auth.0.ensure(Permission::BillManage)?;
    validate_period(&request.period)?;

    if !BILL_KINDS.contains(&request.kind.as_str()) {
        return Err(LinliError::validation("未知账单类型"));
    }
    if request.amount_cents <= 0 {
        return Err(LinliError::validation("金额必须为正数"));
    }

    state
        .users()
        .find_by_id(request.user_id)
        .await?
        .ok_or_else(|| LinliError::not_found("用户不存在"))?;

    let bill = DbBill {
        id: Uuid::new_v4().to_string(),
        no: codes::business_no("BL"),
        house_id: request.house_id.map(|id| id.to_string()),
        user_id: request.user_id.to_string(),
        kind: request.kind,
        period: request.period,
        amount_cents: request.amount_cents,
        status: BillStatus::Unpaid.as_str().to_string(),
        paid_at: None,
        payment_method: None,
        created_at: Utc::now(),
    };

    state.bills().create(&bill).await.map_err(|e| match e {
        crate::database::DatabaseError::Duplicate => {
            LinliError::conflict("该房屋本期账单已存在")
        }
        other => other.into(),
    })?;

    Ok(ApiResponse::ok_with("账单已创建", bill))
}

async fn list_bills(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Query(params): Query<ListBillsParams>,
) -> ApiResult<Vec<DbBill>> {
    auth.0.ensure(Permission::BillManage)?;

    let status = match params.status.as_deref() {
        Some(s) => Some(
            s.parse::<BillStatus>()
                .map_err(|_| LinliError::validation("未知账单状态"))?,
        ),
        None => None,
    };

    let bills = state
        .bills()
        .list(
            status,
            params.period.as_deref(),
            params.page.unwrap_or(1),
            params.page_size.unwrap_or(20).min(100),
        )
        .await?;
    Ok(ApiResponse::ok(bills))
}

/// 我的账单
async fn my_bills(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Query(params): Query<MyBillsParams>,
) -> ApiResult<Vec<DbBill>> {
    let status = match params.status.as_deref() {
        Some(s) => Some(
            s.parse::<BillStatus>()
                .map_err(|_| LinliError::validation("未知账单状态"))?,
        ),
        None => None,
    };

    let bills = state.bills().list_by_user(auth.0.user_id, status).await?;
    Ok(ApiResponse::ok(bills))
}

/// 缴费：未缴账单一次缴清
async fn pay_bill(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
    Json(request): Json<PayRequest>,
) -> ApiResult<serde_json::Value> {
    if !PAYMENT_METHODS.contains(&request.payment_method.as_str()) {
        return Err(LinliError::validation("未知支付方式"));
    }

    let bills = state.bills();
    let bill = bills
        .find_by_id(id)
        .await?
        .ok_or_else(|| LinliError::not_found("账单不存在"))?;

    if bill.user_id != auth.0.user_id.to_string() {
        return Err(LinliError::authorization("只能缴纳本人账单"));
    }

    if !bills.pay(id, auth.0.user_id, &request.payment_method).await? {
        return Err(LinliError::conflict("账单已缴清"));
    }

    info!("Bill {} paid by {}", bill.no, auth.0.username);
    Ok(ApiResponse::message("缴费成功"))
}
