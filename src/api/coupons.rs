//! 优惠券：商户发券，住户领券得核销码，到店核销单次有效。

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
use crate::api::shops::approved_shop;
use crate::auth::middleware::AuthExtractor;
use crate::codes;
use crate::database::models::{CouponStatus, DbCoupon, DbUserCoupon, ShopStatus};
use crate::database::repositories::CouponVerifyOutcome;
use crate::error::LinliError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCouponRequest {
    pub title: String,
    pub discount_cents: i64,
    pub min_spend_cents: i64,
    pub total_count: i64,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct MyCouponsParams {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub code: String,
}

/// 公开路由：店铺可领券列表
pub fn public_routes() -> Router<AppState> {
    Router::new().route("/api/shops/{id}/coupons", get(claimable_coupons))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/merchant/coupons",
            post(create_coupon).get(merchant_coupons),
        )
        .route("/api/merchant/coupons/verify", post(verify_coupon))
        .route("/api/coupons/{id}/claim", post(claim_coupon))
        .route("/api/coupons/mine", get(my_coupons))
}

/// 商户发券
async fn create_coupon(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Json(request): Json<CreateCouponRequest>,
) -> ApiResult<DbCoupon> {
    let shop = approved_shop(&state, &auth.0).await?;

    if request.title.is_empty() || request.title.len() > 64 {
        return Err(LinliError::validation("券名称长度应在 1 到 64 之间"));
    }
    if request.discount_cents <= 0 {
        return Err(LinliError::validation("抵扣金额必须为正数"));
    }
    if request.min_spend_cents < 0 {
        return Err(LinliError::validation("使用门槛不能为负数"));
    }
    if request.total_count <= 0 {
        return Err(LinliError::validation("发放数量必须为正数"));
    }
    if request.valid_until <= request.valid_from {
        return Err(LinliError::validation("有效期结束应晚于开始"));
    }

    let coupon = DbCoupon {
        id: Uuid::new_v4().to_string(),
        shop_id: shop.id.clone(),
        title: request.title,
        discount_cents: request.discount_cents,
        min_spend_cents: request.min_spend_cents,
        total_count: request.total_count,
        claimed_count: 0,
        used_count: 0,
        valid_from: request.valid_from,
        valid_until: request.valid_until,
        created_at: Utc::now(),
    };
    state.coupons().create(&coupon).await?;

    info!("Coupon created by shop {}: {}", shop.name, coupon.title);
    Ok(ApiResponse::ok_with("优惠券已创建", coupon))
}

/// 商户的券列表
async fn merchant_coupons(
    State(state): State<AppState>,
    auth: AuthExtractor,
) -> ApiResult<Vec<DbCoupon>> {
    let shop = approved_shop(&state, &auth.0).await?;
    let shop_id = Uuid::parse_str(&shop.id).map_err(|_| LinliError::internal("店铺记录损坏"))?;

    let coupons = state.coupons().list_by_shop(shop_id).await?;
    Ok(ApiResponse::ok(coupons))
}

/// 店铺当前可领的券
async fn claimable_coupons(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<DbCoupon>> {
    let shop = state
        .shops()
        .find_by_id(id)
        .await?
        .filter(|s| s.status == ShopStatus::Approved.as_str())
        .ok_or_else(|| LinliError::not_found("店铺不存在"))?;

    let shop_id = Uuid::parse_str(&shop.id).map_err(|_| LinliError::internal("店铺记录损坏"))?;
    let coupons = state.coupons().list_claimable(shop_id, Utc::now()).await?;
    Ok(ApiResponse::ok(coupons))
}

/// 领券：每人每券一张，签发 12 位核销码
async fn claim_coupon(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    let coupons = state.coupons();
    coupons
        .find_by_id(id)
        .await?
        .ok_or_else(|| LinliError::not_found("优惠券不存在"))?;

    let code = codes::coupon_code();
    let claimed = coupons
        .claim(id, auth.0.user_id, &code, Utc::now())
        .await
        .map_err(|e| match e {
            crate::database::DatabaseError::Duplicate => {
                LinliError::conflict("您已领取过该券")
            }
            other => other.into(),
        })?;

    if !claimed {
        return Err(LinliError::conflict("优惠券已领完或不在领取期内"));
    }

    info!("Coupon {} claimed by {}", id, auth.0.username);
    Ok(ApiResponse::ok(serde_json::json!({ "code": code })))
}

/// 我的券包
async fn my_coupons(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Query(params): Query<MyCouponsParams>,
) -> ApiResult<Vec<DbUserCoupon>> {
    let status = match params.status.as_deref() {
        Some(s) => Some(
            s.parse::<CouponStatus>()
                .map_err(|_| LinliError::validation("未知券状态"))?,
        ),
        None => None,
    };

    let user_coupons = state.coupons().list_by_user(auth.0.user_id, status).await?;
    Ok(ApiResponse::ok(user_coupons))
}

/// 到店核销：一码一次
async fn verify_coupon(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Json(request): Json<VerifyRequest>,
) -> ApiResult<DbUserCoupon> {
    if request.code.len() != 12 {
        return Err(LinliError::validation("核销码应为 12 位"));
    }

    let shop = approved_shop(&state, &auth.0).await?;
    let shop_id = Uuid::parse_str(&shop.id).map_err(|_| LinliError::internal("店铺记录损坏"))?;

    match state.coupons().verify(shop_id, &request.code, Utc::now()).await? {
        CouponVerifyOutcome::Verified(user_coupon) => {
            info!("Coupon code verified at shop {}", shop.name);
            Ok(ApiResponse::ok_with("核销成功", user_coupon))
        }
        CouponVerifyOutcome::NotFound => Err(LinliError::not_found("核销码不存在或不属于本店")),
        CouponVerifyOutcome::Expired => Err(LinliError::conflict("券不在有效期内")),
        CouponVerifyOutcome::AlreadyUsed => Err(LinliError::conflict("券已使用")),
    }
}
