//! 店铺订单：下单锁价快照、用券抵扣、接单签发取货码、到店凭码核销。

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::response::{ApiResponse, ApiResult};
use crate::api::shops::approved_shop;
use crate::auth::middleware::AuthExtractor;
use crate::codes;
use crate::database::models::{
    CouponStatus, DbShopOrder, DbShopOrderItem, OrderStatus, ShopStatus,
};
use crate::database::repositories::PlaceOrderOutcome;
use crate::error::LinliError;
use crate::server::AppState;

const MAX_ORDER_LINES: usize = 20;

#[derive(Debug, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub shop_id: Uuid,
    pub items: Vec<OrderLineRequest>,
    pub user_coupon_id: Option<Uuid>,
    pub remark: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersParams {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct PickupRequest {
    pub code: String,
}

/// 订单视图：订单头 + 明细快照
#[derive(Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: DbShopOrder,
    pub items: Vec<DbShopOrderItem>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/orders", post(create_order))
        .route("/api/orders/mine", get(my_orders))
        .route("/api/orders/{id}", get(get_order))
        .route("/api/orders/{id}/cancel", post(cancel_order))
        .route("/api/merchant/orders", get(merchant_orders))
        .route("/api/merchant/orders/{id}/accept", post(accept_order))
        .route("/api/merchant/orders/{id}/reject", post(reject_order))
        .route("/api/merchant/orders/pickup", post(pickup))
}

/// 下单。商品归属、券资格在读侧校验，库存与券的最终判定
/// 由仓库层事务内的条件更新保证。
async fn create_order(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Json(request): Json<CreateOrderRequest>,
) -> ApiResult<OrderView> {
    if request.items.is_empty() {
        return Err(LinliError::validation("订单不能为空"));
    }
    if request.items.len() > MAX_ORDER_LINES {
        return Err(LinliError::validation("单笔订单商品种类过多"));
    }

    let shop = state
        .shops()
        .find_by_id(request.shop_id)
        .await?
        .filter(|s| s.status == ShopStatus::Approved.as_str())
        .ok_or_else(|| LinliError::not_found("店铺不存在"))?;

    // 逐项校验并锁价快照
    let order_id = Uuid::new_v4().to_string();
    let mut items = Vec::with_capacity(request.items.len());
    let mut total_cents: i64 = 0;

    for line in &request.items {
        if line.quantity <= 0 || line.quantity > 99 {
            return Err(LinliError::validation("商品数量应在 1 到 99 之间"));
        }

        let product = state
            .shops()
            .find_product(line.product_id)
            .await?
            .filter(|p| p.shop_id == shop.id && p.on_shelf)
            .ok_or_else(|| LinliError::not_found("商品不存在或已下架"))?;

        total_cents += product.price_cents * line.quantity;
        items.push(DbShopOrderItem {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.clone(),
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            unit_price_cents: product.price_cents,
            quantity: line.quantity,
        });
    }

    // 用券资格校验
    let mut discount_cents: i64 = 0;
    if let Some(user_coupon_id) = request.user_coupon_id {
        let user_coupon = state
            .coupons()
            .find_user_coupon(user_coupon_id)
            .await?
            .filter(|uc| uc.user_id == auth.0.user_id.to_string())
            .ok_or_else(|| LinliError::not_found("优惠券不存在"))?;

        if user_coupon.status != CouponStatus::Unused.as_str() {
            return Err(LinliError::conflict("优惠券已使用"));
        }

        let coupon_id = Uuid::parse_str(&user_coupon.coupon_id)
            .map_err(|_| LinliError::internal("券记录损坏"))?;
        let coupon = state
            .coupons()
            .find_by_id(coupon_id)
            .await?
            .ok_or_else(|| LinliError::not_found("优惠券不存在"))?;

        if coupon.shop_id != shop.id {
            return Err(LinliError::conflict("优惠券不适用于该店铺"));
        }
        if !coupon.in_validity(Utc::now()) {
            return Err(LinliError::conflict("优惠券不在有效期内"));
        }
        if total_cents < coupon.min_spend_cents {
            return Err(LinliError::conflict("未达到优惠券使用门槛"));
        }

        // 抵扣不超过订单金额
        discount_cents = coupon.discount_cents.min(total_cents);
    }

    let order = DbShopOrder {
        id: order_id,
        no: codes::business_no("SO"),
        shop_id: shop.id.clone(),
        buyer_id: auth.0.user_id.to_string(),
        total_cents,
        discount_cents,
        payable_cents: total_cents - discount_cents,
        user_coupon_id: request.user_coupon_id.map(|id| id.to_string()),
        pickup_code: None,
        status: OrderStatus::Pending.as_str().to_string(),
        remark: request.remark,
        cancelled_reason: None,
        created_at: Utc::now(),
        accepted_at: None,
        completed_at: None,
    };

    match state.orders().place(&order, &items).await? {
        PlaceOrderOutcome::Placed => {}
        PlaceOrderOutcome::InsufficientStock { product_id } => {
            warn!("Order rejected, insufficient stock: {}", product_id);
            return Err(LinliError::conflict("商品库存不足"));
        }
        PlaceOrderOutcome::CouponUnavailable => {
            return Err(LinliError::conflict("优惠券不可用"));
        }
    }

    info!("Order {} placed by {}", order.no, auth.0.username);
    Ok(ApiResponse::ok_with("下单成功", OrderView { order, items }))
}

/// 我的订单
async fn my_orders(State(state): State<AppState>, auth: AuthExtractor) -> ApiResult<Vec<DbShopOrder>> {
    let orders = state.orders().list_by_buyer(auth.0.user_id).await?;
    Ok(ApiResponse::ok(orders))
}

/// 订单详情：买家或店主可见
async fn get_order(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderView> {
    let order = state
        .orders()
        .find_by_id(id)
        .await?
        .ok_or_else(|| LinliError::not_found("订单不存在"))?;

    let caller = auth.0.user_id.to_string();
    let is_buyer = order.buyer_id == caller;
    let is_owner = match state.shops().find_by_owner(auth.0.user_id).await? {
        Some(shop) => shop.id == order.shop_id,
        None => false,
    };
    if !is_buyer && !is_owner {
        return Err(LinliError::authorization("无权查看该订单"));
    }

    let items = state.orders().items(id).await?;
    Ok(ApiResponse::ok(OrderView { order, items }))
}

/// 买家取消待接单订单
async fn cancel_order(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    let order = state
        .orders()
        .find_by_id(id)
        .await?
        .ok_or_else(|| LinliError::not_found("订单不存在"))?;

    if order.buyer_id != auth.0.user_id.to_string() {
        return Err(LinliError::authorization("只能取消本人订单"));
    }

    if !state.orders().cancel_pending(id, Some("买家取消")).await? {
        return Err(LinliError::conflict("仅待接单订单可取消"));
    }

    info!("Order {} cancelled by buyer {}", order.no, auth.0.username);
    Ok(ApiResponse::message("订单已取消"))
}

/// 商户订单列表
async fn merchant_orders(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Query(params): Query<ListOrdersParams>,
) -> ApiResult<Vec<DbShopOrder>> {
    let shop = approved_shop(&state, &auth.0).await?;
    let shop_id = Uuid::parse_str(&shop.id).map_err(|_| LinliError::internal("店铺记录损坏"))?;

    let status = match params.status.as_deref() {
        Some(s) => Some(
            s.parse::<OrderStatus>()
                .map_err(|_| LinliError::validation("未知订单状态"))?,
        ),
        None => None,
    };

    let orders = state.orders().list_by_shop(shop_id, status).await?;
    Ok(ApiResponse::ok(orders))
}

/// 接单：签发 6 位取货码
async fn accept_order(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    let shop = approved_shop(&state, &auth.0).await?;
    let shop_id = Uuid::parse_str(&shop.id).map_err(|_| LinliError::internal("店铺记录损坏"))?;

    // 取货码在本店待取订单范围内唯一
    let orders = state.orders();
    let mut pickup_code = codes::pickup_code();
    for _ in 0..10 {
        if !orders.pickup_code_in_use(shop_id, &pickup_code).await? {
            break;
        }
        pickup_code = codes::pickup_code();
    }

    if !orders.accept(id, shop_id, &pickup_code).await? {
        return Err(LinliError::conflict("仅本店待接单订单可接单"));
    }

    info!("Order {} accepted by shop {}", id, shop.name);
    Ok(ApiResponse::ok(serde_json::json!({ "pickup_code": pickup_code })))
}

/// 商户拒单：回补库存并退券
async fn reject_order(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
    Json(request): Json<RejectRequest>,
) -> ApiResult<serde_json::Value> {
    if request.reason.is_empty() {
        return Err(LinliError::validation("拒单原因不能为空"));
    }

    let shop = approved_shop(&state, &auth.0).await?;

    let order = state
        .orders()
        .find_by_id(id)
        .await?
        .filter(|o| o.shop_id == shop.id)
        .ok_or_else(|| LinliError::not_found("订单不存在"))?;

    if !state
        .orders()
        .cancel_pending(id, Some(&request.reason))
        .await?
    {
        return Err(LinliError::conflict("仅待接单订单可拒单"));
    }

    info!("Order {} rejected by shop {}", order.no, shop.name);
    Ok(ApiResponse::message("已拒单"))
}

/// 到店取货：凭取货码完成订单
async fn pickup(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Json(request): Json<PickupRequest>,
) -> ApiResult<DbShopOrder> {
    if request.code.len() != 6 || !request.code.chars().all(|c| c.is_ascii_digit()) {
        return Err(LinliError::validation("取货码应为 6 位数字"));
    }

    let shop = approved_shop(&state, &auth.0).await?;
    let shop_id = Uuid::parse_str(&shop.id).map_err(|_| LinliError::internal("店铺记录损坏"))?;

    let order = state
        .orders()
        .complete_by_pickup(shop_id, &request.code)
        .await?
        .ok_or_else(|| LinliError::conflict("取货码无效或订单已完成"))?;

    info!("Order {} completed via pickup code", order.no);
    Ok(ApiResponse::ok_with("订单已完成", order))
}
