//! 商户门店：入驻申请、管理员审核、商品上下架、公开橱窗。

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::api::auth::UploadRequest;
use crate::api::response::{ApiResponse, ApiResult};
use crate::auth::middleware::{AuthContext, AuthExtractor};
use crate::auth::models::Permission;
use crate::database::models::{DbProduct, DbShop, ShopStatus};
use crate::error::LinliError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateShopRequest {
    pub name: String,
    pub description: Option<String>,
    pub phone: String,
    pub logo: Option<UploadRequest>,
    pub license: Option<UploadRequest>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateShopRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub phone: Option<String>,
    pub logo: Option<UploadRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ListShopsParams {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub stock: i64,
    pub image: Option<UploadRequest>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub stock: Option<i64>,
    pub image: Option<UploadRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ShelfRequest {
    pub on_shelf: bool,
}

/// 公开橱窗路由
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/api/shops", get(list_approved_shops))
        .route("/api/shops/{id}/products", get(list_shop_products))
}

/// 商户与管理端路由
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/merchant/shop",
            post(create_shop).get(my_shop).put(update_shop),
        )
        .route("/api/merchant/products", post(create_product).get(my_products))
        .route(
            "/api/merchant/products/{id}",
            put(update_product).delete(delete_product),
        )
        .route("/api/merchant/products/{id}/shelf", put(set_shelf))
        .route("/api/admin/shops", get(list_shops))
        .route("/api/admin/shops/{id}/approve", post(approve_shop))
        .route("/api/admin/shops/{id}/reject", post(reject_shop))
}

/// 当前商户的店铺，未入驻时报错
pub(crate) async fn merchant_shop(
    state: &AppState,
    auth: &AuthContext,
) -> Result<DbShop, LinliError> {
    auth.ensure(Permission::ShopOperate)?;

    state
        .shops()
        .find_by_owner(auth.user_id)
        .await?
        .ok_or_else(|| LinliError::not_found("尚未入驻，请先提交店铺信息"))
}

/// 已过审的店铺，未过审不可经营
pub(crate) async fn approved_shop(
    state: &AppState,
    auth: &AuthContext,
) -> Result<DbShop, LinliError> {
    let shop = merchant_shop(state, auth).await?;
    if shop.status != ShopStatus::Approved.as_str() {
        return Err(LinliError::conflict("店铺未过审，暂不能经营"));
    }
    Ok(shop)
}

/// 提交入驻
async fn create_shop(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Json(request): Json<CreateShopRequest>,
) -> ApiResult<DbShop> {
    auth.0.ensure(Permission::ShopOperate)?;

    if request.name.is_empty() || request.name.len() > 64 {
        return Err(LinliError::validation("店铺名称长度应在 1 到 64 之间"));
    }
    if request.phone.is_empty() {
        return Err(LinliError::validation("联系电话不能为空"));
    }

    let shops = state.shops();
    if shops.find_by_owner(auth.0.user_id).await?.is_some() {
        return Err(LinliError::conflict("每个商户只能开设一家店铺"));
    }

    let logo = match &request.logo {
        Some(upload) => Some(
            state
                .media
                .save_image("shop", &upload.file_name, &upload.content)
                .await?,
        ),
        None => None,
    };
    let license_image = match &request.license {
        Some(upload) => Some(
            state
                .media
                .save_image("license", &upload.file_name, &upload.content)
                .await?,
        ),
        None => None,
    };

    let shop = DbShop {
        id: Uuid::new_v4().to_string(),
        owner_id: auth.0.user_id.to_string(),
        name: request.name,
        description: request.description,
        logo,
        license_image,
        phone: request.phone,
        status: ShopStatus::Pending.as_str().to_string(),
        total_orders: 0,
        created_at: Utc::now(),
    };
    shops.create(&shop).await?;

    info!("Shop submitted by {}: {}", auth.0.username, shop.name);
    Ok(ApiResponse::ok_with("入驻申请已提交，等待审核", shop))
}

async fn my_shop(State(state): State<AppState>, auth: AuthExtractor) -> ApiResult<DbShop> {
    let shop = merchant_shop(&state, &auth.0).await?;
    Ok(ApiResponse::ok(shop))
}

async fn update_shop(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Json(request): Json<UpdateShopRequest>,
) -> ApiResult<serde_json::Value> {
    let shop = merchant_shop(&state, &auth.0).await?;

    if shop.status == ShopStatus::Rejected.as_str() || shop.status == ShopStatus::Closed.as_str() {
        return Err(LinliError::conflict("当前状态不可修改店铺信息"));
    }

    let logo = match &request.logo {
        Some(upload) => Some(
            state
                .media
                .save_image("shop", &upload.file_name, &upload.content)
                .await?,
        ),
        None => None,
    };

    let shop_id = Uuid::parse_str(&shop.id).map_err(|_| LinliError::internal("店铺记录损坏"))?;
    state
        .shops()
        .update_profile(
            shop_id,
            request.name.as_deref(),
            request.description.as_deref(),
            request.phone.as_deref(),
            logo.as_deref(),
        )
        .await?;

    Ok(ApiResponse::message("店铺信息已更新"))
}

/// 入驻审核列表
async fn list_shops(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Query(params): Query<ListShopsParams>,
) -> ApiResult<Vec<DbShop>> {
    auth.0.ensure(Permission::ShopReview)?;

    let status = match params.status.as_deref() {
        Some(s) => Some(
            s.parse::<ShopStatus>()
                .map_err(|_| LinliError::validation("未知店铺状态"))?,
        ),
        None => None,
    };

    let shops = state
        .shops()
        .list(
            status,
            params.page.unwrap_or(1),
            params.page_size.unwrap_or(20).min(100),
        )
        .await?;
    Ok(ApiResponse::ok(shops))
}

async fn approve_shop(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    auth.0.ensure(Permission::ShopReview)?;

    if !state.shops().review(id, ShopStatus::Approved).await? {
        return Err(LinliError::conflict("店铺不存在或已审核"));
    }

    info!("Shop {} approved by {}", id, auth.0.username);
    Ok(ApiResponse::message("已批准入驻"))
}

async fn reject_shop(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
    Json(_request): Json<RejectRequest>,
) -> ApiResult<serde_json::Value> {
    auth.0.ensure(Permission::ShopReview)?;

    if !state.shops().review(id, ShopStatus::Rejected).await? {
        return Err(LinliError::conflict("店铺不存在或已审核"));
    }
    Ok(ApiResponse::message("已驳回入驻"))
}

// -- 商品 -------------------------------------------------------------------

async fn create_product(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Json(request): Json<ProductRequest>,
) -> ApiResult<DbProduct> {
    let shop = approved_shop(&state, &auth.0).await?;

    if request.name.is_empty() || request.name.len() > 64 {
        return Err(LinliError::validation("商品名称长度应在 1 到 64 之间"));
    }
    if request.price_cents <= 0 {
        return Err(LinliError::validation("价格必须为正数"));
    }
    if request.stock < 0 {
        return Err(LinliError::validation("库存不能为负数"));
    }

    let image = match &request.image {
        Some(upload) => Some(
            state
                .media
                .save_image("product", &upload.file_name, &upload.content)
                .await?,
        ),
        None => None,
    };

    let now = Utc::now();
    let product = DbProduct {
        id: Uuid::new_v4().to_string(),
        shop_id: shop.id.clone(),
        name: request.name,
        description: request.description,
        image,
        price_cents: request.price_cents,
        stock: request.stock,
        on_shelf: true,
        created_at: now,
        updated_at: now,
    };
    state.shops().create_product(&product).await?;

    Ok(ApiResponse::ok_with("商品已创建", product))
}

async fn my_products(State(state): State<AppState>, auth: AuthExtractor) -> ApiResult<Vec<DbProduct>> {
    let shop = merchant_shop(&state, &auth.0).await?;
    let shop_id = Uuid::parse_str(&shop.id).map_err(|_| LinliError::internal("店铺记录损坏"))?;

    let products = state.shops().list_products(shop_id, false).await?;
    Ok(ApiResponse::ok(products))
}

async fn update_product(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateProductRequest>,
) -> ApiResult<serde_json::Value> {
    let shop = approved_shop(&state, &auth.0).await?;
    let shop_id = Uuid::parse_str(&shop.id).map_err(|_| LinliError::internal("店铺记录损坏"))?;

    if let Some(price) = request.price_cents {
        if price <= 0 {
            return Err(LinliError::validation("价格必须为正数"));
        }
    }
    if let Some(stock) = request.stock {
        if stock < 0 {
            return Err(LinliError::validation("库存不能为负数"));
        }
    }

    let image = match &request.image {
        Some(upload) => Some(
            state
                .media
                .save_image("product", &upload.file_name, &upload.content)
                .await?,
        ),
        None => None,
    };

    let updated = state
        .shops()
        .update_product(
            id,
            shop_id,
            request.name.as_deref(),
            request.description.as_deref(),
            request.price_cents,
            request.stock,
            image.as_deref(),
        )
        .await?;

    if !updated {
        return Err(LinliError::not_found("商品不存在"));
    }
    Ok(ApiResponse::message("商品已更新"))
}

async fn set_shelf(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
    Json(request): Json<ShelfRequest>,
) -> ApiResult<serde_json::Value> {
    let shop = approved_shop(&state, &auth.0).await?;
    let shop_id = Uuid::parse_str(&shop.id).map_err(|_| LinliError::internal("店铺记录损坏"))?;

    if !state
        .shops()
        .set_product_shelf(id, shop_id, request.on_shelf)
        .await?
    {
        return Err(LinliError::not_found("商品不存在"));
    }
    Ok(ApiResponse::message(if request.on_shelf {
        "商品已上架"
    } else {
        "商品已下架"
    }))
}

async fn delete_product(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    let shop = merchant_shop(&state, &auth.0).await?;
    let shop_id = Uuid::parse_str(&shop.id).map_err(|_| LinliError::internal("店铺记录损坏"))?;

    if !state.shops().delete_product(id, shop_id).await? {
        return Err(LinliError::not_found("商品不存在"));
    }
    Ok(ApiResponse::message("商品已删除"))
}

// -- 公开橱窗 ---------------------------------------------------------------

async fn list_approved_shops(
    State(state): State<AppState>,
    Query(params): Query<ListShopsParams>,
) -> ApiResult<Vec<DbShop>> {
    let shops = state
        .shops()
        .list(
            Some(ShopStatus::Approved),
            params.page.unwrap_or(1),
            params.page_size.unwrap_or(20).min(100),
        )
        .await?;
    Ok(ApiResponse::ok(shops))
}

async fn list_shop_products(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<DbProduct>> {
    let shop = state
        .shops()
        .find_by_id(id)
        .await?
        .filter(|s| s.status == ShopStatus::Approved.as_str())
        .ok_or_else(|| LinliError::not_found("店铺不存在"))?;

    let shop_id = Uuid::parse_str(&shop.id).map_err(|_| LinliError::internal("店铺记录损坏"))?;
    let products = state.shops().list_products(shop_id, true).await?;
    Ok(ApiResponse::ok(products))
}
