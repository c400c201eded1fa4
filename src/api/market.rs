//! 社区二手集市。

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
use crate::database::models::{DbMarketItem, MarketStatus};
use crate::error::LinliError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub title: String,
    pub description: String,
    pub price_cents: i64,
    #[serde(default)]
    pub images: Vec<UploadRequest>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BrowseParams {
    pub keyword: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// 商品视图，images 解开成数组
#[derive(Debug, Serialize)]
pub struct ItemView {
    pub id: String,
    pub seller_id: String,
    pub title: String,
    pub description: String,
    pub price_cents: i64,
    pub images: Vec<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&DbMarketItem> for ItemView {
    fn from(item: &DbMarketItem) -> Self {
        Self {
            id: item.id.clone(),
            seller_id: item.seller_id.clone(),
            title: item.title.clone(),
            description: item.description.clone(),
            price_cents: item.price_cents,
            images: item.image_list(),
            status: item.status.clone(),
            created_at: item.created_at.to_rfc3339(),
            updated_at: item.updated_at.to_rfc3339(),
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/market/items", post(create_item).get(browse_items))
        .route("/api/market/items/mine", get(my_items))
        .route(
            "/api/market/items/{id}",
            get(get_item).put(update_item).delete(delete_item),
        )
}

/// 发布闲置
async fn create_item(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Json(request): Json<CreateItemRequest>,
) -> ApiResult<ItemView> {
    if request.title.is_empty() || request.title.len() > 64 {
        return Err(LinliError::validation("标题长度应在 1 到 64 之间"));
    }
    if request.price_cents < 0 {
        return Err(LinliError::validation("价格不能为负数"));
    }
    if request.images.len() > 9 {
        return Err(LinliError::validation("最多上传 9 张图片"));
    }

    let mut image_paths = Vec::with_capacity(request.images.len());
    for image in &request.images {
        let path = state
            .media
            .save_image("market", &image.file_name, &image.content)
            .await?;
        image_paths.push(path);
    }

    let now = Utc::now();
    let item = DbMarketItem {
        id: Uuid::new_v4().to_string(),
        seller_id: auth.0.user_id.to_string(),
        title: request.title,
        description: request.description,
        price_cents: request.price_cents,
        images: serde_json::to_string(&image_paths)?,
        status: MarketStatus::OnSale.as_str().to_string(),
        created_at: now,
        updated_at: now,
    };
    state.market().create(&item).await?;

    info!("Market item listed by {}: {}", auth.0.username, item.title);
    Ok(ApiResponse::ok_with("已发布", ItemView::from(&item)))
}

/// 浏览在售闲置
async fn browse_items(
    State(state): State<AppState>,
    Query(params): Query<BrowseParams>,
) -> ApiResult<Vec<ItemView>> {
    let items = state
        .market()
        .list_on_sale(
            params.keyword.as_deref(),
            params.page.unwrap_or(1),
            params.page_size.unwrap_or(20).min(100),
        )
        .await?;
    Ok(ApiResponse::ok(items.iter().map(ItemView::from).collect()))
}

/// 我发布的闲置
async fn my_items(State(state): State<AppState>, auth: AuthExtractor) -> ApiResult<Vec<ItemView>> {
    let items = state.market().list_by_seller(auth.0.user_id).await?;
    Ok(ApiResponse::ok(items.iter().map(ItemView::from).collect()))
}

/// 商品详情。非在售商品仅卖家可见。
async fn get_item(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<ItemView> {
    let item = state
        .market()
        .find_by_id(id)
        .await?
        .ok_or_else(|| LinliError::not_found("商品不存在"))?;

    if item.status != MarketStatus::OnSale.as_str()
        && item.seller_id != auth.0.user_id.to_string()
    {
        return Err(LinliError::not_found("商品不存在"));
    }

    Ok(ApiResponse::ok(ItemView::from(&item)))
}

/// 卖家编辑商品或流转状态
async fn update_item(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateItemRequest>,
) -> ApiResult<serde_json::Value> {
    if let Some(price) = request.price_cents {
        if price < 0 {
            return Err(LinliError::validation("价格不能为负数"));
        }
    }

    let status = match request.status.as_deref() {
        Some(s) => Some(
            s.parse::<MarketStatus>()
                .map_err(|_| LinliError::validation("未知商品状态"))?,
        ),
        None => None,
    };

    let updated = state
        .market()
        .update(
            id,
            auth.0.user_id,
            request.title.as_deref(),
            request.description.as_deref(),
            request.price_cents,
            status,
        )
        .await?;

    if !updated {
        return Err(LinliError::not_found("商品不存在或非本人发布"));
    }
    Ok(ApiResponse::message("已更新"))
}

async fn delete_item(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    if !state.market().delete(id, auth.0.user_id).await? {
        return Err(LinliError::not_found("商品不存在或非本人发布"));
    }
    Ok(ApiResponse::message("已删除"))
}
