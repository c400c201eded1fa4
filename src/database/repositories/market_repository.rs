use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::database::models::{DbMarketItem, MarketStatus};
use crate::database::DatabaseResult;

/// 二手集市仓库
#[derive(Clone)]
pub struct MarketRepository {
    pool: SqlitePool,
}

impl MarketRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, item: &DbMarketItem) -> DatabaseResult<()> {
        sqlx::query(
            "INSERT INTO market_items
                (id, seller_id, title, description, price_cents, images, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&item.id)
        .bind(&item.seller_id)
        .bind(&item.title)
        .bind(&item.description)
        .bind(item.price_cents)
        .bind(&item.images)
        .bind(&item.status)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<DbMarketItem>> {
        let item = sqlx::query_as::<_, DbMarketItem>("SELECT * FROM market_items WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    /// 在售商品，按关键字模糊匹配标题
    pub async fn list_on_sale(
        &self,
        keyword: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> DatabaseResult<Vec<DbMarketItem>> {
        let offset = (page.saturating_sub(1) * page_size) as i64;
        let pattern = keyword.map(|k| format!("%{}%", k));

        let items = sqlx::query_as::<_, DbMarketItem>(
            "SELECT * FROM market_items
             WHERE status = ? AND (? IS NULL OR title LIKE ?)
             ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(MarketStatus::OnSale.as_str())
        .bind(&pattern)
        .bind(&pattern)
        .bind(page_size as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    pub async fn list_by_seller(&self, seller_id: Uuid) -> DatabaseResult<Vec<DbMarketItem>> {
        let items = sqlx::query_as::<_, DbMarketItem>(
            "SELECT * FROM market_items WHERE seller_id = ? ORDER BY created_at DESC",
        )
        .bind(seller_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// 更新商品信息，限卖家本人
    pub async fn update(
        &self,
        id: Uuid,
        seller_id: Uuid,
        title: Option<&str>,
        description: Option<&str>,
        price_cents: Option<i64>,
        status: Option<MarketStatus>,
    ) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "UPDATE market_items SET
                title = COALESCE(?, title),
                description = COALESCE(?, description),
                price_cents = COALESCE(?, price_cents),
                status = COALESCE(?, status),
                updated_at = ?
             WHERE id = ? AND seller_id = ?",
        )
        .bind(title)
        .bind(description)
        .bind(price_cents)
        .bind(status.map(|s| s.as_str()))
        .bind(Utc::now())
        .bind(id.to_string())
        .bind(seller_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: Uuid, seller_id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM market_items WHERE id = ? AND seller_id = ?")
            .bind(id.to_string())
            .bind(seller_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
