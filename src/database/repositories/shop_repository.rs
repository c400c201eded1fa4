use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::models::{DbProduct, DbShop, ShopStatus};
use crate::database::DatabaseResult;

/// 商铺与商品仓库
#[derive(Clone)]
pub struct ShopRepository {
    pool: SqlitePool,
}

impl ShopRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // -- 商铺 ---------------------------------------------------------------

    pub async fn create(&self, shop: &DbShop) -> DatabaseResult<()> {
        debug!("创建商铺: {}", shop.name);

        sqlx::query(
            "INSERT INTO shops
                (id, owner_id, name, description, logo, license_image, phone, status,
                 total_orders, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&shop.id)
        .bind(&shop.owner_id)
        .bind(&shop.name)
        .bind(&shop.description)
        .bind(&shop.logo)
        .bind(&shop.license_image)
        .bind(&shop.phone)
        .bind(&shop.status)
        .bind(shop.total_orders)
        .bind(shop.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<DbShop>> {
        let shop = sqlx::query_as::<_, DbShop>("SELECT * FROM shops WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(shop)
    }

    pub async fn find_by_owner(&self, owner_id: Uuid) -> DatabaseResult<Option<DbShop>> {
        let shop = sqlx::query_as::<_, DbShop>("SELECT * FROM shops WHERE owner_id = ?")
            .bind(owner_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(shop)
    }

    pub async fn update_profile(
        &self,
        id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
        phone: Option<&str>,
        logo: Option<&str>,
    ) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "UPDATE shops SET
                name = COALESCE(?, name),
                description = COALESCE(?, description),
                phone = COALESCE(?, phone),
                logo = COALESCE(?, logo)
             WHERE id = ?",
        )
        .bind(name)
        .bind(description)
        .bind(phone)
        .bind(logo)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list(
        &self,
        status: Option<ShopStatus>,
        page: u32,
        page_size: u32,
    ) -> DatabaseResult<Vec<DbShop>> {
        let offset = (page.saturating_sub(1) * page_size) as i64;

        let shops = sqlx::query_as::<_, DbShop>(
            "SELECT * FROM shops WHERE (? IS NULL OR status = ?)
             ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(status.map(|s| s.as_str()))
        .bind(status.map(|s| s.as_str()))
        .bind(page_size as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(shops)
    }

    /// 入驻审核：仅 Pending 可落定
    pub async fn review(&self, id: Uuid, outcome: ShopStatus) -> DatabaseResult<bool> {
        let result = sqlx::query("UPDATE shops SET status = ? WHERE id = ? AND status = ?")
            .bind(outcome.as_str())
            .bind(id.to_string())
            .bind(ShopStatus::Pending.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            info!("Shop {} reviewed: {}", id, outcome.as_str());
        }
        Ok(result.rows_affected() > 0)
    }

    // -- 商品 ---------------------------------------------------------------

    pub async fn create_product(&self, product: &DbProduct) -> DatabaseResult<()> {
        sqlx::query(
            "INSERT INTO products
                (id, shop_id, name, description, image, price_cents, stock, on_shelf,
                 created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&product.id)
        .bind(&product.shop_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.image)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(product.on_shelf)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_product(&self, id: Uuid) -> DatabaseResult<Option<DbProduct>> {
        let product = sqlx::query_as::<_, DbProduct>("SELECT * FROM products WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    pub async fn update_product(
        &self,
        id: Uuid,
        shop_id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
        price_cents: Option<i64>,
        stock: Option<i64>,
        image: Option<&str>,
    ) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "UPDATE products SET
                name = COALESCE(?, name),
                description = COALESCE(?, description),
                price_cents = COALESCE(?, price_cents),
                stock = COALESCE(?, stock),
                image = COALESCE(?, image),
                updated_at = ?
             WHERE id = ? AND shop_id = ?",
        )
        .bind(name)
        .bind(description)
        .bind(price_cents)
        .bind(stock)
        .bind(image)
        .bind(Utc::now())
        .bind(id.to_string())
        .bind(shop_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_product_shelf(
        &self,
        id: Uuid,
        shop_id: Uuid,
        on_shelf: bool,
    ) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "UPDATE products SET on_shelf = ?, updated_at = ? WHERE id = ? AND shop_id = ?",
        )
        .bind(on_shelf)
        .bind(Utc::now())
        .bind(id.to_string())
        .bind(shop_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_product(&self, id: Uuid, shop_id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = ? AND shop_id = ?")
            .bind(id.to_string())
            .bind(shop_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_products(
        &self,
        shop_id: Uuid,
        on_shelf_only: bool,
    ) -> DatabaseResult<Vec<DbProduct>> {
        let products = if on_shelf_only {
            sqlx::query_as::<_, DbProduct>(
                "SELECT * FROM products WHERE shop_id = ? AND on_shelf = 1
                 ORDER BY created_at DESC",
            )
            .bind(shop_id.to_string())
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, DbProduct>(
                "SELECT * FROM products WHERE shop_id = ? ORDER BY created_at DESC",
            )
            .bind(shop_id.to_string())
            .fetch_all(&self.pool)
            .await?
        };
        Ok(products)
    }
}
