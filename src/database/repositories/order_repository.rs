use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::models::{DbShopOrder, DbShopOrderItem, OrderStatus};
use crate::database::DatabaseResult;

/// 下单结果。库存与券的守卫在事务内判定。
#[derive(Debug)]
pub enum PlaceOrderOutcome {
    Placed,
    InsufficientStock { product_id: String },
    CouponUnavailable,
}

/// 店铺订单仓库。跨商品、券、店铺计数的写入都收拢在单个事务里。
#[derive(Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 下单：扣减库存、核销券、落订单与明细、累加店铺接单数。
    /// 任一守卫未命中则整体回滚。
    pub async fn place(
        &self,
        order: &DbShopOrder,
        items: &[DbShopOrderItem],
    ) -> DatabaseResult<PlaceOrderOutcome> {
        debug!("下单: {} 共 {} 项", order.no, items.len());

        let mut tx = self.pool.begin().await?;

        // 逐项扣库存，要求在架且存量充足
        for item in items {
            let result = sqlx::query(
                "UPDATE products SET stock = stock - ?
                 WHERE id = ? AND shop_id = ? AND on_shelf = 1 AND stock >= ?",
            )
            .bind(item.quantity)
            .bind(&item.product_id)
            .bind(&order.shop_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                tx.rollback().await?;
                return Ok(PlaceOrderOutcome::InsufficientStock {
                    product_id: item.product_id.clone(),
                });
            }
        }

        // 用券：券实例置已用，模板计数原子递增且不越过发放总量
        if let Some(user_coupon_id) = &order.user_coupon_id {
            let result = sqlx::query(
                "UPDATE user_coupons SET status = 'Used', used_at = ?
                 WHERE id = ? AND user_id = ? AND status = 'Unused'",
            )
            .bind(Utc::now())
            .bind(user_coupon_id)
            .bind(&order.buyer_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                tx.rollback().await?;
                return Ok(PlaceOrderOutcome::CouponUnavailable);
            }

            let result = sqlx::query(
                "UPDATE coupons SET used_count = used_count + 1
                 WHERE id = (SELECT coupon_id FROM user_coupons WHERE id = ?)
                   AND used_count < total_count",
            )
            .bind(user_coupon_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                tx.rollback().await?;
                return Ok(PlaceOrderOutcome::CouponUnavailable);
            }
        }

        sqlx::query(
            "INSERT INTO shop_orders
                (id, no, shop_id, buyer_id, total_cents, discount_cents, payable_cents,
                 user_coupon_id, pickup_code, status, remark, cancelled_reason, created_at,
                 accepted_at, completed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order.id)
        .bind(&order.no)
        .bind(&order.shop_id)
        .bind(&order.buyer_id)
        .bind(order.total_cents)
        .bind(order.discount_cents)
        .bind(order.payable_cents)
        .bind(&order.user_coupon_id)
        .bind(&order.pickup_code)
        .bind(&order.status)
        .bind(&order.remark)
        .bind(&order.cancelled_reason)
        .bind(order.created_at)
        .bind(order.accepted_at)
        .bind(order.completed_at)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                "INSERT INTO shop_order_items
                    (id, order_id, product_id, product_name, unit_price_cents, quantity)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&item.id)
            .bind(&item.order_id)
            .bind(&item.product_id)
            .bind(&item.product_name)
            .bind(item.unit_price_cents)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE shops SET total_orders = total_orders + 1 WHERE id = ?")
            .bind(&order.shop_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!("Order placed: {} payable={}", order.no, order.payable_cents);
        Ok(PlaceOrderOutcome::Placed)
    }

    pub async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<DbShopOrder>> {
        let order = sqlx::query_as::<_, DbShopOrder>("SELECT * FROM shop_orders WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    pub async fn items(&self, order_id: Uuid) -> DatabaseResult<Vec<DbShopOrderItem>> {
        let items = sqlx::query_as::<_, DbShopOrderItem>(
            "SELECT * FROM shop_order_items WHERE order_id = ?",
        )
        .bind(order_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    pub async fn list_by_buyer(&self, buyer_id: Uuid) -> DatabaseResult<Vec<DbShopOrder>> {
        let orders = sqlx::query_as::<_, DbShopOrder>(
            "SELECT * FROM shop_orders WHERE buyer_id = ? ORDER BY created_at DESC",
        )
        .bind(buyer_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    pub async fn list_by_shop(
        &self,
        shop_id: Uuid,
        status: Option<OrderStatus>,
    ) -> DatabaseResult<Vec<DbShopOrder>> {
        let orders = sqlx::query_as::<_, DbShopOrder>(
            "SELECT * FROM shop_orders
             WHERE shop_id = ? AND (? IS NULL OR status = ?)
             ORDER BY created_at DESC",
        )
        .bind(shop_id.to_string())
        .bind(status.map(|s| s.as_str()))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    /// 取货码在本店待取订单中是否已被占用
    pub async fn pickup_code_in_use(
        &self,
        shop_id: Uuid,
        pickup_code: &str,
    ) -> DatabaseResult<bool> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM shop_orders
             WHERE shop_id = ? AND pickup_code = ? AND status = ?",
        )
        .bind(shop_id.to_string())
        .bind(pickup_code)
        .bind(OrderStatus::Accepted.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0 > 0)
    }

    /// 接单：Pending -> Accepted，签发取货码
    pub async fn accept(
        &self,
        id: Uuid,
        shop_id: Uuid,
        pickup_code: &str,
    ) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "UPDATE shop_orders SET status = ?, pickup_code = ?, accepted_at = ?
             WHERE id = ? AND shop_id = ? AND status = ?",
        )
        .bind(OrderStatus::Accepted.as_str())
        .bind(pickup_code)
        .bind(Utc::now())
        .bind(id.to_string())
        .bind(shop_id.to_string())
        .bind(OrderStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// 取消待接单订单：回补库存、退回券，同一事务。
    /// 调用方先行校验取消人身份。
    pub async fn cancel_pending(&self, id: Uuid, reason: Option<&str>) -> DatabaseResult<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE shop_orders SET status = ?, cancelled_reason = ?
             WHERE id = ? AND status = ?",
        )
        .bind(OrderStatus::Cancelled.as_str())
        .bind(reason)
        .bind(id.to_string())
        .bind(OrderStatus::Pending.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        let items = sqlx::query_as::<_, DbShopOrderItem>(
            "SELECT * FROM shop_order_items WHERE order_id = ?",
        )
        .bind(id.to_string())
        .fetch_all(&mut *tx)
        .await?;

        for item in &items {
            sqlx::query("UPDATE products SET stock = stock + ? WHERE id = ?")
                .bind(item.quantity)
                .bind(&item.product_id)
                .execute(&mut *tx)
                .await?;
        }

        let user_coupon_id: Option<(Option<String>,)> =
            sqlx::query_as("SELECT user_coupon_id FROM shop_orders WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&mut *tx)
                .await?;

        if let Some((Some(user_coupon_id),)) = user_coupon_id {
            sqlx::query(
                "UPDATE user_coupons SET status = 'Unused', used_at = NULL WHERE id = ?",
            )
            .bind(&user_coupon_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "UPDATE coupons SET used_count = used_count - 1
                 WHERE id = (SELECT coupon_id FROM user_coupons WHERE id = ?)
                   AND used_count > 0",
            )
            .bind(&user_coupon_id)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "UPDATE shops SET total_orders = total_orders - 1
             WHERE id = (SELECT shop_id FROM shop_orders WHERE id = ?) AND total_orders > 0",
        )
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// 凭取货码完成订单：限本店 Accepted 订单，只成功一次。
    /// 先定位单号再按主键条件更新，同码多单也只完成一单。
    pub async fn complete_by_pickup(
        &self,
        shop_id: Uuid,
        pickup_code: &str,
    ) -> DatabaseResult<Option<DbShopOrder>> {
        let candidate = sqlx::query_as::<_, DbShopOrder>(
            "SELECT * FROM shop_orders
             WHERE shop_id = ? AND pickup_code = ? AND status = ?
             ORDER BY accepted_at ASC LIMIT 1",
        )
        .bind(shop_id.to_string())
        .bind(pickup_code)
        .bind(OrderStatus::Accepted.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(order) = candidate else {
            return Ok(None);
        };

        let completed_at = Utc::now();
        let result = sqlx::query(
            "UPDATE shop_orders SET status = ?, completed_at = ? WHERE id = ? AND status = ?",
        )
        .bind(OrderStatus::Completed.as_str())
        .bind(completed_at)
        .bind(&order.id)
        .bind(OrderStatus::Accepted.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(DbShopOrder {
            status: OrderStatus::Completed.as_str().to_string(),
            completed_at: Some(completed_at),
            ..order
        }))
    }
}
