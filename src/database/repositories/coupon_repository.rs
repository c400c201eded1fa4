use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::models::{CouponStatus, DbCoupon, DbUserCoupon};
use crate::database::DatabaseResult;

/// 核销结果
#[derive(Debug)]
pub enum CouponVerifyOutcome {
    Verified(DbUserCoupon),
    NotFound,
    Expired,
    AlreadyUsed,
}

/// 优惠券仓库。领取量与核销量都用带守卫的原子更新维护。
#[derive(Clone)]
pub struct CouponRepository {
    pool: SqlitePool,
}

impl CouponRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, coupon: &DbCoupon) -> DatabaseResult<()> {
        debug!("创建优惠券: {}", coupon.title);

        sqlx::query(
            "INSERT INTO coupons
                (id, shop_id, title, discount_cents, min_spend_cents, total_count,
                 claimed_count, used_count, valid_from, valid_until, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&coupon.id)
        .bind(&coupon.shop_id)
        .bind(&coupon.title)
        .bind(coupon.discount_cents)
        .bind(coupon.min_spend_cents)
        .bind(coupon.total_count)
        .bind(coupon.claimed_count)
        .bind(coupon.used_count)
        .bind(coupon.valid_from)
        .bind(coupon.valid_until)
        .bind(coupon.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<DbCoupon>> {
        let coupon = sqlx::query_as::<_, DbCoupon>("SELECT * FROM coupons WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(coupon)
    }

    pub async fn list_by_shop(&self, shop_id: Uuid) -> DatabaseResult<Vec<DbCoupon>> {
        let coupons = sqlx::query_as::<_, DbCoupon>(
            "SELECT * FROM coupons WHERE shop_id = ? ORDER BY created_at DESC",
        )
        .bind(shop_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(coupons)
    }

    /// 可领取的券：在有效期内且还有剩余
    pub async fn list_claimable(
        &self,
        shop_id: Uuid,
        now: DateTime<Utc>,
    ) -> DatabaseResult<Vec<DbCoupon>> {
        let coupons = sqlx::query_as::<_, DbCoupon>(
            "SELECT * FROM coupons
             WHERE shop_id = ? AND valid_from <= ? AND valid_until >= ?
               AND claimed_count < total_count
             ORDER BY created_at DESC",
        )
        .bind(shop_id.to_string())
        .bind(now)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(coupons)
    }

    /// 领券。领取计数的守卫与券实例落库在同一事务：
    /// 超发返回 Ok(false)，重复领取冒出 Duplicate。
    pub async fn claim(
        &self,
        coupon_id: Uuid,
        user_id: Uuid,
        code: &str,
        now: DateTime<Utc>,
    ) -> DatabaseResult<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE coupons SET claimed_count = claimed_count + 1
             WHERE id = ? AND claimed_count < total_count
               AND valid_from <= ? AND valid_until >= ?",
        )
        .bind(coupon_id.to_string())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO user_coupons (id, coupon_id, user_id, code, status, claimed_at, used_at)
             VALUES (?, ?, ?, ?, ?, ?, NULL)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(coupon_id.to_string())
        .bind(user_id.to_string())
        .bind(code)
        .bind(CouponStatus::Unused.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!("Coupon {} claimed by {}", coupon_id, user_id);
        Ok(true)
    }

    pub async fn find_user_coupon(&self, id: Uuid) -> DatabaseResult<Option<DbUserCoupon>> {
        let user_coupon =
            sqlx::query_as::<_, DbUserCoupon>("SELECT * FROM user_coupons WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        Ok(user_coupon)
    }

    pub async fn list_by_user(
        &self,
        user_id: Uuid,
        status: Option<CouponStatus>,
    ) -> DatabaseResult<Vec<DbUserCoupon>> {
        let user_coupons = sqlx::query_as::<_, DbUserCoupon>(
            "SELECT * FROM user_coupons
             WHERE user_id = ? AND (? IS NULL OR status = ?)
             ORDER BY claimed_at DESC",
        )
        .bind(user_id.to_string())
        .bind(status.map(|s| s.as_str()))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        Ok(user_coupons)
    }

    /// 到店核销：码属于本店、未用、在有效期内。
    /// 实例状态与模板核销量在同一事务内更新。
    pub async fn verify(
        &self,
        shop_id: Uuid,
        code: &str,
        now: DateTime<Utc>,
    ) -> DatabaseResult<CouponVerifyOutcome> {
        let mut tx = self.pool.begin().await?;

        let row: Option<DbUserCoupon> = sqlx::query_as(
            "SELECT uc.* FROM user_coupons uc
             JOIN coupons c ON c.id = uc.coupon_id
             WHERE uc.code = ? AND c.shop_id = ?",
        )
        .bind(code)
        .bind(shop_id.to_string())
        .fetch_optional(&mut *tx)
        .await?;

        let user_coupon = match row {
            Some(user_coupon) => user_coupon,
            None => {
                tx.rollback().await?;
                return Ok(CouponVerifyOutcome::NotFound);
            }
        };

        if user_coupon.status == CouponStatus::Used.as_str() {
            tx.rollback().await?;
            return Ok(CouponVerifyOutcome::AlreadyUsed);
        }

        let in_validity: Option<(i64,)> = sqlx::query_as(
            "SELECT COUNT(*) FROM coupons
             WHERE id = ? AND valid_from <= ? AND valid_until >= ?",
        )
        .bind(&user_coupon.coupon_id)
        .bind(now)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        if in_validity.map(|(n,)| n == 0).unwrap_or(true) {
            tx.rollback().await?;
            return Ok(CouponVerifyOutcome::Expired);
        }

        let result = sqlx::query(
            "UPDATE user_coupons SET status = ?, used_at = ? WHERE id = ? AND status = ?",
        )
        .bind(CouponStatus::Used.as_str())
        .bind(now)
        .bind(&user_coupon.id)
        .bind(CouponStatus::Unused.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(CouponVerifyOutcome::AlreadyUsed);
        }

        let result = sqlx::query(
            "UPDATE coupons SET used_count = used_count + 1
             WHERE id = ? AND used_count < total_count",
        )
        .bind(&user_coupon.coupon_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(CouponVerifyOutcome::AlreadyUsed);
        }

        tx.commit().await?;

        info!("Coupon code {} verified at shop {}", code, shop_id);
        Ok(CouponVerifyOutcome::Verified(DbUserCoupon {
            status: CouponStatus::Used.as_str().to_string(),
            used_at: Some(now),
            ..user_coupon
        }))
    }
}
