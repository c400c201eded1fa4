use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::database::models::{BillStatus, DbBill};
use crate::database::DatabaseResult;

/// 账单仓库
#[derive(Clone)]
pub struct BillRepository {
    pool: SqlitePool,
}

impl BillRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, bill: &DbBill) -> DatabaseResult<()> {
        debug!("创建账单: {} {}", bill.no, bill.period);

        sqlx::query(
            "INSERT INTO bills
                (id, no, house_id, user_id, kind, period, amount_cents, status, paid_at,
                 payment_method, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&bill.id)
        .bind(&bill.no)
        .bind(&bill.house_id)
        .bind(&bill.user_id)
        .bind(&bill.kind)
        .bind(&bill.period)
        .bind(bill.amount_cents)
        .bind(&bill.status)
        .bind(bill.paid_at)
        .bind(&bill.payment_method)
        .bind(&bill.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// 批量生成时按 (house, kind, period) 幂等插入，返回是否新插入
    pub async fn create_if_absent(&self, bill: &DbBill) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO bills
                (id, no, house_id, user_id, kind, period, amount_cents, status, paid_at,
                 payment_method, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&bill.id)
        .bind(&bill.no)
        .bind(&bill.house_id)
        .bind(&bill.user_id)
        .bind(&bill.kind)
        .bind(&bill.period)
        .bind(bill.amount_cents)
        .bind(&bill.status)
        .bind(bill.paid_at)
        .bind(&bill.payment_method)
        .bind(&bill.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<DbBill>> {
        let bill = sqlx::query_as::<_, DbBill>("SELECT * FROM bills WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(bill)
    }

    pub async fn list_by_user(
        &self,
        user_id: Uuid,
        status: Option<BillStatus>,
    ) -> DatabaseResult<Vec<DbBill>> {
        let bills = match status {
            Some(status) => {
                sqlx::query_as::<_, DbBill>(
                    "SELECT * FROM bills WHERE user_id = ? AND status = ?
                     ORDER BY created_at DESC",
                )
                .bind(user_id.to_string())
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, DbBill>(
                    "SELECT * FROM bills WHERE user_id = ? ORDER BY created_at DESC",
                )
                .bind(user_id.to_string())
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(bills)
    }

    pub async fn list(
        &self,
        status: Option<BillStatus>,
        period: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> DatabaseResult<Vec<DbBill>> {
        let offset = (page.saturating_sub(1) * page_size) as i64;

        // 两个可选过滤条件归一成一条语句
        let bills = sqlx::query_as::<_, DbBill>(
            "SELECT * FROM bills
             WHERE (? IS NULL OR status = ?) AND (? IS NULL OR period = ?)
             ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(status.map(|s| s.as_str()))
        .bind(status.map(|s| s.as_str()))
        .bind(period)
        .bind(period)
        .bind(page_size as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(bills)
    }

    /// 缴费：Unpaid -> Paid，限本人账单，只成功一次
    pub async fn pay(
        &self,
        id: Uuid,
        user_id: Uuid,
        payment_method: &str,
    ) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "UPDATE bills SET status = ?, paid_at = ?, payment_method = ?
             WHERE id = ? AND user_id = ? AND status = ?",
        )
        .bind(BillStatus::Paid.as_str())
        .bind(Utc::now())
        .bind(payment_method)
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(BillStatus::Unpaid.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
