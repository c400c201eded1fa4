use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::database::models::{DbRepairOrder, RepairStatus};
use crate::database::DatabaseResult;

/// 报修工单仓库。状态迁移一律带条件更新，返回是否命中。
#[derive(Clone)]
pub struct RepairRepository {
    pool: SqlitePool,
}

impl RepairRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, order: &DbRepairOrder) -> DatabaseResult<()> {
        debug!("创建工单: {}", order.no);

        sqlx::query(
            "INSERT INTO repair_orders
                (id, no, reporter_id, location, category, description, photos, status,
                 assignee_id, rating, rating_comment, created_at, assigned_at, completed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order.id)
        .bind(&order.no)
        .bind(&order.reporter_id)
        .bind(&order.location)
        .bind(&order.category)
        .bind(&order.description)
        .bind(&order.photos)
        .bind(&order.status)
        .bind(&order.assignee_id)
        .bind(order.rating)
        .bind(&order.rating_comment)
        .bind(order.created_at)
        .bind(order.assigned_at)
        .bind(order.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<DbRepairOrder>> {
        let order = sqlx::query_as::<_, DbRepairOrder>("SELECT * FROM repair_orders WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    pub async fn list_by_reporter(&self, reporter_id: Uuid) -> DatabaseResult<Vec<DbRepairOrder>> {
        let orders = sqlx::query_as::<_, DbRepairOrder>(
            "SELECT * FROM repair_orders WHERE reporter_id = ? ORDER BY created_at DESC",
        )
        .bind(reporter_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    pub async fn list(
        &self,
        status: Option<RepairStatus>,
        page: u32,
        page_size: u32,
    ) -> DatabaseResult<Vec<DbRepairOrder>> {
        let offset = (page.saturating_sub(1) * page_size) as i64;

        let orders = match status {
            Some(status) => {
                sqlx::query_as::<_, DbRepairOrder>(
                    "SELECT * FROM repair_orders WHERE status = ?
                     ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(status.as_str())
                .bind(page_size as i64)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, DbRepairOrder>(
                    "SELECT * FROM repair_orders ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(page_size as i64)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(orders)
    }

    /// 派单：Pending -> Assigned
    pub async fn assign(&self, id: Uuid, assignee_id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "UPDATE repair_orders SET status = ?, assignee_id = ?, assigned_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(RepairStatus::Assigned.as_str())
        .bind(assignee_id.to_string())
        .bind(Utc::now())
        .bind(id.to_string())
        .bind(RepairStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// 开工：Assigned -> Processing，仅限被派单人
    pub async fn start(&self, id: Uuid, assignee_id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "UPDATE repair_orders SET status = ?
             WHERE id = ? AND status = ? AND assignee_id = ?",
        )
        .bind(RepairStatus::Processing.as_str())
        .bind(id.to_string())
        .bind(RepairStatus::Assigned.as_str())
        .bind(assignee_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// 完工：Processing -> Completed，仅限被派单人
    pub async fn complete(&self, id: Uuid, assignee_id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "UPDATE repair_orders SET status = ?, completed_at = ?
             WHERE id = ? AND status = ? AND assignee_id = ?",
        )
        .bind(RepairStatus::Completed.as_str())
        .bind(Utc::now())
        .bind(id.to_string())
        .bind(RepairStatus::Processing.as_str())
        .bind(assignee_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// 撤单：报修人本人、仅 Pending
    pub async fn cancel(&self, id: Uuid, reporter_id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "UPDATE repair_orders SET status = ?
             WHERE id = ? AND status = ? AND reporter_id = ?",
        )
        .bind(RepairStatus::Cancelled.as_str())
        .bind(id.to_string())
        .bind(RepairStatus::Pending.as_str())
        .bind(reporter_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// 评价：完工后报修人一次性写入
    pub async fn rate(
        &self,
        id: Uuid,
        reporter_id: Uuid,
        rating: i64,
        comment: Option<&str>,
    ) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "UPDATE repair_orders SET rating = ?, rating_comment = ?
             WHERE id = ? AND status = ? AND reporter_id = ? AND rating IS NULL",
        )
        .bind(rating)
        .bind(comment)
        .bind(id.to_string())
        .bind(RepairStatus::Completed.as_str())
        .bind(reporter_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
