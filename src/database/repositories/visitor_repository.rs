use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::database::models::{DbVisitorPass, PassStatus};
use crate::database::DatabaseResult;

/// 访客通行证仓库
#[derive(Clone)]
pub struct VisitorRepository {
    pool: SqlitePool,
}

impl VisitorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, pass: &DbVisitorPass) -> DatabaseResult<()> {
        sqlx::query(
            "INSERT INTO visitor_passes
                (id, host_id, visitor_name, visitor_phone, plate, visit_date, code, status,
                 created_at, used_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&pass.id)
        .bind(&pass.host_id)
        .bind(&pass.visitor_name)
        .bind(&pass.visitor_phone)
        .bind(&pass.plate)
        .bind(pass.visit_date)
        .bind(&pass.code)
        .bind(&pass.status)
        .bind(pass.created_at)
        .bind(pass.used_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_by_host(&self, host_id: Uuid) -> DatabaseResult<Vec<DbVisitorPass>> {
        let passes = sqlx::query_as::<_, DbVisitorPass>(
            "SELECT * FROM visitor_passes WHERE host_id = ? ORDER BY created_at DESC",
        )
        .bind(host_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(passes)
    }

    pub async fn find_by_code(&self, code: &str) -> DatabaseResult<Option<DbVisitorPass>> {
        let pass = sqlx::query_as::<_, DbVisitorPass>(
            "SELECT * FROM visitor_passes WHERE code = ?",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(pass)
    }

    /// 核销通行码：仅当日有效、只成功一次
    pub async fn mark_used(&self, code: &str, today: NaiveDate) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "UPDATE visitor_passes SET status = ?, used_at = ?
             WHERE code = ? AND status = ? AND visit_date = ?",
        )
        .bind(PassStatus::Used.as_str())
        .bind(Utc::now())
        .bind(code)
        .bind(PassStatus::Active.as_str())
        .bind(today)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
