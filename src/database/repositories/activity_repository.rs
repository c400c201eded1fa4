use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::database::models::{ActivityStatus, DbActivity, DbActivityRegistration};
use crate::database::DatabaseResult;

/// 社区活动仓库。报名人数通过带守卫的原子更新维护，避免并发丢失更新。
#[derive(Clone)]
pub struct ActivityRepository {
    pool: SqlitePool,
}

impl ActivityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, activity: &DbActivity) -> DatabaseResult<()> {
        debug!("创建活动: {}", activity.title);

        sqlx::query(
            "INSERT INTO activities
                (id, title, content, location, starts_at, ends_at, capacity, participant_count,
                 status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&activity.id)
        .bind(&activity.title)
        .bind(&activity.content)
        .bind(&activity.location)
        .bind(activity.starts_at)
        .bind(activity.ends_at)
        .bind(activity.capacity)
        .bind(activity.participant_count)
        .bind(&activity.status)
        .bind(activity.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<DbActivity>> {
        let activity = sqlx::query_as::<_, DbActivity>("SELECT * FROM activities WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(activity)
    }

    pub async fn list(&self, page: u32, page_size: u32) -> DatabaseResult<Vec<DbActivity>> {
        let offset = (page.saturating_sub(1) * page_size) as i64;

        let activities = sqlx::query_as::<_, DbActivity>(
            "SELECT * FROM activities ORDER BY starts_at DESC LIMIT ? OFFSET ?",
        )
        .bind(page_size as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(activities)
    }

    pub async fn update(
        &self,
        id: Uuid,
        title: &str,
        content: &str,
        location: &str,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        capacity: i64,
    ) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "UPDATE activities SET title = ?, content = ?, location = ?, starts_at = ?,
                ends_at = ?, capacity = ? WHERE id = ?",
        )
        .bind(title)
        .bind(content)
        .bind(location)
        .bind(starts_at)
        .bind(ends_at)
        .bind(capacity)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn close(&self, id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("UPDATE activities SET status = ? WHERE id = ? AND status = ?")
            .bind(ActivityStatus::Closed.as_str())
            .bind(id.to_string())
            .bind(ActivityStatus::Open.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_registrations(
        &self,
        activity_id: Uuid,
    ) -> DatabaseResult<Vec<DbActivityRegistration>> {
        let registrations = sqlx::query_as::<_, DbActivityRegistration>(
            "SELECT * FROM activity_registrations WHERE activity_id = ? ORDER BY created_at ASC",
        )
        .bind(activity_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(registrations)
    }

    /// 报名。人数守卫与报名行在同一事务内落库：
    /// 守卫未命中（满员/已关闭/已开场）返回 Ok(false)，重复报名冒出 Duplicate。
    pub async fn register(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> DatabaseResult<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE activities SET participant_count = participant_count + 1
             WHERE id = ? AND status = ? AND participant_count < capacity AND starts_at > ?",
        )
        .bind(activity_id.to_string())
        .bind(ActivityStatus::Open.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO activity_registrations (id, activity_id, user_id, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(activity_id.to_string())
        .bind(user_id.to_string())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// 取消报名：删除报名行并回落计数，同一事务
    pub async fn cancel_registration(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
    ) -> DatabaseResult<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "DELETE FROM activity_registrations WHERE activity_id = ? AND user_id = ?",
        )
        .bind(activity_id.to_string())
        .bind(user_id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "UPDATE activities SET participant_count = participant_count - 1
             WHERE id = ? AND participant_count > 0",
        )
        .bind(activity_id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}
