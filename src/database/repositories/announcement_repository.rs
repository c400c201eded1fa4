use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::database::models::DbAnnouncement;
use crate::database::DatabaseResult;

/// 公告仓库
#[derive(Clone)]
pub struct AnnouncementRepository {
    pool: SqlitePool,
}

impl AnnouncementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, announcement: &DbAnnouncement) -> DatabaseResult<()> {
        sqlx::query(
            "INSERT INTO announcements (id, title, content, author_id, published, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&announcement.id)
        .bind(&announcement.title)
        .bind(&announcement.content)
        .bind(&announcement.author_id)
        .bind(announcement.published)
        .bind(announcement.created_at)
        .bind(announcement.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<DbAnnouncement>> {
        let announcement =
            sqlx::query_as::<_, DbAnnouncement>("SELECT * FROM announcements WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        Ok(announcement)
    }

    pub async fn update(&self, id: Uuid, title: &str, content: &str) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "UPDATE announcements SET title = ?, content = ?, updated_at = ? WHERE id = ?",
        )
        .bind(title)
        .bind(content)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_published(&self, id: Uuid, published: bool) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "UPDATE announcements SET published = ?, updated_at = ? WHERE id = ?",
        )
        .bind(published)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM announcements WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_published(&self, page: u32, page_size: u32) -> DatabaseResult<Vec<DbAnnouncement>> {
        let offset = (page.saturating_sub(1) * page_size) as i64;

        let announcements = sqlx::query_as::<_, DbAnnouncement>(
            "SELECT * FROM announcements WHERE published = 1
             ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(page_size as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(announcements)
    }

    pub async fn list_all(&self, page: u32, page_size: u32) -> DatabaseResult<Vec<DbAnnouncement>> {
        let offset = (page.saturating_sub(1) * page_size) as i64;

        let announcements = sqlx::query_as::<_, DbAnnouncement>(
            "SELECT * FROM announcements ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(page_size as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(announcements)
    }
}
