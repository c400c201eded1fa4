use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::models::{
    ApplicationStatus, AssetStatus, DbParkingBinding, DbParkingBindingApplication, DbParkingSpace,
};
use crate::database::DatabaseResult;

/// 车位与车位绑定仓库
#[derive(Clone)]
pub struct ParkingRepository {
    pool: SqlitePool,
}

impl ParkingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // -- 车位台账 -----------------------------------------------------------

    pub async fn create(&self, space: &DbParkingSpace) -> DatabaseResult<()> {
        debug!("创建车位: {}-{}", space.zone, space.number);

        sqlx::query(
            "INSERT INTO parking_spaces (id, zone, number, kind, monthly_fee_cents, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&space.id)
        .bind(&space.zone)
        .bind(&space.number)
        .bind(&space.kind)
        .bind(space.monthly_fee_cents)
        .bind(&space.status)
        .bind(space.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<DbParkingSpace>> {
        let space = sqlx::query_as::<_, DbParkingSpace>("SELECT * FROM parking_spaces WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(space)
    }

    pub async fn update(
        &self,
        id: Uuid,
        zone: &str,
        number: &str,
        kind: &str,
        monthly_fee_cents: i64,
    ) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "UPDATE parking_spaces SET zone = ?, number = ?, kind = ?, monthly_fee_cents = ?
             WHERE id = ?",
        )
        .bind(zone)
        .bind(number)
        .bind(kind)
        .bind(monthly_fee_cents)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_vacant(&self, id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM parking_spaces WHERE id = ? AND status = ?")
            .bind(id.to_string())
            .bind(AssetStatus::Vacant.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list(
        &self,
        zone: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> DatabaseResult<Vec<DbParkingSpace>> {
        let offset = (page.saturating_sub(1) * page_size) as i64;

        let spaces = match zone {
            Some(zone) => {
                sqlx::query_as::<_, DbParkingSpace>(
                    "SELECT * FROM parking_spaces WHERE zone = ?
                     ORDER BY zone, number LIMIT ? OFFSET ?",
                )
                .bind(zone)
                .bind(page_size as i64)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, DbParkingSpace>(
                    "SELECT * FROM parking_spaces ORDER BY zone, number LIMIT ? OFFSET ?",
                )
                .bind(page_size as i64)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(spaces)
    }

    pub async fn set_status(&self, id: Uuid, status: AssetStatus) -> DatabaseResult<()> {
        sqlx::query("UPDATE parking_spaces SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // -- 绑定申请 -----------------------------------------------------------

    pub async fn create_application(
        &self,
        application: &DbParkingBindingApplication,
    ) -> DatabaseResult<()> {
        sqlx::query(
            "INSERT INTO parking_binding_applications
                (id, space_id, applicant_id, plate, status, reject_reason, reviewer_id,
                 created_at, reviewed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&application.id)
        .bind(&application.space_id)
        .bind(&application.applicant_id)
        .bind(&application.plate)
        .bind(&application.status)
        .bind(&application.reject_reason)
        .bind(&application.reviewer_id)
        .bind(application.created_at)
        .bind(application.reviewed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_application(
        &self,
        id: Uuid,
    ) -> DatabaseResult<Option<DbParkingBindingApplication>> {
        let application = sqlx::query_as::<_, DbParkingBindingApplication>(
            "SELECT * FROM parking_binding_applications WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        Ok(application)
    }

    pub async fn has_pending_application(
        &self,
        space_id: Uuid,
        applicant_id: Uuid,
    ) -> DatabaseResult<bool> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM parking_binding_applications
             WHERE space_id = ? AND applicant_id = ? AND status = ?",
        )
        .bind(space_id.to_string())
        .bind(applicant_id.to_string())
        .bind(ApplicationStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0 > 0)
    }

    pub async fn list_applications(
        &self,
        status: Option<ApplicationStatus>,
        page: u32,
        page_size: u32,
    ) -> DatabaseResult<Vec<DbParkingBindingApplication>> {
        let offset = (page.saturating_sub(1) * page_size) as i64;

        let applications = match status {
            Some(status) => {
                sqlx::query_as::<_, DbParkingBindingApplication>(
                    "SELECT * FROM parking_binding_applications WHERE status = ?
                     ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(status.as_str())
                .bind(page_size as i64)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, DbParkingBindingApplication>(
                    "SELECT * FROM parking_binding_applications
                     ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(page_size as i64)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(applications)
    }

    pub async fn list_applications_by_user(
        &self,
        applicant_id: Uuid,
    ) -> DatabaseResult<Vec<DbParkingBindingApplication>> {
        let applications = sqlx::query_as::<_, DbParkingBindingApplication>(
            "SELECT * FROM parking_binding_applications WHERE applicant_id = ?
             ORDER BY created_at DESC",
        )
        .bind(applicant_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(applications)
    }

    pub async fn review_application(
        &self,
        id: Uuid,
        outcome: ApplicationStatus,
        reviewer_id: Uuid,
        reject_reason: Option<&str>,
    ) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "UPDATE parking_binding_applications
             SET status = ?, reviewer_id = ?, reject_reason = ?, reviewed_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(outcome.as_str())
        .bind(reviewer_id.to_string())
        .bind(reject_reason)
        .bind(Utc::now())
        .bind(id.to_string())
        .bind(ApplicationStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // -- 绑定关系 -----------------------------------------------------------

    pub async fn create_binding(&self, binding: &DbParkingBinding) -> DatabaseResult<()> {
        sqlx::query(
            "INSERT INTO parking_bindings (id, space_id, user_id, plate, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&binding.id)
        .bind(&binding.space_id)
        .bind(&binding.user_id)
        .bind(&binding.plate)
        .bind(binding.created_at)
        .execute(&self.pool)
        .await?;

        info!("Parking binding created: space={} user={}", binding.space_id, binding.user_id);
        Ok(())
    }

    pub async fn binding_exists(&self, space_id: Uuid, user_id: Uuid) -> DatabaseResult<bool> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM parking_bindings WHERE space_id = ? AND user_id = ?",
        )
        .bind(space_id.to_string())
        .bind(user_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0 > 0)
    }

    pub async fn find_binding(&self, id: Uuid) -> DatabaseResult<Option<DbParkingBinding>> {
        let binding =
            sqlx::query_as::<_, DbParkingBinding>("SELECT * FROM parking_bindings WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        Ok(binding)
    }

    pub async fn list_bindings_by_user(
        &self,
        user_id: Uuid,
    ) -> DatabaseResult<Vec<DbParkingBinding>> {
        let bindings = sqlx::query_as::<_, DbParkingBinding>(
            "SELECT * FROM parking_bindings WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(bindings)
    }

    pub async fn delete_binding(&self, id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM parking_bindings WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_bindings_for_space(&self, space_id: Uuid) -> DatabaseResult<i64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM parking_bindings WHERE space_id = ?")
                .bind(space_id.to_string())
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }
}
