use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::models::{
    ApplicationStatus, AssetStatus, DbHouse, DbHouseBinding, DbHouseBindingApplication,
};
use crate::database::DatabaseResult;

/// 房屋与房屋绑定仓库
#[derive(Clone)]
pub struct HouseRepository {
    pool: SqlitePool,
}

impl HouseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // -- 房屋台账 -----------------------------------------------------------

    pub async fn create(&self, house: &DbHouse) -> DatabaseResult<()> {
        debug!("创建房屋: {}-{}-{}", house.building, house.unit, house.number);

        sqlx::query(
            "INSERT INTO houses (id, building, unit, number, area_m2, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&house.id)
        .bind(&house.building)
        .bind(&house.unit)
        .bind(&house.number)
        .bind(house.area_m2)
        .bind(&house.status)
        .bind(house.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<DbHouse>> {
        let house = sqlx::query_as::<_, DbHouse>("SELECT * FROM houses WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(house)
    }

    pub async fn update(
        &self,
        id: Uuid,
        building: &str,
        unit: &str,
        number: &str,
        area_m2: f64,
    ) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "UPDATE houses SET building = ?, unit = ?, number = ?, area_m2 = ? WHERE id = ?",
        )
        .bind(building)
        .bind(unit)
        .bind(number)
        .bind(area_m2)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// 仅允许删除空置房屋
    pub async fn delete_vacant(&self, id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM houses WHERE id = ? AND status = ?")
            .bind(id.to_string())
            .bind(AssetStatus::Vacant.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list(
        &self,
        building: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> DatabaseResult<Vec<DbHouse>> {
        let offset = (page.saturating_sub(1) * page_size) as i64;

        let houses = match building {
            Some(building) => {
                sqlx::query_as::<_, DbHouse>(
                    "SELECT * FROM houses WHERE building = ?
                     ORDER BY building, unit, number LIMIT ? OFFSET ?",
                )
                .bind(building)
                .bind(page_size as i64)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, DbHouse>(
                    "SELECT * FROM houses ORDER BY building, unit, number LIMIT ? OFFSET ?",
                )
                .bind(page_size as i64)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(houses)
    }

    pub async fn list_occupied(&self) -> DatabaseResult<Vec<DbHouse>> {
        let houses = sqlx::query_as::<_, DbHouse>("SELECT * FROM houses WHERE status = ?")
            .bind(AssetStatus::Occupied.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(houses)
    }

    pub async fn set_status(&self, id: Uuid, status: AssetStatus) -> DatabaseResult<()> {
        sqlx::query("UPDATE houses SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // -- 绑定申请 -----------------------------------------------------------

    pub async fn create_application(
        &self,
        application: &DbHouseBindingApplication,
    ) -> DatabaseResult<()> {
        sqlx::query(
            "INSERT INTO house_binding_applications
                (id, house_id, applicant_id, relation, status, reject_reason, reviewer_id,
                 created_at, reviewed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&application.id)
        .bind(&application.house_id)
        .bind(&application.applicant_id)
        .bind(&application.relation)
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
    ) -> DatabaseResult<Option<DbHouseBindingApplication>> {
        let application = sqlx::query_as::<_, DbHouseBindingApplication>(
            "SELECT * FROM house_binding_applications WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        Ok(application)
    }

    /// 申请人对同一房屋是否已有待审申请
    pub async fn has_pending_application(
        &self,
        house_id: Uuid,
        applicant_id: Uuid,
    ) -> DatabaseResult<bool> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM house_binding_applications
             WHERE house_id = ? AND applicant_id = ? AND status = ?",
        )
        .bind(house_id.to_string())
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
    ) -> DatabaseResult<Vec<DbHouseBindingApplication>> {
        let offset = (page.saturating_sub(1) * page_size) as i64;

        let applications = match status {
            Some(status) => {
                sqlx::query_as::<_, DbHouseBindingApplication>(
                    "SELECT * FROM house_binding_applications WHERE status = ?
                     ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(status.as_str())
                .bind(page_size as i64)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, DbHouseBindingApplication>(
                    "SELECT * FROM house_binding_applications
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
    ) -> DatabaseResult<Vec<DbHouseBindingApplication>> {
        let applications = sqlx::query_as::<_, DbHouseBindingApplication>(
            "SELECT * FROM house_binding_applications WHERE applicant_id = ?
             ORDER BY created_at DESC",
        )
        .bind(applicant_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(applications)
    }

    /// 审核申请：仅 Pending 状态可落定，返回是否真正发生了状态迁移
    pub async fn review_application(
        &self,
        id: Uuid,
        outcome: ApplicationStatus,
        reviewer_id: Uuid,
        reject_reason: Option<&str>,
    ) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "UPDATE house_binding_applications
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

    pub async fn create_binding(&self, binding: &DbHouseBinding) -> DatabaseResult<()> {
        sqlx::query(
            "INSERT INTO house_bindings (id, house_id, user_id, relation, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&binding.id)
        .bind(&binding.house_id)
        .bind(&binding.user_id)
        .bind(&binding.relation)
        .bind(binding.created_at)
        .execute(&self.pool)
        .await?;

        info!("House binding created: house={} user={}", binding.house_id, binding.user_id);
        Ok(())
    }

    pub async fn binding_exists(&self, house_id: Uuid, user_id: Uuid) -> DatabaseResult<bool> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM house_bindings WHERE house_id = ? AND user_id = ?",
        )
        .bind(house_id.to_string())
        .bind(user_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0 > 0)
    }

    pub async fn find_binding(&self, id: Uuid) -> DatabaseResult<Option<DbHouseBinding>> {
        let binding =
            sqlx::query_as::<_, DbHouseBinding>("SELECT * FROM house_bindings WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        Ok(binding)
    }

    pub async fn list_bindings_by_user(&self, user_id: Uuid) -> DatabaseResult<Vec<DbHouseBinding>> {
        let bindings = sqlx::query_as::<_, DbHouseBinding>(
            "SELECT * FROM house_bindings WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(bindings)
    }

    pub async fn delete_binding(&self, id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM house_bindings WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_bindings_for_house(&self, house_id: Uuid) -> DatabaseResult<i64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM house_bindings WHERE house_id = ?")
                .bind(house_id.to_string())
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }

    /// 房屋的任一当前绑定住户（账单归属人）
    pub async fn primary_binding_for_house(
        &self,
        house_id: Uuid,
    ) -> DatabaseResult<Option<DbHouseBinding>> {
        let binding = sqlx::query_as::<_, DbHouseBinding>(
            "SELECT * FROM house_bindings WHERE house_id = ? ORDER BY created_at ASC LIMIT 1",
        )
        .bind(house_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        Ok(binding)
    }
}
