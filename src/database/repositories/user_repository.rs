use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::models::{DbSmsCode, DbUser};
use crate::database::DatabaseResult;

/// 用户仓库
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 创建用户
    pub async fn create(&self, user: &DbUser) -> DatabaseResult<()> {
        debug!("创建用户: {}", user.username);

        sqlx::query(
            "INSERT INTO users (id, username, phone, email, nickname, avatar, password_salt,
                password_hash, role, wechat_openid, is_active, created_at, last_login)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.phone)
        .bind(&user.email)
        .bind(&user.nickname)
        .bind(&user.avatar)
        .bind(&user.password_salt)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(&user.wechat_openid)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.last_login)
        .execute(&self.pool)
        .await?;

        info!("Created user: {}", user.username);
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<DbUser>> {
        let user = sqlx::query_as::<_, DbUser>("SELECT * FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// 登录标识可以是用户名或手机号
    pub async fn find_by_login(&self, login: &str) -> DatabaseResult<Option<DbUser>> {
        let user =
            sqlx::query_as::<_, DbUser>("SELECT * FROM users WHERE username = ? OR phone = ?")
                .bind(login)
                .bind(login)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    pub async fn find_by_phone(&self, phone: &str) -> DatabaseResult<Option<DbUser>> {
        let user = sqlx::query_as::<_, DbUser>("SELECT * FROM users WHERE phone = ?")
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_by_openid(&self, openid: &str) -> DatabaseResult<Option<DbUser>> {
        let user = sqlx::query_as::<_, DbUser>("SELECT * FROM users WHERE wechat_openid = ?")
            .bind(openid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn update_profile(
        &self,
        id: Uuid,
        nickname: Option<&str>,
        email: Option<&str>,
    ) -> DatabaseResult<()> {
        sqlx::query("UPDATE users SET nickname = COALESCE(?, nickname), email = COALESCE(?, email) WHERE id = ?")
            .bind(nickname)
            .bind(email)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_avatar(&self, id: Uuid, avatar: &str) -> DatabaseResult<()> {
        sqlx::query("UPDATE users SET avatar = ? WHERE id = ?")
            .bind(avatar)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_password(&self, id: Uuid, salt: &str, hash: &str) -> DatabaseResult<()> {
        sqlx::query("UPDATE users SET password_salt = ?, password_hash = ? WHERE id = ?")
            .bind(salt)
            .bind(hash)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_last_login(&self, id: Uuid) -> DatabaseResult<()> {
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_role(&self, id: Uuid, role: &str) -> DatabaseResult<bool> {
        let result = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_active(&self, id: Uuid, active: bool) -> DatabaseResult<bool> {
        let result = sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
            .bind(active)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// 分页列出用户，可按角色过滤
    pub async fn list(
        &self,
        role: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> DatabaseResult<Vec<DbUser>> {
        let offset = (page.saturating_sub(1) * page_size) as i64;

        let users = match role {
            Some(role) => {
                sqlx::query_as::<_, DbUser>(
                    "SELECT * FROM users WHERE role = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(role)
                .bind(page_size as i64)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, DbUser>(
                    "SELECT * FROM users ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(page_size as i64)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(users)
    }

    // -- 短信验证码 ---------------------------------------------------------

    pub async fn insert_sms_code(&self, code: &DbSmsCode) -> DatabaseResult<()> {
        sqlx::query(
            "INSERT INTO sms_codes (id, phone, code, expires_at, consumed, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&code.id)
        .bind(&code.phone)
        .bind(&code.code)
        .bind(code.expires_at)
        .bind(code.consumed)
        .bind(code.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// 某手机号最近一次发出的未消费验证码
    pub async fn latest_sms_code(&self, phone: &str) -> DatabaseResult<Option<DbSmsCode>> {
        let code = sqlx::query_as::<_, DbSmsCode>(
            "SELECT * FROM sms_codes WHERE phone = ? AND consumed = 0
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;
        Ok(code)
    }

    /// 消费验证码，只成功一次
    pub async fn consume_sms_code(&self, id: &str) -> DatabaseResult<bool> {
        let result = sqlx::query("UPDATE sms_codes SET consumed = 1 WHERE id = ? AND consumed = 0")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// 节流检查：since 之后是否已发过验证码
    pub async fn sms_sent_since(
        &self,
        phone: &str,
        since: DateTime<Utc>,
    ) -> DatabaseResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT COUNT(*) FROM sms_codes WHERE phone = ? AND created_at > ?",
        )
        .bind(phone)
        .bind(since)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(n,)| n > 0).unwrap_or(false))
    }
}
