use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::models::{Role, User};
use crate::error::LinliError;

/// JWT 声明
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// 用户 ID
    pub sub: String,
    /// 用户名
    pub username: String,
    /// 角色
    pub role: Role,
    /// 签发时间
    pub iat: i64,
    /// 过期时间
    pub exp: i64,
    /// 签发者
    pub iss: String,
    /// 受众
    pub aud: String,
}

/// JWT 管理器
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    access_token_duration: Duration,
    refresh_token_duration: Duration,
}

impl JwtManager {
    pub fn new(secret: &str, issuer: String, audience: String) -> Result<Self> {
        Self::validate_secret_strength(secret)?;

        let encoding_key = EncodingKey::from_secret(secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&issuer]);
        validation.set_audience(&[&audience]);
        validation.leeway = 30;
        validation.validate_exp = true;
        validation.validate_aud = true;

        Ok(Self {
            encoding_key,
            decoding_key,
            validation,
            issuer,
            audience,
            access_token_duration: Duration::hours(2),
            refresh_token_duration: Duration::days(7),
        })
    }

    /// 验证 JWT 密钥强度
    fn validate_secret_strength(secret: &str) -> Result<()> {
        if secret.len() < 16 {
            anyhow::bail!(
                "JWT secret must be at least 16 characters long. Current length: {}",
                secret.len()
            );
        }

        if secret.len() > 512 {
            anyhow::bail!(
                "JWT secret must not exceed 512 characters. Current length: {}",
                secret.len()
            );
        }

        Ok(())
    }

    /// 生成访问令牌
    pub fn generate_access_token(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.access_token_duration).timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| LinliError::internal(format!("JWT encoding error: {}", e)).into())
    }

    /// 生成刷新令牌
    pub fn generate_refresh_token(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.refresh_token_duration).timestamp(),
            iss: format!("{}-refresh", self.issuer),
            aud: self.audience.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| LinliError::internal(format!("JWT encoding error: {}", e)).into())
    }

    /// 验证访问令牌
    pub fn validate_access_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .context("Failed to decode JWT token")
            .map_err(|e| LinliError::authentication(format!("Invalid JWT token: {}", e)))?;

        // 拒绝用刷新令牌访问接口
        if token_data.claims.iss.ends_with("-refresh") {
            return Err(LinliError::authentication("Invalid token type").into());
        }

        Ok(token_data.claims)
    }

    /// 验证刷新令牌
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims> {
        let mut validation = self.validation.clone();
        validation.set_issuer(&[&format!("{}-refresh", self.issuer)]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)
            .context("Failed to decode refresh token")
            .map_err(|e| LinliError::authentication(format!("Invalid refresh token: {}", e)))?;

        Ok(token_data.claims)
    }

    pub fn access_token_duration_secs(&self) -> i64 {
        self.access_token_duration.num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn test_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "zhangsan".to_string(),
            phone: "13800000001".to_string(),
            email: None,
            nickname: None,
            avatar: None,
            role: Role::Resident,
            is_active: true,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    fn manager() -> JwtManager {
        JwtManager::new(
            "unit-test-secret-0123456789abcdef",
            "linli".to_string(),
            "linli-api".to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_access_token_round_trip() {
        let manager = manager();
        let user = test_user();

        let token = manager.generate_access_token(&user).unwrap();
        let claims = manager.validate_access_token(&token).unwrap();

        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.username, user.username);
        assert_eq!(claims.role, Role::Resident);
    }

    #[test]
    fn test_refresh_token_rejected_as_access_token() {
        let manager = manager();
        let user = test_user();

        let refresh = manager.generate_refresh_token(&user).unwrap();
        assert!(manager.validate_access_token(&refresh).is_err());
        assert!(manager.validate_refresh_token(&refresh).is_ok());
    }

    #[test]
    fn test_weak_secret_rejected() {
        assert!(JwtManager::new("short", "linli".to_string(), "linli-api".to_string()).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        let manager = manager();
        assert!(manager.validate_access_token("not-a-token").is_err());
    }
}
