use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::models::{Permission, Role};
use super::JwtManager;
use crate::database::repositories::UserRepository;
use crate::error::LinliError;

/// 认证上下文 - 从请求中提取的用户信息
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: uuid::Uuid,
    pub username: String,
    pub role: Role,
    pub permissions: std::collections::HashSet<Permission>,
}

impl AuthContext {
    pub fn from_claims(claims: super::Claims) -> Result<Self, LinliError> {
        let user_id = uuid::Uuid::parse_str(&claims.sub)
            .map_err(|_| LinliError::authentication("Invalid user ID in token claims"))?;

        Ok(Self {
            user_id,
            username: claims.username,
            role: claims.role,
            permissions: claims.role.permissions(),
        })
    }

    pub fn has_permission(&self, permission: &Permission) -> bool {
        self.permissions.contains(permission)
    }

    /// 权限检查，缺少权限时返回 403 业务错误
    pub fn ensure(&self, permission: Permission) -> Result<(), LinliError> {
        if self.has_permission(&permission) {
            return Ok(());
        }
        warn!(
            "User {} lacks required permission {:?}",
            self.username, permission
        );
        Err(LinliError::authorization("无权执行该操作"))
    }
}

/// 认证中间件
pub struct AuthMiddleware {
    jwt_manager: Arc<JwtManager>,
    users: UserRepository,
}

impl AuthMiddleware {
    pub fn new(jwt_manager: Arc<JwtManager>, users: UserRepository) -> Self {
        Self { jwt_manager, users }
    }

    /// JWT 认证中间件
    pub async fn jwt_auth(
        State(auth_middleware): State<Arc<Self>>,
        mut request: Request,
        next: Next,
    ) -> Result<Response, StatusCode> {
        // 从 Authorization 头中提取令牌
        let auth_header = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        let token = match auth_header {
            Some(header) if header.starts_with("Bearer ") => {
                let token_part = &header[7..];

                if token_part.is_empty() || token_part.len() > 4096 {
                    warn!("Invalid token format: length={}", token_part.len());
                    return Err(StatusCode::UNAUTHORIZED);
                }

                token_part
            }
            _ => {
                warn!("Missing or invalid Authorization header");
                return Err(StatusCode::UNAUTHORIZED);
            }
        };

        let claims = match auth_middleware.jwt_manager.validate_access_token(token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!("JWT validation failed: {}", e);
                return Err(StatusCode::UNAUTHORIZED);
            }
        };

        let auth_context =
            AuthContext::from_claims(claims).map_err(|_| StatusCode::UNAUTHORIZED)?;

        // 停用账号的令牌即刻失效
        match auth_middleware.users.find_by_id(auth_context.user_id).await {
            Ok(Some(user)) if user.is_active => {}
            Ok(_) => {
                warn!("Rejected token of inactive user {}", auth_context.username);
                return Err(StatusCode::UNAUTHORIZED);
            }
            Err(e) => {
                warn!("Database error during auth: {}", e);
                return Err(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }

        debug!("User authenticated: {}", auth_context.username);
        request.extensions_mut().insert(auth_context);
        Ok(next.run(request).await)
    }
}

/// 认证提取器 - 用于处理函数中提取认证信息
pub struct AuthExtractor(pub AuthContext);

impl<S> axum::extract::FromRequestParts<S> for AuthExtractor
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let auth_context = parts
            .extensions
            .get::<AuthContext>()
            .ok_or(StatusCode::UNAUTHORIZED)?
            .clone();

        Ok(AuthExtractor(auth_context))
    }
}

