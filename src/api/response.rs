//! 统一响应信封 {code, message, data}，HTTP 状态码与业务码同步。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use tracing::error;

use crate::error::LinliError;

/// 业务码
pub mod codes {
    pub const OK: i32 = 0;
    pub const VALIDATION: i32 = 1001;
    pub const UNAUTHORIZED: i32 = 1002;
    pub const FORBIDDEN: i32 = 1003;
    pub const NOT_FOUND: i32 = 1004;
    pub const CONFLICT: i32 = 1005;
    pub const UPSTREAM: i32 = 1006;
    pub const INTERNAL: i32 = 1500;
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            code: codes::OK,
            message: "ok".to_string(),
            data: Some(data),
        })
    }

    pub fn ok_with(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            code: codes::OK,
            message: message.into(),
            data: Some(data),
        })
    }
}

impl ApiResponse<serde_json::Value> {
    /// 无数据负载的成功响应
    pub fn message(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            code: codes::OK,
            message: message.into(),
            data: None,
        })
    }
}

/// 处理函数的统一返回类型
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, LinliError>;

impl IntoResponse for LinliError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            LinliError::Validation(_) => (StatusCode::BAD_REQUEST, codes::VALIDATION),
            LinliError::Authentication(_) => (StatusCode::UNAUTHORIZED, codes::UNAUTHORIZED),
            LinliError::Authorization(_) => (StatusCode::FORBIDDEN, codes::FORBIDDEN),
            LinliError::NotFound(_) => (StatusCode::NOT_FOUND, codes::NOT_FOUND),
            LinliError::Conflict(_) => (StatusCode::CONFLICT, codes::CONFLICT),
            LinliError::Upstream(_) => (StatusCode::BAD_GATEWAY, codes::UPSTREAM),
            LinliError::Database(crate::database::DatabaseError::NotFound) => {
                (StatusCode::NOT_FOUND, codes::NOT_FOUND)
            }
            LinliError::Database(crate::database::DatabaseError::Duplicate) => {
                (StatusCode::CONFLICT, codes::CONFLICT)
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, codes::INTERNAL),
        };

        // 业务错误透出原始文案；服务端错误只回笼统信息，细节进日志
        let message = match &self {
            LinliError::Validation(m)
            | LinliError::Authentication(m)
            | LinliError::Authorization(m)
            | LinliError::NotFound(m)
            | LinliError::Conflict(m)
            | LinliError::Upstream(m) => m.clone(),
            LinliError::Database(crate::database::DatabaseError::NotFound) => {
                "记录不存在".to_string()
            }
            LinliError::Database(crate::database::DatabaseError::Duplicate) => {
                "记录已存在".to_string()
            }
            other => {
                error!("Internal error: {}", other);
                "服务器内部错误".to_string()
            }
        };

        let body = Json(ApiResponse::<serde_json::Value> {
            code,
            message,
            data: None,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseError;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_business_error_keeps_message() {
        let response = LinliError::validation("手机号格式不正确").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["code"], codes::VALIDATION);
        assert_eq!(body["message"], "手机号格式不正确");
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn test_internal_error_is_masked() {
        let response = LinliError::internal("secret detail").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["code"], codes::INTERNAL);
        assert_eq!(body["message"], "服务器内部错误");
    }

    #[tokio::test]
    async fn test_database_not_found_maps_to_404() {
        let response = LinliError::from(DatabaseError::NotFound).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["code"], codes::NOT_FOUND);
    }
}
