//! 集成测试公共设施：内存库 + 桩网关 + 请求辅助。

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use linli::auth::models::Role;
use linli::auth::{password, JwtManager};
use linli::config::Config;
use linli::database::models::DbUser;
use linli::database::Database;
use linli::integration::{MockSmsGateway, MockWechatClient};
use linli::media::MediaStore;
use linli::server::{create_app, AppState};

pub const TEST_JWT_SECRET: &str = "integration-test-secret-0123456789";

/// 内存库 + 桩依赖的应用状态
pub async fn test_state() -> AppState {
    let mut config = Config::default();
    config.auth.jwt_secret = TEST_JWT_SECRET.to_string();
    config.media.root = std::env::temp_dir()
        .join(format!("linli-test-{}", Uuid::new_v4()))
        .to_string_lossy()
        .into_owned();

    let db = Database::connect_in_memory().await.unwrap();
    let jwt = JwtManager::new(
        &config.auth.jwt_secret,
        config.auth.issuer.clone(),
        config.auth.audience.clone(),
    )
    .unwrap();
    let media = MediaStore::new(&config.media);

    AppState {
        config: Arc::new(config),
        db,
        jwt: Arc::new(jwt),
        sms: Arc::new(MockSmsGateway::default()),
        wechat: Arc::new(MockWechatClient),
        media: Arc::new(media),
    }
}

pub async fn test_app() -> (AppState, Router) {
    let state = test_state().await;
    let app = create_app(state.clone());
    (state, app)
}

/// 直接落库创建指定角色的用户，返回 (id, 访问令牌)
pub async fn create_user(state: &AppState, username: &str, phone: &str, role: Role) -> (Uuid, String) {
    let salt = password::generate_salt();
    let db_user = DbUser {
        id: Uuid::new_v4().to_string(),
        username: username.to_string(),
        phone: phone.to_string(),
        email: None,
        nickname: None,
        avatar: None,
        password_hash: password::hash_password("test-password", &salt),
        password_salt: salt,
        role: role.as_str().to_string(),
        wechat_openid: None,
        is_active: true,
        created_at: Utc::now(),
        last_login: None,
    };
    state.users().create(&db_user).await.unwrap();

    let user = db_user.to_domain().unwrap();
    let token = state.jwt.generate_access_token(&user).unwrap();
    (user.id, token)
}

/// 发一次请求，返回状态码与响应体
pub async fn request(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };

    (status, json)
}

pub async fn get(app: &Router, uri: &str, token: &str) -> (StatusCode, serde_json::Value) {
    request(app, Method::GET, uri, Some(token), None).await
}

pub async fn post(
    app: &Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    request(app, Method::POST, uri, Some(token), Some(body)).await
}
