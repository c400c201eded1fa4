use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::response::{ApiResponse, ApiResult};
use crate::auth::middleware::AuthExtractor;
use crate::auth::models::{Role, User};
use crate::auth::password;
use crate::codes;
use crate::database::models::{DbSmsCode, DbUser};
use crate::error::LinliError;
use crate::server::AppState;

const SMS_CODE_TTL_MINUTES: i64 = 5;
const SMS_RESEND_INTERVAL_SECONDS: i64 = 60;

/// 注册请求
#[derive(Debug, Deserialize, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub phone: String,
    pub password: String,
}

/// 登录请求
#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

/// 登录响应
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserInfo,
}

#[derive(Debug, Deserialize)]
pub struct SmsSendRequest {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct SmsLoginRequest {
    pub phone: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct WechatLoginRequest {
    pub js_code: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub nickname: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// base64 图片上传
#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub file_name: String,
    pub content: String,
}

/// 用户信息
#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub username: String,
    pub phone: String,
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub created_at: String,
    pub last_login: Option<String>,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            phone: user.phone.clone(),
            email: user.email.clone(),
            nickname: user.nickname.clone(),
            avatar: user.avatar.clone(),
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at.to_rfc3339(),
            last_login: user.last_login.map(|dt| dt.to_rfc3339()),
        }
    }
}

/// 公开认证路由（无需令牌）
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/sms/send", post(sms_send))
        .route("/api/auth/sms/login", post(sms_login))
        .route("/api/auth/wechat/login", post(wechat_login))
        .route("/api/auth/refresh", post(refresh_token))
}

/// 需认证的个人资料路由
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/profile", get(get_profile).put(update_profile))
        .route("/api/auth/password", put(change_password))
        .route("/api/auth/avatar", post(upload_avatar))
}

fn validate_phone(phone: &str) -> Result<(), LinliError> {
    if phone.len() != 11 || !phone.chars().all(|c| c.is_ascii_digit()) {
        return Err(LinliError::validation("手机号格式不正确"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), LinliError> {
    if password.len() < 6 || password.len() > 64 {
        return Err(LinliError::validation("密码长度应在 6 到 64 位之间"));
    }
    Ok(())
}

fn new_resident(username: &str, phone: &str, password: &str) -> DbUser {
    let salt = password::generate_salt();
    let hash = password::hash_password(password, &salt);

    DbUser {
        id: Uuid::new_v4().to_string(),
        username: username.to_string(),
        phone: phone.to_string(),
        email: None,
        nickname: None,
        avatar: None,
        password_salt: salt,
        password_hash: hash,
        role: Role::Resident.as_str().to_string(),
        wechat_openid: None,
        is_active: true,
        created_at: Utc::now(),
        last_login: None,
    }
}

async fn issue_tokens(state: &AppState, user: &User) -> Result<LoginResponse, LinliError> {
    let access_token = state
        .jwt
        .generate_access_token(user)
        .map_err(|e| LinliError::internal(format!("Failed to generate access token: {}", e)))?;
    let refresh_token = state
        .jwt
        .generate_refresh_token(user)
        .map_err(|e| LinliError::internal(format!("Failed to generate refresh token: {}", e)))?;

    state.users().update_last_login(user.id).await?;

    Ok(LoginResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.access_token_duration_secs(),
        user: UserInfo::from(user),
    })
}

/// 住户注册
async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<UserInfo> {
    if request.username.len() < 3 || request.username.len() > 32 {
        return Err(LinliError::validation("用户名长度应在 3 到 32 位之间"));
    }
    validate_phone(&request.phone)?;
    validate_password(&request.password)?;

    let users = state.users();

    if users.find_by_login(&request.username).await?.is_some() {
        return Err(LinliError::conflict("用户名已被占用"));
    }
    if users.find_by_phone(&request.phone).await?.is_some() {
        return Err(LinliError::conflict("手机号已注册"));
    }

    let db_user = new_resident(&request.username, &request.phone, &request.password);
    users.create(&db_user).await?;

    let user = db_user.to_domain()?;
    info!("User registered: {}", user.username);
    Ok(ApiResponse::ok_with("注册成功", UserInfo::from(&user)))
}

/// 账号密码登录
async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    info!("Login attempt for {}", request.login);

    let stored = state
        .users()
        .find_by_login(&request.login)
        .await?
        .ok_or_else(|| LinliError::authentication("用户名或密码错误"))?;

    if !password::verify_password(
        &request.password,
        &stored.password_salt,
        &stored.password_hash,
    ) {
        warn!("Invalid password for {}", request.login);
        return Err(LinliError::authentication("用户名或密码错误"));
    }

    if !stored.is_active {
        return Err(LinliError::authorization("账号已停用"));
    }

    let user = stored.to_domain()?;
    let response = issue_tokens(&state, &user).await?;

    info!("User {} logged in", user.username);
    Ok(ApiResponse::ok(response))
}

/// 发送短信验证码
async fn sms_send(
    State(state): State<AppState>,
    Json(request): Json<SmsSendRequest>,
) -> ApiResult<serde_json::Value> {
    validate_phone(&request.phone)?;

    let users = state.users();
    let throttle_after = Utc::now() - Duration::seconds(SMS_RESEND_INTERVAL_SECONDS);
    if users.sms_sent_since(&request.phone, throttle_after).await? {
        return Err(LinliError::conflict("发送过于频繁，请稍后再试"));
    }

    let code = codes::sms_code();
    let record = DbSmsCode {
        id: Uuid::new_v4().to_string(),
        phone: request.phone.clone(),
        code: code.clone(),
        expires_at: Utc::now() + Duration::minutes(SMS_CODE_TTL_MINUTES),
        consumed: false,
        created_at: Utc::now(),
    };
    users.insert_sms_code(&record).await?;

    state.sms.send_code(&request.phone, &code).await?;

    Ok(ApiResponse::message("验证码已发送"))
}

/// 短信验证码登录，首次登录自动注册住户账号
async fn sms_login(
    State(state): State<AppState>,
    Json(request): Json<SmsLoginRequest>,
) -> ApiResult<LoginResponse> {
    validate_phone(&request.phone)?;

    let users = state.users();
    let record = users
        .latest_sms_code(&request.phone)
        .await?
        .ok_or_else(|| LinliError::authentication("验证码错误或已过期"))?;

    if record.code != request.code || record.expires_at < Utc::now() {
        return Err(LinliError::authentication("验证码错误或已过期"));
    }
    if !users.consume_sms_code(&record.id).await? {
        return Err(LinliError::authentication("验证码已被使用"));
    }

    let stored = match users.find_by_phone(&request.phone).await? {
        Some(stored) => stored,
        None => {
            // 首次短信登录，用随机口令建号
            let username = format!("user_{}", request.phone);
            let db_user = new_resident(&username, &request.phone, &codes::visitor_code());
            users.create(&db_user).await?;
            info!("Auto-registered resident for {}", request.phone);
            db_user
        }
    };

    if !stored.is_active {
        return Err(LinliError::authorization("账号已停用"));
    }

    let user = stored.to_domain()?;
    let response = issue_tokens(&state, &user).await?;
    Ok(ApiResponse::ok(response))
}

/// 微信小程序登录
async fn wechat_login(
    State(state): State<AppState>,
    Json(request): Json<WechatLoginRequest>,
) -> ApiResult<LoginResponse> {
    let openid = state.wechat.code_to_openid(&request.js_code).await?;

    let users = state.users();
    let stored = match users.find_by_openid(&openid).await? {
        Some(stored) => stored,
        None => {
            // 以 openid 建号，手机号待用户后续补充
            let suffix: String = openid.chars().rev().take(8).collect();
            let mut db_user = new_resident(
                &format!("wx_{}", suffix),
                &format!("wx{:0>9}", suffix.chars().take(9).collect::<String>()),
                &codes::visitor_code(),
            );
            db_user.wechat_openid = Some(openid.clone());
            users.create(&db_user).await?;
            info!("Auto-registered resident for openid");
            db_user
        }
    };

    if !stored.is_active {
        return Err(LinliError::authorization("账号已停用"));
    }

    let user = stored.to_domain()?;
    let response = issue_tokens(&state, &user).await?;
    Ok(ApiResponse::ok(response))
}

/// 刷新访问令牌
async fn refresh_token(
    State(state): State<AppState>,
    Json(request): Json<RefreshTokenRequest>,
) -> ApiResult<serde_json::Value> {
    let claims = state
        .jwt
        .validate_refresh_token(&request.refresh_token)
        .map_err(|e| {
            warn!("Invalid refresh token: {}", e);
            LinliError::authentication("刷新令牌无效")
        })?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| LinliError::authentication("刷新令牌无效"))?;

    let stored = state
        .users()
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| LinliError::authentication("刷新令牌无效"))?;

    if !stored.is_active {
        return Err(LinliError::authorization("账号已停用"));
    }

    let user = stored.to_domain()?;
    let access_token = state
        .jwt
        .generate_access_token(&user)
        .map_err(|e| LinliError::internal(format!("Failed to generate access token: {}", e)))?;

    Ok(ApiResponse::ok(serde_json::json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": state.jwt.access_token_duration_secs(),
    })))
}

/// 获取个人资料
async fn get_profile(State(state): State<AppState>, auth: AuthExtractor) -> ApiResult<UserInfo> {
    let stored = state
        .users()
        .find_by_id(auth.0.user_id)
        .await?
        .ok_or_else(|| LinliError::not_found("用户不存在"))?;

    let user = stored.to_domain()?;
    Ok(ApiResponse::ok(UserInfo::from(&user)))
}

/// 更新个人资料
async fn update_profile(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Json(request): Json<UpdateProfileRequest>,
) -> ApiResult<UserInfo> {
    state
        .users()
        .update_profile(
            auth.0.user_id,
            request.nickname.as_deref(),
            request.email.as_deref(),
        )
        .await?;

    let stored = state
        .users()
        .find_by_id(auth.0.user_id)
        .await?
        .ok_or_else(|| LinliError::not_found("用户不存在"))?;

    let user = stored.to_domain()?;
    Ok(ApiResponse::ok_with("资料已更新", UserInfo::from(&user)))
}

/// 修改密码
async fn change_password(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Json(request): Json<ChangePasswordRequest>,
) -> ApiResult<serde_json::Value> {
    validate_password(&request.new_password)?;

    let users = state.users();
    let stored = users
        .find_by_id(auth.0.user_id)
        .await?
        .ok_or_else(|| LinliError::not_found("用户不存在"))?;

    if !password::verify_password(
        &request.old_password,
        &stored.password_salt,
        &stored.password_hash,
    ) {
        return Err(LinliError::authentication("原密码错误"));
    }

    let salt = password::generate_salt();
    let hash = password::hash_password(&request.new_password, &salt);
    users.update_password(auth.0.user_id, &salt, &hash).await?;

    info!("User {} changed password", auth.0.username);
    Ok(ApiResponse::message("密码已修改"))
}

/// 上传头像
async fn upload_avatar(
    State(state): State<AppState>,
    auth: AuthExtractor,
    Json(request): Json<UploadRequest>,
) -> ApiResult<serde_json::Value> {
    let path = state
        .media
        .save_image("avatar", &request.file_name, &request.content)
        .await?;

    state.users().update_avatar(auth.0.user_id, &path).await?;

    Ok(ApiResponse::ok(serde_json::json!({ "avatar": path })))
}
