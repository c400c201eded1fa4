use axum::{http::StatusCode, middleware, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::api;
use crate::auth::{AuthMiddleware, JwtManager};
use crate::config::Config;
use crate::database::repositories::{
    ActivityRepository, AnnouncementRepository, BillRepository, ChatRepository, CouponRepository,
    HouseRepository, MarketRepository, OrderRepository, ParkingRepository, RepairRepository,
    ShopRepository, UserRepository, VisitorRepository,
};
use crate::database::Database;
use crate::error::Result as LinliResult;
use crate::integration::{HttpSmsGateway, HttpWechatClient, SmsGateway, WechatClient};
use crate::media::MediaStore;

/// 全局共享状态
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub jwt: Arc<JwtManager>,
    pub sms: Arc<dyn SmsGateway>,
    pub wechat: Arc<dyn WechatClient>,
    pub media: Arc<MediaStore>,
}

impl AppState {
    /// 按配置装配生产依赖
    pub fn new(config: Config, db: Database) -> LinliResult<Self> {
        let jwt = JwtManager::new(
            &config.auth.jwt_secret,
            config.auth.issuer.clone(),
            config.auth.audience.clone(),
        )
        .map_err(|e| crate::error::LinliError::config(e.to_string()))?;

        let sms: Arc<dyn SmsGateway> = Arc::new(HttpSmsGateway::new(&config.sms));
        let wechat: Arc<dyn WechatClient> = Arc::new(HttpWechatClient::new(&config.wechat));
        let media = Arc::new(MediaStore::new(&config.media));

        Ok(Self {
            config: Arc::new(config),
            db,
            jwt: Arc::new(jwt),
            sms,
            wechat,
            media,
        })
    }

    // 各仓库按需构造，池本身可廉价克隆

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.db.pool().clone())
    }

    pub fn houses(&self) -> HouseRepository {
        HouseRepository::new(self.db.pool().clone())
    }

    pub fn parking(&self) -> ParkingRepository {
        ParkingRepository::new(self.db.pool().clone())
    }

    pub fn repairs(&self) -> RepairRepository {
        RepairRepository::new(self.db.pool().clone())
    }

    pub fn bills(&self) -> BillRepository {
        BillRepository::new(self.db.pool().clone())
    }

    pub fn visitors(&self) -> VisitorRepository {
        VisitorRepository::new(self.db.pool().clone())
    }

    pub fn announcements(&self) -> AnnouncementRepository {
        AnnouncementRepository::new(self.db.pool().clone())
    }

    pub fn market(&self) -> MarketRepository {
        MarketRepository::new(self.db.pool().clone())
    }

    pub fn chat(&self) -> ChatRepository {
        ChatRepository::new(self.db.pool().clone())
    }

    pub fn activities(&self) -> ActivityRepository {
        ActivityRepository::new(self.db.pool().clone())
    }

    pub fn shops(&self) -> ShopRepository {
        ShopRepository::new(self.db.pool().clone())
    }

    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.db.pool().clone())
    }

    pub fn coupons(&self) -> CouponRepository {
        CouponRepository::new(self.db.pool().clone())
    }
}

pub struct Server {
    config: Arc<Config>,
    app: Router,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        let config = state.config.clone();
        let app = create_app(state);
        Self { config, app }
    }

    pub async fn run(self) -> LinliResult<()> {
        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);

        info!("linli server starting on {}", addr);

        let listener = TcpListener::bind(&addr).await?;
        axum::serve(listener, self.app).await?;

        Ok(())
    }
}

/// 组装全部路由。需要登录的路由挂在 JWT 中间件之后。
pub fn create_app(state: AppState) -> Router {
    let auth_middleware = Arc::new(AuthMiddleware::new(state.jwt.clone(), state.users()));

    let public = Router::new()
        .route("/health", get(health_check))
        .merge(api::auth::public_routes())
        .merge(api::announcements::public_routes())
        .merge(api::shops::public_routes())
        .merge(api::coupons::public_routes());

    let protected = Router::new()
        .merge(api::auth::routes())
        .merge(api::users::routes())
        .merge(api::houses::routes())
        .merge(api::parking::routes())
        .merge(api::repairs::routes())
        .merge(api::bills::routes())
        .merge(api::visitors::routes())
        .merge(api::announcements::routes())
        .merge(api::market::routes())
        .merge(api::chat::routes())
        .merge(api::activities::routes())
        .merge(api::shops::routes())
        .merge(api::orders::routes())
        .merge(api::coupons::routes())
        .route_layer(middleware::from_fn_with_state(
            auth_middleware,
            AuthMiddleware::jwt_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health_check() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "linli",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}
