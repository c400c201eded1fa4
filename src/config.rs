use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub media: MediaConfig,
    pub billing: BillingConfig,
    pub sms: SmsConfig,
    pub wechat: WechatConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub audience: String,
}

/// 上传文件落盘目录
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaConfig {
    pub root: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BillingConfig {
    /// 物业费单价，分/平米/月
    pub property_fee_cents_per_m2: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SmsConfig {
    pub gateway_url: String,
    pub app_key: String,
    pub template_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WechatConfig {
    pub app_id: String,
    pub app_secret: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "sqlite://linli.db?mode=rwc".to_string(),
                max_connections: 10,
            },
            auth: AuthConfig {
                jwt_secret: "your-secret-key".to_string(),
                issuer: "linli".to_string(),
                audience: "linli-api".to_string(),
            },
            media: MediaConfig {
                root: "media".to_string(),
                max_upload_bytes: 5 * 1024 * 1024,
            },
            billing: BillingConfig {
                property_fee_cents_per_m2: 280,
            },
            sms: SmsConfig {
                gateway_url: "https://sms.example.com/send".to_string(),
                app_key: String::new(),
                template_id: "100001".to_string(),
            },
            wechat: WechatConfig {
                app_id: String::new(),
                app_secret: String::new(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let mut config = Self::default();

        if let Ok(host) = std::env::var("SERVER_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("SERVER_PORT") {
            config.server.port = port.parse().unwrap_or(8080);
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            config.auth.jwt_secret = secret;
        }
        if let Ok(root) = std::env::var("MEDIA_ROOT") {
            config.media.root = root;
        }
        if let Ok(key) = std::env::var("SMS_APP_KEY") {
            config.sms.app_key = key;
        }
        if let Ok(id) = std::env::var("WECHAT_APP_ID") {
            config.wechat.app_id = id;
        }
        if let Ok(secret) = std::env::var("WECHAT_APP_SECRET") {
            config.wechat.app_secret = secret;
        }

        Ok(config)
    }

    /// Load configuration from a TOML file (linli.toml)
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret == "your-secret-key" {
            anyhow::bail!("JWT secret must be changed from default value");
        }

        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        if self.billing.property_fee_cents_per_m2 <= 0 {
            anyhow::bail!("Property fee rate must be positive");
        }

        Ok(())
    }
}
