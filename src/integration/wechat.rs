//! 微信小程序登录：js_code 换取 openid。

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::WechatConfig;
use crate::error::{LinliError, Result};

const CODE2SESSION_URL: &str = "https://api.weixin.qq.com/sns/jscode2session";

/// 微信登录接口
#[async_trait]
pub trait WechatClient: Send + Sync {
    /// 小程序登录码换取 openid
    async fn code_to_openid(&self, js_code: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct Code2SessionResponse {
    openid: Option<String>,
    errcode: Option<i64>,
    errmsg: Option<String>,
}

/// 微信开放平台客户端
pub struct HttpWechatClient {
    client: Client,
    app_id: String,
    app_secret: String,
}

impl HttpWechatClient {
    pub fn new(config: &WechatConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            app_id: config.app_id.clone(),
            app_secret: config.app_secret.clone(),
        }
    }
}

#[async_trait]
impl WechatClient for HttpWechatClient {
    async fn code_to_openid(&self, js_code: &str) -> Result<String> {
        debug!("Exchanging WeChat js_code");

        let response = self
            .client
            .get(CODE2SESSION_URL)
            .query(&[
                ("appid", self.app_id.as_str()),
                ("secret", self.app_secret.as_str()),
                ("js_code", js_code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| {
                warn!("WeChat code2session request failed: {}", e);
                LinliError::upstream(format!("微信接口请求失败: {}", e))
            })?;

        let body: Code2SessionResponse = response
            .json()
            .await
            .map_err(|e| LinliError::upstream(format!("微信接口响应异常: {}", e)))?;

        match body.openid {
            Some(openid) => Ok(openid),
            None => Err(LinliError::upstream(format!(
                "微信登录失败: errcode={:?} errmsg={:?}",
                body.errcode, body.errmsg
            ))),
        }
    }
}

/// 测试用客户端：js_code 原样映射为 openid
pub struct MockWechatClient;

#[async_trait]
impl WechatClient for MockWechatClient {
    async fn code_to_openid(&self, js_code: &str) -> Result<String> {
        if js_code.is_empty() {
            return Err(LinliError::upstream("微信登录失败: 空登录码"));
        }
        Ok(format!("openid-{}", js_code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_client_maps_code() {
        let client = MockWechatClient;
        assert_eq!(client.code_to_openid("abc").await.unwrap(), "openid-abc");
        assert!(client.code_to_openid("").await.is_err());
    }
}
