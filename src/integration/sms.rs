//! 短信网关：模板短信通过 HTTP GET 下发。

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SmsConfig;
use crate::error::{LinliError, Result};

/// 短信网关接口
#[async_trait]
pub trait SmsGateway: Send + Sync {
    /// 向手机号下发验证码短信
    async fn send_code(&self, phone: &str, code: &str) -> Result<()>;
}

/// HTTP 短信网关客户端
pub struct HttpSmsGateway {
    client: Client,
    gateway_url: String,
    app_key: String,
    template_id: String,
}

impl HttpSmsGateway {
    pub fn new(config: &SmsConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            gateway_url: config.gateway_url.clone(),
            app_key: config.app_key.clone(),
            template_id: config.template_id.clone(),
        }
    }
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    async fn send_code(&self, phone: &str, code: &str) -> Result<()> {
        debug!("Sending SMS code to {}", phone);

        let response = self
            .client
            .get(&self.gateway_url)
            .query(&[
                ("key", self.app_key.as_str()),
                ("tpl_id", self.template_id.as_str()),
                ("mobile", phone),
                ("code", code),
            ])
            .send()
            .await
            .map_err(|e| {
                warn!("SMS gateway request failed: {}", e);
                LinliError::upstream(format!("短信网关请求失败: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(LinliError::upstream(format!(
                "短信网关返回 {}",
                response.status()
            )));
        }

        info!("SMS code sent to {}", phone);
        Ok(())
    }
}

/// 测试用网关：记录发送记录，不出网
#[derive(Default)]
pub struct MockSmsGateway {
    pub sent: std::sync::Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl SmsGateway for MockSmsGateway {
    async fn send_code(&self, phone: &str, code: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((phone.to_string(), code.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_gateway_records_sends() {
        let gateway = MockSmsGateway::default();
        gateway.send_code("13800000001", "123456").await.unwrap();

        let sent = gateway.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "13800000001");
        assert_eq!(sent[0].1, "123456");
    }
}
