use std::time::Duration;

use async_trait::async_trait;
use helpdesk_core::{config::AiConfig, AiTextService, HelpdeskError, HelpdeskResult};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct TextResponse {
    result: String,
}

/// HTTP AI文本服务客户端
///
/// 请求 `{endpoint}/summarize`、`{endpoint}/classify`、`{endpoint}/suggest-reply`，
/// 响应体为 `{"result": "..."}`。
pub struct HttpAiTextService {
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
    http_client: reqwest::Client,
}

impl HttpAiTextService {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
            timeout,
            http_client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &AiConfig) -> HelpdeskResult<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| HelpdeskError::config_error("未配置AI服务地址"))?;
        Ok(Self::new(
            endpoint,
            config.api_key.clone(),
            Duration::from_millis(config.timeout_ms),
        ))
    }

    async fn call(&self, path: &str, body: serde_json::Value) -> HelpdeskResult<String> {
        let url = format!("{}/{}", self.endpoint, path);
        let mut request = self.http_client.post(&url).timeout(self.timeout).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| HelpdeskError::external(format!("AI服务请求失败: {e}")))?;

        if !response.status().is_success() {
            return Err(HelpdeskError::external(format!(
                "AI服务返回错误: HTTP {}",
                response.status()
            )));
        }

        let parsed: TextResponse = response
            .json()
            .await
            .map_err(|e| HelpdeskError::external(format!("AI服务响应解析失败: {e}")))?;

        debug!("AI服务调用成功: {}", path);
        Ok(parsed.result)
    }
}

#[async_trait]
impl AiTextService for HttpAiTextService {
    async fn summarize(&self, text: &str) -> HelpdeskResult<String> {
        self.call("summarize", json!({ "text": text })).await
    }

    async fn classify(&self, text: &str, allowed_categories: &[String]) -> HelpdeskResult<String> {
        self.call(
            "classify",
            json!({ "text": text, "categories": allowed_categories }),
        )
        .await
    }

    async fn suggest_reply(&self, text: &str) -> HelpdeskResult<String> {
        self.call("suggest-reply", json!({ "text": text })).await
    }
}

/// 未启用AI服务时使用，所有调用均返回外部服务错误
#[derive(Debug, Default, Clone)]
pub struct DisabledAiTextService;

#[async_trait]
impl AiTextService for DisabledAiTextService {
    async fn summarize(&self, _text: &str) -> HelpdeskResult<String> {
        Err(HelpdeskError::external("AI服务未启用"))
    }

    async fn classify(&self, _text: &str, _allowed: &[String]) -> HelpdeskResult<String> {
        Err(HelpdeskError::external("AI服务未启用"))
    }

    async fn suggest_reply(&self, _text: &str) -> HelpdeskResult<String> {
        Err(HelpdeskError::external("AI服务未启用"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_requires_endpoint() {
        let config = AiConfig::default();
        assert!(HttpAiTextService::from_config(&config).is_err());

        let config = AiConfig {
            enabled: true,
            endpoint: Some("http://localhost:8500/v1/".to_string()),
            api_key: None,
            timeout_ms: 100,
        };
        let client = HttpAiTextService::from_config(&config).unwrap();
        assert_eq!(client.endpoint, "http://localhost:8500/v1");
    }

    #[tokio::test]
    async fn test_disabled_service_returns_external_error() {
        let service = DisabledAiTextService;
        let err = service.classify("printer", &[]).await.unwrap_err();
        assert!(matches!(err, HelpdeskError::ExternalService(_)));
    }
}
