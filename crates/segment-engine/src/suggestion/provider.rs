//! 规则建议服务
//!
//! 建议服务返回自由文本，期望其中包含一个 JSON 数组。解析与校验由调用方负责，
//! 这里只负责一次远程文本生成调用。

use super::prompt::{SuggestionCatalog, build_prompt};
use crate::error::{Result, SegmentError};
use async_trait::async_trait;
use crm_shared::config::SuggestionConfig;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, instrument};

/// 建议服务接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    /// 根据自由文本请求与可用字段、操作符返回原始文本
    ///
    /// 超时、认证失败、空响应都返回 `SuggestionUnavailable`。
    async fn suggest(&self, request: &str, catalog: &SuggestionCatalog) -> Result<String>;
}

/// generateContent 风格的 HTTP 文本生成服务
pub struct GenerativeTextProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl GenerativeTextProvider {
    pub fn new(config: &SuggestionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| SegmentError::SuggestionUnavailable(format!("创建 HTTP 客户端失败: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl SuggestionProvider for GenerativeTextProvider {
    #[instrument(skip(self, catalog), fields(model = %self.model))]
    async fn suggest(&self, request: &str, catalog: &SuggestionCatalog) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SegmentError::SuggestionUnavailable("未配置 API key".to_string()))?;
        let prompt = build_prompt(request, catalog)?;

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let resp = self
            .client
            .post(self.url())
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| SegmentError::SuggestionUnavailable(format!("请求失败: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SegmentError::SuggestionUnavailable(format!(
                "建议服务返回 HTTP {status}"
            )));
        }

        let payload: Value = resp
            .json()
            .await
            .map_err(|e| SegmentError::SuggestionUnavailable(format!("响应解析失败: {e}")))?;

        let text = response_text(&payload)
            .ok_or_else(|| SegmentError::SuggestionUnavailable("建议服务无响应内容".to_string()))?;

        debug!(len = text.len(), "收到建议文本");
        Ok(text)
    }
}

/// 拼接首个候选的全部文本片段
fn response_text(payload: &Value) -> Option<String> {
    let parts = payload
        .pointer("/candidates/0/content/parts")?
        .as_array()?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();

    if text.trim().is_empty() { None } else { Some(text) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_text() {
        let payload = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "```json\n[" }, { "text": "]\n```" }] }
            }]
        });
        assert_eq!(response_text(&payload).as_deref(), Some("```json\n[]\n```"));
    }

    #[test]
    fn test_empty_response() {
        assert_eq!(response_text(&json!({ "candidates": [] })), None);
        let blank = json!({ "candidates": [{ "content": { "parts": [{ "text": "  " }] } }] });
        assert_eq!(response_text(&blank), None);
    }

    #[test]
    fn test_url() {
        let config = SuggestionConfig {
            endpoint: "https://example.test/v1beta/".to_string(),
            ..Default::default()
        };
        let provider = GenerativeTextProvider::new(&config).unwrap();
        assert_eq!(
            provider.url(),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn test_missing_api_key_is_unavailable() {
        let config = SuggestionConfig {
            api_key: Some("   ".to_string()),
            ..Default::default()
        };
        let provider = GenerativeTextProvider::new(&config).unwrap();

        let catalog = SuggestionCatalog::from_registry(&crate::registry::FieldRegistry::standard());
        let err = provider.suggest("anything", &catalog).await.unwrap_err();
        assert_eq!(err.code(), "SUGGESTION_UNAVAILABLE");
    }
}
