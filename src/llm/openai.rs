//! OpenAI 兼容 Chat Completions API 实现（DeepSeek）

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use super::client::require_api_key;
use super::format::{build_openai_endpoint, preview};
use super::types::{ChatMessage, ChatModel, ChatOptions, LlmError};
use crate::utils::RequestLogger;

/// OpenAI 请求载荷
#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

/// OpenAI 非流式响应
#[derive(Deserialize, Debug)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize, Debug)]
struct OpenAiChoice {
    message: Option<OpenAiMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct OpenAiMessage {
    content: Option<String>,
}

/// OpenAI 兼容客户端
pub struct OpenAiCompatClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    request_logger: Option<Arc<RequestLogger>>,
}

impl OpenAiCompatClient {
    pub fn new(
        client: Client,
        api_key: impl Into<String>,
        base_url: &str,
        model: impl Into<String>,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client,
            api_key: require_api_key(api_key.into())?,
            endpoint: build_openai_endpoint(base_url),
            model: model.into(),
            request_logger: None,
        })
    }

    pub fn with_request_logger(mut self, logger: Arc<RequestLogger>) -> Self {
        self.request_logger = Some(logger);
        self
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<String, LlmError> {
        let payload = OpenAiRequest {
            model: &self.model,
            messages,
            stream: false,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            response_format: options.response_format.as_ref().map(|t| ResponseFormat {
                format_type: t.clone(),
            }),
        };

        debug!("OpenAI API request: endpoint={}, model={}", self.endpoint, self.model);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(LlmError::from_request)?;

        let status = response.status();
        let body = response.text().await.map_err(LlmError::from_request)?;

        if !status.is_success() {
            error!("OpenAI API error: status={}, body={}", status.as_u16(), preview(&body, 500));
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: OpenAiResponse = serde_json::from_str(&body)?;
        let choice = parsed.choices.into_iter().next().ok_or(LlmError::EmptyResponse)?;
        let content = choice.message.and_then(|m| m.content).unwrap_or_default();

        info!(
            "Chat completion finished: model={}, finish_reason={:?}, content_length={}",
            self.model,
            choice.finish_reason,
            content.chars().count()
        );

        if content.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(content)
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatClient {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: ChatOptions,
    ) -> Result<String, LlmError> {
        let start = Instant::now();
        let entry = self.request_logger.as_ref().map(|logger| {
            let prompt = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
            logger.start("deepseek", &self.endpoint, &self.model, &self.api_key, prompt, false)
        });

        let result = self.send(&messages, &options).await;

        if let (Some(logger), Some(entry)) = (&self.request_logger, entry) {
            match &result {
                Ok(text) => logger.log_success(entry, start, text),
                Err(e) => {
                    let status = match e {
                        LlmError::ApiError { status, .. } => Some(*status),
                        _ => None,
                    };
                    logger.log_error(entry, start, &e.to_string(), status);
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_server::spawn;
    use axum::{
        http::{HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};

    /// 固定状态码与响应体的 DeepSeek 替身
    fn chat_server(status: StatusCode, reply: Value) -> Router {
        Router::new().route(
            "/v1/chat/completions",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let reply = reply.clone();
                async move {
                    assert_eq!(headers["authorization"], "Bearer ds-key");
                    assert_eq!(body["model"], "deepseek-chat");
                    (status, Json(reply))
                }
            }),
        )
    }

    async fn client_for(server: Router) -> OpenAiCompatClient {
        let base_url = spawn(server).await;
        OpenAiCompatClient::new(Client::new(), "ds-key", &base_url, "deepseek-chat").unwrap()
    }

    fn json_mode() -> ChatOptions {
        ChatOptions {
            response_format: Some("json_object".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_completion_content_is_returned() {
        let client = client_for(chat_server(
            StatusCode::OK,
            json!({
                "choices": [{
                    "message": {"content": "{\"recommendations\":[]}"},
                    "finish_reason": "stop"
                }]
            }),
        ))
        .await;

        let text = client
            .complete(vec![ChatMessage::user("menu")], json_mode())
            .await
            .unwrap();
        assert_eq!(text, "{\"recommendations\":[]}");
    }

    #[tokio::test]
    async fn test_empty_content_is_an_error() {
        let client = client_for(chat_server(
            StatusCode::OK,
            json!({"choices": [{"message": {"content": ""}, "finish_reason": "stop"}]}),
        ))
        .await;

        let err = client
            .complete(vec![ChatMessage::user("menu")], json_mode())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let client = client_for(chat_server(
            StatusCode::UNAUTHORIZED,
            json!({"error": {"message": "invalid api key"}}),
        ))
        .await;

        let err = client
            .complete(vec![ChatMessage::user("menu")], json_mode())
            .await
            .unwrap_err();
        match err {
            LlmError::ApiError { status, message } => {
                assert_eq!(status, 401);
                assert!(message.contains("invalid api key"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_request_payload_shape() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("menu")];
        let payload = OpenAiRequest {
            model: "deepseek-chat",
            messages: &messages,
            stream: false,
            temperature: Some(0.7),
            max_tokens: Some(1500),
            response_format: Some(ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["model"], "deepseek-chat");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["max_tokens"], 1500);
        assert_eq!(value["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_omits_unset_options() {
        let messages = vec![ChatMessage::user("hi")];
        let payload = OpenAiRequest {
            model: "m",
            messages: &messages,
            stream: false,
            temperature: None,
            max_tokens: None,
            response_format: None,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("temperature").is_none());
        assert!(value.get("response_format").is_none());
    }
}
