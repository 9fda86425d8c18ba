//! Gemini generateContent API 实现

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

use super::client::require_api_key;
use super::format::{build_gemini_endpoint, preview};
use super::types::{InlineImage, LlmError, VisionModel};
use crate::utils::RequestLogger;

/// Gemini 请求载荷
#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

/// Gemini 响应
#[derive(Deserialize, Debug)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// 拼接首个候选的全部文本片段
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Gemini 客户端
pub struct GeminiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    request_logger: Option<Arc<RequestLogger>>,
}

impl GeminiClient {
    pub fn new(
        client: Client,
        api_key: impl Into<String>,
        base_url: &str,
        model: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let model = model.into();
        Ok(Self {
            client,
            api_key: require_api_key(api_key.into())?,
            endpoint: build_gemini_endpoint(base_url, &model),
            model,
            request_logger: None,
        })
    }

    pub fn with_request_logger(mut self, logger: Arc<RequestLogger>) -> Self {
        self.request_logger = Some(logger);
        self
    }

    async fn send(&self, prompt: &str, image: &InlineImage) -> Result<String, LlmError> {
        let payload = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: prompt },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: &image.mime_type,
                            data: &image.data,
                        },
                    },
                ],
            }],
        };

        debug!("Gemini API request: endpoint={}, model={}", self.endpoint, self.model);

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(LlmError::from_request)?;

        let status = response.status();
        let body = response.text().await.map_err(LlmError::from_request)?;

        if !status.is_success() {
            error!("Gemini API error: status={}, body={}", status.as_u16(), preview(&body, 500));
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)?;
        parsed.text().ok_or(LlmError::EmptyResponse)
    }
}

#[async_trait]
impl VisionModel for GeminiClient {
    async fn generate_with_image(
        &self,
        prompt: &str,
        image: &InlineImage,
    ) -> Result<String, LlmError> {
        let start = Instant::now();
        let entry = self.request_logger.as_ref().map(|logger| {
            logger.start("gemini", &self.endpoint, &self.model, &self.api_key, prompt, true)
        });

        let result = self.send(prompt, image).await;

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
        http::{HeaderMap, StatusCode, Uri},
        Json, Router,
    };
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    /// 请求路径、API Key 头与请求体
    type Seen = Arc<Mutex<Vec<(String, String, Value)>>>;

    /// Gemini 替身；路径含 `:generateContent`，用 fallback 接收
    fn gemini_server(status: StatusCode, reply: Value, seen: Seen) -> Router {
        let handler = move |uri: Uri, headers: HeaderMap, Json(body): Json<Value>| {
            let reply = reply.clone();
            let seen = seen.clone();
            async move {
                let key = headers
                    .get("x-goog-api-key")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                seen.lock().push((uri.path().to_string(), key, body));
                (status, Json(reply))
            }
        };
        Router::new().fallback(handler)
    }

    #[tokio::test]
    async fn test_generate_sends_key_header_and_inline_image() {
        let seen = Seen::default();
        let base_url = spawn(gemini_server(
            StatusCode::OK,
            json!({"candidates": [{"content": {"parts": [{"text": "ビール ¥600"}]}}]}),
            seen.clone(),
        ))
        .await;
        let client =
            GeminiClient::new(Client::new(), "gm-key", &base_url, "gemini-2.0-flash").unwrap();

        let text = client
            .generate_with_image("extract", &InlineImage::jpeg("AAAA"))
            .await
            .unwrap();
        assert_eq!(text, "ビール ¥600");

        let seen = seen.lock();
        let (path, key, body) = &seen[0];
        assert_eq!(path, "/v1beta/models/gemini-2.0-flash:generateContent");
        assert_eq!(key, "gm-key");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "extract");
        assert_eq!(body["contents"][0]["parts"][1]["inline_data"]["data"], "AAAA");
        assert_eq!(body["contents"][0]["parts"][1]["inline_data"]["mime_type"], "image/jpeg");
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let base_url = spawn(gemini_server(
            StatusCode::UNAUTHORIZED,
            json!({"error": {"message": "API key not valid"}}),
            Seen::default(),
        ))
        .await;
        let client =
            GeminiClient::new(Client::new(), "bad", &base_url, "gemini-2.0-flash").unwrap();

        let err = client
            .generate_with_image("extract", &InlineImage::jpeg("AAAA"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ApiError { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_no_candidates_is_an_error() {
        let server = gemini_server(StatusCode::OK, json!({"candidates": []}), Seen::default());
        let base_url = spawn(server).await;
        let client = GeminiClient::new(Client::new(), "gm-key", &base_url, "m").unwrap();

        let err = client
            .generate_with_image("extract", &InlineImage::jpeg("AAAA"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
    }

    #[test]
    fn test_request_payload_shape() {
        let payload = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: "extract" },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/jpeg",
                            data: "AAAA",
                        },
                    },
                ],
            }],
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "contents": [{"parts": [
                    {"text": "extract"},
                    {"inline_data": {"mime_type": "image/jpeg", "data": "AAAA"}}
                ]}]
            })
        );
    }

    #[test]
    fn test_response_text_joins_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"ビール "},{"text":"¥600"}]}}]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.text().as_deref(), Some("ビール ¥600"));

        let empty: GenerateContentResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(empty.text().is_none());
    }

    #[test]
    fn test_empty_api_key_is_rejected() {
        let err = GeminiClient::new(Client::new(), "", "https://g", "m").err().unwrap();
        assert!(matches!(err, LlmError::ConfigError(_)));
    }
}
