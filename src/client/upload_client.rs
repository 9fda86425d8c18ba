//! 上传客户端
//!
//! 上传按策略列表顺序尝试：先经中继 multipart 上传，失败后可直接调用网关的
//! OCR+推荐端点。列表之外不做重试，也没有退避。

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{multipart, Client};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{FormattedResult, ImageRequest, OcrAndRecommendResult, UploadResponse};

/// 上传策略
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStrategy {
    /// 经中继 `/api/upload` 上传 multipart
    Relay { url: String },
    /// 直接调用网关 `/api/llm/ocr-and-recommend`
    DirectGateway { url: String },
}

impl UploadStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            UploadStrategy::Relay { .. } => "relay",
            UploadStrategy::DirectGateway { .. } => "direct-gateway",
        }
    }
}

/// 单次尝试的失败记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub strategy: &'static str,
    pub message: String,
}

/// 上传错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("没有可用的上传策略")]
    NoStrategies,

    #[error("所有上传策略均失败: {}", describe_attempts(.attempts))]
    AllFailed { attempts: Vec<AttemptFailure> },
}

fn describe_attempts(attempts: &[AttemptFailure]) -> String {
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.strategy, a.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl UploadError {
    /// 面向用户的提示
    pub fn user_message(&self) -> String {
        let detail = match self {
            UploadError::AllFailed { attempts } => attempts.first().map(|a| a.message.clone()),
            UploadError::NoStrategies => None,
        };
        format!(
            "処理中にエラーが発生しました: {}",
            detail.unwrap_or_else(|| "もう一度お試しください。".to_string())
        )
    }
}

/// 图像上传能力
#[async_trait]
pub trait ImageUploader: Send + Sync {
    async fn upload(&self, image: &[u8]) -> Result<FormattedResult, UploadError>;
}

/// HTTP 上传客户端
pub struct UploadClient {
    http: Client,
    strategies: Vec<UploadStrategy>,
}

impl UploadClient {
    pub fn new(http: Client, strategies: Vec<UploadStrategy>) -> Self {
        Self { http, strategies }
    }

    /// 中继优先，可选直连网关作为后备
    pub fn with_fallback(http: Client, relay_url: &str, gateway_url: Option<&str>) -> Self {
        let mut strategies = vec![UploadStrategy::Relay {
            url: relay_url.to_string(),
        }];
        if let Some(url) = gateway_url {
            strategies.push(UploadStrategy::DirectGateway {
                url: url.to_string(),
            });
        }
        Self::new(http, strategies)
    }

    /// 按顺序尝试，首个成功即返回
    pub async fn submit(&self, image: &[u8]) -> Result<FormattedResult, UploadError> {
        if self.strategies.is_empty() {
            return Err(UploadError::NoStrategies);
        }

        let mut attempts = Vec::new();
        for strategy in &self.strategies {
            match self.attempt(strategy, image).await {
                Ok(result) => {
                    info!(
                        "Upload succeeded via {}: {} item(s)",
                        strategy.name(),
                        result.items.len()
                    );
                    return Ok(result);
                }
                Err(message) => {
                    warn!("Upload via {} failed: {}", strategy.name(), message);
                    attempts.push(AttemptFailure {
                        strategy: strategy.name(),
                        message,
                    });
                }
            }
        }

        Err(UploadError::AllFailed { attempts })
    }

    async fn attempt(
        &self,
        strategy: &UploadStrategy,
        image: &[u8],
    ) -> Result<FormattedResult, String> {
        match strategy {
            UploadStrategy::Relay { url } => {
                let part = multipart::Part::bytes(image.to_vec())
                    .file_name("menu.jpg")
                    .mime_str("image/jpeg")
                    .map_err(|e| e.to_string())?;
                let form = multipart::Form::new().part("image", part);

                let response = self.http.post(url).multipart(form).send().await;
                let body: UploadResponse = read_json(response, "サーバーエラー").await?;
                Ok(body.result)
            }
            UploadStrategy::DirectGateway { url } => {
                let body = ImageRequest {
                    image: Some(general_purpose::STANDARD.encode(image)),
                };

                let response = self.http.post(url).json(&body).send().await;
                let body: OcrAndRecommendResult = read_json(response, "OCR処理に失敗しました").await?;
                Ok(FormattedResult::from(body.recommendations))
            }
        }
    }
}

/// 非 2xx 或网络错误都视为失败
async fn read_json<T: DeserializeOwned>(
    response: Result<reqwest::Response, reqwest::Error>,
    status_label: &str,
) -> Result<T, String> {
    let response = response.map_err(|e| e.to_string())?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("{}: {}", status_label, status.as_u16()));
    }
    response.json::<T>().await.map_err(|e| e.to_string())
}

#[async_trait]
impl ImageUploader for UploadClient {
    async fn upload(&self, image: &[u8]) -> Result<FormattedResult, UploadError> {
        self.submit(image).await
    }
}
