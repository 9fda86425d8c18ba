//! 中继到 LLM 网关的调用
//!
//! `MenuGateway` 是中继唯一依赖的上游接口，测试中可替换为内存实现。

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::config::RelayConfig;
use crate::llm::preview;
use crate::models::{
    ImageRequest, OcrAndRecommendResult, OcrResult, RecommendRequest, RecommendResult,
};

/// 网关调用错误
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("网关请求失败 ({url}): {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("网关返回错误状态 ({url}): {status}")]
    Status { url: String, status: u16 },

    #[error("网关响应解析失败 ({url}): {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 网关能力
#[async_trait]
pub trait MenuGateway: Send + Sync {
    /// OCR，图像为 Base64
    async fn ocr(&self, image: &str) -> Result<OcrResult, GatewayError>;

    /// 根据文本推荐
    async fn recommend(&self, menu_text: &str) -> Result<RecommendResult, GatewayError>;

    /// OCR 与推荐一次完成
    async fn ocr_and_recommend(&self, image: &str) -> Result<OcrAndRecommendResult, GatewayError>;
}

/// 基于 HTTP 的网关客户端
pub struct HttpMenuGateway {
    client: Client,
    ocr_url: String,
    recommend_url: String,
    ocr_and_recommend_url: String,
}

impl HttpMenuGateway {
    pub fn new(client: Client, config: &RelayConfig) -> Self {
        Self {
            client,
            ocr_url: config.ocr_url.clone(),
            recommend_url: config.recommend_url.clone(),
            ocr_and_recommend_url: config.ocr_and_recommend_url.clone(),
        }
    }

    async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        debug!("Gateway request: url={}", url);

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|source| GatewayError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|source| GatewayError::Http {
            url: url.to_string(),
            source,
        })?;

        if !status.is_success() {
            error!(
                "Gateway error: url={}, status={}, body={}",
                url,
                status.as_u16(),
                preview(&text, 300)
            );
            return Err(GatewayError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        serde_json::from_str(&text).map_err(|source| GatewayError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl MenuGateway for HttpMenuGateway {
    async fn ocr(&self, image: &str) -> Result<OcrResult, GatewayError> {
        let body = ImageRequest {
            image: Some(image.to_string()),
        };
        self.post_json(&self.ocr_url, &body).await
    }

    async fn recommend(&self, menu_text: &str) -> Result<RecommendResult, GatewayError> {
        let body = RecommendRequest {
            menu_text: Some(menu_text.to_string()),
        };
        self.post_json(&self.recommend_url, &body).await
    }

    async fn ocr_and_recommend(&self, image: &str) -> Result<OcrAndRecommendResult, GatewayError> {
        let body = ImageRequest {
            image: Some(image.to_string()),
        };
        self.post_json(&self.ocr_and_recommend_url, &body).await
    }
}
