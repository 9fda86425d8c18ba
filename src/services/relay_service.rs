//! 上传中继服务
//!
//! 将客户端上传的图像转发给网关，并把推荐整理为 `FormattedResult`。

use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;
use tracing::{error, info};

use super::gateway_client::{GatewayError, MenuGateway};
use super::upload_store::UploadStore;
use crate::config::RelayPipeline;
use crate::error::AppError;
use crate::llm::preview;
use crate::models::{FormattedResult, RecommendationItem};

/// 中继服务
#[derive(Clone)]
pub struct RelayService {
    gateway: Arc<dyn MenuGateway>,
    pipeline: RelayPipeline,
    store: UploadStore,
}

impl RelayService {
    pub fn new(gateway: Arc<dyn MenuGateway>, pipeline: RelayPipeline, store: UploadStore) -> Self {
        Self {
            gateway,
            pipeline,
            store,
        }
    }

    pub fn store(&self) -> &UploadStore {
        &self.store
    }

    /// 处理 multipart 上传：落盘、读取、转发，返回前删除临时文件
    pub async fn process_upload(
        &self,
        bytes: &[u8],
        file_name: Option<&str>,
    ) -> Result<FormattedResult, AppError> {
        let upload = self.store.save(bytes, file_name).await.map_err(|e| {
            AppError::Internal(format!("一時ファイルの保存に失敗しました: {}", e))
        })?;

        let result = match upload.read().await {
            Ok(stored) => self.process_base64(&general_purpose::STANDARD.encode(stored)).await,
            Err(e) => Err(AppError::Internal(format!(
                "一時ファイルの読み込みに失敗しました: {}",
                e
            ))),
        };

        let path = upload.path().to_path_buf();
        if let Err(e) = upload.remove().await {
            error!("Failed to remove upload {}: {}", path.display(), e);
        }

        result
    }

    /// 处理 Base64 图像
    pub async fn process_base64(&self, image: &str) -> Result<FormattedResult, AppError> {
        let items = match self.pipeline {
            RelayPipeline::TwoStep => self.two_step(image).await,
            RelayPipeline::Combined => self
                .gateway
                .ocr_and_recommend(image)
                .await
                .map(|result| result.recommendations),
        }
        .map_err(|e| AppError::Upstream(e.to_string()))?;

        info!("Relay finished: {} item(s)", items.len());
        Ok(FormattedResult::from(items))
    }

    async fn two_step(&self, image: &str) -> Result<Vec<RecommendationItem>, GatewayError> {
        let ocr = self.gateway.ocr(image).await?;
        info!("OCR text: {}", preview(&ocr.text, 100));

        let recommendations = self.gateway.recommend(&ocr.text).await?;
        Ok(recommendations.recommendations)
    }
}
