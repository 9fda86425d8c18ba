//! 菜单识别与推荐服务（网关业务层）
//!
//! 通过 `VisionModel` / `ChatModel` 调用提供方，并把模型输出整理为应用结构。
//! 模型输出无法解析为 JSON 时返回哨兵条目而不是报错。

use std::sync::Arc;
use tracing::{info, warn};

use super::prompt_service::{PromptService, RECOMMEND_MAX_TOKENS, RECOMMEND_TEMPERATURE};
use crate::llm::{
    parse_image_payload, preview, strip_code_fence, ChatModel, ChatOptions, LlmError, VisionModel,
};
use crate::models::{OcrAndRecommendResult, OcrResult, RecommendResult, RecommendationItem};

/// 菜单服务
#[derive(Clone)]
pub struct MenuService {
    vision: Arc<dyn VisionModel>,
    chat: Arc<dyn ChatModel>,
    prompts: PromptService,
}

impl MenuService {
    pub fn new(vision: Arc<dyn VisionModel>, chat: Arc<dyn ChatModel>) -> Self {
        Self {
            vision,
            chat,
            prompts: PromptService::new(),
        }
    }

    /// 从图像提取菜单文本
    pub async fn ocr(&self, image: &str) -> Result<OcrResult, LlmError> {
        let image = parse_image_payload(image);
        let text = self
            .vision
            .generate_with_image(self.prompts.ocr_prompt(), &image)
            .await?;

        info!("OCR result: {}", preview(&text, 100));
        Ok(OcrResult { text })
    }

    /// 一次调用完成 OCR 与推荐
    pub async fn ocr_and_recommend(&self, image: &str) -> Result<OcrAndRecommendResult, LlmError> {
        let image = parse_image_payload(image);
        let raw = self
            .vision
            .generate_with_image(self.prompts.ocr_and_recommend_prompt(), &image)
            .await?;

        info!("OCR and recommend result: {}", preview(&raw, 100));
        Ok(parse_ocr_and_recommend(&raw))
    }

    /// 根据菜单文本生成推荐
    pub async fn recommend(&self, menu_text: &str) -> Result<RecommendResult, LlmError> {
        info!("Recommend started: {}", preview(menu_text, 100));

        let messages = self.prompts.build_recommend_messages(menu_text);
        let options = ChatOptions {
            temperature: Some(RECOMMEND_TEMPERATURE),
            max_tokens: Some(RECOMMEND_MAX_TOKENS),
            response_format: Some("json_object".to_string()),
        };

        let raw = self.chat.complete(messages, options).await?;
        Ok(parse_recommendations(&raw))
    }
}

/// 解析 OCR+推荐输出，失败时保留原文并返回哨兵条目
pub fn parse_ocr_and_recommend(raw: &str) -> OcrAndRecommendResult {
    match serde_json::from_str::<OcrAndRecommendResult>(strip_code_fence(raw)) {
        Ok(result) => result,
        Err(e) => {
            warn!("Failed to parse model output as JSON: {}, raw={}", e, preview(raw, 200));
            OcrAndRecommendResult {
                text: raw.to_string(),
                recommendations: vec![RecommendationItem::parse_error()],
            }
        }
    }
}

/// 解析推荐输出，失败时返回哨兵条目
pub fn parse_recommendations(raw: &str) -> RecommendResult {
    match serde_json::from_str::<RecommendResult>(strip_code_fence(raw)) {
        Ok(result) => result,
        Err(e) => {
            warn!("Failed to parse model output as JSON: {}, raw={}", e, preview(raw, 200));
            RecommendResult::parse_error()
        }
    }
}
