//! REST API 请求/响应模型
//!
//! 与前端及网关之间的 JSON 协议保持一致（camelCase）。

use serde::{Deserialize, Serialize};

/// 解析失败时返回的哨兵条目名称
pub const PARSE_ERROR_NAME: &str = "レスポンス解析エラー";

/// 图像请求（OCR / OCR+推荐 / JSON 方式上传）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageRequest {
    /// Base64 图像，可带 `data:image/jpeg;base64,` 前缀
    #[serde(default)]
    pub image: Option<String>,
}

/// 推荐请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendRequest {
    #[serde(default)]
    pub menu_text: Option<String>,
}

/// OCR 结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrResult {
    #[serde(default)]
    pub text: String,
}

/// 单条推荐
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reason: String,
}

impl RecommendationItem {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            reason: reason.into(),
        }
    }

    /// 模型输出无法解析时的占位条目
    pub fn parse_error() -> Self {
        Self::new(
            PARSE_ERROR_NAME,
            "APIからの応答を解析できませんでした",
            "技術的な問題が発生しました",
        )
    }

    pub fn is_parse_error(&self) -> bool {
        self.name == PARSE_ERROR_NAME
    }
}

/// 推荐结果（按约定最多 3 条，不强制）
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecommendResult {
    #[serde(default)]
    pub recommendations: Vec<RecommendationItem>,
}

impl RecommendResult {
    pub fn parse_error() -> Self {
        Self {
            recommendations: vec![RecommendationItem::parse_error()],
        }
    }
}

/// OCR 与推荐合并结果
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OcrAndRecommendResult {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub recommendations: Vec<RecommendationItem>,
}

/// 返回给前端的结果
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FormattedResult {
    pub items: Vec<RecommendationItem>,
}

impl From<Vec<RecommendationItem>> for FormattedResult {
    fn from(items: Vec<RecommendationItem>) -> Self {
        Self { items }
    }
}

/// 上传响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub result: FormattedResult,
}

impl UploadResponse {
    pub fn ok(result: FormattedResult) -> Self {
        Self {
            success: true,
            result,
        }
    }
}

/// 健康检查响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub timestamp: String,
}
