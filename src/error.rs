//! 统一错误处理模块
//!
//! 定义应用级错误类型，并实现 axum 的 IntoResponse trait 以便自动转换为 HTTP 响应。
//! 5xx 错误只向客户端返回通用信息，详细原因写入日志。

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::llm::LlmError;

/// 对外暴露的通用服务端错误信息
pub const GENERIC_ERROR_MESSAGE: &str = "処理中にエラーが発生しました";

/// 应用错误枚举
#[derive(Error, Debug)]
pub enum AppError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 上游（LLM 提供方或网关）调用错误
    #[error("上游错误: {0}")]
    Upstream(String),

    /// 请求参数错误
    #[error("请求错误: {0}")]
    BadRequest(String),

    /// 上传体过大
    #[error("上传过大: {0}")]
    PayloadTooLarge(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Config(_) | AppError::Upstream(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match &self {
            AppError::BadRequest(msg) | AppError::PayloadTooLarge(msg) => msg.clone(),
            _ => {
                error!("Request failed: {}", self);
                GENERIC_ERROR_MESSAGE.to_string()
            }
        };

        let body = Json(json!({
            "success": false,
            "error": error_message
        }));

        (status, body).into_response()
    }
}

impl From<LlmError> for AppError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::ConfigError(msg) => AppError::Config(msg),
            other => AppError::Upstream(other.to_string()),
        }
    }
}

/// 便捷类型别名
pub type AppResult<T> = Result<T, AppError>;
