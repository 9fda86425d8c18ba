//! 共享 HTTP 客户端构建

use reqwest::Client;
use std::time::Duration;

use super::types::LlmError;

/// 连接超时
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// 构建带超时的 HTTP 客户端
///
/// 所有上游调用都有总超时上限，避免上游无响应时阻塞处理器。
pub fn build_http_client(timeout: Duration) -> Result<Client, LlmError> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .pool_max_idle_per_host(5)
        .build()
        .map_err(LlmError::HttpError)
}

/// 校验 API Key 非空
pub(super) fn require_api_key(api_key: String) -> Result<String, LlmError> {
    if api_key.trim().is_empty() {
        return Err(LlmError::ConfigError("API Key is required".to_string()));
    }
    Ok(api_key)
}
