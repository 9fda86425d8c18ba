//! 应用状态管理
//!
//! 定义在请求处理器之间共享的状态。状态只包含不可变配置与可克隆的服务句柄，
//! 请求之间不共享可变数据。

use std::sync::Arc;

use crate::config::{GatewayConfig, RelayConfig};
use crate::llm::{build_http_client, GeminiClient, LlmError, OpenAiCompatClient};
use crate::services::{HttpMenuGateway, MenuGateway, MenuService, RelayService, UploadStore};
use crate::utils::RequestLogger;

/// 网关共享状态
#[derive(Clone)]
pub struct GatewayState {
    pub menu: MenuService,
}

impl GatewayState {
    pub fn new(menu: MenuService) -> Self {
        Self { menu }
    }

    /// 按配置创建真实提供方客户端
    pub fn from_config(config: &GatewayConfig) -> Result<Self, LlmError> {
        let http = build_http_client(config.upstream_timeout)?;

        let mut gemini = GeminiClient::new(
            http.clone(),
            &config.gemini_api_key,
            &config.gemini_base_url,
            &config.gemini_model,
        )?;
        let mut deepseek = OpenAiCompatClient::new(
            http,
            &config.deepseek_api_key,
            &config.deepseek_base_url,
            &config.deepseek_model,
        )?;

        if let Some(dir) = &config.request_log_dir {
            let logger = Arc::new(RequestLogger::new(dir));
            gemini = gemini.with_request_logger(Arc::clone(&logger));
            deepseek = deepseek.with_request_logger(logger);
        }

        Ok(Self::new(MenuService::new(Arc::new(gemini), Arc::new(deepseek))))
    }
}

/// 中继共享状态
#[derive(Clone)]
pub struct RelayState {
    pub relay: RelayService,
    pub config: Arc<RelayConfig>,
}

impl RelayState {
    pub fn new(gateway: Arc<dyn MenuGateway>, config: RelayConfig) -> Self {
        let relay = RelayService::new(
            gateway,
            config.pipeline,
            UploadStore::new(config.upload_dir.clone()),
        );
        Self {
            relay,
            config: Arc::new(config),
        }
    }

    /// 使用 HTTP 网关客户端
    pub fn from_config(config: RelayConfig) -> Result<Self, LlmError> {
        let http = build_http_client(config.upstream_timeout)?;
        let gateway = HttpMenuGateway::new(http, &config);
        Ok(Self::new(Arc::new(gateway), config))
    }
}
