//! API 路由模块

mod health;
mod index;
mod llm;
mod upload;

pub use health::health_routes;
pub use index::index_routes;
pub use llm::llm_routes;
pub use upload::upload_routes;

use axum::extract::DefaultBodyLimit;
use axum::Router;

use crate::state::{GatewayState, RelayState};

/// 网关接受的 JSON 请求体上限（Base64 图像）
const GATEWAY_BODY_LIMIT: usize = 50 * 1024 * 1024;

/// 创建网关路由
pub fn create_gateway_routes(state: GatewayState) -> Router {
    Router::new()
        .merge(health_routes("llm-services"))
        .merge(llm_routes())
        .layer(DefaultBodyLimit::max(GATEWAY_BODY_LIMIT))
        .with_state(state)
}

/// 创建中继路由
pub fn create_relay_routes(state: RelayState) -> Router {
    // Base64 与 multipart 头部的膨胀留出余量，字段本身的上限在处理器内检查
    let body_limit = state.config.max_upload_bytes.saturating_mul(2).max(64 * 1024);

    Router::new()
        .merge(health_routes("upload-relay"))
        .merge(index_routes())
        .merge(upload_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
