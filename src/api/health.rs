//! 健康检查端点

use axum::{routing::get, Json, Router};

use crate::models::HealthResponse;

/// 创建健康检查路由
pub fn health_routes<S>(service: &'static str) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/health",
        get(move || async move {
            Json(HealthResponse {
                status: "ok".to_string(),
                service: service.to_string(),
                timestamp: chrono::Utc::now().to_rfc3339(),
            })
        }),
    )
}
