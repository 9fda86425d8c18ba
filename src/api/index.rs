//! 拍照页面
//!
//! 页面为内嵌静态 HTML，启动时把上传端点等客户端配置注入脚本。

use axum::{
    extract::State,
    http::{header::HOST, HeaderMap},
    response::Html,
    routing::get,
    Router,
};
use serde::Serialize;
use tracing::warn;

use crate::capture::{is_secure_origin, JPEG_QUALITY};
use crate::state::RelayState;

const INDEX_HTML: &str = include_str!("../ui/index.html");
const CONFIG_PLACEHOLDER: &str = "__CLIENT_CONFIG__";

/// 注入页面的客户端配置
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientConfig<'a> {
    upload_url: &'a str,
    ocr_and_recommend_url: &'a str,
    image_format: &'a str,
    image_quality: f32,
}

fn render_index(ocr_and_recommend_url: &str) -> String {
    let config = ClientConfig {
        upload_url: "/api/upload",
        ocr_and_recommend_url,
        image_format: "image/jpeg",
        image_quality: f32::from(JPEG_QUALITY) / 100.0,
    };
    // 防止配置值提前闭合 <script>
    let json = serde_json::to_string(&config)
        .unwrap_or_else(|_| "{}".to_string())
        .replace("</", "<\\/");
    INDEX_HTML.replace(CONFIG_PLACEHOLDER, &json)
}

/// 按请求头判断页面来源，反向代理通过 `x-forwarded-proto` 传递协议
fn served_securely(headers: &HeaderMap) -> bool {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let scheme = header("x-forwarded-proto").unwrap_or("http");
    let host = header(HOST.as_str()).unwrap_or_default();
    let host = match host.find(']') {
        Some(end) if host.starts_with('[') => &host[..=end],
        _ => host.split(':').next().unwrap_or_default(),
    };
    is_secure_origin(scheme, host)
}

async fn index(State(state): State<RelayState>, headers: HeaderMap) -> Html<String> {
    if !served_securely(&headers) {
        warn!("Capture page served from an insecure origin; browsers will block the camera");
    }
    Html(render_index(&state.config.ocr_and_recommend_url))
}

/// 创建页面路由
pub fn index_routes() -> Router<RelayState> {
    Router::new().route("/", get(index))
}
