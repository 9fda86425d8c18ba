//! 图像上传中继端点
//!
//! 支持 multipart（字段 `image`）与 JSON（`{image: base64}`）两种提交方式。

use axum::{
    extract::{multipart::MultipartError, FromRequest, Multipart, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    routing::post,
    Json, Router,
};
use base64::{engine::general_purpose, Engine as _};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::llm::parse_image_payload;
use crate::models::{ImageRequest, UploadResponse};
use crate::state::RelayState;

const MISSING_IMAGE: &str = "画像が提供されていません";
const INVALID_IMAGE: &str = "画像データが不正です";
const TOO_LARGE: &str = "画像サイズが上限を超えています";

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(TOO_LARGE.to_string())
    } else {
        AppError::BadRequest(e.body_text())
    }
}

/// 读取 multipart 中的 `image` 字段，超过上限立即中止
async fn read_image_field(
    mut multipart: Multipart,
    max_bytes: usize,
) -> AppResult<Option<(Vec<u8>, Option<String>)>> {
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("image") {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let mut bytes = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            if bytes.len() + chunk.len() > max_bytes {
                return Err(AppError::PayloadTooLarge(TOO_LARGE.to_string()));
            }
            bytes.extend_from_slice(&chunk);
        }
        return Ok(Some((bytes, file_name)));
    }
    Ok(None)
}

/// 上传处理器
async fn upload(
    State(state): State<RelayState>,
    request: Request,
) -> AppResult<Json<UploadResponse>> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false);

    let result = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        let (bytes, file_name) = read_image_field(multipart, state.config.max_upload_bytes)
            .await?
            .filter(|(bytes, _)| !bytes.is_empty())
            .ok_or_else(|| AppError::BadRequest(MISSING_IMAGE.to_string()))?;

        info!("Upload received: multipart, {} bytes", bytes.len());
        state.relay.process_upload(&bytes, file_name.as_deref()).await?
    } else {
        let Json(req) = Json::<ImageRequest>::from_request(request, &state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        let image = req
            .image
            .map(|raw| parse_image_payload(&raw).data)
            .filter(|data| !data.is_empty())
            .ok_or_else(|| AppError::BadRequest(MISSING_IMAGE.to_string()))?;

        let decoded = general_purpose::STANDARD
            .decode(&image)
            .map_err(|_| AppError::BadRequest(INVALID_IMAGE.to_string()))?;
        if decoded.is_empty() {
            return Err(AppError::BadRequest(MISSING_IMAGE.to_string()));
        }
        if decoded.len() > state.config.max_upload_bytes {
            return Err(AppError::PayloadTooLarge(TOO_LARGE.to_string()));
        }

        info!("Upload received: json, {} bytes", decoded.len());
        state.relay.process_base64(&image).await?
    };

    Ok(Json(UploadResponse::ok(result)))
}

/// 创建上传路由
pub fn upload_routes() -> Router<RelayState> {
    Router::new().route("/api/upload", post(upload))
}
