//! LLM 网关端点

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use tracing::error;

use crate::error::{AppError, AppResult};
use crate::models::{
    ImageRequest, OcrAndRecommendResult, OcrResult, RecommendRequest, RecommendResult,
};
use crate::state::GatewayState;

const MISSING_IMAGE: &str = "画像が提供されていません";
const MISSING_MENU_TEXT: &str = "メニューテキストが提供されていません";

/// 取出非空字段，否则返回 400
fn require_field(value: Option<String>, message: &str) -> AppResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest(message.to_string()))
}

fn reject(rejection: JsonRejection) -> AppError {
    AppError::BadRequest(rejection.body_text())
}

/// OCR
async fn ocr(
    State(state): State<GatewayState>,
    payload: Result<Json<ImageRequest>, JsonRejection>,
) -> AppResult<Json<OcrResult>> {
    let Json(req) = payload.map_err(reject)?;
    let image = require_field(req.image, MISSING_IMAGE)?;

    let result = state.menu.ocr(&image).await.map_err(|e| {
        error!("OCR failed: {}", e);
        AppError::from(e)
    })?;
    Ok(Json(result))
}

/// OCR + 推荐
async fn ocr_and_recommend(
    State(state): State<GatewayState>,
    payload: Result<Json<ImageRequest>, JsonRejection>,
) -> AppResult<Json<OcrAndRecommendResult>> {
    let Json(req) = payload.map_err(reject)?;
    let image = require_field(req.image, MISSING_IMAGE)?;

    let result = state.menu.ocr_and_recommend(&image).await.map_err(|e| {
        error!("OCR and recommend failed: {}", e);
        AppError::from(e)
    })?;
    Ok(Json(result))
}

/// 推荐
async fn recommend(
    State(state): State<GatewayState>,
    payload: Result<Json<RecommendRequest>, JsonRejection>,
) -> AppResult<Json<RecommendResult>> {
    let Json(req) = payload.map_err(reject)?;
    let menu_text = require_field(req.menu_text, MISSING_MENU_TEXT)?;

    let result = state.menu.recommend(&menu_text).await.map_err(|e| {
        error!("Recommend failed: {}", e);
        AppError::from(e)
    })?;
    Ok(Json(result))
}

/// 创建网关路由
pub fn llm_routes() -> Router<GatewayState> {
    Router::new()
        .route("/api/llm/ocr", post(ocr))
        .route("/api/llm/ocr-and-recommend", post(ocr_and_recommend))
        .route("/api/llm/recommend", post(recommend))
}
