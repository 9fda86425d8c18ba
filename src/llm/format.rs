//! URL 构建与模型输出整理工具

use once_cell::sync::Lazy;
use regex::Regex;

use super::types::InlineImage;

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*\s*\n?(.*?)\n?\s*```\s*$").expect("valid fence regex")
});

static DATA_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:([^;,]+)?(?:;[^,]*)?,(.*)$").expect("valid data url regex")
});

/// 修复 base_url
///
/// - 移除末尾斜杠
/// - 修复双斜杠（保留协议部分）
pub fn fix_base_url(base_url: &str) -> String {
    let mut url = base_url.trim_end_matches('/').to_string();

    if let Some(pos) = url.find("://") {
        let (protocol, rest) = url.split_at(pos + 3);
        let fixed_rest = rest.replace("//", "/");
        url = format!("{}{}", protocol, fixed_rest);
    }

    url
}

/// 构建 OpenAI 兼容 Chat Completions 端点（DeepSeek 使用）
pub fn build_openai_endpoint(base_url: &str) -> String {
    let url = fix_base_url(base_url);

    if url.ends_with("/chat/completions") {
        url
    } else if url.ends_with("/v1") {
        format!("{}/chat/completions", url)
    } else {
        format!("{}/v1/chat/completions", url)
    }
}

/// 构建 Gemini generateContent 端点
pub fn build_gemini_endpoint(base_url: &str, model: &str) -> String {
    let url = fix_base_url(base_url);

    if url.ends_with(":generateContent") {
        url
    } else if url.ends_with("/v1beta") || url.ends_with("/v1") {
        format!("{}/models/{}:generateContent", url, model)
    } else {
        format!("{}/v1beta/models/{}:generateContent", url, model)
    }
}

/// 解析客户端提交的 Base64 图像，兼容 `data:image/...;base64,` 前缀
pub fn parse_image_payload(payload: &str) -> InlineImage {
    let payload = payload.trim();
    match DATA_URL.captures(payload) {
        Some(caps) => InlineImage {
            mime_type: caps
                .get(1)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| "image/jpeg".to_string()),
            data: caps.get(2).map(|m| m.as_str()).unwrap_or_default().to_string(),
        },
        None => InlineImage::jpeg(payload),
    }
}

/// 去掉模型常见的 Markdown 代码块包裹
pub fn strip_code_fence(text: &str) -> &str {
    match CODE_FENCE.captures(text).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str(),
        None => text.trim(),
    }
}

/// 日志用的截断预览（按字符截断，避免切断多字节字符）
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
