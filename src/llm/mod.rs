//! LLM 模块
//!
//! 提供 Gemini（视觉）与 OpenAI 兼容（DeepSeek 对话）客户端，
//! 以及供业务层替换实现的能力 trait。

mod client;
mod format;
mod gemini;
mod openai;
mod types;

pub use client::build_http_client;
pub use format::{parse_image_payload, preview, strip_code_fence};
pub use gemini::GeminiClient;
pub use openai::OpenAiCompatClient;
pub use types::*;
