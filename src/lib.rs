//! Menu Recommender
//!
//! 拍摄菜单照片，经 Gemini 识别文字、DeepSeek 生成推荐。包含 LLM 网关、
//! 上传中继、上传客户端与拍照会话。

pub mod api;
pub mod capture;
pub mod client;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;
