//! 客户端模块

mod upload_client;

pub use upload_client::{AttemptFailure, ImageUploader, UploadClient, UploadError, UploadStrategy};
