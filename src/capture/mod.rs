//! 拍照模块

mod camera;
mod session;

pub use camera::{is_secure_origin, Camera, CameraError, CameraStream, FileCamera};
pub use session::{encode_jpeg, CaptureSession, CaptureState};

/// 拍摄图像的 JPEG 质量
pub const JPEG_QUALITY: u8 = 90;
