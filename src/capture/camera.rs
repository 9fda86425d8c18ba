//! 相机抽象与错误分类

use image::RgbImage;
use std::path::PathBuf;
use thiserror::Error;

/// 相机错误
///
/// 每种原因对应不同的用户提示，不能合并为通用错误。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// 用户或浏览器拒绝授权（NotAllowedError）
    #[error("カメラへのアクセスが拒否されました。ブラウザの設定でカメラへのアクセスを許可してください。")]
    PermissionDenied,

    /// 没有可用设备（NotFoundError）
    #[error("カメラが見つかりません。デバイスにカメラが接続されていることを確認してください。")]
    NotFound,

    /// 设备被占用（NotReadableError）
    #[error("カメラにアクセスできません。すでに他のアプリケーションがカメラを使用している可能性があります。")]
    DeviceBusy,

    /// 约束无法满足（OverconstrainedError）
    #[error("指定されたカメラ設定が利用できません。")]
    Overconstrained,

    /// 安全策略拒绝（SecurityError）
    #[error("セキュリティ上の理由でカメラへのアクセスが拒否されました。HTTPSでアクセスしてください。")]
    Security,

    /// 非安全上下文，打开相机前即判定
    #[error("カメラへのアクセスにはHTTPS接続が必要です。HTTPSでアクセスするか、localhostを使用してください。")]
    InsecureContext,

    /// 运行环境不支持相机
    #[error("お使いのブラウザはカメラアクセスをサポートしていません。")]
    Unsupported,

    #[error("カメラへのアクセスに失敗しました: {0}")]
    Other(String),
}

impl CameraError {
    /// 按浏览器 DOMException 名称分类
    pub fn from_dom_name(name: &str, message: &str) -> Self {
        match name {
            "NotAllowedError" | "PermissionDeniedError" => Self::PermissionDenied,
            "NotFoundError" | "DevicesNotFoundError" => Self::NotFound,
            "NotReadableError" | "TrackStartError" => Self::DeviceBusy,
            "OverconstrainedError" | "ConstraintNotSatisfiedError" => Self::Overconstrained,
            "SecurityError" => Self::Security,
            _ if message.is_empty() => Self::Other("不明なエラー".to_string()),
            _ => Self::Other(message.to_string()),
        }
    }

    /// 面向用户的提示
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

/// 页面来源是否为安全上下文（HTTPS 或本机）
pub fn is_secure_origin(scheme: &str, host: &str) -> bool {
    scheme.eq_ignore_ascii_case("https") || matches!(host, "localhost" | "127.0.0.1" | "[::1]")
}

/// 相机
pub trait Camera: Send {
    /// 打开视频流
    fn open(&mut self) -> Result<Box<dyn CameraStream>, CameraError>;
}

/// 已打开的视频流
pub trait CameraStream: Send {
    /// 取当前帧
    fn grab_frame(&mut self) -> Result<RgbImage, CameraError>;

    /// 停止所有轨道，可重复调用
    fn stop(&mut self);
}

/// 以静态图片文件模拟相机（命令行扫描使用）
pub struct FileCamera {
    path: PathBuf,
}

impl FileCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Camera for FileCamera {
    fn open(&mut self) -> Result<Box<dyn CameraStream>, CameraError> {
        if !self.path.is_file() {
            return Err(CameraError::NotFound);
        }
        let frame = image::open(&self.path)
            .map_err(|e| CameraError::Other(e.to_string()))?
            .to_rgb8();
        Ok(Box::new(StillStream {
            frame: Some(frame),
        }))
    }
}

/// 固定帧的视频流
struct StillStream {
    frame: Option<RgbImage>,
}

impl CameraStream for StillStream {
    fn grab_frame(&mut self) -> Result<RgbImage, CameraError> {
        self.frame
            .clone()
            .ok_or_else(|| CameraError::Other("stream stopped".to_string()))
    }

    fn stop(&mut self) {
        self.frame = None;
    }
}
