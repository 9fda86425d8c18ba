//! 拍照会话状态机
//!
//! 进入拍摄状态时打开相机，离开时（包括出错）停止所有轨道。
//! 快门后立即上传；相机错误不会触发上传。

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use tracing::{error, info};

use super::camera::{Camera, CameraError, CameraStream};
use super::JPEG_QUALITY;
use crate::client::ImageUploader;
use crate::models::FormattedResult;

/// 界面状态
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureState {
    pub capturing: bool,
    /// 已拍摄的 JPEG
    pub captured_image: Option<Vec<u8>>,
    pub loading: bool,
    pub result: Option<FormattedResult>,
    pub error: Option<String>,
}

/// 将帧编码为 JPEG
pub fn encode_jpeg(frame: &RgbImage, quality: u8) -> Result<Vec<u8>, CameraError> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode_image(frame)
        .map_err(|e| CameraError::Other(e.to_string()))?;
    Ok(buffer)
}

/// 拍照会话
pub struct CaptureSession<C: Camera, U: ImageUploader> {
    camera: C,
    uploader: U,
    secure_context: bool,
    stream: Option<Box<dyn CameraStream>>,
    state: CaptureState,
}

impl<C: Camera, U: ImageUploader> CaptureSession<C, U> {
    /// 新会话处于拍摄状态，需调用 `start` 打开相机
    pub fn new(camera: C, uploader: U, secure_context: bool) -> Self {
        Self {
            camera,
            uploader,
            secure_context,
            stream: None,
            state: CaptureState {
                capturing: true,
                ..Default::default()
            },
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }

    /// 打开相机（仅在拍摄状态且尚未打开时）
    pub fn start(&mut self) {
        if !self.state.capturing || self.stream.is_some() {
            return;
        }

        if !self.secure_context {
            self.fail_camera(CameraError::InsecureContext);
            return;
        }

        match self.camera.open() {
            Ok(stream) => self.stream = Some(stream),
            Err(e) => self.fail_camera(e),
        }
    }

    /// 快门：取帧、编码、离开拍摄状态并上传
    pub async fn shutter(&mut self) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };

        let encoded = stream
            .grab_frame()
            .and_then(|frame| encode_jpeg(&frame, JPEG_QUALITY));
        self.stop_stream();

        let image = match encoded {
            Ok(image) => image,
            Err(e) => {
                self.fail_camera(e);
                return;
            }
        };

        info!("Captured image: {} bytes", image.len());
        self.state.capturing = false;
        self.state.loading = true;
        self.state.error = None;
        self.state.captured_image = Some(image.clone());

        let outcome = self.uploader.upload(&image).await;
        self.state.loading = false;

        match outcome {
            Ok(result) => self.state.result = Some(result),
            Err(e) => {
                error!("Upload failed: {}", e);
                self.state.error = Some(e.user_message());
            }
        }
    }

    /// 重拍：清空图像与结果并重新进入拍摄状态
    pub fn retake(&mut self) {
        self.state.captured_image = None;
        self.state.result = None;
        self.state.error = None;
        self.state.capturing = true;
        self.start();
    }

    fn fail_camera(&mut self, e: CameraError) {
        error!("Camera error: {:?}", e);
        self.stop_stream();
        self.state.error = Some(e.user_message());
    }

    fn stop_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
    }
}

impl<C: Camera, U: ImageUploader> Drop for CaptureSession<C, U> {
    fn drop(&mut self) {
        self.stop_stream();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::UploadError;
    use crate::models::RecommendationItem;
    use async_trait::async_trait;
    use image::Rgb;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// 记录打开/停止次数的相机替身
    #[derive(Clone, Default)]
    struct FakeCamera {
        fail_with: Option<CameraError>,
        opened: Arc<AtomicUsize>,
        stopped: Arc<AtomicUsize>,
    }

    struct FakeStream {
        stopped: Arc<AtomicUsize>,
    }

    impl Camera for FakeCamera {
        fn open(&mut self) -> Result<Box<dyn CameraStream>, CameraError> {
            if let Some(e) = &self.fail_with {
                return Err(e.clone());
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeStream {
                stopped: self.stopped.clone(),
            }))
        }
    }

    impl CameraStream for FakeStream {
        fn grab_frame(&mut self) -> Result<RgbImage, CameraError> {
            Ok(RgbImage::from_pixel(8, 8, Rgb([240, 240, 240])))
        }

        fn stop(&mut self) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// 上传替身
    #[derive(Clone, Default)]
    struct FakeUploader {
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ImageUploader for FakeUploader {
        async fn upload(&self, image: &[u8]) -> Result<FormattedResult, UploadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // JPEG SOI 标记
            assert_eq!(&image[..2], &[0xFF, 0xD8]);
            if self.fail {
                Err(UploadError::AllFailed { attempts: Vec::new() })
            } else {
                Ok(FormattedResult::from(vec![RecommendationItem::new("Beer", "Lager", "cheap")]))
            }
        }
    }

    #[tokio::test]
    async fn test_shutter_uploads_and_stops_stream() {
        let camera = FakeCamera::default();
        let uploader = FakeUploader::default();
        let mut session = CaptureSession::new(camera.clone(), uploader.clone(), true);

        session.start();
        assert!(session.is_streaming());

        session.shutter().await;
        let state = session.state();
        assert!(!state.capturing);
        assert!(!state.loading);
        assert!(state.captured_image.is_some());
        assert_eq!(state.result.as_ref().unwrap().items[0].name, "Beer");
        assert!(state.error.is_none());
        assert!(!session.is_streaming());
        assert_eq!(camera.stopped.load(Ordering::SeqCst), 1);
        assert_eq!(uploader.calls.load(Ordering::SeqCst), 1);
    }

    /// 永不返回的上传替身
    struct PendingUploader;

    #[async_trait]
    impl ImageUploader for PendingUploader {
        async fn upload(&self, _image: &[u8]) -> Result<FormattedResult, UploadError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_preview_is_shown_while_uploading() {
        let mut session = CaptureSession::new(FakeCamera::default(), PendingUploader, true);
        session.start();

        let shutter = tokio::time::timeout(Duration::from_millis(50), session.shutter());
        assert!(shutter.await.is_err());

        let state = session.state();
        assert!(state.loading);
        assert!(!state.capturing);
        assert!(state.captured_image.is_some());
        assert!(state.result.is_none());
    }

    #[tokio::test]
    async fn test_permission_denied_never_uploads() {
        let camera = FakeCamera {
            fail_with: Some(CameraError::PermissionDenied),
            ..Default::default()
        };
        let uploader = FakeUploader::default();
        let mut session = CaptureSession::new(camera, uploader.clone(), true);

        session.start();
        session.shutter().await;

        let error = session.state().error.clone().unwrap();
        assert_eq!(error, CameraError::PermissionDenied.user_message());
        assert_ne!(
            error,
            UploadError::AllFailed { attempts: Vec::new() }.user_message()
        );
        assert!(session.state().capturing);
        assert_eq!(uploader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_insecure_context_does_not_open_camera() {
        let camera = FakeCamera::default();
        let mut session = CaptureSession::new(camera.clone(), FakeUploader::default(), false);

        session.start();
        assert_eq!(camera.opened.load(Ordering::SeqCst), 0);
        assert_eq!(
            session.state().error.as_deref(),
            Some(CameraError::InsecureContext.user_message().as_str())
        );
    }

    #[tokio::test]
    async fn test_upload_failure_sets_error_and_retake_resets() {
        let camera = FakeCamera::default();
        let uploader = FakeUploader {
            fail: true,
            ..Default::default()
        };
        let mut session = CaptureSession::new(camera.clone(), uploader, true);

        session.start();
        session.shutter().await;
        let error = session.state().error.as_deref().unwrap();
        assert!(error.starts_with("処理中にエラーが発生しました"));
        assert!(session.state().result.is_none());

        session.retake();
        let state = session.state();
        assert!(state.capturing);
        assert!(state.captured_image.is_none());
        assert!(state.result.is_none());
        assert!(state.error.is_none());
        assert!(session.is_streaming());
        assert_eq!(camera.opened.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_drop_stops_stream() {
        let camera = FakeCamera::default();
        {
            let mut session = CaptureSession::new(camera.clone(), FakeUploader::default(), true);
            session.start();
        }
        assert_eq!(camera.stopped.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_encode_jpeg() {
        let frame = RgbImage::from_pixel(16, 16, Rgb([10, 20, 30]));
        let jpeg = encode_jpeg(&frame, JPEG_QUALITY).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 16));
    }
}
