//! 上传临时文件管理
//!
//! 每个上传写入唯一命名的临时文件，处理结束后无论成功失败都会删除。
//! `TempUpload` 在未显式删除时由 Drop 兜底删除（包括请求 future 被取消的情况）。

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

/// 上传目录
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 确保目录存在
    pub async fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir).await
    }

    /// 写入临时文件
    pub async fn save(&self, bytes: &[u8], original_name: Option<&str>) -> io::Result<TempUpload> {
        self.ensure_dir().await?;

        let file_name = format!(
            "{}-{}{}",
            chrono::Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            extension_of(original_name)
        );
        let path = self.dir.join(file_name);

        // 构造守卫后再写入，写入失败时半成品文件同样会被删除
        let upload = TempUpload {
            path,
            removed: false,
        };
        fs::write(&upload.path, bytes).await?;
        debug!("Saved upload: {}", upload.path.display());
        Ok(upload)
    }
}

/// 取原文件名中安全的扩展名（含点），否则为空
fn extension_of(original_name: Option<&str>) -> String {
    original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// 临时上传文件守卫
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
    removed: bool,
}

impl TempUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path).await
    }

    /// 删除文件；文件已不存在视为成功
    pub async fn remove(mut self) -> io::Result<()> {
        self.removed = true;
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!("Removed upload: {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove upload {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Some("menu.JPG")), ".jpg");
        assert_eq!(extension_of(Some("menu")), "");
        assert_eq!(extension_of(Some("x.j/pg")), "");
        assert_eq!(extension_of(None), "");
    }

    #[tokio::test]
    async fn test_save_read_remove() {
        let dir = TempDir::new().unwrap();
        let store = UploadStore::new(dir.path().join("uploads"));

        let upload = store.save(b"jpeg-bytes", Some("menu.jpg")).await.unwrap();
        assert!(upload.path().exists());
        assert_eq!(upload.read().await.unwrap(), b"jpeg-bytes");

        upload.remove().await.unwrap();
        assert_eq!(entries(store.dir()), 0);
    }

    #[tokio::test]
    async fn test_drop_removes_file() {
        let dir = TempDir::new().unwrap();
        let store = UploadStore::new(dir.path());

        {
            let _upload = store.save(b"x", None).await.unwrap();
            assert_eq!(entries(dir.path()), 1);
        }
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_concurrent_saves_get_unique_names() {
        let dir = TempDir::new().unwrap();
        let store = UploadStore::new(dir.path());

        let (a, b) = tokio::join!(
            store.save(b"a", Some("menu.jpg")),
            store.save(b"b", Some("menu.jpg")),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.path(), b.path());
        assert_eq!(entries(dir.path()), 2);
    }
}
