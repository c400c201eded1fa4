//! 上传文件落盘。请求体携带 base64 内容，存储路径返回给客户端引用。

use base64::Engine;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::MediaConfig;
use crate::error::{LinliError, Result};

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// 媒体文件存储
pub struct MediaStore {
    root: PathBuf,
    max_bytes: usize,
}

impl MediaStore {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            root: PathBuf::from(&config.root),
            max_bytes: config.max_upload_bytes,
        }
    }

    /// 保存一份 base64 编码的图片，返回相对存储路径（如 avatar/xxx.png）
    pub async fn save_image(
        &self,
        category: &str,
        file_name: &str,
        content_base64: &str,
    ) -> Result<String> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(LinliError::validation(format!(
                "不支持的文件类型: {}",
                file_name
            )));
        }

        let content = base64::engine::general_purpose::STANDARD
            .decode(content_base64)
            .map_err(|e| {
                warn!("Invalid base64 upload: {}", e);
                LinliError::validation("文件内容不是有效的 base64")
            })?;

        if content.is_empty() {
            return Err(LinliError::validation("文件内容为空"));
        }
        if content.len() > self.max_bytes {
            return Err(LinliError::validation(format!(
                "文件超过大小限制 {} 字节",
                self.max_bytes
            )));
        }

        let relative = format!("{}/{}.{}", category, Uuid::new_v4(), extension);
        let full_path = self.root.join(&relative);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full_path, &content).await?;

        debug!("Saved upload: {} ({} bytes)", relative, content.len());
        Ok(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    fn store(dir: &Path) -> MediaStore {
        MediaStore::new(&MediaConfig {
            root: dir.to_string_lossy().into_owned(),
            max_upload_bytes: 64,
        })
    }

    #[tokio::test]
    async fn test_save_and_reject() {
        let dir = std::env::temp_dir().join(format!("linli-media-{}", Uuid::new_v4()));
        let store = store(&dir);

        let content = base64::engine::general_purpose::STANDARD.encode(b"fake image bytes");
        let path = store.save_image("avatar", "me.png", &content).await.unwrap();
        assert!(path.starts_with("avatar/"));
        assert!(dir.join(&path).exists());

        // 非法扩展名
        assert!(store.save_image("avatar", "evil.exe", &content).await.is_err());
        // 非法 base64
        assert!(store.save_image("avatar", "a.png", "!!not-base64!!").await.is_err());

        // 超限
        let big = base64::engine::general_purpose::STANDARD.encode(vec![0u8; 128]);
        assert!(store.save_image("avatar", "big.png", &big).await.is_err());

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
