use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use tracing::info;

use crate::capture::{CameraDevice, Facing, PermissionResponse, PermissionStatus};
use crate::error::CaptureError;

/// Camera backed by an image already on disk.
///
/// Used when running headless: permission is always granted, both facings
/// see the same picture, and every shutter press copies the source image into
/// the capture directory as a fresh file.
pub struct StillImageCamera {
    source: PathBuf,
    capture_dir: PathBuf,
}

impl StillImageCamera {
    pub fn new(source: impl Into<PathBuf>, capture_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            capture_dir: capture_dir.into(),
        }
    }

    fn capture_name(&self) -> String {
        let ext = self
            .source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("jpg");
        format!("capture-{}.{}", Utc::now().format("%Y%m%dT%H%M%S%.6fZ"), ext)
    }
}

#[async_trait]
impl CameraDevice for StillImageCamera {
    async fn permission_status(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn request_permission(&self) -> PermissionResponse {
        PermissionResponse {
            granted: true,
            can_ask_again: true,
        }
    }

    async fn open_settings(&self) -> Result<(), CaptureError> {
        info!("No OS settings for a still-image camera");
        Ok(())
    }

    async fn is_available(&self, _facing: Facing) -> bool {
        tokio::fs::metadata(&self.source)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    async fn take_picture(&self, _facing: Facing) -> Result<PathBuf, CaptureError> {
        tokio::fs::create_dir_all(&self.capture_dir)
            .await
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;

        let target = self.capture_dir.join(self.capture_name());
        tokio::fs::copy(&self.source, &target)
            .await
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;
        Ok(target)
    }
}
