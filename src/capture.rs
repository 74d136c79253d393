//! Camera capture controller.
//!
//! The controller is an explicit state machine over an abstract `CameraDevice`:
//!
//! ```text
//! PermissionUnknown ──► PermissionDenied
//!        │
//!        ▼
//! PermissionGranted ──► DeviceUnavailable
//!        │
//!        ▼
//!      Ready ◄──► Capturing
//! ```

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::CaptureError;

/// In-app denials after which we send the user to OS settings instead of
/// prompting again
const DENIALS_BEFORE_SETTINGS: u32 = 2;

/// Which camera is in use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    #[default]
    Back,
    Front,
}

impl Facing {
    pub fn flipped(self) -> Self {
        match self {
            Facing::Back => Facing::Front,
            Facing::Front => Facing::Back,
        }
    }
}

/// OS-reported camera permission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Undetermined,
    Granted,
    Denied,
}

/// Answer to an in-app permission prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionResponse {
    pub granted: bool,
    /// False when the OS will not show the prompt again
    pub can_ask_again: bool,
}

/// Result of `CaptureController::request_permission`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
    Granted,
    /// Denied; when `offer_settings` is set the UI should show a
    /// "open settings" escape instead of another grant button
    Denied { offer_settings: bool },
    /// No prompt was shown; the OS settings page was opened instead
    OpenedSettings,
}

/// Platform camera boundary.
#[async_trait]
pub trait CameraDevice: Send + Sync {
    async fn permission_status(&self) -> PermissionStatus;

    /// Show the OS permission prompt.
    async fn request_permission(&self) -> PermissionResponse;

    /// Deep-link to the app's page in OS settings.
    async fn open_settings(&self) -> Result<(), CaptureError>;

    async fn is_available(&self, facing: Facing) -> bool;

    /// Take one still photo and return where it was written.
    async fn take_picture(&self, facing: Facing) -> Result<PathBuf, CaptureError>;
}

/// One shutter press worth of output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureResult {
    pub image_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraState {
    PermissionUnknown,
    PermissionDenied,
    PermissionGranted,
    DeviceUnavailable,
    Ready,
    Capturing,
}

impl fmt::Display for CameraState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CameraState::PermissionUnknown => "permission unknown",
            CameraState::PermissionDenied => "permission denied",
            CameraState::PermissionGranted => "permission granted",
            CameraState::DeviceUnavailable => "device unavailable",
            CameraState::Ready => "ready",
            CameraState::Capturing => "capturing",
        };
        f.write_str(label)
    }
}

pub struct CaptureController {
    device: Box<dyn CameraDevice>,
    state: CameraState,
    facing: Facing,
    denials: u32,
    offer_settings: bool,
}

impl CaptureController {
    pub fn new(device: Box<dyn CameraDevice>) -> Self {
        Self {
            device,
            state: CameraState::PermissionUnknown,
            facing: Facing::default(),
            denials: 0,
            offer_settings: false,
        }
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn is_ready(&self) -> bool {
        self.state == CameraState::Ready
    }

    /// Whether the UI should offer the OS-settings escape
    pub fn offers_settings(&self) -> bool {
        self.offer_settings
    }

    /// Re-read the OS permission without prompting (screen entry, app resume).
    pub async fn sync_permission(&mut self) -> CameraState {
        match self.device.permission_status().await {
            PermissionStatus::Granted => self.on_granted().await,
            PermissionStatus::Denied => self.state = CameraState::PermissionDenied,
            PermissionStatus::Undetermined => {
                if self.state != CameraState::PermissionDenied {
                    self.state = CameraState::PermissionUnknown;
                }
            }
        }
        self.state
    }

    /// Ask for camera access.
    ///
    /// After repeated denials the in-app prompt is usually a no-op on mobile,
    /// so the OS settings page is opened instead of prompting again.
    pub async fn request_permission(&mut self) -> Result<PermissionOutcome, CaptureError> {
        if self.is_granted() {
            return Ok(PermissionOutcome::Granted);
        }

        if self.offer_settings {
            info!("Camera permission previously denied, opening settings");
            self.device.open_settings().await?;
            return Ok(PermissionOutcome::OpenedSettings);
        }

        let response = self.device.request_permission().await;
        if response.granted {
            self.on_granted().await;
            return Ok(PermissionOutcome::Granted);
        }

        self.denials += 1;
        self.state = CameraState::PermissionDenied;
        self.offer_settings = self.denials >= DENIALS_BEFORE_SETTINGS || !response.can_ask_again;
        warn!(
            "Camera permission denied ({} in a row, offer settings: {})",
            self.denials, self.offer_settings
        );
        Ok(PermissionOutcome::Denied {
            offer_settings: self.offer_settings,
        })
    }

    /// Re-probe the device, e.g. after hardware becomes available.
    pub async fn refresh_device(&mut self) -> CameraState {
        if matches!(
            self.state,
            CameraState::PermissionGranted | CameraState::DeviceUnavailable
        ) {
            self.probe_device().await;
        }
        self.state
    }

    /// Toggle front/back. Returns whether the toggle took effect.
    pub async fn flip(&mut self) -> bool {
        if !matches!(self.state, CameraState::Ready | CameraState::PermissionGranted) {
            debug!("Ignoring flip in state {}", self.state);
            return false;
        }
        self.facing = self.facing.flipped();
        self.probe_device().await;
        true
    }

    /// Take one photo. Only valid in `Ready`; always returns to `Ready`.
    pub async fn capture(&mut self) -> Result<CaptureResult, CaptureError> {
        match self.state {
            CameraState::Ready => {}
            CameraState::PermissionUnknown | CameraState::PermissionDenied => {
                return Err(CaptureError::PermissionDenied)
            }
            CameraState::DeviceUnavailable => return Err(CaptureError::DeviceUnavailable),
            other => return Err(CaptureError::NotReady(other.to_string())),
        }

        self.state = CameraState::Capturing;
        let result = self.device.take_picture(self.facing).await;
        self.state = CameraState::Ready;

        let image_path = result?;
        if image_path.as_os_str().is_empty() {
            return Err(CaptureError::CaptureFailed(
                "camera returned no image".to_string(),
            ));
        }
        debug!("Captured {}", image_path.display());
        Ok(CaptureResult { image_path })
    }

    fn is_granted(&self) -> bool {
        matches!(
            self.state,
            CameraState::PermissionGranted
                | CameraState::DeviceUnavailable
                | CameraState::Ready
                | CameraState::Capturing
        )
    }

    async fn on_granted(&mut self) {
        self.denials = 0;
        self.offer_settings = false;
        if !self.is_granted() {
            self.state = CameraState::PermissionGranted;
        }
        if self.state == CameraState::PermissionGranted {
            self.probe_device().await;
        }
    }

    async fn probe_device(&mut self) {
        self.state = if self.device.is_available(self.facing).await {
            CameraState::Ready
        } else {
            warn!("No {:?} camera available", self.facing);
            CameraState::DeviceUnavailable
        };
    }
}
