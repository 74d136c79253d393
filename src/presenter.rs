use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{CaptureError, TranslationError};
use crate::i18n::LanguageCode;

/// Why a capture-translate cycle produced no text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    PermissionDenied,
    DeviceUnavailable,
    CaptureFailed,
    ModelUnavailable,
    InferenceFailed,
    CaptureMissing,
    Busy,
}

impl FailureCause {
    /// Text shown in the result overlay
    pub fn message(&self) -> &'static str {
        match self {
            Self::PermissionDenied => {
                "Camera access is off. Enable it in Settings to translate what you see."
            }
            Self::DeviceUnavailable => "No camera is available on this device.",
            Self::CaptureFailed => "Couldn't take the photo. Try again.",
            Self::ModelUnavailable => "The translation model isn't ready. Try again in a moment.",
            Self::InferenceFailed => "Couldn't read or translate any text. Try another photo.",
            Self::CaptureMissing => "Choose a language and take a photo first.",
            Self::Busy => "A translation is already running. Wait for it to finish.",
        }
    }

    /// Whether another shutter press may succeed without outside changes
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::PermissionDenied | Self::DeviceUnavailable)
    }
}

impl From<&CaptureError> for FailureCause {
    fn from(err: &CaptureError) -> Self {
        match err {
            CaptureError::PermissionDenied => Self::PermissionDenied,
            CaptureError::DeviceUnavailable => Self::DeviceUnavailable,
            CaptureError::CaptureFailed(_) | CaptureError::NotReady(_) => Self::CaptureFailed,
        }
    }
}

impl From<&TranslationError> for FailureCause {
    fn from(err: &TranslationError) -> Self {
        match err {
            TranslationError::ModelUnavailable(_) => Self::ModelUnavailable,
            TranslationError::InferenceFailed(_) => Self::InferenceFailed,
            TranslationError::CaptureMissing(_) => Self::CaptureMissing,
            TranslationError::Busy => Self::Busy,
        }
    }
}

/// Result of one capture-translate cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TranslationOutcome {
    Translated {
        text: String,
        language: LanguageCode,
        completed_at: DateTime<Utc>,
    },
    Failed {
        cause: FailureCause,
        detail: String,
    },
}

impl TranslationOutcome {
    pub fn translated(text: impl Into<String>, language: LanguageCode) -> Self {
        Self::Translated {
            text: text.into(),
            language,
            completed_at: Utc::now(),
        }
    }

    pub fn failed(cause: FailureCause, detail: impl Into<String>) -> Self {
        Self::Failed {
            cause,
            detail: detail.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Translated { .. })
    }

    /// What the overlay body shows
    pub fn display_text(&self) -> &str {
        match self {
            Self::Translated { text, .. } => text.as_str(),
            Self::Failed { cause, .. } => cause.message(),
        }
    }
}

impl From<TranslationError> for TranslationOutcome {
    fn from(err: TranslationError) -> Self {
        Self::failed(FailureCause::from(&err), err.to_string())
    }
}

impl From<CaptureError> for TranslationOutcome {
    fn from(err: CaptureError) -> Self {
        Self::failed(FailureCause::from(&err), err.to_string())
    }
}

/// Dismissible overlay holding the latest outcome. Never auto-dismisses.
#[derive(Debug, Default)]
pub struct ResultPresenter {
    current: Option<TranslationOutcome>,
}

impl ResultPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever is shown.
    pub fn show(&mut self, outcome: TranslationOutcome) {
        self.current = Some(outcome);
    }

    /// Hide the overlay, returning what it was showing.
    pub fn dismiss(&mut self) -> Option<TranslationOutcome> {
        self.current.take()
    }

    pub fn is_visible(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&TranslationOutcome> {
        self.current.as_ref()
    }
}
