//! Error taxonomy for the capture-to-translation flow.
//!
//! Each external boundary (storage, camera, vision engine) gets its own error
//! type. None of them is allowed to escape the flow: `flow::ScreenFlow`
//! converts them into a displayable `presenter::TranslationOutcome`.

use thiserror::Error;

/// Durable preference storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backing file could not be read
    #[error("Failed to read preferences from {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Backing file could not be written
    #[error("Failed to write preferences to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Stored preferences are not valid JSON
    #[error("Preferences file {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Storage is not reachable at all (e.g. read-only volume, test double)
    #[error("Preference storage unavailable: {0}")]
    Unavailable(String),
}

/// Camera subsystem errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The user refused camera access
    #[error("Camera permission denied")]
    PermissionDenied,

    /// No usable camera for the selected facing
    #[error("Camera device unavailable")]
    DeviceUnavailable,

    /// The shutter was pressed but no photo came back
    #[error("Failed to capture photo: {0}")]
    CaptureFailed(String),

    /// `capture()` called outside the `Ready` state
    #[error("Camera is not ready (state: {0})")]
    NotReady(String),
}

/// Errors raised by a vision engine implementation
#[derive(Error, Debug)]
pub enum EngineError {
    /// Model could not be loaded, downloaded or located
    #[error("Model initialization failed: {0}")]
    Init(String),

    /// Transport-level failure talking to the engine
    #[error("Engine request failed: {0}")]
    Request(String),

    /// Engine answered with a non-success status
    #[error("Engine API error ({status}): {body}")]
    Status { status: u16, body: String },

    /// Engine answered with a payload we could not understand
    #[error("Failed to parse engine response: {0}")]
    Parse(String),

    /// Captured image could not be read for upload
    #[error("Failed to read image {path}: {reason}")]
    Image { path: String, reason: String },
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        EngineError::Request(err.to_string())
    }
}

/// Errors surfaced by `TranslationOrchestrator::translate`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslationError {
    /// Engine failed to initialize; retryable on next capture
    #[error("Translation model unavailable: {0}")]
    ModelUnavailable(String),

    /// Engine ran but produced nothing usable; retryable
    #[error("Translation failed: {0}")]
    InferenceFailed(String),

    /// No image or no target language supplied
    #[error("Nothing to translate: {0}")]
    CaptureMissing(String),

    /// Another translation is still running
    #[error("A translation is already in progress")]
    Busy,
}

/// Language selector errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Language selector is not open")]
    NotOpen,

    #[error("Language '{0}' is not in the catalog")]
    NotInCatalog(String),
}

/// Precondition violations on the screen flow itself
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("Select a translation language first")]
    LanguageRequired,

    #[error("Camera screen is not active")]
    NotOnCamera,

    #[error("A capture or translation is already in progress")]
    Busy,

    #[error(transparent)]
    Capture(#[from] CaptureError),
}
