use regex::Regex;
use std::sync::OnceLock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::capture::CaptureResult;
use crate::engine::{EngineHandle, InferenceRequest};
use crate::error::{EngineError, TranslationError};
use crate::i18n::{LanguageCode, LanguageRegistry};

/// What the model answers when the photo has no readable text
const NO_TEXT_SENTINEL: &str = "NO_TEXT_FOUND";

/// Build the single extract-and-translate instruction sent with the photo
fn build_translation_prompt(target_language: &str) -> String {
    format!(
        r#"You are looking at a photo taken with a phone camera. Read all of the text visible in the image and translate it into {}.

## Rules
- Reply with the translated text only: no explanations, no notes, no transliteration
- Keep the reading order and line breaks of the original
- Keep numbers, prices, and proper names as they appear
- If some text is already in {}, keep it unchanged
- If the image contains no readable text, reply with exactly {}"#,
        target_language, target_language, NO_TEXT_SENTINEL
    )
}

/// Strip wrappers models like to add around the answer
fn clean_response(raw: &str) -> String {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    static LABEL: OnceLock<Regex> = OnceLock::new();

    let fence = FENCE.get_or_init(|| {
        Regex::new(r"(?s)^\s*```[A-Za-z]*\s*\n?(.*?)\n?\s*```\s*$").expect("valid fence regex")
    });
    let label = LABEL.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:\*\*)?translation(?:\s*\([^)]*\))?(?:\*\*)?\s*:\s*(?:\*\*)?")
            .expect("valid label regex")
    });

    let text = fence
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw);
    label.replace(text, "").trim().to_string()
}

/// Turns one captured photo into translated text.
///
/// Owns the engine handle. At most one translation runs at a time; a call made
/// while another is pending is refused with `TranslationError::Busy` rather
/// than queued behind it.
pub struct TranslationOrchestrator {
    engine: EngineHandle,
    registry: LanguageRegistry,
    in_flight: Mutex<()>,
}

impl TranslationOrchestrator {
    pub fn new(engine: EngineHandle, registry: LanguageRegistry) -> Self {
        Self {
            engine,
            registry,
            in_flight: Mutex::new(()),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    /// Translate the text in `image` into `target`.
    ///
    /// The capture is consumed: once the request completes, successfully or
    /// not, the image file is deleted. A refused (`Busy`) call leaves it alone.
    /// Either the complete translation or an error is returned, never partial
    /// output.
    pub async fn translate(
        &self,
        image: CaptureResult,
        target: &LanguageCode,
    ) -> Result<String, TranslationError> {
        let _guard = self.in_flight.try_lock().map_err(|_| {
            warn!("Refusing translation: another one is in progress");
            TranslationError::Busy
        })?;

        let result = self.run(&image, target).await;
        discard_capture(&image).await;
        result
    }

    async fn run(
        &self,
        image: &CaptureResult,
        target: &LanguageCode,
    ) -> Result<String, TranslationError> {
        if target.is_blank() {
            return Err(TranslationError::CaptureMissing(
                "no target language".to_string(),
            ));
        }
        if image.image_path.as_os_str().is_empty() {
            return Err(TranslationError::CaptureMissing("no image".to_string()));
        }
        if !tokio::fs::try_exists(&image.image_path).await.unwrap_or(false) {
            return Err(TranslationError::CaptureMissing(format!(
                "image {} does not exist",
                image.image_path.display()
            )));
        }

        self.engine.ensure_ready().await.map_err(|e| {
            warn!("Vision model unavailable: {}", e);
            TranslationError::ModelUnavailable(e.to_string())
        })?;

        let language_name = self.registry.display_name(target).to_string();
        info!(
            "Translating {} to {} ({})",
            image.image_path.display(),
            language_name,
            target
        );

        let request = InferenceRequest {
            prompt: build_translation_prompt(&language_name),
            image_path: image.image_path.clone(),
            target_language: language_name.clone(),
        };

        let response = self.engine.complete(request).await.map_err(|e| match e {
            EngineError::Init(msg) => TranslationError::ModelUnavailable(msg),
            other => {
                warn!("Inference failed: {}", other);
                TranslationError::InferenceFailed(other.to_string())
            }
        })?;

        if !response.success {
            return Err(TranslationError::InferenceFailed(
                "model returned no result".to_string(),
            ));
        }

        let text = clean_response(&response.response);
        if text.is_empty() {
            return Err(TranslationError::InferenceFailed(
                "model returned an empty translation".to_string(),
            ));
        }
        if text == NO_TEXT_SENTINEL {
            return Err(TranslationError::InferenceFailed(
                "no text found in image".to_string(),
            ));
        }

        info!("Translation to {} complete ({} chars)", language_name, text.chars().count());
        Ok(text)
    }
}

/// Delete a capture whose request has completed.
async fn discard_capture(image: &CaptureResult) {
    if image.image_path.as_os_str().is_empty() {
        return;
    }
    match tokio::fs::remove_file(&image.image_path).await {
        Ok(()) => debug!("Discarded capture {}", image.image_path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            "Failed to remove capture {}: {}",
            image.image_path.display(),
            e
        ),
    }
}
