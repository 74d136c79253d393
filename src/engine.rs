use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::EngineError;

/// Everything the model needs for one extract-and-translate pass
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub prompt: String,
    pub image_path: PathBuf,
    /// Display name of the target language (e.g. "Spanish")
    pub target_language: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InferenceResponse {
    pub success: bool,
    pub response: String,
}

/// On-device multimodal model.
///
/// Implementations are not required to support concurrent `complete` calls;
/// `TranslationOrchestrator` never issues more than one at a time.
#[async_trait]
pub trait VisionEngine: Send + Sync {
    /// Load (and download if needed) the model. Expensive.
    async fn init(&self) -> Result<(), EngineError>;

    async fn complete(&self, request: InferenceRequest) -> Result<InferenceResponse, EngineError>;
}

/// Owned handle to a vision engine with init-once semantics.
///
/// `init` runs on first use and is cached once it succeeds. A failed init is
/// not cached, so the next request tries again. Not safe for concurrent
/// inference: callers must serialize `complete`.
pub struct EngineHandle {
    engine: Arc<dyn VisionEngine>,
    ready: OnceCell<()>,
}

impl EngineHandle {
    pub fn new(engine: Arc<dyn VisionEngine>) -> Self {
        Self {
            engine,
            ready: OnceCell::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.ready.initialized()
    }

    /// Initialize the engine unless that already happened.
    pub async fn ensure_ready(&self) -> Result<(), EngineError> {
        self.ready
            .get_or_try_init(|| async {
                info!("Initializing vision model");
                self.engine.init().await?;
                info!("Vision model ready");
                Ok::<(), EngineError>(())
            })
            .await
            .map(|_| ())
    }

    pub async fn complete(&self, request: InferenceRequest) -> Result<InferenceResponse, EngineError> {
        self.ensure_ready().await?;
        self.engine.complete(request).await
    }
}

// ==================== OpenAI-compatible HTTP engine ====================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Vision model served over an OpenAI-compatible API on the device
/// (llama.cpp server, Ollama, LM Studio...).
pub struct HttpVisionEngine {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl HttpVisionEngine {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            api_url: config.engine_api_url.clone(),
            api_key: config.engine_api_key.clone(),
            model: config.engine_model.clone(),
            max_tokens: config.engine_max_tokens,
            temperature: config.engine_temperature,
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, EngineError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
        Err(EngineError::Status { status, body })
    }
}

#[async_trait]
impl VisionEngine for HttpVisionEngine {
    async fn init(&self) -> Result<(), EngineError> {
        let response = self
            .authorize(self.client.get(format!("{}/models", self.api_url)))
            .send()
            .await
            .map_err(|e| EngineError::Init(format!("engine not reachable: {}", e)))?;
        let response = Self::check_status(response).await?;

        let models: ModelList = response
            .json()
            .await
            .map_err(|e| EngineError::Parse(e.to_string()))?;

        if !models.data.iter().any(|m| m.id == self.model) {
            let served: Vec<_> = models.data.iter().map(|m| m.id.as_str()).collect();
            return Err(EngineError::Init(format!(
                "model '{}' is not loaded (served: {})",
                self.model,
                served.join(", ")
            )));
        }
        Ok(())
    }

    async fn complete(&self, request: InferenceRequest) -> Result<InferenceResponse, EngineError> {
        let image_url = encode_image(&request.image_path).await?;

        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: request.prompt,
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: image_url },
                    },
                ],
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!(
            "Sending image {} to {} for {}",
            request.image_path.display(),
            self.model,
            request.target_language
        );

        let response = self
            .authorize(self.client.post(format!("{}/chat/completions", self.api_url)))
            .json(&body)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Parse(e.to_string()))?;

        let text = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if text.trim().is_empty() {
            warn!("Engine returned an empty completion");
        }

        Ok(InferenceResponse {
            success: !text.trim().is_empty(),
            response: text,
        })
    }
}

/// Read an image file into a base64 `data:` URL.
async fn encode_image(path: &Path) -> Result<String, EngineError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| EngineError::Image {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(format!("data:{};base64,{}", mime_for(path), STANDARD.encode(bytes)))
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        _ => "image/jpeg",
    }
}
