use anyhow::{bail, Result};

#[derive(Debug, Clone)]
pub struct Config {
    // Vision engine (OpenAI-compatible server running on device)
    pub engine_api_url: String,
    pub engine_api_key: Option<String>,
    pub engine_model: String,
    pub engine_max_tokens: u32,
    pub engine_temperature: f32,

    // Storage
    pub preferences_path: String,
    pub capture_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let engine_api_url = std::env::var("ENGINE_API_URL")
            .unwrap_or_else(|_| "http://localhost:8080/v1".to_string());
        if engine_api_url.trim().is_empty() {
            bail!("ENGINE_API_URL is set but empty");
        }

        Ok(Self {
            engine_api_url: engine_api_url.trim_end_matches('/').to_string(),
            engine_api_key: std::env::var("ENGINE_API_KEY")
                .ok()
                .filter(|v| !v.is_empty()),
            engine_model: std::env::var("ENGINE_MODEL")
                .unwrap_or_else(|_| "gemma-3-4b-it".to_string()),
            engine_max_tokens: std::env::var("ENGINE_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1024),
            engine_temperature: std::env::var("ENGINE_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.2),

            preferences_path: std::env::var("PREFERENCES_PATH")
                .unwrap_or_else(|_| "data/preferences.json".to_string()),
            capture_dir: std::env::var("CAPTURE_DIR")
                .unwrap_or_else(|_| "data/captures".to_string()),
        })
    }
}
