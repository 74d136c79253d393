//! Headless driver: translate the text in an image file.
//!
//! Usage:
//!   cargo run -- <image-path>                  # Use the saved language
//!   cargo run -- <image-path> --language es    # Pick (and save) a language first
//!
//! Optional environment variables (see `config::Config`):
//! - ENGINE_API_URL, ENGINE_API_KEY, ENGINE_MODEL
//! - ENGINE_MAX_TOKENS, ENGINE_TEMPERATURE
//! - PREFERENCES_PATH, CAPTURE_DIR

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use offsight::capture::{CaptureController, PermissionOutcome};
use offsight::config::Config;
use offsight::engine::{EngineHandle, HttpVisionEngine};
use offsight::flow::{Route, ScreenFlow};
use offsight::i18n::LanguageRegistry;
use offsight::preferences::{FilePreferenceStore, PreferenceStore};
use offsight::still_camera::StillImageCamera;
use offsight::translation::TranslationOrchestrator;

struct Args {
    image_path: String,
    language: Option<String>,
}

fn parse_args() -> Result<Args> {
    let mut image_path = None;
    let mut language = None;
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--language" | "-l" => {
                language = Some(args.next().context("--language needs a code, e.g. es")?);
            }
            other if other.starts_with('-') => bail!("Unknown option: {}", other),
            other => image_path = Some(other.to_string()),
        }
    }

    Ok(Args {
        image_path: image_path.context("Usage: offsight <image-path> [--language <code>]")?,
        language,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when absent)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("offsight=info".parse()?),
        )
        .init();

    let args = parse_args()?;
    let config = Config::from_env()?;

    let registry = LanguageRegistry::default();
    let store: Arc<dyn PreferenceStore> =
        Arc::new(FilePreferenceStore::new(&config.preferences_path));
    let camera = CaptureController::new(Box::new(StillImageCamera::new(
        &args.image_path,
        &config.capture_dir,
    )));
    let engine = HttpVisionEngine::new(reqwest::Client::new(), &config);
    let orchestrator = Arc::new(TranslationOrchestrator::new(
        EngineHandle::new(Arc::new(engine)),
        registry.clone(),
    ));

    let mut flow = ScreenFlow::new(store, registry, camera, orchestrator);
    flow.launch().await;

    if flow.navigate(Route::Camera).await == Route::LanguageSelector || args.language.is_some() {
        let Some(code) = args.language.as_deref() else {
            bail!("No language selected yet; pass --language <code>");
        };
        if flow.route() != Route::LanguageSelector {
            flow.open_language_selector().await;
        }
        flow.select_language(code)
            .await
            .with_context(|| format!("Cannot select language '{}'", code))?;
    }
    info!("Translating into {}", flow.language_label());

    if !flow.camera().is_ready() {
        match flow.request_camera_permission().await? {
            PermissionOutcome::Granted => {}
            other => warn!("Camera not usable: {:?}", other),
        }
    }

    if let Err(e) = flow.capture_and_translate().await {
        warn!("Capture did not complete: {}", e);
    }

    match flow.presenter().current() {
        Some(outcome) => {
            println!("{}", outcome.display_text());
            info!("{}", serde_json::to_string(outcome)?);
            if !outcome.is_success() {
                std::process::exit(1);
            }
        }
        None => bail!("No translation produced"),
    }

    flow.dismiss_result();
    Ok(())
}
