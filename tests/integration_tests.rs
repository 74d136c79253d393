//! Integration tests for the capture-to-translation flow
//!
//! These tests drive `ScreenFlow` end to end with scripted camera and engine
//! doubles, plus one run over the real file store, still-image camera and
//! HTTP engine against a mocked server.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::Notify;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use offsight::capture::{
    CameraDevice, CaptureController, Facing, PermissionOutcome, PermissionResponse,
    PermissionStatus,
};
use offsight::config::Config;
use offsight::engine::{
    EngineHandle, HttpVisionEngine, InferenceRequest, InferenceResponse, VisionEngine,
};
use offsight::error::{CaptureError, EngineError, FlowError, StorageError};
use offsight::flow::{Route, ScreenFlow};
use offsight::i18n::{Language, LanguageCode, LanguageRegistry};
use offsight::preferences::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore};
use offsight::presenter::{FailureCause, TranslationOutcome};
use offsight::still_camera::StillImageCamera;
use offsight::translation::TranslationOrchestrator;

// ==================== Test Doubles ====================

struct CameraInner {
    dir: TempDir,
    status: Mutex<PermissionStatus>,
    answers: Mutex<VecDeque<PermissionResponse>>,
    prompts: AtomicUsize,
    settings_opened: AtomicUsize,
    shots: AtomicUsize,
    fail_next_shot: AtomicBool,
}

/// Camera that writes a small file per shot and answers prompts from a script
#[derive(Clone)]
struct FakeCamera {
    inner: Arc<CameraInner>,
}

impl FakeCamera {
    fn with_status(status: PermissionStatus) -> Self {
        Self {
            inner: Arc::new(CameraInner {
                dir: TempDir::new().expect("Failed to create temp dir"),
                status: Mutex::new(status),
                answers: Mutex::new(VecDeque::new()),
                prompts: AtomicUsize::new(0),
                settings_opened: AtomicUsize::new(0),
                shots: AtomicUsize::new(0),
                fail_next_shot: AtomicBool::new(false),
            }),
        }
    }

    fn granted() -> Self {
        Self::with_status(PermissionStatus::Granted)
    }

    fn answer(&self, response: PermissionResponse) {
        self.inner.answers.lock().unwrap().push_back(response);
    }
}

#[async_trait]
impl CameraDevice for FakeCamera {
    async fn permission_status(&self) -> PermissionStatus {
        *self.inner.status.lock().unwrap()
    }

    async fn request_permission(&self) -> PermissionResponse {
        self.inner.prompts.fetch_add(1, Ordering::SeqCst);
        let response = self
            .inner
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PermissionResponse {
                granted: false,
                can_ask_again: true,
            });
        *self.inner.status.lock().unwrap() = if response.granted {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        };
        response
    }

    async fn open_settings(&self) -> Result<(), CaptureError> {
        self.inner.settings_opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn is_available(&self, _facing: Facing) -> bool {
        true
    }

    async fn take_picture(&self, _facing: Facing) -> Result<PathBuf, CaptureError> {
        if self.inner.fail_next_shot.swap(false, Ordering::SeqCst) {
            return Err(CaptureError::CaptureFailed("sensor busy".to_string()));
        }
        let n = self.inner.shots.fetch_add(1, Ordering::SeqCst);
        let path = self.inner.dir.path().join(format!("shot-{}.jpg", n));
        std::fs::write(&path, b"jpeg").map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;
        Ok(path)
    }
}

struct EngineInner {
    replies: Mutex<VecDeque<Result<InferenceResponse, EngineError>>>,
    init_failures: AtomicUsize,
    init_calls: AtomicUsize,
    requests: Mutex<Vec<InferenceRequest>>,
    completed: AtomicUsize,
    gated: AtomicBool,
    release: Notify,
}

/// Engine replying from a queue; can be held until the test releases it
#[derive(Clone)]
struct FakeEngine {
    inner: Arc<EngineInner>,
}

impl FakeEngine {
    fn new() -> Self {
        Self {
            inner: Arc::new(EngineInner {
                replies: Mutex::new(VecDeque::new()),
                init_failures: AtomicUsize::new(0),
                init_calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
                completed: AtomicUsize::new(0),
                gated: AtomicBool::new(false),
                release: Notify::new(),
            }),
        }
    }

    fn reply(&self, text: &str) {
        self.inner.replies.lock().unwrap().push_back(Ok(InferenceResponse {
            success: true,
            response: text.to_string(),
        }));
    }

    fn fail(&self, error: EngineError) {
        self.inner.replies.lock().unwrap().push_back(Err(error));
    }

    fn hold(&self) {
        self.inner.gated.store(true, Ordering::SeqCst);
    }

    fn release(&self) {
        self.inner.release.notify_one();
    }

    fn request_count(&self) -> usize {
        self.inner.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl VisionEngine for FakeEngine {
    async fn init(&self) -> Result<(), EngineError> {
        self.inner.init_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.inner.init_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.inner.init_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(EngineError::Init("model download failed".to_string()));
        }
        Ok(())
    }

    async fn complete(&self, request: InferenceRequest) -> Result<InferenceResponse, EngineError> {
        self.inner.requests.lock().unwrap().push(request);
        if self.inner.gated.load(Ordering::SeqCst) {
            self.inner.release.notified().await;
        }
        let reply = self
            .inner
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(EngineError::Request("no reply scripted".to_string())));
        self.inner.completed.fetch_add(1, Ordering::SeqCst);
        reply
    }
}

/// Store whose writes always fail
struct ReadOnlyStore;

#[async_trait]
impl PreferenceStore for ReadOnlyStore {
    async fn get(&self) -> Result<Option<LanguageCode>, StorageError> {
        Ok(None)
    }

    async fn set(&self, _code: &LanguageCode) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("read-only volume".to_string()))
    }
}

// ==================== Test Helpers ====================

fn small_catalog() -> LanguageRegistry {
    LanguageRegistry::new(vec![
        Language { code: "en", name: "English", native_name: "English" },
        Language { code: "es", name: "Spanish", native_name: "Español" },
        Language { code: "fr", name: "French", native_name: "Français" },
    ])
}

fn build_flow(
    store: Arc<dyn PreferenceStore>,
    camera: &FakeCamera,
    engine: &FakeEngine,
) -> ScreenFlow {
    let registry = small_catalog();
    let orchestrator = Arc::new(TranslationOrchestrator::new(
        EngineHandle::new(Arc::new(engine.clone())),
        registry.clone(),
    ));
    ScreenFlow::new(
        store,
        registry,
        CaptureController::new(Box::new(camera.clone())),
        orchestrator,
    )
}

/// Flow already on the camera screen with Spanish selected
async fn flow_on_camera(camera: &FakeCamera, engine: &FakeEngine) -> ScreenFlow {
    let mut flow = build_flow(
        Arc::new(MemoryPreferenceStore::with_language("es")),
        camera,
        engine,
    );
    flow.launch().await;
    assert_eq!(flow.navigate(Route::Camera).await, Route::Camera);
    assert!(flow.shutter_enabled());
    flow
}

// ==================== Scenario Tests ====================

#[tokio::test]
async fn test_select_capture_translate_dismiss_scenario() {
    let store = Arc::new(MemoryPreferenceStore::new());
    let camera = FakeCamera::granted();
    let engine = FakeEngine::new();
    engine.reply("Hola");

    let mut flow = build_flow(store.clone(), &camera, &engine);
    assert_eq!(flow.launch().await, None);

    // Gated camera entry shows the selector first
    assert_eq!(flow.navigate(Route::Camera).await, Route::LanguageSelector);
    let codes: Vec<_> = flow.selector_entries().iter().map(|e| e.code).collect();
    assert_eq!(codes, vec!["en", "es", "fr"]);

    let selection = flow.select_language("es").await.unwrap();
    assert!(selection.persisted);
    assert_eq!(store.get().await.unwrap(), Some(LanguageCode::new("es")));
    assert_eq!(flow.route(), Route::Camera);
    assert_eq!(flow.language_label(), "Spanish");

    let outcome = flow.capture_and_translate().await.unwrap().unwrap();
    assert_eq!(outcome.display_text(), "Hola");
    assert!(matches!(
        outcome,
        TranslationOutcome::Translated { language, .. } if language.as_str() == "es"
    ));

    assert_eq!(flow.dismiss_result(), Route::Camera);
    assert!(!flow.presenter().is_visible());
    assert!(flow.shutter_enabled());
}

#[tokio::test]
async fn test_empty_storage_requires_selection_before_capture() {
    let camera = FakeCamera::granted();
    let engine = FakeEngine::new();
    let mut flow = build_flow(Arc::new(MemoryPreferenceStore::new()), &camera, &engine);

    assert_eq!(flow.launch().await, None);
    assert_eq!(flow.language_label(), "Not selected");
    assert!(!flow.shutter_enabled());

    assert_eq!(flow.navigate(Route::Camera).await, Route::LanguageSelector);
    assert!(!flow.shutter_enabled());
    assert_eq!(flow.press_shutter().await, Err(FlowError::NotOnCamera));

    // Backing out of the gated entry returns home
    assert_eq!(flow.close_language_selector(), Route::Home);
    assert_eq!(camera.inner.shots.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_selecting_language_unblocks_shutter_immediately() {
    let camera = FakeCamera::granted();
    let engine = FakeEngine::new();
    let mut flow = build_flow(Arc::new(MemoryPreferenceStore::new()), &camera, &engine);
    flow.launch().await;
    flow.navigate(Route::Camera).await;

    flow.select_language("fr").await.unwrap();

    assert_eq!(flow.route(), Route::Camera);
    assert!(flow.shutter_enabled());
}

#[tokio::test]
async fn test_changing_language_from_camera_stays_on_camera() {
    let camera = FakeCamera::granted();
    let engine = FakeEngine::new();
    engine.reply("Bonjour");
    let mut flow = flow_on_camera(&camera, &engine).await;

    let entries = flow.open_language_selector().await;
    assert!(entries.iter().find(|e| e.code == "es").unwrap().selected);
    assert!(!flow.shutter_enabled());

    flow.select_language("fr").await.unwrap();
    assert_eq!(flow.route(), Route::Camera);

    flow.capture_and_translate().await.unwrap();
    assert_eq!(engine.inner.requests.lock().unwrap()[0].target_language, "French");
}

#[tokio::test]
async fn test_saved_language_outside_catalog_is_shown_verbatim() {
    let camera = FakeCamera::granted();
    let engine = FakeEngine::new();
    let mut flow = build_flow(
        Arc::new(MemoryPreferenceStore::with_language("de")),
        &camera,
        &engine,
    );

    assert_eq!(flow.launch().await, Some(&LanguageCode::new("de")));
    assert_eq!(flow.language_label(), "de");
    assert_eq!(flow.navigate(Route::Camera).await, Route::Camera);
}

// ==================== Concurrency Tests ====================

#[tokio::test]
async fn test_second_shutter_while_translating_is_refused() {
    let camera = FakeCamera::granted();
    let engine = FakeEngine::new();
    engine.hold();
    engine.reply("Hola");
    let mut flow = flow_on_camera(&camera, &engine).await;

    flow.press_shutter().await.unwrap();
    assert!(flow.is_translating());
    assert!(!flow.shutter_enabled());
    assert_eq!(flow.press_shutter().await, Err(FlowError::Busy));
    assert_eq!(camera.inner.shots.load(Ordering::SeqCst), 1);

    engine.release();
    let outcome = flow.finish().await.unwrap();
    assert_eq!(outcome.display_text(), "Hola");
    assert_eq!(engine.request_count(), 1);
    assert!(flow.shutter_enabled());
}

#[tokio::test]
async fn test_orchestrator_refuses_overlapping_calls() {
    let engine = FakeEngine::new();
    engine.hold();
    engine.reply("Hola");
    let orchestrator = Arc::new(TranslationOrchestrator::new(
        EngineHandle::new(Arc::new(engine.clone())),
        small_catalog(),
    ));

    let dir = TempDir::new().unwrap();
    let image = dir.path().join("a.jpg");
    std::fs::write(&image, b"jpeg").unwrap();

    let first = {
        let orchestrator = orchestrator.clone();
        let capture = offsight::capture::CaptureResult {
            image_path: image.clone(),
        };
        tokio::spawn(async move { orchestrator.translate(capture, &LanguageCode::new("es")).await })
    };

    // Wait until the first call is inside the engine
    while engine.request_count() == 0 {
        tokio::task::yield_now().await;
    }

    let second = orchestrator
        .translate(
            offsight::capture::CaptureResult { image_path: image },
            &LanguageCode::new("es"),
        )
        .await;
    assert_eq!(second, Err(offsight::error::TranslationError::Busy));

    engine.release();
    assert_eq!(first.await.unwrap(), Ok("Hola".to_string()));
    assert_eq!(engine.request_count(), 1);
}

#[tokio::test]
async fn test_closing_camera_discards_pending_result_without_aborting() {
    let camera = FakeCamera::granted();
    let engine = FakeEngine::new();
    engine.hold();
    engine.reply("Hola");
    let mut flow = flow_on_camera(&camera, &engine).await;

    flow.press_shutter().await.unwrap();
    assert_eq!(flow.close_camera(), Route::Home);

    engine.release();
    assert!(flow.finish().await.is_none());

    // The engine call ran to completion; its result was dropped
    assert_eq!(engine.inner.completed.load(Ordering::SeqCst), 1);
    assert!(!flow.presenter().is_visible());
    assert!(!flow.is_translating());
}

#[tokio::test]
async fn test_captures_do_not_accumulate() {
    let camera = FakeCamera::granted();
    let engine = FakeEngine::new();
    engine.reply("Hola");
    engine.fail(EngineError::Request("connection reset".to_string()));
    engine.reply("Hola");
    let mut flow = flow_on_camera(&camera, &engine).await;

    for _ in 0..3 {
        flow.capture_and_translate().await.unwrap();
        flow.dismiss_result();
    }

    // Discarded result: the capture still goes once the translation completes
    engine.hold();
    engine.reply("Hola");
    flow.press_shutter().await.unwrap();
    flow.close_camera();
    engine.release();
    assert!(flow.finish().await.is_none());

    assert_eq!(camera.inner.shots.load(Ordering::SeqCst), 4);
    let left = std::fs::read_dir(camera.inner.dir.path()).unwrap().count();
    assert_eq!(left, 0);
}

#[tokio::test]
async fn test_result_for_old_camera_session_is_dropped_after_reopen() {
    let camera = FakeCamera::granted();
    let engine = FakeEngine::new();
    engine.hold();
    engine.reply("Hola");
    let mut flow = flow_on_camera(&camera, &engine).await;

    flow.press_shutter().await.unwrap();
    flow.close_camera();
    flow.navigate(Route::Camera).await;

    engine.release();
    assert!(flow.finish().await.is_none());
    assert!(!flow.presenter().is_visible());
    assert!(flow.shutter_enabled());
}

// ==================== Failure Tests ====================

#[tokio::test]
async fn test_failed_translation_replaces_previous_success() {
    let camera = FakeCamera::granted();
    let engine = FakeEngine::new();
    engine.reply("Hola");
    engine.fail(EngineError::Request("connection reset".to_string()));
    let mut flow = flow_on_camera(&camera, &engine).await;

    flow.capture_and_translate().await.unwrap();
    assert_eq!(flow.presenter().current().unwrap().display_text(), "Hola");

    // Press again without dismissing: the old text must not linger
    let outcome = flow.capture_and_translate().await.unwrap().unwrap();
    assert!(matches!(
        outcome,
        TranslationOutcome::Failed { cause: FailureCause::InferenceFailed, .. }
    ));
    assert_eq!(flow.dismiss_result(), Route::Camera);
    assert!(flow.shutter_enabled());
}

#[tokio::test]
async fn test_model_unavailable_then_retry_succeeds() {
    let camera = FakeCamera::granted();
    let engine = FakeEngine::new();
    engine.inner.init_failures.store(1, Ordering::SeqCst);
    engine.reply("Hola");
    let mut flow = flow_on_camera(&camera, &engine).await;

    let outcome = flow.capture_and_translate().await.unwrap().unwrap();
    assert!(matches!(
        outcome,
        TranslationOutcome::Failed { cause: FailureCause::ModelUnavailable, .. }
    ));
    assert_eq!(engine.request_count(), 0);

    flow.dismiss_result();
    let outcome = flow.capture_and_translate().await.unwrap().unwrap();
    assert_eq!(outcome.display_text(), "Hola");
    assert_eq!(engine.inner.init_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_capture_failure_is_displayed_and_retryable() {
    let camera = FakeCamera::granted();
    let engine = FakeEngine::new();
    engine.reply("Hola");
    let mut flow = flow_on_camera(&camera, &engine).await;
    camera.inner.fail_next_shot.store(true, Ordering::SeqCst);

    let result = flow.capture_and_translate().await;
    assert!(matches!(
        result,
        Err(FlowError::Capture(CaptureError::CaptureFailed(_)))
    ));
    let shown = flow.presenter().current().unwrap();
    assert!(matches!(
        shown,
        TranslationOutcome::Failed { cause: FailureCause::CaptureFailed, .. }
    ));
    assert_eq!(engine.request_count(), 0);

    flow.dismiss_result();
    assert!(flow.shutter_enabled());
    let outcome = flow.capture_and_translate().await.unwrap().unwrap();
    assert_eq!(outcome.display_text(), "Hola");
}

#[tokio::test]
async fn test_storage_write_failure_is_not_fatal() {
    let camera = FakeCamera::granted();
    let engine = FakeEngine::new();
    engine.reply("Hola");
    let store: Arc<dyn PreferenceStore> = Arc::new(ReadOnlyStore);
    let mut flow = build_flow(store.clone(), &camera, &engine);
    flow.launch().await;
    flow.navigate(Route::Camera).await;

    let selection = flow.select_language("es").await.unwrap();
    assert!(!selection.persisted);
    assert!(flow.shutter_enabled());
    assert_eq!(flow.capture_and_translate().await.unwrap().unwrap().display_text(), "Hola");

    // Next launch: nothing was saved
    let mut relaunched = build_flow(store, &camera, &engine);
    assert_eq!(relaunched.launch().await, None);
}

// ==================== Permission Tests ====================

#[tokio::test]
async fn test_two_denials_lead_to_settings_instead_of_third_prompt() {
    let camera = FakeCamera::with_status(PermissionStatus::Undetermined);
    let engine = FakeEngine::new();
    let mut flow = flow_on_camera_without_permission(&camera, &engine).await;
    assert!(!flow.shutter_enabled());

    assert_eq!(
        flow.request_camera_permission().await.unwrap(),
        PermissionOutcome::Denied { offer_settings: false }
    );
    assert_eq!(
        flow.request_camera_permission().await.unwrap(),
        PermissionOutcome::Denied { offer_settings: true }
    );
    assert_eq!(
        flow.request_camera_permission().await.unwrap(),
        PermissionOutcome::OpenedSettings
    );

    assert_eq!(camera.inner.prompts.load(Ordering::SeqCst), 2);
    assert_eq!(camera.inner.settings_opened.load(Ordering::SeqCst), 1);
    assert!(!flow.shutter_enabled());
}

#[tokio::test]
async fn test_grant_enables_shutter() {
    let camera = FakeCamera::with_status(PermissionStatus::Undetermined);
    camera.answer(PermissionResponse {
        granted: true,
        can_ask_again: true,
    });
    let engine = FakeEngine::new();
    let mut flow = flow_on_camera_without_permission(&camera, &engine).await;

    assert_eq!(
        flow.request_camera_permission().await.unwrap(),
        PermissionOutcome::Granted
    );
    assert!(flow.shutter_enabled());
}

async fn flow_on_camera_without_permission(camera: &FakeCamera, engine: &FakeEngine) -> ScreenFlow {
    let mut flow = build_flow(
        Arc::new(MemoryPreferenceStore::with_language("es")),
        camera,
        engine,
    );
    flow.launch().await;
    assert_eq!(flow.navigate(Route::Camera).await, Route::Camera);
    flow
}

// ==================== End-to-End Test ====================

#[tokio::test]
async fn test_file_store_still_camera_and_http_engine() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{ "id": "test-vlm" }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "```\nSalida\n```" } }]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let image = temp_dir.path().join("sign.jpg");
    std::fs::write(&image, [0xFF, 0xD8, 0xFF, 0xE0]).unwrap();

    let config = Config {
        engine_api_url: server.uri(),
        engine_api_key: None,
        engine_model: "test-vlm".to_string(),
        engine_max_tokens: 128,
        engine_temperature: 0.0,
        preferences_path: temp_dir
            .path()
            .join("prefs/preferences.json")
            .to_str()
            .unwrap()
            .to_string(),
        capture_dir: temp_dir.path().join("captures").to_str().unwrap().to_string(),
    };

    let build = |config: &Config| {
        let registry = LanguageRegistry::default();
        let orchestrator = Arc::new(TranslationOrchestrator::new(
            EngineHandle::new(Arc::new(HttpVisionEngine::new(reqwest::Client::new(), config))),
            registry.clone(),
        ));
        let camera = CaptureController::new(Box::new(StillImageCamera::new(
            image.clone(),
            config.capture_dir.clone(),
        )));
        (
            ScreenFlow::new(
                Arc::new(FilePreferenceStore::new(config.preferences_path.clone())),
                registry,
                camera,
                orchestrator.clone(),
            ),
            orchestrator,
        )
    };

    let (mut flow, _orchestrator) = build(&config);
    flow.launch().await;
    flow.navigate(Route::Camera).await;
    flow.select_language("es").await.unwrap();

    let outcome = flow.capture_and_translate().await.unwrap().unwrap();
    assert_eq!(outcome.display_text(), "Salida");
    flow.dismiss_result();

    // Same process, second capture: model is not initialized again
    let outcome = flow.capture_and_translate().await.unwrap().unwrap();
    assert_eq!(outcome.display_text(), "Salida");

    // Each capture is discarded once its translation completes
    let captures = std::fs::read_dir(temp_dir.path().join("captures")).unwrap().count();
    assert_eq!(captures, 0);
    assert!(image.exists());

    // A fresh launch picks up the saved language and goes straight to the camera
    let (mut relaunched, _) = build(&config);
    assert_eq!(relaunched.launch().await, Some(&LanguageCode::new("es")));
    assert_eq!(relaunched.navigate(Route::Camera).await, Route::Camera);
}
