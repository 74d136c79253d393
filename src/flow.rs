//! Screen flow: home, camera, and the language-selector modal.
//!
//! Camera entry is gated on a selected language. Without one, the selector
//! opens first and, once a language is picked, the camera follows. The
//! shutter is additionally disabled whenever no language is selected.
//!
//! Translations run on the tokio runtime so the flow stays responsive. Closing
//! the camera does not abort a pending translation (the engine has no abort);
//! its result is dropped when it arrives for a camera screen that is gone.

use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::capture::{CaptureController, PermissionOutcome};
use crate::error::{CaptureError, FlowError, SelectionError, TranslationError};
use crate::i18n::{LanguageCode, LanguageRegistry};
use crate::preferences::{load_selected_language, PreferenceStore};
use crate::presenter::{ResultPresenter, TranslationOutcome};
use crate::selector::{LanguageSelector, Selection, SelectorEntry};
use crate::translation::TranslationOrchestrator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Home,
    Camera,
    LanguageSelector,
}

struct PendingTranslation {
    session: u64,
    language: LanguageCode,
    handle: JoinHandle<Result<String, TranslationError>>,
}

pub struct ScreenFlow {
    route: Route,
    store: Arc<dyn PreferenceStore>,
    selector: LanguageSelector,
    /// Where closing the selector without a pick goes
    selector_origin: Route,
    /// Where an accepted pick goes
    selector_target: Route,
    selected: Option<LanguageCode>,
    camera: CaptureController,
    /// Set while the camera screen is mounted (the modal may sit on top)
    camera_session: Option<u64>,
    sessions_started: u64,
    orchestrator: Arc<TranslationOrchestrator>,
    pending: Option<PendingTranslation>,
    presenter: ResultPresenter,
}

impl ScreenFlow {
    pub fn new(
        store: Arc<dyn PreferenceStore>,
        registry: LanguageRegistry,
        camera: CaptureController,
        orchestrator: Arc<TranslationOrchestrator>,
    ) -> Self {
        Self {
            route: Route::Home,
            selector: LanguageSelector::new(registry, store.clone()),
            store,
            selector_origin: Route::Home,
            selector_target: Route::Home,
            selected: None,
            camera,
            camera_session: None,
            sessions_started: 0,
            orchestrator,
            pending: None,
            presenter: ResultPresenter::new(),
        }
    }

    /// Read the saved language. Call once at startup.
    pub async fn launch(&mut self) -> Option<&LanguageCode> {
        self.selected = load_selected_language(self.store.as_ref()).await;
        match &self.selected {
            Some(code) => info!("Loaded saved language: {}", code),
            None => info!("No saved language, selection required before capture"),
        }
        self.selected.as_ref()
    }

    // ==================== Accessors ====================

    pub fn route(&self) -> Route {
        self.route
    }

    pub fn selected_language(&self) -> Option<&LanguageCode> {
        self.selected.as_ref()
    }

    /// Label for the camera's language button
    pub fn language_label(&self) -> &str {
        self.selector
            .registry()
            .display_selection(self.selected.as_ref())
    }

    pub fn camera(&self) -> &CaptureController {
        &self.camera
    }

    pub fn presenter(&self) -> &ResultPresenter {
        &self.presenter
    }

    pub fn selector_entries(&self) -> Vec<SelectorEntry> {
        self.selector.entries()
    }

    pub fn is_translating(&self) -> bool {
        self.pending.is_some()
    }

    pub fn shutter_enabled(&self) -> bool {
        self.route == Route::Camera
            && self.selected.is_some()
            && self.camera.is_ready()
            && self.pending.is_none()
    }

    // ==================== Navigation ====================

    pub async fn navigate(&mut self, route: Route) -> Route {
        match route {
            Route::Home => {
                self.leave_camera();
                self.selector.close();
                self.route = Route::Home;
            }
            Route::Camera if self.selected.is_none() => {
                debug!("Camera entry without a language, showing selector first");
                let origin = if self.camera_session.is_some() {
                    Route::Camera
                } else {
                    Route::Home
                };
                self.show_selector(origin, Route::Camera).await;
            }
            Route::Camera => self.enter_camera().await,
            Route::LanguageSelector => {
                self.open_language_selector().await;
            }
        }
        self.route
    }

    /// Open the selector over the current screen.
    pub async fn open_language_selector(&mut self) -> Vec<SelectorEntry> {
        let here = match self.route {
            Route::LanguageSelector => self.selector_origin,
            other => other,
        };
        self.show_selector(here, here).await
    }

    pub async fn select_language(&mut self, code: &str) -> Result<Selection, SelectionError> {
        let selection = self.selector.select(code).await?;
        if !selection.persisted {
            warn!("Language {} applies to this session only", selection.code);
        }
        self.selected = Some(selection.code.clone());

        match self.selector_target {
            Route::Camera if self.camera_session.is_some() => self.route = Route::Camera,
            Route::Camera => self.enter_camera().await,
            other => self.route = other,
        }
        Ok(selection)
    }

    pub fn close_language_selector(&mut self) -> Route {
        self.selector.close();
        self.route = self.selector_origin;
        self.route
    }

    /// Leave the camera for home. A pending translation keeps running.
    pub fn close_camera(&mut self) -> Route {
        self.leave_camera();
        self.selector.close();
        self.route = Route::Home;
        self.route
    }

    // ==================== Camera ====================

    pub async fn request_camera_permission(&mut self) -> Result<PermissionOutcome, CaptureError> {
        self.camera.request_permission().await
    }

    pub async fn flip_camera(&mut self) -> bool {
        self.camera.flip().await
    }

    /// Take a photo and start translating it.
    ///
    /// Capture failures are shown in the result overlay and also returned.
    /// The translation itself is collected with `finish`.
    pub async fn press_shutter(&mut self) -> Result<(), FlowError> {
        let session = match (self.route, self.camera_session) {
            (Route::Camera, Some(session)) => session,
            _ => return Err(FlowError::NotOnCamera),
        };
        let language = self.selected.clone().ok_or(FlowError::LanguageRequired)?;
        if self.pending.is_some() {
            return Err(FlowError::Busy);
        }

        // No stale result stays up while the next one is produced
        self.presenter.dismiss();

        let capture = match self.camera.capture().await {
            Ok(capture) => capture,
            Err(e) => {
                warn!("Capture failed: {}", e);
                self.presenter.show(e.clone().into());
                return Err(e.into());
            }
        };

        let orchestrator = Arc::clone(&self.orchestrator);
        let target = language.clone();
        let handle = tokio::spawn(async move { orchestrator.translate(capture, &target).await });

        self.pending = Some(PendingTranslation {
            session,
            language,
            handle,
        });
        Ok(())
    }

    /// Wait for the pending translation and present it.
    ///
    /// Returns `None` when nothing was pending or when the camera screen it
    /// belonged to has since been closed.
    pub async fn finish(&mut self) -> Option<&TranslationOutcome> {
        let pending = self.pending.take()?;

        let result = pending.handle.await.unwrap_or_else(|e| {
            Err(TranslationError::InferenceFailed(format!(
                "translation task ended unexpectedly: {}",
                e
            )))
        });

        if self.camera_session != Some(pending.session) {
            debug!("Camera screen closed while translating, discarding result");
            return None;
        }

        let outcome = match result {
            Ok(text) => TranslationOutcome::translated(text, pending.language),
            Err(e) => {
                warn!("Translation failed: {}", e);
                e.into()
            }
        };
        self.presenter.show(outcome);
        self.presenter.current()
    }

    /// `press_shutter` followed by `finish`.
    pub async fn capture_and_translate(&mut self) -> Result<Option<&TranslationOutcome>, FlowError> {
        self.press_shutter().await?;
        Ok(self.finish().await)
    }

    /// Hide the result overlay and go back to the live camera view.
    pub fn dismiss_result(&mut self) -> Route {
        self.presenter.dismiss();
        if self.camera_session.is_some() {
            self.selector.close();
            self.route = Route::Camera;
        }
        self.route
    }

    // ==================== Internals ====================

    async fn show_selector(&mut self, origin: Route, target: Route) -> Vec<SelectorEntry> {
        self.selector_origin = origin;
        self.selector_target = target;
        self.route = Route::LanguageSelector;
        self.selector.open().await
    }

    async fn enter_camera(&mut self) {
        if self.camera_session.is_none() {
            self.sessions_started += 1;
            self.camera_session = Some(self.sessions_started);
            self.presenter.dismiss();
        }
        self.selector.close();
        self.route = Route::Camera;
        let state = self.camera.sync_permission().await;
        debug!("Camera screen open, camera {}", state);
    }

    fn leave_camera(&mut self) {
        if self.camera_session.take().is_some() {
            self.presenter.dismiss();
            if self.pending.is_some() {
                info!("Leaving camera with a translation in flight; its result will be dropped");
            }
        }
    }
}
