use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::error::SelectionError;
use crate::i18n::{LanguageCode, LanguageRegistry};
use crate::preferences::{load_selected_language, save_selected_language, PreferenceStore};

/// One row of the language picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectorEntry {
    pub code: &'static str,
    pub name: &'static str,
    pub native_name: &'static str,
    /// Whether this is the currently saved language
    pub selected: bool,
}

/// An accepted pick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub code: LanguageCode,
    /// False when the store write failed; the pick still applies for this session
    pub persisted: bool,
}

/// Modal language picker backed by the preference store.
///
/// Nothing survives between open/close cycles: every `open` re-reads the
/// store to decide which entry to mark.
pub struct LanguageSelector {
    registry: LanguageRegistry,
    store: Arc<dyn PreferenceStore>,
    visible: bool,
    marked: Option<LanguageCode>,
}

impl LanguageSelector {
    pub fn new(registry: LanguageRegistry, store: Arc<dyn PreferenceStore>) -> Self {
        Self {
            registry,
            store,
            visible: false,
            marked: None,
        }
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Show the picker with the saved language marked.
    pub async fn open(&mut self) -> Vec<SelectorEntry> {
        self.marked = load_selected_language(self.store.as_ref()).await;
        self.visible = true;
        self.entries()
    }

    /// Catalog entries in order, with the current mark applied.
    pub fn entries(&self) -> Vec<SelectorEntry> {
        self.registry
            .list()
            .iter()
            .map(|lang| SelectorEntry {
                code: lang.code,
                name: lang.name,
                native_name: lang.native_name,
                selected: self.marked.as_ref().map(LanguageCode::as_str) == Some(lang.code),
            })
            .collect()
    }

    /// Accept a pick: persist it (exactly one store write) and close.
    pub async fn select(&mut self, code: &str) -> Result<Selection, SelectionError> {
        if !self.visible {
            return Err(SelectionError::NotOpen);
        }
        let language = self
            .registry
            .get_by_code(code)
            .ok_or_else(|| SelectionError::NotInCatalog(code.to_string()))?;

        let code = LanguageCode::from(language);
        let persisted = save_selected_language(self.store.as_ref(), &code).await;
        info!("Selected translation language: {} ({})", language.name, code);

        self.close();
        Ok(Selection { code, persisted })
    }

    /// Dismiss without effect.
    pub fn close(&mut self) {
        self.visible = false;
        self.marked = None;
    }
}
