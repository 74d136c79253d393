//! `LanguageCode`: the language token stored in preferences and passed around
//! the capture flow.
//!
//! Unlike a catalog entry, a code is never rejected at construction. A stored
//! value from an older build may no longer be in the catalog; it is still
//! carried and shown verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Language, LanguageRegistry};

/// Short token identifying a target language (e.g. "es").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageCode(String);

impl LanguageCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for empty or whitespace-only codes.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Catalog entry for this code in the default registry, if any.
    pub fn language(&self) -> Option<&'static Language> {
        LanguageRegistry::get().get_by_code(&self.0)
    }

    /// Whether the default registry knows this code.
    pub fn is_known(&self) -> bool {
        self.language().is_some()
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LanguageCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<&Language> for LanguageCode {
    fn from(language: &Language) -> Self {
        Self::new(language.code)
    }
}
