//! Language registry: the static, ordered catalog of target languages.
//!
//! The default catalog is built once on first access via `OnceLock` and never
//! mutated afterwards. Custom catalogs can be built with `LanguageRegistry::new`.

use std::sync::OnceLock;

use super::LanguageCode;

/// Placeholder shown when no language has been chosen yet
const NOT_SELECTED: &str = "Not selected";

/// A supported target language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    /// ISO 639-1 language code (e.g., "en", "es")
    pub code: &'static str,

    /// English name, used in prompts and the selector (e.g., "Spanish")
    pub name: &'static str,

    /// Name in the language itself (e.g., "Español")
    pub native_name: &'static str,
}

/// Ordered catalog of supported languages.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    languages: Vec<Language>,
}

/// Global registry instance (initialized lazily)
static REGISTRY: OnceLock<LanguageRegistry> = OnceLock::new();

impl LanguageRegistry {
    /// Build a catalog from an explicit list. Order is preserved.
    pub fn new(languages: Vec<Language>) -> Self {
        Self { languages }
    }

    /// Get the process-wide default catalog.
    pub fn get() -> &'static LanguageRegistry {
        REGISTRY.get_or_init(LanguageRegistry::default)
    }

    /// Look up a language by code.
    ///
    /// # Returns
    /// * `Some(&Language)` if the code is in the catalog
    /// * `None` otherwise
    pub fn get_by_code(&self, code: &str) -> Option<&Language> {
        self.languages.iter().find(|lang| lang.code == code)
    }

    /// All languages, in catalog order.
    pub fn list(&self) -> &[Language] {
        &self.languages
    }

    pub fn contains(&self, code: &str) -> bool {
        self.get_by_code(code).is_some()
    }

    /// Name to show for a code.
    ///
    /// Known codes map to their catalog name. Unknown codes are displayed
    /// verbatim; a blank code means nothing has been selected.
    pub fn display_name<'a>(&'a self, code: &'a LanguageCode) -> &'a str {
        if code.is_blank() {
            return NOT_SELECTED;
        }
        self.get_by_code(code.as_str())
            .map(|lang| lang.name)
            .unwrap_or(code.as_str())
    }

    /// Like `display_name`, but for an optional selection.
    pub fn display_selection<'a>(&'a self, code: Option<&'a LanguageCode>) -> &'a str {
        code.map(|c| self.display_name(c)).unwrap_or(NOT_SELECTED)
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new(default_languages())
    }
}

fn default_languages() -> Vec<Language> {
    vec![
        Language { code: "en", name: "English", native_name: "English" },
        Language { code: "es", name: "Spanish", native_name: "Español" },
        Language { code: "fr", name: "French", native_name: "Français" },
        Language { code: "de", name: "German", native_name: "Deutsch" },
        Language { code: "it", name: "Italian", native_name: "Italiano" },
        Language { code: "pt", name: "Portuguese", native_name: "Português" },
        Language { code: "ru", name: "Russian", native_name: "Русский" },
        Language { code: "ja", name: "Japanese", native_name: "日本語" },
        Language { code: "ko", name: "Korean", native_name: "한국어" },
        Language { code: "zh", name: "Chinese", native_name: "中文" },
        Language { code: "ar", name: "Arabic", native_name: "العربية" },
        Language { code: "hi", name: "Hindi", native_name: "हिन्दी" },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_get_returns_singleton() {
        let registry1 = LanguageRegistry::get();
        let registry2 = LanguageRegistry::get();

        // Should return the same instance (same memory address)
        assert!(std::ptr::eq(registry1, registry2));
    }

    #[test]
    fn test_default_catalog_order() {
        let codes: Vec<&str> = LanguageRegistry::get().list().iter().map(|l| l.code).collect();
        assert_eq!(
            codes,
            vec!["en", "es", "fr", "de", "it", "pt", "ru", "ja", "ko", "zh", "ar", "hi"]
        );
    }

    #[test]
    fn test_get_by_code_spanish() {
        let config = LanguageRegistry::get().get_by_code("es").expect("es is supported");
        assert_eq!(config.name, "Spanish");
        assert_eq!(config.native_name, "Español");
    }

    #[test]
    fn test_get_by_code_nonexistent() {
        assert!(LanguageRegistry::get().get_by_code("tlh").is_none());
        assert!(!LanguageRegistry::get().contains(""));
    }

    #[test]
    fn test_display_name_known_and_unknown() {
        let registry = LanguageRegistry::get();
        assert_eq!(registry.display_name(&LanguageCode::new("ja")), "Japanese");
        assert_eq!(registry.display_name(&LanguageCode::new("xx-YY")), "xx-YY");
        assert_eq!(registry.display_name(&LanguageCode::new("  ")), "Not selected");
    }

    #[test]
    fn test_display_selection_none() {
        assert_eq!(LanguageRegistry::get().display_selection(None), "Not selected");
    }

    #[test]
    fn test_custom_catalog_preserves_order() {
        let registry = LanguageRegistry::new(vec![
            Language { code: "fr", name: "French", native_name: "Français" },
            Language { code: "en", name: "English", native_name: "English" },
        ]);
        assert_eq!(registry.list()[0].code, "fr");
        assert!(!registry.contains("es"));
        // Outside this catalog, "es" is shown verbatim
        assert_eq!(registry.display_name(&LanguageCode::new("es")), "es");
    }
}
