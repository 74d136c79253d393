//! Supported target languages.
//!
//! # Architecture
//!
//! - `registry`: Single source of truth for the language catalog, in display order
//! - `language`: `LanguageCode`, the persisted/in-memory language token
//!
//! # Example
//!
//! ```rust
//! use offsight::i18n::{LanguageCode, LanguageRegistry};
//!
//! let spanish = LanguageCode::new("es");
//! assert_eq!(LanguageRegistry::get().display_name(&spanish), "Spanish");
//!
//! // Codes outside the catalog are shown as-is rather than rejected
//! let klingon = LanguageCode::new("tlh");
//! assert_eq!(LanguageRegistry::get().display_name(&klingon), "tlh");
//! ```

mod language;
mod registry;

pub use language::LanguageCode;
pub use registry::{Language, LanguageRegistry};
