pub mod capture;
pub mod config;
pub mod engine;
pub mod error;
pub mod flow;
pub mod i18n;
pub mod preferences;
pub mod presenter;
pub mod selector;
pub mod still_camera;
pub mod translation;
