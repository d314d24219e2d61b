//! Core: Application, Module, error conversion.

pub mod app;
pub mod into_core_error;
pub mod module;

pub use app::Application;
pub use into_core_error::IntoCoreError;
pub use module::Module;
