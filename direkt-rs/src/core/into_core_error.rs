//! Map foreign errors to CoreError without writing `.map_err(|e| CoreError::Handler(e.to_string()))`.

use direkt_core::CoreError;

/// Convert any error. Use `.map_err(IntoCoreError::into_core_error)` in setup code and hooks.
pub trait IntoCoreError {
    fn into_core_error(self) -> CoreError;
}

impl<E: std::error::Error + Send + Sync + 'static> IntoCoreError for E {
    fn into_core_error(self) -> CoreError {
        CoreError::Handler(self.to_string())
    }
}
