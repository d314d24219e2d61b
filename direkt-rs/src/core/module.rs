//! Module: register into app.

use direkt_core::CoreError;

use super::app::Application;

/// Anything that contributes actions (or collaborators) to an application.
pub trait Module {
    fn register_into(&mut self, app: &mut Application) -> Result<(), CoreError>;
}
