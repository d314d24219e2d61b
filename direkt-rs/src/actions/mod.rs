//! Actions: type-named handler groups and the module that registers them.

pub mod action;
pub mod action_module;

pub use action::Action;
pub use action_module::ActionModule;
