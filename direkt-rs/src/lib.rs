//! Direkt Rust facade: Application, Module trait, action modules, ERP handler groups on direkt-core.

// lets `#[derive(Action)]` expand to `::direkt_rs::Action` inside this crate too
extern crate self as direkt_rs;

pub mod actions;
pub mod auth;
pub mod core;
pub mod erp;

pub use actions::{Action, ActionModule};
pub use auth::StaticUsers;
pub use crate::core::{Application, IntoCoreError, Module};
pub use direkt_core::{
    ActionHandler, Caller, CoreError, ErrorCode, HandlerError, HandlerResult, Operation, RequestContext,
    Response as CoreResponse, Rights, RouterConfig, ServerConfig,
};
pub use direkt_rs_macros::Action;
pub use erp::{CategoryHandler, ErpModule, ErpStore, MemoryStore, OrderHandler};
