//! ERP handler groups: categories and customer orders over an `ErpStore`.
//!
//! Register both with `app.register(&mut ErpModule::new().store(MemoryStore::new()))`.

pub mod categories;
pub mod orders;
pub mod records;
pub mod store;

pub use categories::CategoryHandler;
pub use orders::OrderHandler;
pub use records::{Filter, Records};
pub use store::{ErpStore, MemoryStore, Record, StoreError, Table};

use std::sync::Arc;

use direkt_core::{Caller, CoreError, ErrorCode, HandlerError, Operation};

use crate::core::{Application, Module};

/// Per-call view of the ERP: who is calling and which store (if any) backs the handlers.
#[derive(Clone)]
pub struct Session {
    caller: Caller,
    store: Option<Arc<dyn ErpStore>>,
}

impl Session {
    pub fn new(caller: &Caller, store: Option<Arc<dyn ErpStore>>) -> Self {
        Self {
            caller: caller.clone(),
            store,
        }
    }

    pub fn caller(&self) -> &Caller {
        &self.caller
    }

    /// Store for an authenticated caller; `Connect` otherwise.
    pub fn connected(&self) -> Result<&dyn ErpStore, HandlerError> {
        match &self.store {
            Some(store) if self.caller.is_authenticated() => Ok(store.as_ref()),
            _ => Err(ErrorCode::Connect.into()),
        }
    }

    /// `connected`, then `Permission` unless the caller holds `op` on `resource`.
    pub fn authorize(&self, resource: &str, op: Operation) -> Result<&dyn ErpStore, HandlerError> {
        let store = self.connected()?;
        if !self.caller.can(resource, op) {
            tracing::debug!(login = ?self.caller.login(), resource, ?op, "permission denied");
            return Err(ErrorCode::Permission.into());
        }
        Ok(store)
    }
}

/// Registers the `Category` and `Order` actions. Without a store every method answers `Connect`.
#[derive(Default)]
pub struct ErpModule {
    store: Option<Arc<dyn ErpStore>>,
}

impl ErpModule {
    pub fn new() -> Self {
        Self { store: None }
    }

    pub fn store(mut self, store: impl ErpStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Share a store with other parts of the application.
    pub fn shared(mut self, store: Arc<dyn ErpStore>) -> Self {
        self.store = Some(store);
        self
    }
}

impl Module for ErpModule {
    fn register_into(&mut self, app: &mut Application) -> Result<(), CoreError> {
        app.register(&mut categories::module(self.store.clone()))?;
        app.register(&mut orders::module(self.store.clone()))
    }
}
