//! Caller identity and the authentication collaborator.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Read,
        Operation::Create,
        Operation::Update,
        Operation::Delete,
    ];
}

/// Fine-grained grants: one per resource x operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Rights {
    grants: BTreeSet<(String, Operation)>,
}

impl Rights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, resource: &str, op: Operation) -> Self {
        self.grants.insert((resource.to_string(), op));
        self
    }

    /// Every operation on `resource`.
    pub fn grant_all(mut self, resource: &str) -> Self {
        for op in Operation::ALL {
            self.grants.insert((resource.to_string(), op));
        }
        self
    }

    pub fn allows(&self, resource: &str, op: Operation) -> bool {
        self.grants.contains(&(resource.to_string(), op))
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}

/// Authenticated principal for one inbound request. Shared read-only by every call in the batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Caller {
    login: Option<String>,
    rights: Rights,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(login: impl Into<String>, rights: Rights) -> Self {
        Self {
            login: Some(login.into()),
            rights,
        }
    }

    pub fn login(&self) -> Option<&str> {
        self.login.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.login.as_deref().is_some_and(|l| !l.is_empty())
    }

    pub fn rights(&self) -> &Rights {
        &self.rights
    }

    /// Unauthenticated callers hold no rights, whatever their grant table says.
    pub fn can(&self, resource: &str, op: Operation) -> bool {
        self.is_authenticated() && self.rights.allows(resource, op)
    }
}

/// Resolves the caller once per inbound request, from the request headers.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, headers: &[(String, String)]) -> Caller;
}

/// Every request is anonymous.
pub struct Anonymous;

#[async_trait]
impl Authenticator for Anonymous {
    async fn authenticate(&self, _headers: &[(String, String)]) -> Caller {
        Caller::anonymous()
    }
}
