//! Static authenticator: login -> rights table, login taken from a request header.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use direkt_core::{Authenticator, Caller, CoreError, Operation, Rights};
use serde::Deserialize;

use crate::core::IntoCoreError;

pub const LOGIN_HEADER: &str = "x-login";

/// One user's entry in the JSON table: resource -> granted operations.
#[derive(Deserialize, Debug, Default)]
#[serde(transparent)]
struct Grants {
    by_resource: HashMap<String, Vec<Operation>>,
}

impl From<Grants> for Rights {
    fn from(grants: Grants) -> Self {
        grants
            .by_resource
            .iter()
            .fold(Rights::new(), |rights, (resource, ops)| {
                ops.iter().fold(rights, |rights, op| rights.grant(resource, *op))
            })
    }
}

/// Known users and their grants. Unknown or missing logins are anonymous.
#[derive(Clone, Debug, Default)]
pub struct StaticUsers {
    users: HashMap<String, Rights>,
}

impl StaticUsers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, login: &str, rights: Rights) -> Self {
        self.users.insert(login.to_string(), rights);
        self
    }

    /// `{"admin": {"order": ["read", "create"], "category": ["read"]}}`
    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        let table: HashMap<String, Grants> = serde_json::from_str(text)?;
        let users = table
            .into_iter()
            .map(|(login, grants)| (login, Rights::from(grants)))
            .collect();
        Ok(Self { users })
    }

    pub fn from_file(path: &Path) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path).map_err(IntoCoreError::into_core_error)?;
        Self::from_json(&text)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn caller(&self, login: &str) -> Caller {
        match self.users.get(login) {
            Some(rights) => Caller::authenticated(login, rights.clone()),
            None => Caller::anonymous(),
        }
    }
}

#[async_trait]
impl Authenticator for StaticUsers {
    async fn authenticate(&self, headers: &[(String, String)]) -> Caller {
        let login = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(LOGIN_HEADER))
            .map(|(_, v)| v.trim());
        match login {
            Some(login) if !login.is_empty() => {
                let caller = self.caller(login);
                if !caller.is_authenticated() {
                    tracing::debug!(%login, "unknown login");
                }
                caller
            }
            _ => Caller::anonymous(),
        }
    }
}
