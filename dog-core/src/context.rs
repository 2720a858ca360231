//! Request-scoped identity for DogRS operations.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of an authenticated requester.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(pub String);

impl PrincipalId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The authenticated identity issuing a request.
///
/// Built once by the authentication collaborator and never mutated
/// afterwards; roles are a plain set of names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl Principal {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self {
            id: PrincipalId(id.into()),
            roles: BTreeSet::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// True when at least one of `required` is held.
    pub fn has_any_role(&self, required: &BTreeSet<String>) -> bool {
        !self.roles.is_disjoint(required)
    }
}

/// Context carried through one resolution pass.
///
/// Created at request start, passed explicitly into every call,
/// dropped at request end. Nothing in here is ever promoted to
/// process-wide state.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub principal: Option<Principal>,
}

impl RequestContext {
    /// Context for an unauthenticated request.
    pub fn anonymous() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            principal: None,
        }
    }

    pub fn authenticated(principal: Principal) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            principal: Some(principal),
        }
    }

    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }
}
