//! Ownership scopes: which root entities a principal may see or mutate.

use dog_core::{Entity, KeyValue, Predicate, Principal};
use serde_json::{Map, Value};

use crate::error::{AuthError, GraphError, GraphResult};
use crate::view::ViewDefinition;

/// Restricts a view to entities whose `owner_field` equals the principal id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipScope {
    owner_field: String,
}

impl OwnershipScope {
    pub fn owner_field(field: impl Into<String>) -> Self {
        Self {
            owner_field: field.into(),
        }
    }

    pub fn field(&self) -> &str {
        &self.owner_field
    }

    /// Whether an entity whose owner field holds `owner` is visible.
    pub fn in_scope(&self, principal: Option<&Principal>, owner: Option<&Value>) -> bool {
        match (principal, owner.and_then(KeyValue::from_value)) {
            (Some(p), Some(owner)) => owner.as_str() == p.id.as_str(),
            _ => false,
        }
    }

    pub fn contains(&self, principal: Option<&Principal>, entity: &Entity) -> bool {
        self.in_scope(principal, entity.fields.get(&self.owner_field))
    }

    /// Store-side form of the scope. Without a principal nothing is in scope.
    pub fn predicate(&self, principal: Option<&Principal>) -> Predicate {
        match principal {
            Some(p) => Predicate::eq(self.owner_field.clone(), p.id.as_str()),
            None => Predicate::Never,
        }
    }

    /// Set the owner field of create data to the principal id, overwriting
    /// whatever the client sent.
    pub fn stamp(&self, principal: Option<&Principal>, data: &mut Map<String, Value>) -> GraphResult<()> {
        let principal = principal.ok_or(AuthError::Unauthenticated)?;
        data.insert(
            self.owner_field.clone(),
            Value::String(principal.id.as_str().to_string()),
        );
        Ok(())
    }

    /// Reject update data that would move an entity to another owner.
    pub fn guard_update(&self, data: &Map<String, Value>) -> GraphResult<()> {
        if data.contains_key(&self.owner_field) {
            return Err(GraphError::invalid_request(format!(
                "`{}` cannot be changed through a scoped view",
                self.owner_field
            )));
        }
        Ok(())
    }
}

/// Predicate every root fetch and mutation target lookup of `view` carries.
pub fn view_predicate(view: &ViewDefinition, principal: Option<&Principal>) -> Predicate {
    view.scope()
        .map_or(Predicate::Always, |scope| scope.predicate(principal))
}
