//! Named query surfaces.
//!
//! Several views may project the same entity type: a public `posts`
//! surface and an owner-restricted `adminPosts` surface share one entity
//! and relation model and differ only in their root fields, role
//! requirements and ownership scope.

use std::collections::{BTreeMap, BTreeSet};

use dog_core::Principal;

use crate::catalog::RelationName;
use crate::scope::OwnershipScope;

/// Roles allowed to call a root field. Empty means public.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleRequirement {
    roles: BTreeSet<String>,
}

impl RoleRequirement {
    pub fn public() -> Self {
        Self::default()
    }

    /// Satisfied by a principal holding at least one of `roles`.
    pub fn any_of<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_public(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn is_satisfied_by(&self, principal: &Principal) -> bool {
        self.is_public() || principal.has_any_role(&self.roles)
    }
}

/// What a root field does against the view's entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootOperation {
    FindMany,
    FindOne,
    Create,
    Update,
    Delete,
}

impl RootOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            RootOperation::FindMany => "findMany",
            RootOperation::FindOne => "findOne",
            RootOperation::Create => "create",
            RootOperation::Update => "update",
            RootOperation::Delete => "delete",
        }
    }

    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            RootOperation::Create | RootOperation::Update | RootOperation::Delete
        )
    }

    pub fn returns_many(&self) -> bool {
        matches!(self, RootOperation::FindMany)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootField {
    pub name: String,
    pub operation: RootOperation,
    pub requires: RoleRequirement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewDefinition {
    name: String,
    entity_type: String,
    root_fields: BTreeMap<String, RootField>,
    scope: Option<OwnershipScope>,
    required_relations: BTreeSet<RelationName>,
}

impl ViewDefinition {
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            root_fields: BTreeMap::new(),
            scope: None,
            required_relations: BTreeSet::new(),
        }
    }

    /// Expose a root field. A later call with the same name replaces it.
    pub fn root(
        mut self,
        name: impl Into<String>,
        operation: RootOperation,
        requires: RoleRequirement,
    ) -> Self {
        let name = name.into();
        self.root_fields.insert(
            name.clone(),
            RootField {
                name,
                operation,
                requires,
            },
        );
        self
    }

    pub fn scoped_by(mut self, scope: OwnershipScope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Declare `source_type.field` non-nullable within this view: resolving
    /// it to nothing is an integrity fault instead of a null.
    pub fn require_relation(mut self, source_type: impl Into<String>, field: impl Into<String>) -> Self {
        self.required_relations
            .insert(RelationName::new(source_type, field));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn root_field(&self, name: &str) -> Option<&RootField> {
        self.root_fields.get(name)
    }

    pub fn root_fields(&self) -> impl Iterator<Item = &RootField> {
        self.root_fields.values()
    }

    pub fn scope(&self) -> Option<&OwnershipScope> {
        self.scope.as_ref()
    }

    pub fn required_relations(&self) -> &BTreeSet<RelationName> {
        &self.required_relations
    }

    pub fn is_required(&self, relation: &RelationName) -> bool {
        self.required_relations.contains(relation)
    }
}
