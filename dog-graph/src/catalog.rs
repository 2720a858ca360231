//! Entity types and the relations between them.
//!
//! The catalog is the single source of truth for relation resolution:
//! every view projects one of its entity types, and every nested field a
//! client may request is either a scalar declared here or a relation
//! registered here. Nothing is looked up by name at request time without
//! having been validated at registration.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use dog_core::ID_FIELD;
use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Pseudo-field answering the entity type name.
pub const TYPENAME_FIELD: &str = "__typename";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Cardinality {
    One,
    Many,
}

/// Which side of a relation holds the foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeySide {
    Source,
    Target,
}

/// `(source type, field)` pair identifying a relation, e.g. `Post.author`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationName {
    pub source_type: String,
    pub field: String,
}

impl RelationName {
    pub fn new(source_type: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            source_type: source_type.into(),
            field: field.into(),
        }
    }
}

impl fmt::Display for RelationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.source_type, self.field)
    }
}

/// A declared link between two entity types.
///
/// Fields are private: once registered, target and cardinality never change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Relation {
    name: RelationName,
    target_type: String,
    foreign_key: String,
    cardinality: Cardinality,
    key_side: KeySide,
}

impl Relation {
    /// `Post.author`: the source row holds `author_id`, pointing at one target.
    pub fn belongs_to(
        source_type: impl Into<String>,
        field: impl Into<String>,
        target_type: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::build(source_type, field, target_type, foreign_key, Cardinality::One, KeySide::Source)
    }

    /// `User.posts`: every target row holding the source id in `foreign_key`.
    pub fn has_many(
        source_type: impl Into<String>,
        field: impl Into<String>,
        target_type: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::build(source_type, field, target_type, foreign_key, Cardinality::Many, KeySide::Target)
    }

    /// `User.profile`: the single target row holding the source id.
    pub fn has_one(
        source_type: impl Into<String>,
        field: impl Into<String>,
        target_type: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::build(source_type, field, target_type, foreign_key, Cardinality::One, KeySide::Target)
    }

    fn build(
        source_type: impl Into<String>,
        field: impl Into<String>,
        target_type: impl Into<String>,
        foreign_key: impl Into<String>,
        cardinality: Cardinality,
        key_side: KeySide,
    ) -> Self {
        Self {
            name: RelationName::new(source_type, field),
            target_type: target_type.into(),
            foreign_key: foreign_key.into(),
            cardinality,
            key_side,
        }
    }

    pub fn name(&self) -> &RelationName {
        &self.name
    }

    pub fn source_type(&self) -> &str {
        &self.name.source_type
    }

    pub fn field(&self) -> &str {
        &self.name.field
    }

    pub fn target_type(&self) -> &str {
        &self.target_type
    }

    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn key_side(&self) -> KeySide {
        self.key_side
    }

    /// Field of the parent row whose value keys the batch.
    pub fn parent_key_field(&self) -> &str {
        match self.key_side {
            KeySide::Source => &self.foreign_key,
            KeySide::Target => ID_FIELD,
        }
    }

    /// Field of the target rows matched against the collected keys.
    pub fn target_key_field(&self) -> &str {
        match self.key_side {
            KeySide::Source => ID_FIELD,
            KeySide::Target => &self.foreign_key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityType {
    name: String,
    scalars: BTreeSet<String>,
}

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scalars: BTreeSet::new(),
        }
    }

    pub fn scalar(mut self, field: impl Into<String>) -> Self {
        self.scalars.insert(field.into());
        self
    }

    pub fn scalars<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scalars.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `id` is implicitly a scalar of every type.
    pub fn has_scalar(&self, field: &str) -> bool {
        field == ID_FIELD || self.scalars.contains(field)
    }
}

/// How a requested field of some entity type is answered.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind<'a> {
    Typename,
    Scalar,
    Relation(&'a Arc<Relation>),
}

#[derive(Debug, Default)]
pub struct Catalog {
    types: BTreeMap<String, EntityType>,
    relations: BTreeMap<RelationName, Arc<Relation>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_type(&mut self, entity_type: EntityType) -> Result<(), SchemaError> {
        if self.types.contains_key(entity_type.name()) {
            return Err(SchemaError::DuplicateType(entity_type.name().to_string()));
        }
        self.types.insert(entity_type.name().to_string(), entity_type);
        Ok(())
    }

    /// Register a relation. Both types must exist, the field name must be
    /// free on the source type and the foreign key must be a scalar of the
    /// side that holds it.
    pub fn register_relation(&mut self, relation: Relation) -> Result<(), SchemaError> {
        let source = self.require_type(relation.source_type())?;
        let target = self.require_type(relation.target_type())?;

        if source.has_scalar(relation.field())
            || relation.field() == TYPENAME_FIELD
            || self.relations.contains_key(relation.name())
        {
            return Err(SchemaError::DuplicateField {
                entity_type: relation.source_type().to_string(),
                field: relation.field().to_string(),
            });
        }

        let holder = match relation.key_side() {
            KeySide::Source => source,
            KeySide::Target => target,
        };
        if !holder.has_scalar(relation.foreign_key()) {
            return Err(SchemaError::UnknownForeignKey {
                entity_type: holder.name().to_string(),
                field: relation.foreign_key().to_string(),
            });
        }

        self.relations
            .insert(relation.name().clone(), Arc::new(relation));
        Ok(())
    }

    pub fn require_type(&self, name: &str) -> Result<&EntityType, SchemaError> {
        self.types
            .get(name)
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))
    }

    pub fn relation(&self, source_type: &str, field: &str) -> Option<&Arc<Relation>> {
        self.relations.get(&RelationName::new(source_type, field))
    }

    pub fn relations(&self) -> impl Iterator<Item = &Arc<Relation>> {
        self.relations.values()
    }

    /// Classify `field` on `entity_type`; `None` for unknown fields.
    pub fn field_kind(&self, entity_type: &str, field: &str) -> Option<FieldKind<'_>> {
        if field == TYPENAME_FIELD {
            return Some(FieldKind::Typename);
        }
        if self.types.get(entity_type)?.has_scalar(field) {
            return Some(FieldKind::Scalar);
        }
        self.relation(entity_type, field).map(FieldKind::Relation)
    }
}
