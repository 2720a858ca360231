use std::sync::Arc;

use dog_core::{Entity, EntityId};
use tracing::warn;

use crate::batch::{BatchWindow, LoadHandle, Rows};
use crate::catalog::{Cardinality, Catalog, Relation};
use crate::error::{GraphResult, IntegrityError, RelationError};
use crate::view::ViewDefinition;

/// Related entities of one parent, shaped by the relation's cardinality.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    One(Option<Entity>),
    Many(Vec<Entity>),
}

impl Related {
    pub fn entities(&self) -> Vec<&Entity> {
        match self {
            Related::One(e) => e.iter().collect(),
            Related::Many(v) => v.iter().collect(),
        }
    }
}

/// A scheduled relation lookup for one parent entity.
///
/// A parent whose key field is null schedules nothing and resolves to
/// no rows.
pub struct RelationLoad {
    relation: Arc<Relation>,
    parent_id: EntityId,
    required: bool,
    pending: Option<LoadHandle>,
}

impl RelationLoad {
    pub fn relation(&self) -> &Arc<Relation> {
        &self.relation
    }

    pub fn is_scheduled(&self) -> bool {
        self.pending.is_some()
    }

    /// Wait for the batch and shape the rows.
    ///
    /// A required to-one relation that resolves to nothing is a data
    /// integrity fault, not a null.
    pub async fn finish(self) -> GraphResult<Related> {
        let rows: Rows = match self.pending {
            Some(handle) => handle.wait().await?,
            None => Rows::from(Vec::new()),
        };

        match self.relation.cardinality() {
            Cardinality::Many => Ok(Related::Many(rows.to_vec())),
            Cardinality::One => {
                if rows.len() > 1 {
                    warn!(
                        "{} matched {} rows for {} `{}`, keeping the first",
                        self.relation.name(),
                        rows.len(),
                        self.relation.source_type(),
                        self.parent_id
                    );
                }
                let row = rows.first().cloned();
                if row.is_none() && self.required {
                    return Err(IntegrityError::NonNullableMissing {
                        relation: self.relation.name().clone(),
                        parent_id: self.parent_id,
                    }
                    .into());
                }
                Ok(Related::One(row))
            }
        }
    }
}

/// Maps `(entity type, field)` to its registered relation and routes the
/// lookup through the pass's batch window.
pub struct RelationResolver<'p> {
    catalog: &'p Catalog,
    view: &'p ViewDefinition,
    window: &'p BatchWindow,
}

impl<'p> RelationResolver<'p> {
    pub fn new(catalog: &'p Catalog, view: &'p ViewDefinition, window: &'p BatchWindow) -> Self {
        Self {
            catalog,
            view,
            window,
        }
    }

    /// Schedule the lookup of `field` for `entity`. Never touches the
    /// entity's stored key; the only side effect is the scheduled key.
    pub fn resolve(&self, entity: &Entity, field: &str) -> GraphResult<RelationLoad> {
        let relation = self
            .catalog
            .relation(&entity.entity_type, field)
            .ok_or_else(|| RelationError::UnknownField {
                entity_type: entity.entity_type.clone(),
                field: field.to_string(),
            })?;

        let pending = entity
            .key(relation.parent_key_field())
            .map(|key| self.window.schedule(relation, key));

        Ok(RelationLoad {
            relation: Arc::clone(relation),
            parent_id: entity.id.clone(),
            required: self.view.is_required(relation.name()),
            pending,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::EntityType;
    use crate::error::GraphError;
    use dog_core::MemoryStore;
    use tracing_test::traced_test;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.register_type(EntityType::new("User").scalar("name")).unwrap();
        catalog
            .register_type(EntityType::new("Post").scalars(["title", "authorId"]))
            .unwrap();
        catalog
            .register_relation(Relation::belongs_to("Post", "author", "User", "authorId"))
            .unwrap();
        catalog
            .register_relation(Relation::has_many("User", "posts", "Post", "authorId"))
            .unwrap();
        catalog
    }

    fn store() -> MemoryStore {
        MemoryStore::new().with_entities([
            Entity::new("User", "1").with_field("name", "ada"),
            Entity::new("Post", "10").with_field("authorId", "1"),
            Entity::new("Post", "11").with_field("authorId", "1"),
        ])
    }

    #[tokio::test]
    async fn resolves_both_directions() {
        let catalog = catalog();
        let view = ViewDefinition::new("public", "Post");
        let window = BatchWindow::new();
        let resolver = RelationResolver::new(&catalog, &view, &window);

        let post = Entity::new("Post", "10").with_field("authorId", "1");
        let user = Entity::new("User", "1");
        let author = resolver.resolve(&post, "author").unwrap();
        let posts = resolver.resolve(&user, "posts").unwrap();
        assert_eq!(window.dispatch(&store()).await.unwrap(), 2);

        match author.finish().await.unwrap() {
            Related::One(Some(u)) => assert_eq!(u.id.as_str(), "1"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(posts.finish().await.unwrap().entities().len(), 2);
        // the parent's key is untouched
        assert_eq!(post.fields["authorId"], serde_json::json!("1"));
    }

    #[tokio::test]
    async fn unknown_fields_are_relation_errors() {
        let catalog = catalog();
        let view = ViewDefinition::new("public", "Post");
        let window = BatchWindow::new();
        let resolver = RelationResolver::new(&catalog, &view, &window);

        let err = resolver
            .resolve(&Entity::new("Post", "10"), "comments")
            .err()
            .unwrap();
        assert!(matches!(err, GraphError::Relation(RelationError::UnknownField { .. })));
        assert_eq!(window.pending_keys(), 0);
    }

    #[tokio::test]
    async fn null_keys_schedule_nothing() {
        let catalog = catalog();
        let view = ViewDefinition::new("public", "Post");
        let window = BatchWindow::new();
        let resolver = RelationResolver::new(&catalog, &view, &window);

        let orphan = Entity::new("Post", "12").with_field("authorId", serde_json::Value::Null);
        let load = resolver.resolve(&orphan, "author").unwrap();
        assert!(!load.is_scheduled());
        assert_eq!(load.finish().await.unwrap(), Related::One(None));
    }

    #[tokio::test]
    async fn required_relations_fail_on_dangling_keys() {
        let catalog = catalog();
        let view = ViewDefinition::new("public", "Post").require_relation("Post", "author");
        let window = BatchWindow::new();
        let resolver = RelationResolver::new(&catalog, &view, &window);

        let dangling = Entity::new("Post", "13").with_field("authorId", "404");
        let load = resolver.resolve(&dangling, "author").unwrap();
        window.dispatch(&store()).await.unwrap();

        let err = load.finish().await.unwrap_err();
        assert!(matches!(
            err,
            GraphError::Integrity(IntegrityError::NonNullableMissing { .. })
        ));
    }

    #[tokio::test]
    #[traced_test]
    async fn to_one_relations_with_several_rows_are_reported() {
        let mut catalog = catalog();
        catalog
            .register_type(EntityType::new("Profile").scalars(["bio", "userId"]))
            .unwrap();
        catalog
            .register_relation(Relation::has_one("User", "profile", "Profile", "userId"))
            .unwrap();
        let view = ViewDefinition::new("public", "User");
        let window = BatchWindow::new();
        let resolver = RelationResolver::new(&catalog, &view, &window);
        let store = MemoryStore::new().with_entities([
            Entity::new("Profile", "a").with_field("userId", "1"),
            Entity::new("Profile", "b").with_field("userId", "1"),
        ]);

        let load = resolver.resolve(&Entity::new("User", "1"), "profile").unwrap();
        window.dispatch(&store).await.unwrap();

        match load.finish().await.unwrap() {
            Related::One(Some(p)) => assert_eq!(p.id.as_str(), "a"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(logs_contain("User.profile matched 2 rows for User `1`"));
    }
}
