use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::info;

use crate::error::{GraphError, GraphResult, SchemaError};
use crate::view::{RootField, ViewDefinition};

/// A registry that maps view names to view definitions.
///
/// Root field names are unique across every registered view, so a root
/// field alone identifies the view that serves it. Registration is
/// append-only and happens at startup; the registry is read-only once
/// the schema is built.
#[derive(Debug, Default)]
pub struct ViewRegistry {
    views: BTreeMap<String, Arc<ViewDefinition>>,
    // root field name -> view name
    root_index: HashMap<String, String>,
}

impl ViewRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a view. Nothing is registered if its name or any of its
    /// root field names is already taken.
    pub fn register(&mut self, view: ViewDefinition) -> Result<(), SchemaError> {
        if self.views.contains_key(view.name()) {
            return Err(SchemaError::DuplicateView(view.name().to_string()));
        }

        for field in view.root_fields() {
            if let Some(existing) = self.root_index.get(&field.name) {
                return Err(SchemaError::RootFieldCollision {
                    field: field.name.clone(),
                    view: view.name().to_string(),
                    existing_view: existing.clone(),
                });
            }
        }

        for field in view.root_fields() {
            self.root_index
                .insert(field.name.clone(), view.name().to_string());
        }

        info!("Registered view {} over {}", view.name(), view.entity_type());
        self.views.insert(view.name().to_string(), Arc::new(view));
        Ok(())
    }

    /// Look up a view by name.
    pub fn lookup(&self, name: &str) -> GraphResult<&Arc<ViewDefinition>> {
        self.views
            .get(name)
            .ok_or_else(|| GraphError::UnknownView(name.to_string()))
    }

    /// Find the view serving `root_field` together with the field itself.
    pub fn resolve_root(&self, root_field: &str) -> Option<(&Arc<ViewDefinition>, &RootField)> {
        let view = self.views.get(self.root_index.get(root_field)?)?;
        Some((view, view.root_field(root_field)?))
    }

    pub fn views(&self) -> impl Iterator<Item = &Arc<ViewDefinition>> {
        self.views.values()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::OwnershipScope;
    use crate::view::{RoleRequirement, RootOperation};

    fn public_posts() -> ViewDefinition {
        ViewDefinition::new("public", "Post")
            .root("posts", RootOperation::FindMany, RoleRequirement::public())
            .root("post", RootOperation::FindOne, RoleRequirement::public())
    }

    fn admin_posts() -> ViewDefinition {
        ViewDefinition::new("admin", "Post")
            .root("adminPosts", RootOperation::FindMany, RoleRequirement::any_of(["admin"]))
            .scoped_by(OwnershipScope::owner_field("ownerId"))
    }

    #[test]
    fn register_then_lookup_returns_an_equal_definition() {
        let mut registry = ViewRegistry::new();
        registry.register(admin_posts()).unwrap();

        assert_eq!(**registry.lookup("admin").unwrap(), admin_posts());
        assert!(matches!(registry.lookup("nope"), Err(GraphError::UnknownView(_))));
    }

    #[test]
    fn root_fields_are_unique_across_views() {
        let mut registry = ViewRegistry::new();
        registry.register(public_posts()).unwrap();

        let clash = ViewDefinition::new("drafts", "Post")
            .root("drafts", RootOperation::FindMany, RoleRequirement::public())
            .root("post", RootOperation::FindOne, RoleRequirement::public());

        let err = registry.register(clash).unwrap_err();
        assert_eq!(
            err,
            SchemaError::RootFieldCollision {
                field: "post".into(),
                view: "drafts".into(),
                existing_view: "public".into(),
            }
        );
        // nothing from the rejected view leaked into the index
        assert!(registry.resolve_root("drafts").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_view_names_are_rejected() {
        let mut registry = ViewRegistry::new();
        registry.register(public_posts()).unwrap();
        let again = ViewDefinition::new("public", "Post");
        assert_eq!(
            registry.register(again),
            Err(SchemaError::DuplicateView("public".into()))
        );
    }

    #[test]
    fn resolve_root_finds_the_serving_view() {
        let mut registry = ViewRegistry::new();
        registry.register(public_posts()).unwrap();
        registry.register(admin_posts()).unwrap();

        let (view, field) = registry.resolve_root("adminPosts").unwrap();
        assert_eq!(view.name(), "admin");
        assert_eq!(field.operation, RootOperation::FindMany);
        assert!(registry.resolve_root("missing").is_none());
    }
}
