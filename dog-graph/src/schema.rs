use tracing::info;

use crate::catalog::{Catalog, EntityType, Relation};
use crate::error::{RelationError, SchemaError};
use crate::registry::ViewRegistry;
use crate::view::ViewDefinition;

/// Catalog and views of one graph surface, validated and frozen.
#[derive(Debug)]
pub struct GraphSchema {
    catalog: Catalog,
    views: ViewRegistry,
}

impl GraphSchema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn views(&self) -> &ViewRegistry {
        &self.views
    }
}

/// Startup-time registration of entity types, relations and views.
///
/// Each step fails fast on its own conflicts; [`SchemaBuilder::build`]
/// then cross-checks views against the catalog so configuration faults
/// surface before the first request.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    catalog: Catalog,
    views: ViewRegistry,
}

impl SchemaBuilder {
    pub fn entity(mut self, entity_type: EntityType) -> Result<Self, SchemaError> {
        self.catalog.register_type(entity_type)?;
        Ok(self)
    }

    pub fn relation(mut self, relation: Relation) -> Result<Self, SchemaError> {
        self.catalog.register_relation(relation)?;
        Ok(self)
    }

    pub fn view(mut self, view: ViewDefinition) -> Result<Self, SchemaError> {
        self.views.register(view)?;
        Ok(self)
    }

    pub fn build(self) -> Result<GraphSchema, SchemaError> {
        for view in self.views.views() {
            let entity_type = self.catalog.require_type(view.entity_type())?;

            if let Some(scope) = view.scope() {
                if !entity_type.has_scalar(scope.field()) {
                    return Err(SchemaError::UnknownOwnerField {
                        view: view.name().to_string(),
                        entity_type: view.entity_type().to_string(),
                        field: scope.field().to_string(),
                    });
                }
            }

            for required in view.required_relations() {
                if self
                    .catalog
                    .relation(&required.source_type, &required.field)
                    .is_none()
                {
                    return Err(RelationError::UnknownField {
                        entity_type: required.source_type.clone(),
                        field: required.field.clone(),
                    }
                    .into());
                }
            }
        }

        info!(
            "Graph schema ready: {} relations, {} views",
            self.catalog.relations().count(),
            self.views.len()
        );

        Ok(GraphSchema {
            catalog: self.catalog,
            views: self.views,
        })
    }
}
