//! dog-graph: authorization-scoped graph queries over DogRS entities.
//!
//! A [`GraphSchema`] holds the relation catalog and the registered
//! views. A [`Coordinator`] runs one resolution pass per request: it
//! authorizes the root field, fetches the root entities inside the view's
//! ownership scope, resolves nested relations through a per-pass
//! [`BatchWindow`] and assembles the requested shape.
//!
//! ```no_run
//! use std::sync::Arc;
//! use dog_core::{MemoryStore, RequestContext};
//! use dog_graph::{
//!     Coordinator, EntityType, GraphSchema, QueryRequest, Relation, RoleRequirement,
//!     RootOperation, SelectionSet, ViewDefinition,
//! };
//!
//! # async fn run() -> anyhow::Result<()> {
//! let schema = GraphSchema::builder()
//!     .entity(EntityType::new("User").scalar("name"))?
//!     .entity(EntityType::new("Post").scalars(["title", "authorId"]))?
//!     .relation(Relation::belongs_to("Post", "author", "User", "authorId"))?
//!     .view(
//!         ViewDefinition::new("public", "Post")
//!             .root("posts", RootOperation::FindMany, RoleRequirement::public()),
//!     )?
//!     .build()?;
//!
//! let coordinator = Coordinator::new(Arc::new(schema), Arc::new(MemoryStore::new()));
//! let posts = coordinator
//!     .execute(
//!         &RequestContext::anonymous(),
//!         &QueryRequest::new("posts", SelectionSet::scalars(["id", "title"])),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod catalog;
pub mod coordinator;
pub mod error;
pub mod gate;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod scope;
pub mod selection;
pub mod settings;
pub mod view;

pub use batch::{BatchKey, BatchWindow, LoadHandle, Rows};
pub use catalog::{Cardinality, Catalog, EntityType, FieldKind, KeySide, Relation, RelationName, TYPENAME_FIELD};
pub use coordinator::{Coordinator, PassState};
pub use error::{AuthError, GraphError, GraphResult, IntegrityError, RelationError, SchemaError};
pub use registry::ViewRegistry;
pub use resolver::{Related, RelationLoad, RelationResolver};
pub use schema::{GraphSchema, SchemaBuilder};
pub use scope::{view_predicate, OwnershipScope};
pub use selection::{Arguments, FieldRequest, QueryRequest, SelectionSet};
pub use settings::GraphSettings;
pub use view::{RoleRequirement, RootField, RootOperation, ViewDefinition};
