//! dog-core: framework-agnostic core for DogRS.
//!
//! Entities, request context, the persistence contract and configuration
//! shared by the graph engine and any store implementation.

pub mod config;
pub mod context;
pub mod entity;
pub mod errors;
pub mod memory;
pub mod predicate;
pub mod store;

pub use config::{DogConfig, DogConfigSnapshot};
pub use context::{Principal, PrincipalId, RequestContext};
pub use entity::{Entity, EntityId, KeyValue, ID_FIELD};
pub use errors::{ErrorKind, StoreError, StoreResult};
pub use memory::{MemoryStore, StoreCall};
pub use predicate::Predicate;
pub use store::{EntityStore, StoreMethod};
