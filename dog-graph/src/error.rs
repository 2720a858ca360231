use dog_core::{EntityId, ErrorKind, StoreError};
use serde_json::{json, Value};
use thiserror::Error;

use crate::catalog::RelationName;

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Raised by the authorization gate, always before any fetch.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Forbidden")]
    Forbidden,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelationError {
    #[error("Unknown field `{field}` on `{entity_type}`")]
    UnknownField { entity_type: String, field: String },
}

/// Stored data violates a declared non-nullable relation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("Required relation `{relation}` is missing for `{parent_id}`")]
    NonNullableMissing {
        relation: RelationName,
        parent_id: EntityId,
    },
}

/// Startup-time registration and validation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Entity type already registered: {0}")]
    DuplicateType(String),

    #[error("Unknown entity type: {0}")]
    UnknownType(String),

    #[error("Field `{field}` already declared on `{entity_type}`")]
    DuplicateField { entity_type: String, field: String },

    #[error("Foreign key `{field}` is not a scalar of `{entity_type}`")]
    UnknownForeignKey { entity_type: String, field: String },

    #[error("View already registered: {0}")]
    DuplicateView(String),

    #[error("Root field `{field}` of view `{view}` is already exposed by view `{existing_view}`")]
    RootFieldCollision {
        field: String,
        view: String,
        existing_view: String,
    },

    #[error("Ownership field `{field}` of view `{view}` is not a scalar of `{entity_type}`")]
    UnknownOwnerField {
        view: String,
        entity_type: String,
        field: String,
    },

    #[error(transparent)]
    Relation(#[from] RelationError),
}

#[derive(Error, Debug)]
pub enum GraphError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Relation(#[from] RelationError),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// Same error for "does not exist" and "outside the caller's scope".
    #[error("No record found for {entity_type} `{id}`")]
    NotFound { entity_type: String, id: EntityId },

    #[error("Unknown root field `{0}`")]
    UnknownRootField(String),

    #[error("Unknown view `{0}`")]
    UnknownView(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Resolution pass cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl GraphError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        GraphError::InvalidRequest(msg.into())
    }

    pub fn not_found(entity_type: impl Into<String>, id: EntityId) -> Self {
        GraphError::NotFound {
            entity_type: entity_type.into(),
            id,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::Auth(AuthError::Unauthenticated) => ErrorKind::NotAuthenticated,
            GraphError::Auth(AuthError::Forbidden) => ErrorKind::Forbidden,
            GraphError::NotFound { .. } | GraphError::UnknownView(_) => ErrorKind::NotFound,
            GraphError::Relation(_)
            | GraphError::UnknownRootField(_)
            | GraphError::InvalidRequest(_) => ErrorKind::BadRequest,
            GraphError::Integrity(_) | GraphError::Schema(_) => ErrorKind::GeneralError,
            GraphError::Cancelled => ErrorKind::Unavailable,
            GraphError::Store(e) => match e.kind() {
                ErrorKind::Conflict => ErrorKind::Conflict,
                ErrorKind::Unprocessable => ErrorKind::Unprocessable,
                _ => ErrorKind::GeneralError,
            },
        }
    }

    /// Feathers-ish client payload. Server faults keep their detail
    /// out of the message; it belongs in the logs.
    pub fn to_json(&self) -> Value {
        let kind = self.kind();
        let message = if kind.is_server_fault() {
            kind.name().to_string()
        } else {
            self.to_string()
        };

        json!({
            "name": kind.name(),
            "message": message,
            "code": kind.status_code(),
            "className": kind.class_name(),
        })
    }
}
