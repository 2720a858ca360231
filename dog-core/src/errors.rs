//! # Errors (Feathers-style)
//!
//! DogRS keeps a Feathers-inspired set of error kinds so every surface
//! (graph engine, stores, transports) agrees on status codes and class names.
//!
//! Typed errors live next to the code that raises them and map onto an
//! [`ErrorKind`] when they cross a transport boundary. This module also
//! carries [`StoreError`], the error contract of the persistence layer.

use thiserror::Error;

/// Feathers-ish error class names + status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,       // 400
    NotAuthenticated, // 401
    Forbidden,        // 403
    NotFound,         // 404
    Conflict,         // 409
    Unprocessable,    // 422
    GeneralError,     // 500
    NotImplemented,   // 501
    Unavailable,      // 503
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::NotAuthenticated => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Unprocessable => 422,
            ErrorKind::GeneralError => 500,
            ErrorKind::NotImplemented => 501,
            ErrorKind::Unavailable => 503,
        }
    }

    /// Feathers error `name` (e.g. "NotFound")
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::NotAuthenticated => "NotAuthenticated",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::Unprocessable => "Unprocessable",
            ErrorKind::GeneralError => "GeneralError",
            ErrorKind::NotImplemented => "NotImplemented",
            ErrorKind::Unavailable => "Unavailable",
        }
    }

    /// Feathers error `className` (commonly kebab-cased)
    pub fn class_name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad-request",
            ErrorKind::NotAuthenticated => "not-authenticated",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unprocessable => "unprocessable",
            ErrorKind::GeneralError => "general-error",
            ErrorKind::NotImplemented => "not-implemented",
            ErrorKind::Unavailable => "unavailable",
        }
    }

    /// Server-side kinds never expose their message to clients.
    pub fn is_server_fault(&self) -> bool {
        self.status_code() >= 500
    }
}

/// Result type for persistence operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by an [`EntityStore`](crate::store::EntityStore).
///
/// "Not found" is not an error at this level: lookups return `Option`
/// and the caller decides how absence is reported.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Method not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("Entity already exists: {entity_type} `{id}`")]
    Conflict { entity_type: String, id: String },

    #[error("Invalid data for {entity_type}: {reason}")]
    InvalidData { entity_type: String, reason: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotImplemented(_) => ErrorKind::NotImplemented,
            StoreError::Conflict { .. } => ErrorKind::Conflict,
            StoreError::InvalidData { .. } => ErrorKind::Unprocessable,
            StoreError::Unavailable(_) => ErrorKind::Unavailable,
            StoreError::Other(_) => ErrorKind::GeneralError,
        }
    }
}
