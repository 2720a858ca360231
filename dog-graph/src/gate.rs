//! Authorization gate.
//!
//! Runs before any fetch or resolver: a rejected request has no side
//! effects and never reaches the store.

use dog_core::Principal;

use crate::error::{AuthError, GraphError, GraphResult};
use crate::view::{RoleRequirement, RootField, ViewDefinition};

/// Check a role requirement against an optional principal.
pub fn check(requires: &RoleRequirement, principal: Option<&Principal>) -> Result<(), AuthError> {
    if requires.is_public() {
        return Ok(());
    }
    match principal {
        None => Err(AuthError::Unauthenticated),
        Some(p) if requires.is_satisfied_by(p) => Ok(()),
        Some(_) => Err(AuthError::Forbidden),
    }
}

/// Authorize a call to `root_field` of `view`, returning the field on success.
pub fn authorize<'v>(
    view: &'v ViewDefinition,
    root_field: &str,
    principal: Option<&Principal>,
) -> GraphResult<&'v RootField> {
    let field = view
        .root_field(root_field)
        .ok_or_else(|| GraphError::UnknownRootField(root_field.to_string()))?;
    check(&field.requires, principal)?;
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::RootOperation;

    fn view() -> ViewDefinition {
        ViewDefinition::new("admin", "Post")
            .root("adminPosts", RootOperation::FindMany, RoleRequirement::any_of(["admin"]))
            .root("postCount", RootOperation::FindMany, RoleRequirement::public())
    }

    #[test]
    fn public_fields_allow_anyone() {
        assert!(authorize(&view(), "postCount", None).is_ok());
    }

    #[test]
    fn gated_fields_need_a_principal() {
        let err = authorize(&view(), "adminPosts", None).unwrap_err();
        assert!(matches!(err, GraphError::Auth(AuthError::Unauthenticated)));
    }

    #[test]
    fn gated_fields_need_a_matching_role() {
        let reader = Principal::new("9").with_role("reader");
        let err = authorize(&view(), "adminPosts", Some(&reader)).unwrap_err();
        assert!(matches!(err, GraphError::Auth(AuthError::Forbidden)));

        let admin = Principal::new("7").with_role("admin");
        let view = view();
        let field = authorize(&view, "adminPosts", Some(&admin)).unwrap();
        assert_eq!(field.name, "adminPosts");
    }

    #[test]
    fn unknown_root_fields_are_reported() {
        let err = authorize(&view(), "nope", None).unwrap_err();
        assert!(matches!(err, GraphError::UnknownRootField(_)));
    }
}
