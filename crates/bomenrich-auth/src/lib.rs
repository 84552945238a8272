//! Tenant Auth Context: an immutable value derived from an
//! authenticated request, plus the helpers every data-access path uses to
//! enforce row-level tenant isolation. A small, cloneable, serde-able
//! context value threaded through call sites instead of ambient globals.

use bomenrich_core::{CoreError, ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Roles form a total order: `analyst < engineer < admin < owner < super_admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Analyst,
    Engineer,
    Admin,
    Owner,
    SuperAdmin,
}

impl Role {
    pub fn satisfies(self, required: Role) -> bool {
        self >= required
    }
}

/// Immutable auth-context value. Produced once per request by an
/// external token-verification collaborator and threaded through every
/// data-access call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: Role,
    pub is_super_admin: bool,
    pub email: String,
}

impl AuthContext {
    pub fn new(user_id: Uuid, organization_id: Uuid, role: Role, email: impl Into<String>) -> Self {
        let is_super_admin = role == Role::SuperAdmin;
        Self { user_id, organization_id, role, is_super_admin, email: email.into() }
    }

    /// Refuses the call unless `self.role` satisfies `required`.
    pub fn require_role(&self, required: Role) -> Result<(), CoreError> {
        if self.role.satisfies(required) {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!(
                        "role {:?} does not satisfy minimum required role {:?}",
                        self.role, required
                    )))
        }
    }

    /// Destructive deletes require admin+ and a non-empty `reason`.
    pub fn require_destructive_delete(&self, reason: &str) -> Result<(), CoreError> {
        self.require_role(Role::Admin)?;
        if reason.trim().is_empty() {
            return Err(CoreError::Validation("deletion reason must not be empty".to_string()));
        }
        Ok(())
    }

    /// The `organization_id` every SQL read must filter by, unless the caller
    /// is super-admin (in which case `None` means "no additional filter").
    pub fn tenant_filter(&self) -> Option<Uuid> {
        if self.is_super_admin {
            None
        } else {
            Some(self.organization_id)
        }
    }

    /// Enforces that an explicit org filter supplied by the caller matches
    /// their own org, unless they are super-admin. An explicit filter for
    /// another tenant is a forbidden request, not a silent narrowing.
    pub fn authorize_org_filter(&self, requested_org: Uuid) -> Result<(), CoreError> {
        if self.is_super_admin || requested_org == self.organization_id {
            Ok(())
        } else {
            Err(CoreError::Forbidden("organization_id does not match caller's tenant".to_string()))
        }
    }

    /// Row-level guard for single-resource reads. A mismatch against another
    /// org's resource returns "not found" rather than "forbidden" so callers
    /// never learn a resource with that id exists.
    pub fn guard_resource_org(&self, resource_org: Uuid) -> Result<(), CoreError> {
        if self.is_super_admin || resource_org == self.organization_id {
            Ok(())
        } else {
            Err(CoreError::NotFound)
        }
    }
}

pub fn kind_of(err: &CoreError) -> ErrorKind {
    err.kind()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: Role, org: Uuid) -> AuthContext {
        AuthContext::new(Uuid::new_v4(), org, role, "user@example.com")
    }

    #[test]
    fn role_order_is_total() {
        assert!(Role::SuperAdmin > Role::Owner);
        assert!(Role::Owner > Role::Admin);
        assert!(Role::Admin > Role::Engineer);
        assert!(Role::Engineer > Role::Analyst);
    }

    #[test]
    fn require_role_rejects_below_minimum() {
        let c = ctx(Role::Analyst, Uuid::new_v4());
        assert!(c.require_role(Role::Engineer).is_err());
        assert!(c.require_role(Role::Analyst).is_ok());
    }

    #[test]
    fn destructive_delete_requires_admin_and_reason() {
        let analyst = ctx(Role::Analyst, Uuid::new_v4());
        assert!(analyst.require_destructive_delete("cleanup").is_err());

        let admin = ctx(Role::Admin, Uuid::new_v4());
        assert!(admin.require_destructive_delete("").is_err());
        assert!(admin.require_destructive_delete("duplicate upload").is_ok());
    }

    #[test]
    fn tenant_filter_is_none_only_for_super_admin() {
        let org = Uuid::new_v4();
        assert_eq!(ctx(Role::Owner, org).tenant_filter(), Some(org));
        assert_eq!(ctx(Role::SuperAdmin, org).tenant_filter(), None);
    }

    #[test]
    fn cross_tenant_resource_read_returns_not_found_not_forbidden() {
        let c = ctx(Role::Owner, Uuid::new_v4());
        let other_org_resource = Uuid::new_v4();
        let err = c.guard_resource_org(other_org_resource).unwrap_err();
        assert_eq!(err.kind(), bomenrich_core::ErrorKind::NotFound);
    }

    #[test]
    fn super_admin_bypasses_org_filter_checks() {
        let c = ctx(Role::SuperAdmin, Uuid::new_v4());
        assert!(c.authorize_org_filter(Uuid::new_v4()).is_ok());
        assert!(c.guard_resource_org(Uuid::new_v4()).is_ok());
    }
}
