use crate::api::path;
use crate::error::{AppError, AppResult};

use super::session::{Role, Session};

/// Where a request is allowed to look.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantScope {
    /// Confined to one school's records.
    School(String),
    /// Unscoped; only reachable for non-tenant roles.
    Global,
}

impl TenantScope {
    pub fn school_id(&self) -> Option<&str> {
        match self {
            TenantScope::School(id) => Some(id),
            TenantScope::Global => None,
        }
    }

    /// Collection path for list requests: `/{collection}/school/{id}` or `/{collection}`.
    pub fn list_path(&self, collection: &str) -> String {
        match self {
            TenantScope::School(id) => path(&[collection, "school", id]),
            TenantScope::Global => path(&[collection]),
        }
    }
}

/// Acting user plus the scope every store call is issued under.
///
/// Only [`resolve`] builds one outside tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    user_id: String,
    role: Role,
    scope: TenantScope,
}

impl TenantContext {
    #[cfg(test)]
    pub(crate) fn from_parts(user_id: &str, role: Role, scope: TenantScope) -> Self {
        Self {
            user_id: user_id.to_string(),
            role,
            scope,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn scope(&self) -> &TenantScope {
        &self.scope
    }

    pub fn school_id(&self) -> Option<&str> {
        self.scope.school_id()
    }

    /// Scope for a store request; a tenant-scoped role never gets `Global`.
    pub fn checked_scope(&self) -> AppResult<&TenantScope> {
        match self.scope {
            TenantScope::Global if self.role.is_tenant_scoped() => {
                Err(AppError::MissingTenantContext)
            }
            _ => Ok(&self.scope),
        }
    }
}

/// Derives the tenant context for a session.
///
/// Tenant-scoped roles without a school fail with [`AppError::MissingTenantContext`];
/// they never fall back to the global collection.
pub fn resolve(session: &Session) -> AppResult<TenantContext> {
    let scope = if session.role.is_tenant_scoped() {
        let school_id = session
            .school_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(AppError::MissingTenantContext)?;
        TenantScope::School(school_id.to_string())
    } else {
        TenantScope::Global
    };

    Ok(TenantContext {
        user_id: session.user_id.clone(),
        role: session.role,
        scope,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_student_resolves_to_school_scope() {
        let session = Session::new("u1", Role::Student, Some("s1".to_string()));
        let ctx = resolve(&session).unwrap();
        assert_eq!(ctx.scope(), &TenantScope::School("s1".to_string()));
        assert_eq!(ctx.school_id(), Some("s1"));
        assert_eq!(ctx.user_id(), "u1");
        assert!(ctx.checked_scope().is_ok());
    }

    #[test]
    fn test_scoped_role_without_school_fails_closed() {
        for role in [Role::Student, Role::SchoolAdmin] {
            let session = Session::new("u1", role, None);
            assert!(matches!(
                resolve(&session),
                Err(AppError::MissingTenantContext)
            ));
            let blank = Session::new("u1", role, Some("  ".to_string()));
            assert!(matches!(resolve(&blank), Err(AppError::MissingTenantContext)));
        }
    }

    #[test]
    fn test_super_admin_is_global_even_with_school() {
        let session = Session::new("root", Role::SuperAdmin, Some("s1".to_string()));
        let ctx = resolve(&session).unwrap();
        assert_eq!(ctx.scope(), &TenantScope::Global);
        assert_eq!(ctx.checked_scope().unwrap(), &TenantScope::Global);
    }

    #[test]
    fn test_scoped_role_with_global_scope_is_rejected() {
        let ctx = TenantContext::from_parts("u1", Role::Student, TenantScope::Global);
        assert!(matches!(
            ctx.checked_scope(),
            Err(AppError::MissingTenantContext)
        ));
    }

    #[test]
    fn test_list_path() {
        let school = TenantScope::School("s1".to_string());
        assert_eq!(school.list_path("lost-items"), "/lost-items/school/s1");
        assert_eq!(TenantScope::Global.list_path("lost-items"), "/lost-items");
    }
}
