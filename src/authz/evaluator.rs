use std::sync::Arc;

use super::principal::Principal;
use super::table::PermissionTable;

/// Policy evaluator trait for pluggable route authorization
pub trait PolicyEvaluator: Send + Sync {
    /// Check if the principal may reach `path`
    fn can(&self, principal: &Principal, path: &str) -> bool;
}

/// Default evaluator backed by the shared permission table
///
/// Evaluation order:
/// 1. backoffice prefix -> allow only CEO
/// 2. role entry covers the path -> allow
/// 3. deny
#[derive(Debug, Clone)]
pub struct DefaultPolicyEvaluator {
    table: Arc<PermissionTable>,
}

impl DefaultPolicyEvaluator {
    pub fn new(table: Arc<PermissionTable>) -> Self {
        Self { table }
    }
}

impl PolicyEvaluator for DefaultPolicyEvaluator {
    fn can(&self, principal: &Principal, path: &str) -> bool {
        if self.table.is_backoffice(path) {
            let allowed = principal.is_ceo();
            tracing::debug!(
                user_id = %principal.user_id,
                role = %principal.role,
                path = %path,
                allowed,
                "backoffice check"
            );
            return allowed;
        }

        let allowed = self.table.has_permission(principal.role, path);
        if !allowed {
            tracing::debug!(
                user_id = %principal.user_id,
                role = %principal.role,
                path = %path,
                "route denied"
            );
        }
        allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::Role;
    use uuid::Uuid;

    fn evaluator() -> DefaultPolicyEvaluator {
        DefaultPolicyEvaluator::new(Arc::new(PermissionTable::builtin()))
    }

    #[test]
    fn ceo_reaches_backoffice() {
        let principal = Principal::new(Uuid::new_v4(), Role::Ceo);
        assert!(evaluator().can(&principal, "/backoffice/relatorios"));
    }

    #[test]
    fn admin_is_kept_out_of_backoffice() {
        let principal = Principal::new(Uuid::new_v4(), Role::Admin);
        assert!(!evaluator().can(&principal, "/backoffice"));
        assert!(evaluator().can(&principal, "/admin/usuarios"));
    }

    #[test]
    fn assistant_denied_admin_area() {
        let principal = Principal::new(Uuid::new_v4(), Role::Assistant);
        assert!(!evaluator().can(&principal, "/admin/usuarios"));
        assert!(evaluator().can(&principal, "/dashboard/documentos"));
    }
}
