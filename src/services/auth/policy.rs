//! Role-based access table keyed by HTTP method.
//!
//! Built once at startup and shared read-only. Ordinary users are read-only, admins may use
//! every listed method. Methods missing from the table are denied unless the policy was built
//! with `UnlistedMethod::Allow`, which reproduces the legacy wildcard behaviour.
use std::collections::HashMap;

use axum::http::Method;

use crate::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlistedMethod {
    Deny,
    Allow,
}

#[derive(Debug, Clone, Copy)]
struct Grants {
    user: bool,
    admin: bool,
}

impl Grants {
    const EVERYONE: Grants = Grants {
        user: true,
        admin: true,
    };
    const ADMIN_ONLY: Grants = Grants {
        user: false,
        admin: true,
    };
    const NOBODY: Grants = Grants {
        user: false,
        admin: false,
    };

    fn allows(&self, role: Role) -> bool {
        match role {
            Role::User => self.user,
            Role::Admin => self.admin,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AccessPolicy {
    table: HashMap<Method, Grants>,
    unlisted: Grants,
}

impl AccessPolicy {
    pub fn new(unlisted: UnlistedMethod) -> Self {
        let table = HashMap::from([
            (Method::GET, Grants::EVERYONE),
            (Method::HEAD, Grants::EVERYONE),
            (Method::OPTIONS, Grants::EVERYONE),
            (Method::POST, Grants::ADMIN_ONLY),
            (Method::PUT, Grants::ADMIN_ONLY),
            (Method::PATCH, Grants::ADMIN_ONLY),
            (Method::DELETE, Grants::ADMIN_ONLY),
        ]);

        let unlisted = match unlisted {
            UnlistedMethod::Deny => Grants::NOBODY,
            UnlistedMethod::Allow => Grants::EVERYONE,
        };

        Self { table, unlisted }
    }

    pub fn is_allowed(&self, method: &Method, role: Role) -> bool {
        self.table
            .get(method)
            .unwrap_or(&self.unlisted)
            .allows(role)
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::new(UnlistedMethod::Deny)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn users_are_read_only() {
        let policy = AccessPolicy::default();
        assert!(policy.is_allowed(&Method::GET, Role::User));
        assert!(policy.is_allowed(&Method::HEAD, Role::User));
        for m in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            assert!(!policy.is_allowed(&m, Role::User), "{m} should be denied");
        }
    }

    #[test]
    fn admins_may_use_every_listed_method() {
        let policy = AccessPolicy::default();
        for m in [
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ] {
            assert!(policy.is_allowed(&m, Role::Admin), "{m} should be allowed");
        }
    }

    #[test]
    fn unlisted_methods_are_denied_by_default() {
        let policy = AccessPolicy::default();
        let purge = Method::from_bytes(b"PURGE").unwrap();
        assert!(!policy.is_allowed(&purge, Role::Admin));
        assert!(!policy.is_allowed(&Method::TRACE, Role::User));
    }

    #[test]
    fn fail_open_mode_reproduces_wildcard_entry() {
        let policy = AccessPolicy::new(UnlistedMethod::Allow);
        let purge = Method::from_bytes(b"PURGE").unwrap();
        assert!(policy.is_allowed(&purge, Role::User));
        assert!(policy.is_allowed(&purge, Role::Admin));
        // listed methods keep their entry
        assert!(!policy.is_allowed(&Method::POST, Role::User));
    }
}
