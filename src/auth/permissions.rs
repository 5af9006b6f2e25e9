//! Inventory permissions and the capability set derived from them.

use serde::{Deserialize, Serialize};

use super::AuthUser;
use crate::errors::ServiceError;

/// Permission string constants
pub mod consts {
    pub const INVENTORY_READ: &str = "inventory:read";
    pub const INVENTORY_CREATE: &str = "inventory:create";
    pub const INVENTORY_UPDATE: &str = "inventory:update";
    pub const INVENTORY_DELETE: &str = "inventory:delete";
    pub const INVENTORY_RETURN: &str = "inventory:return";
    pub const INVENTORY_TRANSFER: &str = "inventory:transfer";
    pub const INVENTORY_INCIDENT: &str = "inventory:incident";

    pub const ROLE_ADMIN: &str = "admin";
}

/// Whether `granted` satisfies `required`, honouring `resource:*` and `*` wildcards.
pub fn is_permission_implied(granted: &str, required: &str) -> bool {
    if granted == required || granted == "*" {
        return true;
    }

    match (granted.split_once(':'), required.split_once(':')) {
        (Some((granted_resource, "*")), Some((required_resource, _))) => {
            granted_resource == required_resource || granted_resource == "admin"
        }
        _ => false,
    }
}

/// What the current caller may do with inventory items.
///
/// Every service operation checks its capability before looking at its input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub can_read: bool,
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_return: bool,
    pub can_transfer: bool,
    pub can_record_incident: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Self {
            can_read: true,
            can_create: true,
            can_edit: true,
            can_delete: true,
            can_return: true,
            can_transfer: true,
            can_record_incident: true,
        }
    }

    pub fn read_only() -> Self {
        Self {
            can_read: true,
            ..Self::default()
        }
    }

    pub fn from_user(user: &AuthUser) -> Self {
        if user.has_role(consts::ROLE_ADMIN) {
            return Self::all();
        }

        let granted = |required: &str| {
            user.permissions
                .iter()
                .any(|p| is_permission_implied(p, required))
        };

        Self {
            can_read: granted(consts::INVENTORY_READ),
            can_create: granted(consts::INVENTORY_CREATE),
            can_edit: granted(consts::INVENTORY_UPDATE),
            can_delete: granted(consts::INVENTORY_DELETE),
            can_return: granted(consts::INVENTORY_RETURN),
            can_transfer: granted(consts::INVENTORY_TRANSFER),
            can_record_incident: granted(consts::INVENTORY_INCIDENT),
        }
    }

    /// Turns a missing capability into `PermissionDenied` naming the action.
    pub fn require(allowed: bool, action: &str) -> Result<(), ServiceError> {
        if allowed {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied(format!(
                "not allowed to {}",
                action
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(roles: &[&str], permissions: &[&str]) -> AuthUser {
        AuthUser {
            user_id: "leader-1".into(),
            name: None,
            email: None,
            roles: roles.iter().map(|r| r.to_string()).collect(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            token_id: "jti".into(),
        }
    }

    #[test]
    fn admin_role_grants_everything() {
        assert_eq!(
            Capabilities::from_user(&user(&["admin"], &[])),
            Capabilities::all()
        );
    }

    #[test]
    fn permissions_map_to_capabilities() {
        let caps = Capabilities::from_user(&user(
            &["leader"],
            &[consts::INVENTORY_READ, consts::INVENTORY_TRANSFER],
        ));
        assert!(caps.can_read);
        assert!(caps.can_transfer);
        assert!(!caps.can_create);
        assert!(!caps.can_return);
        assert!(!caps.can_record_incident);
    }

    #[test]
    fn resource_wildcard_implies_every_action() {
        let caps = Capabilities::from_user(&user(&[], &["inventory:*"]));
        assert_eq!(caps, Capabilities::all());

        assert!(!is_permission_implied("orders:*", consts::INVENTORY_READ));
        assert!(is_permission_implied("admin:*", consts::INVENTORY_DELETE));
    }

    #[test]
    fn require_names_the_action() {
        let err = Capabilities::require(false, "transfer items").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Permission denied: not allowed to transfer items"
        );
        assert!(Capabilities::require(true, "transfer items").is_ok());
    }
}
