//! Dashboard roles.

use serde::{Deserialize, Serialize};

/// Role attached to a dashboard user by the backend at login.
///
/// Wire names are the backend's Spanish role strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Full access, including user administration on the backend side.
    #[serde(rename = "SUPERADMIN")]
    SuperAdmin,
    /// Full dashboard access.
    #[serde(rename = "ADMINISTRADOR")]
    Admin,
    /// Delivery person: operates returns and receipts for one reparto,
    /// no access to the management screens.
    #[serde(rename = "REPARTIDOR")]
    Delivery,
}

impl Role {
    /// Whether this role may use the management screens
    /// (productos, clientes, ciudades, repartos).
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::SuperAdmin | Self::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_names() {
        assert_eq!(
            serde_json::to_string(&Role::Delivery).expect("serialize"),
            "\"REPARTIDOR\""
        );
        let role: Role = serde_json::from_str("\"ADMINISTRADOR\"").expect("deserialize");
        assert_eq!(role, Role::Admin);
    }

    #[test]
    fn test_is_admin() {
        assert!(Role::SuperAdmin.is_admin());
        assert!(Role::Admin.is_admin());
        assert!(!Role::Delivery.is_admin());
    }
}
