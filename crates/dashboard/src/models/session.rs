//! Session-related types.
//!
//! Types stored in the session for authentication state. The backend does
//! the actual credential checking; the session only keeps the issued token
//! and enough identity to render the navigation and scope delivery users.

use serde::{Deserialize, Serialize};

use espiga_core::types::{Role, RouteId, UserId};

use crate::backend::AuthToken;

/// Session-stored user identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Backend user ID.
    pub id: UserId,
    /// Account name, shown in the navigation bar.
    pub username: String,
    /// Role driving which screens are reachable.
    pub role: Role,
    /// Route a delivery user is locked to; `None` for administrators.
    pub route_id: Option<RouteId>,
    /// Bearer token for backend requests.
    pub token: AuthToken,
}

impl CurrentUser {
    /// Whether this user may reach the administration screens.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Session keys for authentication data.
pub mod session_keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_user_roundtrips_through_session_json() {
        let user = CurrentUser {
            id: UserId::new(7),
            username: "maria".to_string(),
            role: Role::Admin,
            route_id: None,
            token: AuthToken::from("tok".to_string()),
        };
        let json = serde_json::to_string(&user).expect("serialize");
        let back: CurrentUser = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.username, "maria");
        assert!(back.is_admin());
        assert_eq!(back.token, AuthToken::from("tok".to_string()));
    }

    #[test]
    fn test_delivery_user_is_not_admin() {
        let user = CurrentUser {
            id: UserId::new(3),
            username: "raul".to_string(),
            role: Role::Delivery,
            route_id: Some(RouteId::new(2)),
            token: AuthToken::from("tok".to_string()),
        };
        assert!(!user.is_admin());
    }
}
