use serde::{Deserialize, Serialize};

use crate::entities::{user, UserRole};

/// Who is using the storefront right now.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum AuthSession {
    #[default]
    Anonymous,
    #[serde(rename_all = "camelCase")]
    SignedIn {
        user_id: String,
        name: String,
        role: UserRole,
    },
}

impl AuthSession {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::SignedIn { user_id, .. } => Some(user_id),
            Self::Anonymous => None,
        }
    }

    pub fn role(&self) -> Option<UserRole> {
        match self {
            Self::SignedIn { role, .. } => Some(*role),
            Self::Anonymous => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(UserRole::Admin)
    }
}

impl From<&user::Model> for AuthSession {
    fn from(user: &user::Model) -> Self {
        Self::SignedIn {
            user_id: user.id.to_string(),
            name: user.full_name(),
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    SignedIn(AuthSession),
    SignedOut,
}

pub fn reduce_session(state: AuthSession, action: SessionAction) -> AuthSession {
    match action {
        // Signing in with an anonymous payload changes nothing
        SessionAction::SignedIn(AuthSession::Anonymous) => state,
        SessionAction::SignedIn(session) => session,
        SessionAction::SignedOut => AuthSession::Anonymous,
    }
}

/// Shipping form on the checkout screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingDetails {
    pub name: String,
    pub contact: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pin_code: String,
}

impl ShippingDetails {
    /// `"address, city, state"` as stored on the order.
    pub fn full_address(&self) -> String {
        [&self.address, &self.city, &self.state]
            .iter()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
