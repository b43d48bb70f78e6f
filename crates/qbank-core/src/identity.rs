//! Authenticated user identity.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Account role as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `user` object returned by the login, register and `/auth/me` endpoints.
///
/// Only the fields the client cares about are modelled; anything else the
/// server sends is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: u64,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<NaiveDateTime>,
}

fn default_active() -> bool {
    true
}

impl UserIdentity {
    /// Returns true for administrator accounts.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Apply a partial update, leaving unset fields untouched.
    pub fn apply(&mut self, patch: IdentityPatch) {
        if let Some(username) = patch.username {
            self.username = username;
        }
        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(avatar_url) = patch.avatar_url {
            self.avatar_url = Some(avatar_url);
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active;
        }
    }
}

/// A partial identity update, e.g. after the user edits their profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IdentityPatch {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}
