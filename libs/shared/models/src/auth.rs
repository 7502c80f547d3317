use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => write!(f, "patient"),
            Role::Doctor => write!(f, "doctor"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Role,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or(self.role_label())
    }

    fn role_label(&self) -> &'static str {
        match self.role {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
        }
    }
}

/// Payload of `GET /auth/verify-token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenVerification {
    pub user: User,
}

/// Authenticated session, immutable until logout.
///
/// Built once by the session guard and injected into handlers through request
/// extensions, so no component reads the token ad hoc.
#[derive(Debug, Clone)]
pub struct SessionContext {
    token: String,
    user: User,
}

impl SessionContext {
    pub fn new(token: impl Into<String>, user: User) -> Self {
        Self {
            token: token.into(),
            user,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn has_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.user.role)
    }
}
