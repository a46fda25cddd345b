use serde::{Deserialize, Serialize};

use crate::common::ApiError;

/// Caller role, carried in the token claims and mirrored on the user profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    Guest,
    Staff,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Staff => "staff",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guest" => Ok(Role::Guest),
            "staff" => Ok(Role::Staff),
            "admin" => Ok(Role::Admin),
            other => Err(ApiError::Validation(format!("invalid role: {}", other))),
        }
    }
}

/// Operations gated by role. Handlers and the lifecycle service authorize
/// against capabilities, never against raw role strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// File a new lost/found report
    FileReport,
    /// Edit or delete any report
    ManageReports,
    /// Create, update and delete matches
    ManageMatches,
    /// Process claims (hand-off of matched items)
    ProcessClaims,
    /// List users and claims
    ViewDirectory,
    /// Create, update and delete user accounts
    ManageUsers,
    /// Create, update and delete categories
    ManageCategories,
}

impl Capability {
    /// Roles allowed to exercise this capability.
    fn allowed_roles(&self) -> &'static [Role] {
        match self {
            Capability::FileReport => &[Role::Guest, Role::Staff, Role::Admin],
            Capability::ManageReports => &[Role::Admin],
            Capability::ManageMatches => &[Role::Staff, Role::Admin],
            Capability::ProcessClaims => &[Role::Staff, Role::Admin],
            Capability::ViewDirectory => &[Role::Guest, Role::Staff, Role::Admin],
            Capability::ManageUsers => &[Role::Admin],
            Capability::ManageCategories => &[Role::Staff, Role::Admin],
        }
    }
}

/// Check that `role` may exercise `capability`. Stateless: depends only on
/// the resolved role of the caller.
pub fn authorize(role: Role, capability: Capability) -> Result<(), ApiError> {
    if capability.allowed_roles().contains(&role) {
        Ok(())
    } else {
        Err(ApiError::Authorization(format!(
            "role '{}' is not allowed to perform this operation",
            role
        )))
    }
}
