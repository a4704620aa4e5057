//! Authenticated caller identity, as seen by module services.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, common};
use crate::id::UserId;

/// Account role. A user is either a business (owns clients, products and
/// invoices) or a client of one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Client,
    Business,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Client => "Client",
            Role::Business => "Business",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("client") {
            Ok(Role::Client)
        } else if s.eq_ignore_ascii_case("business") {
            Ok(Role::Business)
        } else {
            Err(UnknownRole(s.to_string()))
        }
    }
}

/// The logged-in user making a request.
///
/// Built by the HTTP layer from a validated token; services trust it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: UserId,
    pub email: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn new(user_id: UserId, email: impl Into<String>, role: Role) -> Self {
        Self {
            user_id,
            email: email.into(),
            role,
        }
    }

    pub fn require_role(&self, role: Role) -> Result<(), ServiceError> {
        if self.role == role {
            Ok(())
        } else {
            Err(common::FORBIDDEN)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!("business".parse::<Role>().unwrap(), Role::Business);
        assert_eq!("Client".parse::<Role>().unwrap(), Role::Client);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn require_role_forbids_other_roles() {
        let user = CurrentUser::new(UserId::new(), "a@b.co", Role::Client);
        assert!(user.require_role(Role::Client).is_ok());
        let err = user.require_role(Role::Business).unwrap_err();
        assert_eq!(err.code(), "Auth.Forbidden");
    }
}
