//! Staff user accounts.
//!
//! Credentials live with the (external) login layer; this type only carries
//! identity and role.

use serde::{Deserialize, Serialize};

use fogon_core::{DomainError, DomainResult, Entity, UserId};

use crate::Role;

/// A staff account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    id: UserId,
    username: String,
    email: String,
    role: Role,
}

impl UserAccount {
    /// Build an account; username and email must be non-blank and the email
    /// must contain an `@`.
    pub fn new(
        id: UserId,
        username: impl Into<String>,
        email: impl Into<String>,
        role: Role,
    ) -> DomainResult<Self> {
        let username = username.into().trim().to_string();
        let email = email.into().trim().to_string();

        if username.is_empty() {
            return Err(DomainError::validation("username cannot be empty"));
        }
        if !email.contains('@') {
            return Err(DomainError::validation("email must contain '@'"));
        }

        Ok(Self {
            id,
            username,
            email,
            role,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_manager(&self) -> bool {
        self.role == Role::Manager
    }
}

impl Entity for UserAccount {
    type Id = UserId;

    fn id(&self) -> UserId {
        self.id
    }
}
