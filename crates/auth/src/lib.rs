//! `fogon-auth`: user accounts and role checks.
//!
//! This crate is intentionally decoupled from HTTP, sessions and storage:
//! it only knows who an account is and what its role allows.

pub mod authorize;
pub mod roles;
pub mod user;

pub use authorize::require_manager;
pub use roles::Role;
pub use user::UserAccount;
