use fogon_core::{DomainError, DomainResult};

use crate::UserAccount;

/// Gate for manager-only operations (catalog edits, request decisions,
/// notification scans).
///
/// - No IO
/// - No panics
pub fn require_manager(user: &UserAccount) -> DomainResult<()> {
    if user.is_manager() {
        Ok(())
    } else {
        Err(DomainError::unauthorized("manager role required"))
    }
}
