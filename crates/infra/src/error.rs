use thiserror::Error;

use fogon_core::DomainError;

use crate::catalog::CatalogError;
use crate::notifications::NotificationStoreError;
use crate::requests::RequestStoreError;

/// Error surfaced by the infra services to their callers.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("notification store error: {0}")]
    Store(#[from] NotificationStoreError),

    #[error("request store error: {0}")]
    Requests(#[from] RequestStoreError),

    /// Every allowed reconcile-and-apply attempt hit a uniqueness conflict.
    #[error("low-stock reconciliation kept conflicting after {attempts} attempt(s)")]
    RetriesExhausted { attempts: u32 },
}
