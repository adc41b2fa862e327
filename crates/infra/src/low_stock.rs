//! Low-stock reconciliation service.
//!
//! Loads the catalog, the managers and the stored `LOW_STOCK` notifications,
//! asks the pure reconciler for a plan and applies it in one batch. A batch
//! rejected by the store's pair guard means another pass got there first, so
//! the whole load-reconcile-apply sequence is retried under the configured
//! `RetryPolicy`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{Span, info, instrument, warn};

use fogon_auth::{UserAccount, require_manager};
use fogon_core::{DomainError, UserId};
use fogon_notifications::{Notification, NotificationType, reconcile};

use crate::catalog::{ProductCatalog, UserDirectory};
use crate::error::ServiceError;
use crate::notifications::{AppliedPlan, NotificationStore, NotificationStoreError};
use crate::retry::RetryPolicy;

/// Result of one reconcile-and-apply call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub created: usize,
    pub deleted: usize,
    /// Attempts made, including the one that succeeded.
    pub attempts: u32,
}

pub struct LowStockService<C, N>
where
    C: ProductCatalog + UserDirectory + ?Sized,
    N: NotificationStore + ?Sized,
{
    catalog: Arc<C>,
    store: Arc<N>,
    retry: RetryPolicy,
}

impl<C, N> LowStockService<C, N>
where
    C: ProductCatalog + UserDirectory + ?Sized,
    N: NotificationStore + ?Sized,
{
    pub fn new(catalog: Arc<C>, store: Arc<N>, retry: RetryPolicy) -> Self {
        Self {
            catalog,
            store,
            retry,
        }
    }

    /// Bring stored `LOW_STOCK` notifications in line with the catalog.
    ///
    /// Idempotent: a second call with nothing changed in between creates and
    /// deletes nothing.
    #[instrument(skip(self), fields(attempts, created, deleted), err)]
    pub async fn reconcile_and_apply(&self) -> Result<ReconcileOutcome, ServiceError> {
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            match self.attempt().await {
                Ok(applied) => {
                    let span = Span::current();
                    span.record("attempts", attempts);
                    span.record("created", applied.created);
                    span.record("deleted", applied.deleted);

                    if applied != AppliedPlan::default() {
                        info!(
                            created = applied.created,
                            deleted = applied.deleted,
                            attempts,
                            "low-stock notifications reconciled"
                        );
                    }

                    return Ok(ReconcileOutcome {
                        created: applied.created,
                        deleted: applied.deleted,
                        attempts,
                    });
                }
                Err(ServiceError::Store(NotificationStoreError::Conflict(reason))) => {
                    if !self.retry.should_retry(attempts) {
                        warn!(attempts, error = %reason, "low-stock reconciliation gave up after conflicts");
                        return Err(ServiceError::RetriesExhausted { attempts });
                    }

                    let delay = self.retry.delay_for_retry(attempts);
                    warn!(
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %reason,
                        "low-stock apply conflicted, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// "Manager opened the notifications list": reconcile, then return the
    /// manager's notifications newest first.
    #[instrument(skip(self), err)]
    pub async fn notifications_for(&self, manager_id: UserId) -> Result<Vec<Notification>, ServiceError> {
        self.authorize_manager(manager_id).await?;
        self.reconcile_and_apply().await?;
        Ok(self.store.list_for_owner(manager_id).await?)
    }

    /// "Manager requested a scan": reconcile and report what changed.
    #[instrument(skip(self), err)]
    pub async fn scan(&self, manager_id: UserId) -> Result<ReconcileOutcome, ServiceError> {
        self.authorize_manager(manager_id).await?;
        self.reconcile_and_apply().await
    }

    async fn attempt(&self) -> Result<AppliedPlan, ServiceError> {
        // With no recipients or nothing to count, the plan is empty whatever
        // is stored, so the store is not read at all.
        let managers = self.catalog.list_managers().await?;
        if managers.is_empty() {
            return Ok(AppliedPlan::default());
        }
        let products = self.catalog.list_products().await?;
        if products.is_empty() {
            return Ok(AppliedPlan::default());
        }
        let existing = self.store.list_by_type(NotificationType::LowStock).await?;

        let plan = reconcile(&products, &managers, &existing);
        if plan.is_noop() {
            return Ok(AppliedPlan::default());
        }

        Ok(self.store.apply_plan(&plan).await?)
    }

    async fn authorize_manager(&self, id: UserId) -> Result<UserAccount, ServiceError> {
        let user = self
            .catalog
            .get_user(id)
            .await?
            .ok_or(DomainError::NotFound)?;
        require_manager(&user)?;
        Ok(user)
    }
}
