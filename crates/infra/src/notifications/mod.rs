//! Notification persistence.
//!
//! Stores hand out ids and timestamps, list notifications per owner, and apply
//! a whole `ReconcilePlan` atomically. One invariant is enforced at this layer
//! rather than in the reconciler: at most one `LOW_STOCK` notification per
//! (owner, product). An insert that would break it fails the batch with
//! `Conflict`, which callers resolve by re-running reconciliation.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fogon_core::{NotificationId, UserId};
use fogon_notifications::{NewNotification, Notification, NotificationType, ReconcilePlan};

pub use in_memory::InMemoryNotificationStore;
pub use postgres::PostgresNotificationStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotificationStoreError {
    /// A uniqueness guard rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("notification not found")]
    NotFound,

    #[error("storage error: {0}")]
    Storage(String),
}

/// What an applied plan actually changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedPlan {
    /// Rows removed; ids already gone are not counted.
    pub deleted: usize,
    pub created: usize,
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn list_by_type(
        &self,
        kind: NotificationType,
    ) -> Result<Vec<Notification>, NotificationStoreError>;

    /// The owner's notifications, newest first (ties broken by id, descending).
    async fn list_for_owner(&self, owner: UserId)
    -> Result<Vec<Notification>, NotificationStoreError>;

    async fn insert(&self, new: NewNotification) -> Result<Notification, NotificationStoreError>;

    /// Insert every notification or none of them, under the same pair guard
    /// as `insert`.
    async fn insert_all(
        &self,
        batch: Vec<NewNotification>,
    ) -> Result<Vec<Notification>, NotificationStoreError>;

    /// Apply every delete and insert of `plan`, or none of them.
    ///
    /// Deleting an id that no longer exists is a no-op. Inserting a
    /// `LOW_STOCK` notification for an (owner, product) pair that is already
    /// stored fails the whole batch with `Conflict`.
    async fn apply_plan(&self, plan: &ReconcilePlan) -> Result<AppliedPlan, NotificationStoreError>;

    async fn mark_read(
        &self,
        owner: UserId,
        id: NotificationId,
    ) -> Result<Notification, NotificationStoreError>;
}

#[async_trait]
impl<S> NotificationStore for Arc<S>
where
    S: NotificationStore + ?Sized,
{
    async fn list_by_type(
        &self,
        kind: NotificationType,
    ) -> Result<Vec<Notification>, NotificationStoreError> {
        (**self).list_by_type(kind).await
    }

    async fn list_for_owner(
        &self,
        owner: UserId,
    ) -> Result<Vec<Notification>, NotificationStoreError> {
        (**self).list_for_owner(owner).await
    }

    async fn insert(&self, new: NewNotification) -> Result<Notification, NotificationStoreError> {
        (**self).insert(new).await
    }

    async fn insert_all(
        &self,
        batch: Vec<NewNotification>,
    ) -> Result<Vec<Notification>, NotificationStoreError> {
        (**self).insert_all(batch).await
    }

    async fn apply_plan(&self, plan: &ReconcilePlan) -> Result<AppliedPlan, NotificationStoreError> {
        (**self).apply_plan(plan).await
    }

    async fn mark_read(
        &self,
        owner: UserId,
        id: NotificationId,
    ) -> Result<Notification, NotificationStoreError> {
        (**self).mark_read(owner, id).await
    }
}
