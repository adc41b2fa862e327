use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use fogon_core::{NotificationId, ProductId, UserId};
use fogon_notifications::{NewNotification, Notification, NotificationType, ReconcilePlan};

use super::{AppliedPlan, NotificationStore, NotificationStoreError};

type Table = HashMap<NotificationId, Notification>;

/// In-memory notification store for tests/dev.
///
/// Every batch is checked and applied under a single write lock, so readers
/// never observe half of a plan.
#[derive(Debug, Default)]
pub struct InMemoryNotificationStore {
    inner: RwLock<Table>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put an already-stored notification back as-is (fixtures, imports).
    ///
    /// Skips the `LOW_STOCK` pair guard so legacy duplicates can be loaded.
    pub fn restore(&self, notification: Notification) -> Result<(), NotificationStoreError> {
        self.write()?.insert(notification.id, notification);
        Ok(())
    }

    /// Every stored notification, oldest first.
    pub fn snapshot(&self) -> Result<Vec<Notification>, NotificationStoreError> {
        let mut all: Vec<Notification> = self.read()?.values().cloned().collect();
        all.sort_by_key(|n| (n.created_at, n.id));
        Ok(all)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Table>, NotificationStoreError> {
        self.inner
            .read()
            .map_err(|_| NotificationStoreError::Storage("notification lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Table>, NotificationStoreError> {
        self.inner
            .write()
            .map_err(|_| NotificationStoreError::Storage("notification lock poisoned".to_string()))
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn list_by_type(
        &self,
        kind: NotificationType,
    ) -> Result<Vec<Notification>, NotificationStoreError> {
        let mut found: Vec<Notification> = self
            .read()?
            .values()
            .filter(|n| n.kind == kind)
            .cloned()
            .collect();
        found.sort_by_key(|n| (n.created_at, n.id));
        Ok(found)
    }

    async fn list_for_owner(
        &self,
        owner: UserId,
    ) -> Result<Vec<Notification>, NotificationStoreError> {
        let mut found: Vec<Notification> = self
            .read()?
            .values()
            .filter(|n| n.user_id == owner)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(found)
    }

    async fn insert(&self, new: NewNotification) -> Result<Notification, NotificationStoreError> {
        let mut map = self.write()?;

        if let Some(key) = new.low_stock_key() {
            if occupied_pairs(&map, &HashSet::new()).contains(&key) {
                return Err(pair_conflict(key));
            }
        }

        let stored = new.into_stored(NotificationId::new(), Utc::now());
        map.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn insert_all(
        &self,
        batch: Vec<NewNotification>,
    ) -> Result<Vec<Notification>, NotificationStoreError> {
        let mut map = self.write()?;

        let mut taken = occupied_pairs(&map, &HashSet::new());
        for new in &batch {
            if let Some(key) = new.low_stock_key() {
                if !taken.insert(key) {
                    return Err(pair_conflict(key));
                }
            }
        }

        let now = Utc::now();
        let stored: Vec<Notification> = batch
            .into_iter()
            .map(|new| new.into_stored(NotificationId::new(), now))
            .collect();
        for n in &stored {
            map.insert(n.id, n.clone());
        }
        Ok(stored)
    }

    async fn apply_plan(&self, plan: &ReconcilePlan) -> Result<AppliedPlan, NotificationStoreError> {
        let mut map = self.write()?;

        // Validate the whole batch before touching anything.
        let doomed: HashSet<NotificationId> = plan
            .to_delete
            .iter()
            .copied()
            .filter(|id| map.contains_key(id))
            .collect();
        let mut taken = occupied_pairs(&map, &doomed);
        for new in &plan.to_create {
            if let Some(key) = new.low_stock_key() {
                if !taken.insert(key) {
                    return Err(pair_conflict(key));
                }
            }
        }

        for id in &doomed {
            map.remove(id);
        }

        let now = Utc::now();
        for new in &plan.to_create {
            let stored = new.clone().into_stored(NotificationId::new(), now);
            map.insert(stored.id, stored);
        }

        Ok(AppliedPlan {
            deleted: doomed.len(),
            created: plan.to_create.len(),
        })
    }

    async fn mark_read(
        &self,
        owner: UserId,
        id: NotificationId,
    ) -> Result<Notification, NotificationStoreError> {
        let mut map = self.write()?;
        match map.get_mut(&id) {
            Some(n) if n.user_id == owner => {
                n.is_read = true;
                Ok(n.clone())
            }
            _ => Err(NotificationStoreError::NotFound),
        }
    }
}

/// `LOW_STOCK` (owner, product) pairs held by notifications outside `excluded`.
fn occupied_pairs(
    map: &Table,
    excluded: &HashSet<NotificationId>,
) -> HashSet<(UserId, ProductId)> {
    map.values()
        .filter(|n| !excluded.contains(&n.id))
        .filter_map(|n| n.low_stock_product().map(|p| (n.user_id, p)))
        .collect()
}

fn pair_conflict((owner, product): (UserId, ProductId)) -> NotificationStoreError {
    NotificationStoreError::Conflict(format!(
        "low-stock notification for user {owner} and product {product} already exists"
    ))
}
