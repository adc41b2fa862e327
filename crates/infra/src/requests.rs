//! Stock-request workflow: cooks ask for stock, managers approve or deny.
//!
//! Each step raises the matching notification (`REQUEST_CREATED` to every
//! manager, `REQUEST_APPROVED` / `REQUEST_DENIED` back to the requester).
//! Approval also puts the requested quantity into stock.
//!
//! Decisions are stored with a compare-and-set on the request's status, so two
//! managers deciding the same request at once cannot both win: the loser gets
//! `Conflict` before any stock moves.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::{Span, field, info, instrument, warn};

use fogon_auth::{UserAccount, require_manager};
use fogon_core::{DomainError, Entity, ProductId, StockRequestId, UserId};
use fogon_inventory::{Product, StockRequest, StockRequestStatus};
use fogon_notifications::NewNotification;

use crate::catalog::{ProductCatalog, UserDirectory};
use crate::error::ServiceError;
use crate::notifications::NotificationStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestStoreError {
    #[error("stock request not found")]
    NotFound,

    #[error("stock request already exists")]
    Duplicate,

    /// The stored status was not the one the caller expected.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),
}

#[async_trait]
pub trait StockRequestStore: Send + Sync {
    async fn insert(&self, request: &StockRequest) -> Result<(), RequestStoreError>;

    async fn get(&self, id: StockRequestId) -> Result<Option<StockRequest>, RequestStoreError>;

    /// Replace a stored request with its new state, but only while its stored
    /// status is still `expected`. Otherwise nothing is written and the call
    /// fails with `Conflict`.
    async fn transition(
        &self,
        request: &StockRequest,
        expected: StockRequestStatus,
    ) -> Result<(), RequestStoreError>;

    /// All requests, newest first.
    async fn list(&self) -> Result<Vec<StockRequest>, RequestStoreError>;
}

#[async_trait]
impl<S> StockRequestStore for Arc<S>
where
    S: StockRequestStore + ?Sized,
{
    async fn insert(&self, request: &StockRequest) -> Result<(), RequestStoreError> {
        (**self).insert(request).await
    }

    async fn get(&self, id: StockRequestId) -> Result<Option<StockRequest>, RequestStoreError> {
        (**self).get(id).await
    }

    async fn transition(
        &self,
        request: &StockRequest,
        expected: StockRequestStatus,
    ) -> Result<(), RequestStoreError> {
        (**self).transition(request, expected).await
    }

    async fn list(&self) -> Result<Vec<StockRequest>, RequestStoreError> {
        (**self).list().await
    }
}

/// In-memory request store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryStockRequestStore {
    requests: RwLock<HashMap<StockRequestId, StockRequest>>,
}

impl InMemoryStockRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<StockRequestId, StockRequest>>, RequestStoreError> {
        self.requests
            .read()
            .map_err(|_| RequestStoreError::Storage("request lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<StockRequestId, StockRequest>>, RequestStoreError> {
        self.requests
            .write()
            .map_err(|_| RequestStoreError::Storage("request lock poisoned".to_string()))
    }
}

#[async_trait]
impl StockRequestStore for InMemoryStockRequestStore {
    async fn insert(&self, request: &StockRequest) -> Result<(), RequestStoreError> {
        let mut map = self.write()?;
        if map.contains_key(&request.id()) {
            return Err(RequestStoreError::Duplicate);
        }
        map.insert(request.id(), request.clone());
        Ok(())
    }

    async fn get(&self, id: StockRequestId) -> Result<Option<StockRequest>, RequestStoreError> {
        Ok(self.read()?.get(&id).cloned())
    }

    async fn transition(
        &self,
        request: &StockRequest,
        expected: StockRequestStatus,
    ) -> Result<(), RequestStoreError> {
        let mut map = self.write()?;
        let slot = map.get_mut(&request.id()).ok_or(RequestStoreError::NotFound)?;
        if slot.status() != expected {
            return Err(RequestStoreError::Conflict(format!(
                "request already {:?}",
                slot.status()
            )));
        }
        *slot = request.clone();
        Ok(())
    }

    async fn list(&self) -> Result<Vec<StockRequest>, RequestStoreError> {
        let mut all: Vec<StockRequest> = self.read()?.values().cloned().collect();
        all.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then(b.id().cmp(&a.id()))
        });
        Ok(all)
    }
}

/// Drives the request lifecycle against the catalog and notification store.
pub struct StockRequestService<C, R, N>
where
    C: ProductCatalog + UserDirectory + ?Sized,
    R: StockRequestStore + ?Sized,
    N: NotificationStore + ?Sized,
{
    catalog: Arc<C>,
    requests: Arc<R>,
    notifications: Arc<N>,
}

impl<C, R, N> StockRequestService<C, R, N>
where
    C: ProductCatalog + UserDirectory + ?Sized,
    R: StockRequestStore + ?Sized,
    N: NotificationStore + ?Sized,
{
    pub fn new(catalog: Arc<C>, requests: Arc<R>, notifications: Arc<N>) -> Self {
        Self {
            catalog,
            requests,
            notifications,
        }
    }

    /// Open a request for `quantity` units and tell every manager about it.
    ///
    /// The request is stored first. The manager notifications then go in as
    /// one batch, so either every manager hears about it or none does.
    #[instrument(skip(self), fields(request_id), err)]
    pub async fn submit(
        &self,
        requester: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<StockRequest, ServiceError> {
        self.known_user(requester).await?;
        let product = self.product(product_id).await?;

        let request = StockRequest::submit(
            StockRequestId::new(),
            product_id,
            requester,
            quantity,
            Utc::now(),
        )?;
        Span::current().record("request_id", field::display(request.id()));
        self.requests.insert(&request).await?;

        let managers = self.catalog.list_managers().await?;
        let batch = managers
            .iter()
            .map(|manager| NewNotification::request_created(manager.id(), &request, &product))
            .collect();
        self.notifications.insert_all(batch).await?;

        info!(managers = managers.len(), "stock request submitted");
        Ok(request)
    }

    /// Approve a pending request: restock the product and notify the requester.
    ///
    /// The decision is claimed in the store before stock is adjusted. If the
    /// adjustment fails, the request is put back to `Pending`.
    #[instrument(skip(self), err)]
    pub async fn approve(
        &self,
        manager: UserId,
        request_id: StockRequestId,
    ) -> Result<StockRequest, ServiceError> {
        self.authorize_manager(manager).await?;
        let pending = self.request(request_id).await?;

        let mut request = pending.clone();
        request.approve(manager, Utc::now())?;
        self.claim(&request, StockRequestStatus::Pending).await?;

        let product = match self
            .catalog
            .adjust_stock(request.product_id(), i64::from(request.quantity()))
            .await
        {
            Ok(product) => product,
            Err(err) => {
                if let Err(revert) = self
                    .requests
                    .transition(&pending, StockRequestStatus::Approved)
                    .await
                {
                    warn!(error = %revert, "could not return request to pending after failed restock");
                }
                return Err(err.into());
            }
        };
        self.notify_requester(&request, &product).await?;

        info!(quantity = request.quantity(), new_quantity = product.quantity(), "stock request approved");
        Ok(request)
    }

    /// Deny a pending request and notify the requester.
    #[instrument(skip(self), err)]
    pub async fn deny(
        &self,
        manager: UserId,
        request_id: StockRequestId,
    ) -> Result<StockRequest, ServiceError> {
        self.authorize_manager(manager).await?;
        let mut request = self.request(request_id).await?;
        let product = self.product(request.product_id()).await?;

        request.deny(manager, Utc::now())?;
        self.claim(&request, StockRequestStatus::Pending).await?;
        self.notify_requester(&request, &product).await?;

        info!("stock request denied");
        Ok(request)
    }

    /// Every request, newest first.
    pub async fn list_requests(&self) -> Result<Vec<StockRequest>, ServiceError> {
        Ok(self.requests.list().await?)
    }

    async fn notify_requester(&self, request: &StockRequest, product: &Product) -> Result<(), ServiceError> {
        if let Some(note) = NewNotification::request_decided(request, product) {
            self.notifications.insert(note).await?;
        }
        Ok(())
    }

    /// Store a decided request, reporting a lost race as a domain conflict.
    async fn claim(&self, request: &StockRequest, expected: StockRequestStatus) -> Result<(), ServiceError> {
        match self.requests.transition(request, expected).await {
            Err(RequestStoreError::Conflict(reason)) => Err(DomainError::conflict(reason).into()),
            other => Ok(other?),
        }
    }

    async fn known_user(&self, id: UserId) -> Result<UserAccount, ServiceError> {
        Ok(self.catalog.get_user(id).await?.ok_or(DomainError::NotFound)?)
    }

    async fn authorize_manager(&self, id: UserId) -> Result<UserAccount, ServiceError> {
        let user = self.known_user(id).await?;
        require_manager(&user)?;
        Ok(user)
    }

    async fn product(&self, id: ProductId) -> Result<Product, ServiceError> {
        Ok(self.catalog.get_product(id).await?.ok_or(DomainError::NotFound)?)
    }

    async fn request(&self, id: StockRequestId) -> Result<StockRequest, ServiceError> {
        Ok(self.requests.get(id).await?.ok_or(DomainError::NotFound)?)
    }
}
