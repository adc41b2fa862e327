//! Stock requests raised by kitchen staff and decided by managers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fogon_core::{DomainError, DomainResult, Entity, ProductId, StockRequestId, UserId};

/// Stock request lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockRequestStatus {
    Pending,
    Approved,
    Denied,
}

/// A request for more stock of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRequest {
    id: StockRequestId,
    product_id: ProductId,
    requested_by: UserId,
    quantity: u32,
    status: StockRequestStatus,
    created_at: DateTime<Utc>,
    decided_by: Option<UserId>,
    decided_at: Option<DateTime<Utc>>,
}

impl StockRequest {
    /// Open a new pending request. The requested quantity must be positive.
    pub fn submit(
        id: StockRequestId,
        product_id: ProductId,
        requested_by: UserId,
        quantity: u32,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be greater than 0"));
        }

        Ok(Self {
            id,
            product_id,
            requested_by,
            quantity,
            status: StockRequestStatus::Pending,
            created_at,
            decided_by: None,
            decided_at: None,
        })
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn status(&self) -> StockRequestStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn decided_by(&self) -> Option<UserId> {
        self.decided_by
    }

    pub fn decided_at(&self) -> Option<DateTime<Utc>> {
        self.decided_at
    }

    pub fn approve(&mut self, by: UserId, at: DateTime<Utc>) -> DomainResult<()> {
        self.decide(StockRequestStatus::Approved, by, at)
    }

    pub fn deny(&mut self, by: UserId, at: DateTime<Utc>) -> DomainResult<()> {
        self.decide(StockRequestStatus::Denied, by, at)
    }

    fn decide(&mut self, outcome: StockRequestStatus, by: UserId, at: DateTime<Utc>) -> DomainResult<()> {
        if self.status != StockRequestStatus::Pending {
            return Err(DomainError::conflict(format!(
                "request already {:?}",
                self.status
            )));
        }
        self.status = outcome;
        self.decided_by = Some(by);
        self.decided_at = Some(at);
        Ok(())
    }
}

impl Entity for StockRequest {
    type Id = StockRequestId;

    fn id(&self) -> StockRequestId {
        self.id
    }
}
