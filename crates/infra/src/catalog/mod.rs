//! Read access to the product catalog and staff accounts.
//!
//! Catalog CRUD belongs to the application glue; reconciliation and the
//! request workflow only need to list, look up and adjust stock.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use fogon_auth::UserAccount;
use fogon_core::{DomainError, ProductId, UserId};
use fogon_inventory::{Product, is_low};

pub use in_memory::InMemoryCatalog;
pub use postgres::PostgresCatalog;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("failed to decode row: {0}")]
    Decode(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Product catalog as seen by reconciliation and the request workflow.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// All products, ordered by name.
    async fn list_products(&self) -> Result<Vec<Product>, CatalogError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, CatalogError>;

    /// Apply a stock movement and return the updated product.
    async fn adjust_stock(&self, id: ProductId, delta: i64) -> Result<Product, CatalogError>;

    /// Products currently low on stock, ordered by name.
    async fn list_low_stock(&self) -> Result<Vec<Product>, CatalogError> {
        let products = self.list_products().await?;
        Ok(products.into_iter().filter(is_low).collect())
    }
}

/// Staff accounts.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Accounts with the manager role, ordered by username.
    async fn list_managers(&self) -> Result<Vec<UserAccount>, CatalogError>;

    async fn get_user(&self, id: UserId) -> Result<Option<UserAccount>, CatalogError>;
}

#[async_trait]
impl<S> ProductCatalog for Arc<S>
where
    S: ProductCatalog + ?Sized,
{
    async fn list_products(&self) -> Result<Vec<Product>, CatalogError> {
        (**self).list_products().await
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, CatalogError> {
        (**self).get_product(id).await
    }

    async fn adjust_stock(&self, id: ProductId, delta: i64) -> Result<Product, CatalogError> {
        (**self).adjust_stock(id, delta).await
    }
}

#[async_trait]
impl<S> UserDirectory for Arc<S>
where
    S: UserDirectory + ?Sized,
{
    async fn list_managers(&self) -> Result<Vec<UserAccount>, CatalogError> {
        (**self).list_managers().await
    }

    async fn get_user(&self, id: UserId) -> Result<Option<UserAccount>, CatalogError> {
        (**self).get_user(id).await
    }
}
