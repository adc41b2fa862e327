//! Infrastructure layer: storage adapters, configuration and the services that
//! run low-stock reconciliation and the stock-request workflow.

pub mod catalog;
pub mod config;
pub mod error;
pub mod low_stock;
pub mod notifications;
pub mod requests;
pub mod retry;

pub use catalog::{CatalogError, InMemoryCatalog, PostgresCatalog, ProductCatalog, UserDirectory};
pub use config::{ConfigError, InfraConfig};
pub use error::ServiceError;
pub use low_stock::{LowStockService, ReconcileOutcome};
pub use notifications::{
    AppliedPlan, InMemoryNotificationStore, NotificationStore, NotificationStoreError,
    PostgresNotificationStore,
};
pub use requests::{
    InMemoryStockRequestStore, RequestStoreError, StockRequestService, StockRequestStore,
};
pub use retry::{BackoffStrategy, RetryPolicy};
