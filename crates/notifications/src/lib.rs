//! `fogon-notifications`
//!
//! **Responsibility:** the notification model and the low-stock reconciler.
//!
//! The reconciler is a pure function: it reads the catalog, the manager
//! accounts and the stored low-stock notifications, and returns the minimal
//! create/delete plan. Applying that plan atomically is the caller's job
//! (see `fogon-infra`).

pub mod notification;
pub mod reconcile;

pub use notification::{LowStockPayload, NewNotification, Notification, NotificationType};
pub use reconcile::{ReconcilePlan, reconcile};
