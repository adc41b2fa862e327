//! Inventory domain module.
//!
//! This crate contains business rules for the product catalog and stock
//! requests, implemented purely as deterministic domain logic (no IO, no HTTP,
//! no storage).

pub mod product;
pub mod request;

pub use product::{LOW_STOCK_FLOOR, NewProduct, Product, is_low};
pub use request::{StockRequest, StockRequestStatus};
