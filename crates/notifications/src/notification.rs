use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

use fogon_core::{DomainError, Entity, NotificationId, ProductId, UserId};
use fogon_inventory::{Product, StockRequest, StockRequestStatus};

/// Closed set of notification kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    RequestCreated,
    RequestApproved,
    RequestDenied,
    LowStock,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::RequestCreated => "REQUEST_CREATED",
            NotificationType::RequestApproved => "REQUEST_APPROVED",
            NotificationType::RequestDenied => "REQUEST_DENIED",
            NotificationType::LowStock => "LOW_STOCK",
        }
    }
}

impl core::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for NotificationType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REQUEST_CREATED" => Ok(NotificationType::RequestCreated),
            "REQUEST_APPROVED" => Ok(NotificationType::RequestApproved),
            "REQUEST_DENIED" => Ok(NotificationType::RequestDenied),
            "LOW_STOCK" => Ok(NotificationType::LowStock),
            other => Err(DomainError::validation(format!(
                "unknown notification type '{other}'"
            ))),
        }
    }
}

/// Structured payload carried by `LOW_STOCK` notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockPayload {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl LowStockPayload {
    /// Extract the referenced product from a stored payload.
    ///
    /// Returns `None` when `product_id` is missing or is not a valid id; callers
    /// treat such payloads as unknown and leave them alone.
    pub fn product_id_of(payload: &JsonValue) -> Option<ProductId> {
        payload.get("product_id")?.as_str()?.parse().ok()
    }

    pub fn to_json(self) -> JsonValue {
        json!({
            "product_id": self.product_id,
            "quantity": self.quantity,
        })
    }
}

/// A stored notification, as listed to its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub message: String,
    pub payload: JsonValue,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Product referenced by a `LOW_STOCK` notification, if extractable.
    pub fn low_stock_product(&self) -> Option<ProductId> {
        if self.kind != NotificationType::LowStock {
            return None;
        }
        LowStockPayload::product_id_of(&self.payload)
    }
}

impl Entity for Notification {
    type Id = NotificationId;

    fn id(&self) -> NotificationId {
        self.id
    }
}

/// A notification that has not been persisted yet.
///
/// The store assigns `id` and `created_at` on insert; new notifications are
/// always unread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub message: String,
    pub payload: JsonValue,
}

impl NewNotification {
    /// Low-stock alert for one manager about one product.
    pub fn low_stock(manager: UserId, product: &Product) -> Self {
        let payload = LowStockPayload {
            product_id: product.id(),
            quantity: product.quantity(),
        };
        Self {
            user_id: manager,
            kind: NotificationType::LowStock,
            message: format!("Low stock: {} has {} left", product.name(), product.quantity()),
            payload: payload.to_json(),
        }
    }

    /// Tells a manager that a cook asked for stock.
    pub fn request_created(manager: UserId, request: &StockRequest, product: &Product) -> Self {
        Self {
            user_id: manager,
            kind: NotificationType::RequestCreated,
            message: format!(
                "New stock request: {} x {}",
                request.quantity(),
                product.name()
            ),
            payload: request_payload(request),
        }
    }

    /// Tells the requester how a manager decided their request.
    ///
    /// Returns `None` while the request is still pending.
    pub fn request_decided(request: &StockRequest, product: &Product) -> Option<Self> {
        let (kind, verb) = match request.status() {
            StockRequestStatus::Pending => return None,
            StockRequestStatus::Approved => (NotificationType::RequestApproved, "approved"),
            StockRequestStatus::Denied => (NotificationType::RequestDenied, "denied"),
        };
        Some(Self {
            user_id: request.requested_by(),
            kind,
            message: format!(
                "Your request for {} x {} was {verb}",
                request.quantity(),
                product.name()
            ),
            payload: request_payload(request),
        })
    }

    /// Materialize with store-assigned identity and timestamp.
    pub fn into_stored(self, id: NotificationId, created_at: DateTime<Utc>) -> Notification {
        Notification {
            id,
            user_id: self.user_id,
            kind: self.kind,
            message: self.message,
            payload: self.payload,
            is_read: false,
            created_at,
        }
    }

    /// `(owner, product)` pair for `LOW_STOCK` notifications; used by stores to
    /// enforce one alert per manager and product.
    pub fn low_stock_key(&self) -> Option<(UserId, ProductId)> {
        if self.kind != NotificationType::LowStock {
            return None;
        }
        LowStockPayload::product_id_of(&self.payload).map(|p| (self.user_id, p))
    }
}

fn request_payload(request: &StockRequest) -> JsonValue {
    json!({
        "request_id": request.id(),
        "product_id": request.product_id(),
        "quantity": request.quantity(),
    })
}
