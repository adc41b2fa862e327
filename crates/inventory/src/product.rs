use serde::{Deserialize, Serialize};

use fogon_core::{DomainError, DomainResult, Entity, ProductId};

/// Absolute stock floor: a product holding fewer units than this is always low,
/// whatever its configured threshold.
pub const LOW_STOCK_FLOOR: u32 = 2;

/// Low-stock predicate shared by the notification reconciler and product listings.
///
/// A product is low when it sits at or below a configured (non-zero) reorder
/// threshold, or below [`LOW_STOCK_FLOOR`] regardless of threshold.
pub fn is_low(product: &Product) -> bool {
    let quantity = product.quantity();
    let threshold = product.threshold();
    (threshold > 0 && quantity <= threshold) || quantity < LOW_STOCK_FLOOR
}

/// Input for creating or replacing a product's editable fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub quantity: u32,
    /// Unit price in the smallest currency unit (cents).
    pub price_cents: u64,
    /// Reorder threshold; 0 means "no explicit threshold".
    #[serde(default)]
    pub threshold: u32,
    #[serde(default)]
    pub description: Option<String>,
}

/// A catalog product with its quantity on hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    name: String,
    quantity: u32,
    price_cents: u64,
    threshold: u32,
    description: Option<String>,
}

impl Product {
    /// Build a product from validated input.
    ///
    /// Names are trimmed and must not be blank; an all-whitespace description
    /// is stored as `None`.
    pub fn create(id: ProductId, input: NewProduct) -> DomainResult<Self> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(Self {
            id,
            name: name.to_string(),
            quantity: input.quantity,
            price_cents: input.price_cents,
            threshold: input.threshold,
            description: normalize_description(input.description),
        })
    }

    /// Replace every editable field (the "edit product" form).
    pub fn update(&mut self, input: NewProduct) -> DomainResult<()> {
        *self = Self::create(self.id, input)?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn price_cents(&self) -> u64 {
        self.price_cents
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_low(&self) -> bool {
        is_low(self)
    }

    /// Apply a signed stock movement and return the new quantity.
    pub fn adjust_stock(&mut self, delta: i64) -> DomainResult<u32> {
        if delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }

        let new_quantity = i64::from(self.quantity) + delta;
        if new_quantity < 0 {
            return Err(DomainError::invariant("stock cannot go negative"));
        }
        let new_quantity = u32::try_from(new_quantity)
            .map_err(|_| DomainError::validation("stock exceeds supported range"))?;

        self.quantity = new_quantity;
        Ok(new_quantity)
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> ProductId {
        self.id
    }
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(quantity: u32, threshold: u32) -> Product {
        Product::create(
            ProductId::new(),
            NewProduct {
                name: "Tomatoes".to_string(),
                quantity,
                price_cents: 250,
                threshold,
                description: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        assert!(product(5, 5).is_low());
        assert!(!product(6, 5).is_low());
    }

    #[test]
    fn floor_applies_without_threshold() {
        assert!(product(0, 0).is_low());
        assert!(product(1, 0).is_low());
        assert!(!product(2, 0).is_low());
    }

    #[test]
    fn threshold_of_one_matches_floor() {
        assert!(product(1, 1).is_low());
        assert!(!product(2, 1).is_low());
    }

    #[test]
    fn create_rejects_blank_name() {
        let err = Product::create(
            ProductId::new(),
            NewProduct {
                name: "   ".to_string(),
                quantity: 3,
                price_cents: 0,
                threshold: 0,
                description: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn create_trims_name_and_drops_blank_description() {
        let p = Product::create(
            ProductId::new(),
            NewProduct {
                name: "  Olive oil ".to_string(),
                quantity: 3,
                price_cents: 1299,
                threshold: 2,
                description: Some("  ".to_string()),
            },
        )
        .unwrap();
        assert_eq!(p.name(), "Olive oil");
        assert_eq!(p.description(), None);
    }

    #[test]
    fn update_keeps_identity() {
        let mut p = product(3, 0);
        let id = p.id();
        p.update(NewProduct {
            name: "Cherry tomatoes".to_string(),
            quantity: 12,
            price_cents: 300,
            threshold: 4,
            description: Some("vine".to_string()),
        })
        .unwrap();
        assert_eq!(p.id(), id);
        assert_eq!(p.quantity(), 12);
        assert_eq!(p.description(), Some("vine"));
    }

    #[test]
    fn adjust_stock_rejects_zero_and_negative_result() {
        let mut p = product(3, 0);
        assert!(matches!(p.adjust_stock(0), Err(DomainError::Validation(_))));
        assert!(matches!(p.adjust_stock(-4), Err(DomainError::InvariantViolation(_))));
        assert_eq!(p.quantity(), 3);

        assert_eq!(p.adjust_stock(-3).unwrap(), 0);
        assert_eq!(p.adjust_stock(10).unwrap(), 10);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 512,
                ..ProptestConfig::default()
            })]

            /// Property: anything under the floor is low, whatever the threshold.
            #[test]
            fn under_floor_is_always_low(quantity in 0u32..LOW_STOCK_FLOOR, threshold in 0u32..1_000) {
                prop_assert!(product(quantity, threshold).is_low());
            }

            /// Property: above both the floor and the threshold is never low.
            #[test]
            fn above_threshold_and_floor_is_never_low(threshold in 0u32..1_000, extra in 1u32..1_000) {
                let quantity = threshold.max(LOW_STOCK_FLOOR - 1) + extra;
                prop_assert!(!product(quantity, threshold).is_low());
            }

            /// Property: a non-zero threshold flags everything at or below it.
            #[test]
            fn at_or_below_threshold_is_low(threshold in 1u32..1_000, below in 0u32..1_000) {
                let quantity = threshold.saturating_sub(below);
                prop_assert!(product(quantity, threshold).is_low());
            }
        }
    }
}
