//! Low-stock notification reconciliation.
//!
//! Desired state: every manager holds exactly one `LOW_STOCK` notification per
//! currently-low product, and none for products that are not low.
//!
//! Model:
//! - Collect the ids of low products (single `is_low` predicate).
//! - Walk the stored `LOW_STOCK` notifications, oldest first, into a
//!   `manager -> {product}` map; anything pointing at a product that is no
//!   longer low (or a second copy of a pair already seen) is slated for deletion.
//! - For every (low product, manager) pair missing from the map, plan one new
//!   notification.
//!
//! Notifications whose payload has no usable `product_id` are never touched.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use fogon_auth::UserAccount;
use fogon_core::{Entity, NotificationId, ProductId, UserId};
use fogon_inventory::{Product, is_low};

use crate::notification::{NewNotification, Notification, NotificationType};

/// Minimal diff between stored and desired low-stock notifications.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcilePlan {
    /// Stored notifications to remove, oldest first.
    pub to_delete: Vec<NotificationId>,
    /// New notifications, in product order then manager order.
    pub to_create: Vec<NewNotification>,
}

impl ReconcilePlan {
    pub fn is_noop(&self) -> bool {
        self.to_delete.is_empty() && self.to_create.is_empty()
    }
}

/// Compute the low-stock plan for the given catalog, accounts and stored
/// notifications.
///
/// Pure and total: the same inputs always give the same plan. Accounts that
/// are not managers and notifications of other types are ignored. With no
/// managers or no products the plan is empty.
pub fn reconcile(
    products: &[Product],
    accounts: &[UserAccount],
    existing: &[Notification],
) -> ReconcilePlan {
    let managers: Vec<UserId> = accounts
        .iter()
        .filter(|a| a.is_manager())
        .map(Entity::id)
        .collect();

    if managers.is_empty() || products.is_empty() {
        return ReconcilePlan::default();
    }

    let low: Vec<&Product> = products.iter().filter(|p| is_low(p)).collect();
    let low_ids: HashSet<ProductId> = low.iter().map(|p| p.id()).collect();

    let mut stored: Vec<&Notification> = existing
        .iter()
        .filter(|n| n.kind == NotificationType::LowStock)
        .collect();
    // Oldest first, so a duplicated pair keeps its original notification.
    stored.sort_by_key(|n| (n.created_at, n.id));

    let mut to_delete = Vec::new();
    let mut existing_map: HashMap<UserId, HashSet<ProductId>> = HashMap::new();

    for n in stored {
        let Some(product_id) = n.low_stock_product() else {
            continue;
        };

        if !low_ids.contains(&product_id) {
            to_delete.push(n.id);
            continue;
        }

        if !existing_map.entry(n.user_id).or_default().insert(product_id) {
            to_delete.push(n.id);
        }
    }

    let mut to_create = Vec::new();
    for product in low {
        for &manager in &managers {
            // insert() doubles as the duplicate guard within this pass
            if existing_map.entry(manager).or_default().insert(product.id()) {
                to_create.push(NewNotification::low_stock(manager, product));
            }
        }
    }

    ReconcilePlan {
        to_delete,
        to_create,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use fogon_auth::Role;
    use fogon_inventory::NewProduct;
    use serde_json::json;

    fn product(name: &str, quantity: u32, threshold: u32) -> Product {
        Product::create(
            ProductId::new(),
            NewProduct {
                name: name.to_string(),
                quantity,
                price_cents: 100,
                threshold,
                description: None,
            },
        )
        .unwrap()
    }

    fn manager() -> UserAccount {
        let id = UserId::new();
        UserAccount::new(id, format!("m-{id}"), "m@fogon.test", Role::Manager).unwrap()
    }

    fn cook() -> UserAccount {
        UserAccount::new(UserId::new(), "cook", "c@fogon.test", Role::Cook).unwrap()
    }

    /// Stand-in for the storage layer: deletes, then inserts with fresh ids.
    fn apply(store: &mut Vec<Notification>, plan: &ReconcilePlan) {
        store.retain(|n| !plan.to_delete.contains(&n.id));
        for new in &plan.to_create {
            store.push(new.clone().into_stored(NotificationId::new(), Utc::now()));
        }
    }

    /// Reconcile against the current store contents and apply the result.
    fn run(store: &mut Vec<Notification>, products: &[Product], managers: &[UserAccount]) -> ReconcilePlan {
        let plan = reconcile(products, managers, store);
        apply(store, &plan);
        plan
    }

    fn count_for(store: &[Notification], manager: UserId, product: ProductId) -> usize {
        store
            .iter()
            .filter(|n| n.user_id == manager && n.low_stock_product() == Some(product))
            .count()
    }

    #[test]
    fn single_low_product_creates_one_alert() {
        let p = product("Eggs", 1, 0);
        let m = manager();

        let plan = reconcile(std::slice::from_ref(&p), std::slice::from_ref(&m), &[]);

        assert!(plan.to_delete.is_empty());
        assert_eq!(plan.to_create.len(), 1);
        let n = &plan.to_create[0];
        assert_eq!(n.user_id, m.id());
        assert_eq!(n.kind, NotificationType::LowStock);
        assert_eq!(n.payload, json!({ "product_id": p.id(), "quantity": 1 }));
    }

    #[test]
    fn restock_deletes_alerts_for_every_manager() {
        let mut p = product("Eggs", 1, 0);
        let managers = vec![manager(), manager()];
        let mut store = Vec::new();

        run(&mut store, std::slice::from_ref(&p), &managers);
        assert_eq!(store.len(), 2);
        store[0].is_read = true;

        p.adjust_stock(9).unwrap();
        let plan = reconcile(std::slice::from_ref(&p), &managers, &store);

        assert_eq!(plan.to_delete.len(), 2);
        assert!(plan.to_create.is_empty());
        apply(&mut store, &plan);
        assert!(store.is_empty());
    }

    #[test]
    fn second_pass_is_a_noop() {
        let products = vec![product("Eggs", 1, 0), product("Flour", 4, 5), product("Salt", 40, 5)];
        let managers = vec![manager(), manager()];
        let mut store = Vec::new();

        run(&mut store, &products, &managers);
        assert_eq!(store.len(), 4);

        let again = reconcile(&products, &managers, &store);
        assert!(again.is_noop());
    }

    #[test]
    fn relow_after_clear_creates_a_fresh_alert() {
        let mut p = product("Milk", 1, 3);
        let managers = vec![manager()];
        let mut store = Vec::new();

        run(&mut store, std::slice::from_ref(&p), &managers);
        let first_id = store[0].id;

        p.adjust_stock(10).unwrap();
        run(&mut store, std::slice::from_ref(&p), &managers);
        assert!(store.is_empty());

        p.adjust_stock(-9).unwrap();
        run(&mut store, std::slice::from_ref(&p), &managers);
        assert_eq!(store.len(), 1);
        assert_ne!(store[0].id, first_id);
        assert!(!store[0].is_read);
        assert_eq!(store[0].payload["quantity"], json!(2));
    }

    #[test]
    fn no_managers_leaves_stale_alerts_alone() {
        let p = product("Eggs", 50, 0);
        let m = manager();
        let stale = NewNotification::low_stock(m.id(), &product("Gone", 0, 0))
            .into_stored(NotificationId::new(), Utc::now());

        let plan = reconcile(&[p], &[cook()], &[stale]);
        assert!(plan.is_noop());
    }

    #[test]
    fn no_products_is_a_noop() {
        let m = manager();
        let stale = NewNotification::low_stock(m.id(), &product("Gone", 0, 0))
            .into_stored(NotificationId::new(), Utc::now());

        assert!(reconcile(&[], &[m], &[stale]).is_noop());
    }

    #[test]
    fn alerts_for_deleted_products_are_removed() {
        let m = manager();
        let gone = NewNotification::low_stock(m.id(), &product("Gone", 0, 0))
            .into_stored(NotificationId::new(), Utc::now());

        let plan = reconcile(&[product("Salt", 40, 0)], &[m], std::slice::from_ref(&gone));
        assert_eq!(plan.to_delete, vec![gone.id]);
    }

    #[test]
    fn malformed_payload_is_never_deleted() {
        let m = manager();
        let broken = Notification {
            id: NotificationId::new(),
            user_id: m.id(),
            kind: NotificationType::LowStock,
            message: "legacy".to_string(),
            payload: json!({ "quantity": 0 }),
            is_read: false,
            created_at: Utc::now(),
        };

        let plan = reconcile(&[product("Salt", 40, 0)], &[m], &[broken]);
        assert!(plan.is_noop());
    }

    #[test]
    fn cooks_and_other_notification_types_are_ignored() {
        let p = product("Eggs", 0, 0);
        let m = manager();
        let c = cook();
        let request_note = Notification {
            id: NotificationId::new(),
            user_id: m.id(),
            kind: NotificationType::RequestCreated,
            message: "New stock request".to_string(),
            payload: json!({ "product_id": product("Salt", 40, 0).id(), "quantity": 2 }),
            is_read: false,
            created_at: Utc::now(),
        };

        let plan = reconcile(std::slice::from_ref(&p), &[c, m.clone()], &[request_note]);
        assert!(plan.to_delete.is_empty());
        assert_eq!(plan.to_create.len(), 1);
        assert_eq!(plan.to_create[0].user_id, m.id());
    }

    #[test]
    fn manager_listed_twice_gets_one_alert() {
        let p = product("Eggs", 0, 0);
        let m = manager();

        let plan = reconcile(&[p], &[m.clone(), m], &[]);
        assert_eq!(plan.to_create.len(), 1);
    }

    #[test]
    fn duplicate_pair_keeps_the_oldest_alert() {
        let p = product("Eggs", 0, 0);
        let m = manager();
        let t0 = Utc::now() - Duration::minutes(5);
        let older = NewNotification::low_stock(m.id(), &p).into_stored(NotificationId::new(), t0);
        let newer = NewNotification::low_stock(m.id(), &p).into_stored(NotificationId::new(), Utc::now());

        let plan = reconcile(std::slice::from_ref(&p), &[m], &[newer.clone(), older]);
        assert_eq!(plan.to_delete, vec![newer.id]);
        assert!(plan.to_create.is_empty());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn catalog(specs: &[(u32, u32)]) -> Vec<Product> {
            specs
                .iter()
                .enumerate()
                .map(|(i, (q, t))| product(&format!("p{i}"), *q, *t))
                .collect()
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: after applying a plan, every (manager, low product) pair
            /// has exactly one alert and no alert points at a product that is not low;
            /// a second pass plans nothing.
            #[test]
            fn plan_converges_in_one_pass(
                before in prop::collection::vec((0u32..8, 0u32..6), 1..12),
                after in prop::collection::vec((0u32..8, 0u32..6), 1..12),
                manager_count in 1usize..4,
            ) {
                let managers: Vec<UserAccount> = (0..manager_count).map(|_| manager()).collect();
                let mut products = catalog(&before);
                let mut store = Vec::new();

                run(&mut store, &products, &managers);

                // Move stock around (same ids where the catalog overlaps).
                for (p, (q, t)) in products.iter_mut().zip(after.iter()) {
                    let name = p.name().to_string();
                    p.update(NewProduct {
                        name,
                        quantity: *q,
                        price_cents: 100,
                        threshold: *t,
                        description: None,
                    }).unwrap();
                }

                run(&mut store, &products, &managers);

                for p in &products {
                    for m in &managers {
                        let expected = usize::from(p.is_low());
                        prop_assert_eq!(count_for(&store, m.id(), p.id()), expected);
                    }
                }
                prop_assert!(reconcile(&products, &managers, &store).is_noop());
            }
        }
    }
}
