use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use fogon_auth::UserAccount;
use fogon_core::{Entity, ProductId, UserId};
use fogon_inventory::Product;

use super::{CatalogError, ProductCatalog, UserDirectory};

/// In-memory catalog and user directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<ProductId, Product>>,
    users: RwLock<HashMap<UserId, UserAccount>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a product.
    pub fn upsert_product(&self, product: Product) -> Result<(), CatalogError> {
        write(&self.products)?.insert(product.id(), product);
        Ok(())
    }

    /// Remove a product; returns whether it existed.
    pub fn remove_product(&self, id: ProductId) -> Result<bool, CatalogError> {
        Ok(write(&self.products)?.remove(&id).is_some())
    }

    /// Insert or replace a user account.
    pub fn upsert_user(&self, user: UserAccount) -> Result<(), CatalogError> {
        write(&self.users)?.insert(user.id(), user);
        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for InMemoryCatalog {
    async fn list_products(&self) -> Result<Vec<Product>, CatalogError> {
        let mut products: Vec<Product> = read(&self.products)?.values().cloned().collect();
        products.sort_by(|a, b| a.name().cmp(b.name()).then(a.id().cmp(&b.id())));
        Ok(products)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, CatalogError> {
        Ok(read(&self.products)?.get(&id).cloned())
    }

    async fn adjust_stock(&self, id: ProductId, delta: i64) -> Result<Product, CatalogError> {
        let mut products = write(&self.products)?;
        let product = products.get_mut(&id).ok_or(CatalogError::NotFound)?;
        product.adjust_stock(delta)?;
        Ok(product.clone())
    }
}

#[async_trait]
impl UserDirectory for InMemoryCatalog {
    async fn list_managers(&self) -> Result<Vec<UserAccount>, CatalogError> {
        let mut managers: Vec<UserAccount> = read(&self.users)?
            .values()
            .filter(|u| u.is_manager())
            .cloned()
            .collect();
        managers.sort_by(|a, b| a.username().cmp(b.username()).then(a.id().cmp(&b.id())));
        Ok(managers)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<UserAccount>, CatalogError> {
        Ok(read(&self.users)?.get(&id).cloned())
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, CatalogError> {
    lock.read()
        .map_err(|_| CatalogError::Storage("catalog lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, CatalogError> {
    lock.write()
        .map_err(|_| CatalogError::Storage("catalog lock poisoned".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fogon_auth::Role;
    use fogon_core::DomainError;
    use fogon_inventory::NewProduct;

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

    #[tokio::test]
    async fn products_are_listed_by_name() {
        let catalog = InMemoryCatalog::new();
        catalog.upsert_product(product("Salt", 10, 0)).unwrap();
        catalog.upsert_product(product("Beans", 10, 0)).unwrap();

        let names: Vec<String> = catalog
            .list_products()
            .await
            .unwrap()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["Beans", "Salt"]);
    }

    #[tokio::test]
    async fn low_stock_listing_uses_the_shared_predicate() {
        let catalog = InMemoryCatalog::new();
        catalog.upsert_product(product("Eggs", 1, 0)).unwrap();
        catalog.upsert_product(product("Flour", 5, 5)).unwrap();
        catalog.upsert_product(product("Salt", 6, 5)).unwrap();

        let low: Vec<String> = catalog
            .list_low_stock()
            .await
            .unwrap()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(low, vec!["Eggs", "Flour"]);
    }

    #[tokio::test]
    async fn adjust_stock_enforces_domain_rules() {
        let catalog = InMemoryCatalog::new();
        let p = product("Eggs", 3, 0);
        let id = p.id();
        catalog.upsert_product(p).unwrap();

        assert_eq!(catalog.adjust_stock(id, 4).await.unwrap().quantity(), 7);
        assert_eq!(
            catalog.adjust_stock(id, -8).await.unwrap_err(),
            CatalogError::Domain(DomainError::invariant("stock cannot go negative"))
        );
        assert_eq!(
            catalog.adjust_stock(ProductId::new(), 1).await.unwrap_err(),
            CatalogError::NotFound
        );
    }

    #[tokio::test]
    async fn only_managers_are_listed() {
        let catalog = InMemoryCatalog::new();
        let boss = UserAccount::new(UserId::new(), "luis", "luis@fogon.test", Role::Manager).unwrap();
        catalog.upsert_user(boss.clone()).unwrap();
        catalog
            .upsert_user(UserAccount::new(UserId::new(), "ana", "ana@fogon.test", Role::Cook).unwrap())
            .unwrap();

        assert_eq!(catalog.list_managers().await.unwrap(), vec![boss]);
    }
}
