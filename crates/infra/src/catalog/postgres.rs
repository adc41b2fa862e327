//! Postgres-backed catalog reads.
//!
//! Reads the `products` and `users` tables owned by the application glue. The
//! only write is `adjust_stock`, which locks the product row, applies the domain
//! rule and writes the new quantity in one transaction.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use fogon_auth::{Role, UserAccount};
use fogon_core::{ProductId, UserId};
use fogon_inventory::{NewProduct, Product};

use super::{CatalogError, ProductCatalog, UserDirectory};

const PRODUCT_COLUMNS: &str = "id, name, quantity, price_cents, threshold, description";
const USER_COLUMNS: &str = "id, username, email, role";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id           UUID PRIMARY KEY,
        name         TEXT NOT NULL,
        quantity     BIGINT NOT NULL DEFAULT 0 CHECK (quantity >= 0),
        price_cents  BIGINT NOT NULL DEFAULT 0 CHECK (price_cents >= 0),
        threshold    BIGINT NOT NULL DEFAULT 0 CHECK (threshold >= 0),
        description  TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id        UUID PRIMARY KEY,
        username  TEXT NOT NULL UNIQUE,
        email     TEXT NOT NULL,
        role      TEXT NOT NULL DEFAULT 'cook' CHECK (role IN ('cook', 'manager'))
    )
    "#,
];

/// Postgres catalog + user directory.
#[derive(Debug, Clone)]
pub struct PostgresCatalog {
    pool: Arc<PgPool>,
}

impl PostgresCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the `products` and `users` tables if they are missing.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), CatalogError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for PostgresCatalog {
    #[instrument(skip(self), err)]
    async fn list_products(&self) -> Result<Vec<Product>, CatalogError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name ASC, id ASC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        rows.iter().map(decode_product).collect()
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, CatalogError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;

        row.as_ref().map(decode_product).transpose()
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn adjust_stock(&self, id: ProductId, delta: i64) -> Result<Product, CatalogError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_product", e))?
        .ok_or(CatalogError::NotFound)?;

        let mut product = decode_product(&row)?;
        let quantity = product.adjust_stock(delta)?;

        sqlx::query("UPDATE products SET quantity = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(i64::from(quantity))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_quantity", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(product)
    }
}

#[async_trait]
impl UserDirectory for PostgresCatalog {
    #[instrument(skip(self), err)]
    async fn list_managers(&self) -> Result<Vec<UserAccount>, CatalogError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = 'manager' ORDER BY username ASC, id ASC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_managers", e))?;

        rows.iter().map(decode_user).collect()
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn get_user(&self, id: UserId) -> Result<Option<UserAccount>, CatalogError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user", e))?;

        row.as_ref().map(decode_user).transpose()
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> CatalogError {
    match err {
        sqlx::Error::Database(db_err) => {
            CatalogError::Storage(format!("database error in {}: {}", operation, db_err.message()))
        }
        sqlx::Error::PoolClosed => {
            CatalogError::Storage(format!("connection pool closed in {}", operation))
        }
        _ => CatalogError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}

// SQLx row types

#[derive(Debug)]
struct ProductRow {
    id: uuid::Uuid,
    name: String,
    quantity: i64,
    price_cents: i64,
    threshold: i64,
    description: Option<String>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for ProductRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            quantity: row.try_get("quantity")?,
            price_cents: row.try_get("price_cents")?,
            threshold: row.try_get("threshold")?,
            description: row.try_get("description")?,
        })
    }
}

impl TryFrom<ProductRow> for Product {
    type Error = CatalogError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let out_of_range = |column: &str, value: i64| {
            CatalogError::Decode(format!("product {}: {column} out of range ({value})", row.id))
        };

        let input = NewProduct {
            name: row.name.clone(),
            quantity: u32::try_from(row.quantity).map_err(|_| out_of_range("quantity", row.quantity))?,
            price_cents: u64::try_from(row.price_cents)
                .map_err(|_| out_of_range("price_cents", row.price_cents))?,
            threshold: u32::try_from(row.threshold).map_err(|_| out_of_range("threshold", row.threshold))?,
            description: row.description.clone(),
        };

        Product::create(ProductId::from_uuid(row.id), input)
            .map_err(|e| CatalogError::Decode(format!("product {}: {e}", row.id)))
    }
}

#[derive(Debug)]
struct UserRow {
    id: uuid::Uuid,
    username: String,
    email: String,
    role: String,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for UserRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            role: row.try_get("role")?,
        })
    }
}

impl TryFrom<UserRow> for UserAccount {
    type Error = CatalogError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: Role = row
            .role
            .parse()
            .map_err(|e| CatalogError::Decode(format!("user {}: {e}", row.id)))?;

        UserAccount::new(UserId::from_uuid(row.id), row.username, row.email, role)
            .map_err(|e| CatalogError::Decode(format!("user {}: {e}", row.id)))
    }
}

fn decode_product(row: &sqlx::postgres::PgRow) -> Result<Product, CatalogError> {
    ProductRow::from_row(row)
        .map_err(|e| CatalogError::Decode(format!("products row: {e}")))?
        .try_into()
}

fn decode_user(row: &sqlx::postgres::PgRow) -> Result<UserAccount, CatalogError> {
    UserRow::from_row(row)
        .map_err(|e| CatalogError::Decode(format!("users row: {e}")))?
        .try_into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fogon_core::{DomainError, Entity};
    use sqlx::postgres::PgPoolOptions;

    async fn pool() -> Option<PgPool> {
        let url = std::env::var("DATABASE_URL").ok()?;
        Some(
            PgPoolOptions::new()
                .max_connections(2)
                .connect(&url)
                .await
                .unwrap(),
        )
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
    async fn stock_adjustments_follow_domain_rules() {
        let Some(pool) = pool().await else { return };
        let catalog = PostgresCatalog::new(pool.clone());
        catalog.ensure_schema().await.unwrap();

        let id = ProductId::new();
        sqlx::query(
            "INSERT INTO products (id, name, quantity, price_cents, threshold, description) \
             VALUES ($1, 'Eggs', 3, 30, 0, NULL)",
        )
        .bind(id.as_uuid())
        .execute(&pool)
        .await
        .unwrap();

        assert_eq!(catalog.adjust_stock(id, 4).await.unwrap().quantity(), 7);
        assert_eq!(
            catalog.adjust_stock(id, -8).await.unwrap_err(),
            CatalogError::Domain(DomainError::invariant("stock cannot go negative"))
        );
        assert_eq!(catalog.get_product(id).await.unwrap().unwrap().quantity(), 7);
        assert_eq!(
            catalog.adjust_stock(ProductId::new(), 1).await.unwrap_err(),
            CatalogError::NotFound
        );
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
    async fn managers_are_decoded_from_rows() {
        let Some(pool) = pool().await else { return };
        let catalog = PostgresCatalog::new(pool.clone());
        catalog.ensure_schema().await.unwrap();

        let id = UserId::new();
        sqlx::query("INSERT INTO users (id, username, email, role) VALUES ($1, $2, 'm@fogon.test', 'manager')")
            .bind(id.as_uuid())
            .bind(format!("manager-{id}"))
            .execute(&pool)
            .await
            .unwrap();

        let user = catalog.get_user(id).await.unwrap().unwrap();
        assert!(user.is_manager());
        assert!(catalog.list_managers().await.unwrap().iter().any(|m| m.id() == id));
    }
}
