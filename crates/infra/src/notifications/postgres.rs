//! Postgres-backed notification store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | NotificationStoreError | Scenario |
//! |------------|----------------------|------------------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | A concurrent pass already stored the (user, product) `LOW_STOCK` pair |
//! | Database (other) | Any other | `Storage` | Constraint or SQL errors |
//! | PoolClosed | N/A | `Storage` | Connection pool was closed |
//! | Other | N/A | `Storage` | Network errors, connection failures, etc. |
//!
//! The pair guard lives in the schema as a unique partial index over
//! `(user_id, payload->>'product_id') WHERE type = 'LOW_STOCK'`.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tracing::{Span, instrument, warn};

use fogon_core::{NotificationId, UserId};
use fogon_notifications::{NewNotification, Notification, NotificationType, ReconcilePlan};

use super::{AppliedPlan, NotificationStore, NotificationStoreError};

const COLUMNS: &str = "id, user_id, type, message, payload, is_read, created_at";

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id          UUID PRIMARY KEY,
        user_id     UUID NOT NULL,
        type        TEXT NOT NULL,
        message     TEXT NOT NULL,
        payload     JSONB NOT NULL DEFAULT '{}'::jsonb,
        is_read     BOOLEAN NOT NULL DEFAULT FALSE,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
"#;

/// Keeps the oldest `(created_at, id)` row of every duplicated `LOW_STOCK`
/// pair. Rows without a `product_id` never compare equal and are left alone.
const DELETE_DUPLICATE_PAIRS: &str = r#"
    DELETE FROM notifications AS dup
    USING notifications AS keep
    WHERE dup.type = 'LOW_STOCK'
      AND keep.type = 'LOW_STOCK'
      AND dup.user_id = keep.user_id
      AND dup.payload->>'product_id' = keep.payload->>'product_id'
      AND (keep.created_at, keep.id) < (dup.created_at, dup.id)
"#;

const CREATE_PAIR_INDEX: &str = r#"
    CREATE UNIQUE INDEX IF NOT EXISTS notifications_low_stock_pair
        ON notifications (user_id, (payload->>'product_id'))
        WHERE type = 'LOW_STOCK'
"#;

const CREATE_OWNER_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS notifications_owner_created
        ON notifications (user_id, created_at DESC, id DESC)
"#;

/// Postgres notification store.
///
/// `apply_plan` runs in one transaction; dropping the transaction on an error
/// path rolls it back.
#[derive(Debug, Clone)]
pub struct PostgresNotificationStore {
    pool: Arc<PgPool>,
}

impl PostgresNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the notifications table and its indexes if they are missing.
    ///
    /// Duplicate `LOW_STOCK` pairs left by data written before the pair index
    /// existed are collapsed to their oldest row first, in the same
    /// transaction, so the unique index can always be built.
    #[instrument(skip(self), fields(duplicates_removed), err)]
    pub async fn ensure_schema(&self) -> Result<(), NotificationStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(CREATE_TABLE)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create_table", e))?;

        let removed = sqlx::query(DELETE_DUPLICATE_PAIRS)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_duplicate_pairs", e))?
            .rows_affected();
        Span::current().record("duplicates_removed", removed);
        if removed > 0 {
            warn!(removed, "removed duplicate low-stock notifications before indexing");
        }

        for (operation, statement) in [
            ("create_pair_index", CREATE_PAIR_INDEX),
            ("create_owner_index", CREATE_OWNER_INDEX),
        ] {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(operation, e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

#[async_trait::async_trait]
impl NotificationStore for PostgresNotificationStore {
    #[instrument(skip(self), fields(count), err)]
    async fn list_by_type(
        &self,
        kind: NotificationType,
    ) -> Result<Vec<Notification>, NotificationStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM notifications WHERE type = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(kind.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_by_type", e))?;

        Span::current().record("count", rows.len());
        rows.iter().map(decode).collect()
    }

    #[instrument(skip(self), err)]
    async fn list_for_owner(
        &self,
        owner: UserId,
    ) -> Result<Vec<Notification>, NotificationStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM notifications WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_for_owner", e))?;

        rows.iter().map(decode).collect()
    }

    #[instrument(skip(self, new), fields(owner = %new.user_id, kind = %new.kind), err)]
    async fn insert(&self, new: NewNotification) -> Result<Notification, NotificationStoreError> {
        let stored = new.into_stored(NotificationId::new(), Utc::now());
        insert_row(&*self.pool, &stored).await?;
        Ok(stored)
    }

    #[instrument(skip(self, batch), fields(count = batch.len()), err)]
    async fn insert_all(
        &self,
        batch: Vec<NewNotification>,
    ) -> Result<Vec<Notification>, NotificationStoreError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let now = Utc::now();
        let mut stored = Vec::with_capacity(batch.len());
        for new in batch {
            let n = new.into_stored(NotificationId::new(), now);
            insert_row(&mut *tx, &n).await?;
            stored.push(n);
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(stored)
    }

    #[instrument(
        skip(self, plan),
        fields(to_delete = plan.to_delete.len(), to_create = plan.to_create.len(), deleted),
        err
    )]
    async fn apply_plan(&self, plan: &ReconcilePlan) -> Result<AppliedPlan, NotificationStoreError> {
        if plan.is_noop() {
            return Ok(AppliedPlan::default());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let mut deleted = 0;
        if !plan.to_delete.is_empty() {
            let ids: Vec<uuid::Uuid> = plan.to_delete.iter().map(|id| *id.as_uuid()).collect();
            let result = sqlx::query(
                "DELETE FROM notifications WHERE id = ANY($1) AND type = 'LOW_STOCK'",
            )
            .bind(&ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_notifications", e))?;
            deleted = result.rows_affected() as usize;
        }
        Span::current().record("deleted", deleted);

        let now = Utc::now();
        for new in &plan.to_create {
            let stored = new.clone().into_stored(NotificationId::new(), now);
            insert_row(&mut *tx, &stored).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(AppliedPlan {
            deleted,
            created: plan.to_create.len(),
        })
    }

    #[instrument(skip(self), err)]
    async fn mark_read(
        &self,
        owner: UserId,
        id: NotificationId,
    ) -> Result<Notification, NotificationStoreError> {
        let row = sqlx::query(&format!(
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2 RETURNING {COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(owner.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("mark_read", e))?
        .ok_or(NotificationStoreError::NotFound)?;

        decode(&row)
    }
}

async fn insert_row<'e, E>(executor: E, n: &Notification) -> Result<(), NotificationStoreError>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO notifications (id, user_id, type, message, payload, is_read, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(n.id.as_uuid())
    .bind(n.user_id.as_uuid())
    .bind(n.kind.as_str())
    .bind(&n.message)
    .bind(&n.payload)
    .bind(n.is_read)
    .bind(n.created_at)
    .execute(executor)
    .await
    .map_err(|e| map_sqlx_error("insert_notification", e))?;
    Ok(())
}

/// Map SQLx errors to NotificationStoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> NotificationStoreError {
    if is_unique_violation(&err) {
        return NotificationStoreError::Conflict(format!(
            "unique violation in {}: low-stock notification already stored",
            operation
        ));
    }

    match err {
        sqlx::Error::Database(db_err) => NotificationStoreError::Storage(format!(
            "database error in {}: {}",
            operation,
            db_err.message()
        )),
        sqlx::Error::PoolClosed => {
            NotificationStoreError::Storage(format!("connection pool closed in {}", operation))
        }
        _ => NotificationStoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}

/// Check if an error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

// SQLx row types

#[derive(Debug)]
struct NotificationRow {
    id: uuid::Uuid,
    user_id: uuid::Uuid,
    kind: String,
    message: String,
    payload: serde_json::Value,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for NotificationRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(NotificationRow {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            kind: row.try_get("type")?,
            message: row.try_get("message")?,
            payload: row.try_get("payload")?,
            is_read: row.try_get("is_read")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<NotificationRow> for Notification {
    type Error = NotificationStoreError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let kind = NotificationType::from_str(&row.kind).map_err(|e| {
            NotificationStoreError::Storage(format!("notification {}: {e}", row.id))
        })?;

        Ok(Notification {
            id: NotificationId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            kind,
            message: row.message,
            payload: row.payload,
            is_read: row.is_read,
            created_at: row.created_at,
        })
    }
}

fn decode(row: &sqlx::postgres::PgRow) -> Result<Notification, NotificationStoreError> {
    NotificationRow::from_row(row)
        .map_err(|e| NotificationStoreError::Storage(format!("failed to decode notification row: {e}")))?
        .try_into()
}
