use crate::domain::{events::DomainEvent, value_objects::BorrowingId};
use crate::ports::event_store::{EventStore as EventStoreTrait, Result, VersionConflict};
use async_trait::async_trait;
use sqlx::{PgPool, Row};

/// PostgreSQL implementation of EventStore
///
/// Stores domain events in an append-only event log.
/// Events are serialized as JSONB for flexible schema evolution.
pub struct EventStore {
    pool: PgPool,
}

impl EventStore {
    /// Create a new EventStore with a PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Map a unique violation on (aggregate_id, aggregate_version) to a version conflict
fn map_insert_error(
    err: sqlx::Error,
    aggregate_id: BorrowingId,
    expected_version: usize,
) -> Box<dyn std::error::Error + Send + Sync> {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => Box::new(VersionConflict {
            aggregate_id,
            expected_version,
        }),
        _ => Box::new(err),
    }
}

#[async_trait]
impl EventStoreTrait for EventStore {
    /// Append events to the event store
    ///
    /// All events of one call are stored atomically within a transaction.
    /// The stored version must equal `expected_version`, otherwise nothing is
    /// written and `VersionConflict` is returned. A concurrent writer that
    /// slips past the check is caught by the unique index on
    /// (aggregate_id, aggregate_version).
    /// Uses batch INSERT with UNNEST.
    async fn append(
        &self,
        aggregate_id: BorrowingId,
        expected_version: usize,
        events: Vec<DomainEvent>,
    ) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        // COALESCE handles NULL when no events exist for this aggregate
        let current_version: i32 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(aggregate_version), 0)
            FROM events
            WHERE aggregate_id = $1
            "#,
        )
        .bind(aggregate_id.value())
        .fetch_one(&mut *tx)
        .await?;

        let expected = i32::try_from(expected_version)?;
        if current_version != expected {
            tracing::debug!(
                %aggregate_id,
                current_version,
                expected_version,
                "Rejecting append on stale version"
            );
            return Err(Box::new(VersionConflict {
                aggregate_id,
                expected_version,
            }));
        }

        let mut versions = Vec::with_capacity(events.len());
        let mut event_types = Vec::with_capacity(events.len());
        let mut event_data_list = Vec::with_capacity(events.len());
        let mut occurred_at_list = Vec::with_capacity(events.len());

        for (i, event) in events.iter().enumerate() {
            versions.push(expected + i32::try_from(i)? + 1);
            event_types.push(event.event_type());
            event_data_list.push(serde_json::to_value(event)?);
            occurred_at_list.push(event.occurred_at());
        }

        let aggregate_types = vec!["Borrowing"; events.len()];

        sqlx::query(
            r#"
            INSERT INTO events (
                aggregate_id,
                aggregate_version,
                aggregate_type,
                event_type,
                event_data,
                occurred_at
            )
            SELECT $1, * FROM UNNEST($2::int[], $3::varchar[], $4::varchar[], $5::jsonb[], $6::timestamptz[])
            "#,
        )
        .bind(aggregate_id.value())
        .bind(&versions)
        .bind(&aggregate_types)
        .bind(&event_types)
        .bind(&event_data_list)
        .bind(&occurred_at_list)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_insert_error(e, aggregate_id, expected_version))?;

        tx.commit()
            .await
            .map_err(|e| map_insert_error(e, aggregate_id, expected_version))?;
        Ok(())
    }

    /// Load all events for an aggregate in the order they were appended
    async fn load(&self, aggregate_id: BorrowingId) -> Result<Vec<DomainEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT event_data
            FROM events
            WHERE aggregate_id = $1
            ORDER BY aggregate_version ASC
            "#,
        )
        .bind(aggregate_id.value())
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let event_data: serde_json::Value = row.get("event_data");
            let event: DomainEvent = serde_json::from_value(event_data)?;
            events.push(event);
        }

        Ok(events)
    }
}
