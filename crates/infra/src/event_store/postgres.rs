//! Postgres-backed event store.
//!
//! Persists streams in a single `events` table:
//!
//! ```sql
//! CREATE TABLE events (
//!     event_id        UUID PRIMARY KEY,
//!     aggregate_id    UUID        NOT NULL,
//!     aggregate_type  TEXT        NOT NULL,
//!     sequence_number BIGINT      NOT NULL CHECK (sequence_number > 0),
//!     event_type      TEXT        NOT NULL,
//!     event_version   INT         NOT NULL,
//!     occurred_at     TIMESTAMPTZ NOT NULL,
//!     recorded_at     TIMESTAMPTZ NOT NULL,
//!     actor_id        UUID        NOT NULL,
//!     actor_role      TEXT        NOT NULL,
//!     payload         JSONB       NOT NULL,
//!     UNIQUE (aggregate_id, sequence_number)
//! );
//! ```
//!
//! The unique constraint on `(aggregate_id, sequence_number)` is the real
//! concurrency guard: two transactions that both pass the version check will
//! race to insert the same sequence number, and the loser gets a `23505`
//! unique violation, which maps to [`EventStoreError::Concurrency`].

use chrono::{DateTime, Utc};
use core::str::FromStr;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::sync::Arc;
use tracing::{Span, instrument};

use chancery_core::{Actor, AggregateId, ExpectedVersion, StaffRole, UserId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// Append-only event store on PostgreSQL.
///
/// The append path runs inside a transaction: read the current stream version
/// with `MAX(sequence_number)`, validate it against [`ExpectedVersion`],
/// insert the batch, commit. Concurrent appends that slip between the check
/// and the insert are caught by the unique constraint and surface as
/// [`EventStoreError::Concurrency`], same as a failed version check.
#[derive(Debug, Clone)]
pub struct PostgresEventStore {
    pool: Arc<PgPool>,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Load one aggregate stream in sequence order.
    #[instrument(skip(self), fields(aggregate_id = %aggregate_id.as_uuid()), err)]
    pub async fn load_stream_events(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                event_id,
                aggregate_id,
                aggregate_type,
                sequence_number,
                event_type,
                event_version,
                occurred_at,
                recorded_at,
                actor_id,
                actor_role,
                payload
            FROM events
            WHERE aggregate_id = $1
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(aggregate_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_stream", e))?;

        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            stored.push(StoredEventRow::read(&row)?.try_into()?);
        }

        Span::current().record("event_count", stored.len());
        Ok(stored)
    }

    /// Load every event across all streams, in global replay order.
    #[instrument(skip(self), err)]
    pub async fn load_all_events(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                event_id,
                aggregate_id,
                aggregate_type,
                sequence_number,
                event_type,
                event_version,
                occurred_at,
                recorded_at,
                actor_id,
                actor_role,
                payload
            FROM events
            ORDER BY recorded_at ASC, aggregate_id ASC, sequence_number ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_all", e))?;

        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            stored.push(StoredEventRow::read(&row)?.try_into()?);
        }

        Span::current().record("event_count", stored.len());
        Ok(stored)
    }

    /// Append a batch with optimistic concurrency control.
    #[instrument(
        skip(self, events),
        fields(event_count = events.len(), expected_version = ?expected_version),
        err
    )]
    pub async fn append_events(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let first = events.first().ok_or_else(|| {
            EventStoreError::InvalidAppend("append called with an empty batch".into())
        })?;
        let aggregate_id = first.aggregate_id;
        let aggregate_type = first.aggregate_type.clone();

        for (idx, event) in events.iter().enumerate() {
            if event.aggregate_id != aggregate_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch contains multiple aggregate_ids (index {idx})"
                )));
            }
            if event.aggregate_type != aggregate_type {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch contains multiple aggregate_types (index {idx})"
                )));
            }
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let (current_version, existing_type) =
            check_stream_version(&mut tx, aggregate_id).await?;

        if let Some(existing_type) = existing_type {
            if existing_type != aggregate_type {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{existing_type}', attempted append with '{aggregate_type}'"
                )));
            }
        }

        if !expected_version.matches(current_version) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(EventStoreError::Concurrency(format!(
                "optimistic concurrency check failed: expected {expected_version:?}, found {current_version}"
            )));
        }

        let recorded_at = Utc::now();
        let mut stored = Vec::with_capacity(events.len());
        let mut next_sequence = current_version + 1;

        for event in events {
            sqlx::query(
                r#"
                INSERT INTO events (
                    event_id,
                    aggregate_id,
                    aggregate_type,
                    sequence_number,
                    event_type,
                    event_version,
                    occurred_at,
                    recorded_at,
                    actor_id,
                    actor_role,
                    payload
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(event.event_id)
            .bind(event.aggregate_id.as_uuid())
            .bind(&event.aggregate_type)
            .bind(next_sequence as i64)
            .bind(&event.event_type)
            .bind(event.event_version as i32)
            .bind(event.occurred_at)
            .bind(recorded_at)
            .bind(event.actor.user_id.as_uuid())
            .bind(event.actor.role.as_str())
            .bind(&event.payload)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    EventStoreError::Concurrency(format!(
                        "concurrent append detected: sequence_number {next_sequence} already exists"
                    ))
                } else {
                    map_sqlx_error("insert_event", e)
                }
            })?;

            stored.push(StoredEvent {
                event_id: event.event_id,
                aggregate_id: event.aggregate_id,
                aggregate_type: event.aggregate_type,
                sequence_number: next_sequence,
                event_type: event.event_type,
                event_version: event.event_version,
                occurred_at: event.occurred_at,
                recorded_at,
                actor: event.actor,
                payload: event.payload,
            });
            next_sequence += 1;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Span::current().record("committed_events", stored.len());
        Ok(stored)
    }
}

/// Current version and recorded aggregate type of a stream.
///
/// `(0, None)` means the stream does not exist yet.
async fn check_stream_version(
    tx: &mut Transaction<'_, Postgres>,
    aggregate_id: AggregateId,
) -> Result<(u64, Option<String>), EventStoreError> {
    let row = sqlx::query(
        r#"
        SELECT
            COALESCE(MAX(sequence_number), 0) AS current_version,
            MAX(aggregate_type) AS aggregate_type
        FROM events
        WHERE aggregate_id = $1
        "#,
    )
    .bind(aggregate_id.as_uuid())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("check_stream_version", e))?;

    let current_version: Option<i64> = row
        .try_get("current_version")
        .map_err(|e| EventStoreError::Backend(format!("failed to read current_version: {e}")))?;
    let aggregate_type: Option<String> = row
        .try_get("aggregate_type")
        .map_err(|e| EventStoreError::Backend(format!("failed to read aggregate_type: {e}")))?;

    Ok((current_version.unwrap_or(0) as u64, aggregate_type))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> EventStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => EventStoreError::Concurrency(msg),
                Some("23503") | Some("23514") => EventStoreError::InvalidAppend(msg),
                _ => EventStoreError::Backend(msg),
            }
        }
        other => EventStoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

#[derive(Debug)]
struct StoredEventRow {
    event_id: uuid::Uuid,
    aggregate_id: uuid::Uuid,
    aggregate_type: String,
    sequence_number: i64,
    event_type: String,
    event_version: i32,
    occurred_at: DateTime<Utc>,
    recorded_at: DateTime<Utc>,
    actor_id: uuid::Uuid,
    actor_role: String,
    payload: serde_json::Value,
}

impl StoredEventRow {
    fn read(row: &sqlx::postgres::PgRow) -> Result<Self, EventStoreError> {
        let read = |e: sqlx::Error| {
            EventStoreError::Backend(format!("failed to decode event row: {e}"))
        };
        Ok(StoredEventRow {
            event_id: row.try_get("event_id").map_err(read)?,
            aggregate_id: row.try_get("aggregate_id").map_err(read)?,
            aggregate_type: row.try_get("aggregate_type").map_err(read)?,
            sequence_number: row.try_get("sequence_number").map_err(read)?,
            event_type: row.try_get("event_type").map_err(read)?,
            event_version: row.try_get("event_version").map_err(read)?,
            occurred_at: row.try_get("occurred_at").map_err(read)?,
            recorded_at: row.try_get("recorded_at").map_err(read)?,
            actor_id: row.try_get("actor_id").map_err(read)?,
            actor_role: row.try_get("actor_role").map_err(read)?,
            payload: row.try_get("payload").map_err(read)?,
        })
    }
}

impl TryFrom<StoredEventRow> for StoredEvent {
    type Error = EventStoreError;

    fn try_from(row: StoredEventRow) -> Result<Self, Self::Error> {
        let role = StaffRole::from_str(&row.actor_role).map_err(|e| {
            EventStoreError::Backend(format!("stored actor_role is not a known role: {e}"))
        })?;

        Ok(StoredEvent {
            event_id: row.event_id,
            aggregate_id: AggregateId::from_uuid(row.aggregate_id),
            aggregate_type: row.aggregate_type,
            sequence_number: row.sequence_number as u64,
            event_type: row.event_type,
            event_version: row.event_version as u32,
            occurred_at: row.occurred_at,
            recorded_at: row.recorded_at,
            actor: Actor::new(UserId::from_uuid(row.actor_id), role),
            payload: row.payload,
        })
    }
}

// The EventStore trait is synchronous; bridge into the async pool via the
// ambient tokio runtime. `block_in_place` keeps this callable from async
// handler threads on a multi-thread runtime.

fn bridge<T>(
    fut: impl Future<Output = Result<T, EventStoreError>>,
) -> Result<T, EventStoreError> {
    let handle = tokio::runtime::Handle::try_current().map_err(|_| {
        EventStoreError::Backend(
            "PostgresEventStore requires a tokio runtime context".to_string(),
        )
    })?;
    tokio::task::block_in_place(|| handle.block_on(fut))
}

impl EventStore for PostgresEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Err(EventStoreError::InvalidAppend(
                "append called with an empty batch".into(),
            ));
        }
        bridge(self.append_events(events, expected_version))
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        bridge(self.load_stream_events(aggregate_id))
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        bridge(self.load_all_events())
    }
}
