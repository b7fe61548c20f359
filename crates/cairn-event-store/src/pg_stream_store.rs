//! `PostgreSQL` implementation of the `StreamStore` port.
//!
//! Each stream has a row in `streams` holding its head position. Appends lock
//! that row (`FOR UPDATE`) inside a transaction, compare it with the expected
//! revision, insert the events and move the head, so concurrent writers to
//! one stream serialize and exactly one of them wins a given revision.
//! Writers racing to create a stream serialize on its `streams` row insert.
//! Event ids are unique across all streams.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use cairn_core::error::DomainError;
use cairn_core::stream::{
    AppendResult, EventData, ExpectedRevision, ReadDirection, RecordedEvent,
    RecordedEventStream, StreamPosition, StreamStore,
};

use crate::config::StoreConfig;
use crate::schema::CREATE_STREAM_TABLES;

const SELECT_FORWARDS: &str = r"
SELECT event_id, event_type, data, metadata, created_at, stream_id, position
FROM stream_events
WHERE stream_id = $1 AND position >= $2
ORDER BY position ASC
LIMIT $3
";

const SELECT_BACKWARDS: &str = r"
SELECT event_id, event_type, data, metadata, created_at, stream_id, position
FROM stream_events
WHERE stream_id = $1 AND position <= $2
ORDER BY position DESC
LIMIT $3
";

/// Unique key on `stream_events.event_id`.
const EVENT_ID_CONSTRAINT: &str = "stream_events_event_id_key";

/// PostgreSQL-backed stream store.
#[derive(Debug, Clone)]
pub struct PgStreamStore {
    pool: PgPool,
}

fn infrastructure(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(format!("postgres: {err}"))
}

fn to_position(value: i64) -> Result<u64, DomainError> {
    u64::try_from(value)
        .map_err(|_| DomainError::Infrastructure(format!("negative stream position {value}")))
}

fn to_column(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn recorded_from_row(row: &PgRow) -> Result<RecordedEvent, DomainError> {
    let event_id: Uuid = row.try_get("event_id").map_err(infrastructure)?;
    let event_type: String = row.try_get("event_type").map_err(infrastructure)?;
    let data: Vec<u8> = row.try_get("data").map_err(infrastructure)?;
    let metadata: Vec<u8> = row.try_get("metadata").map_err(infrastructure)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(infrastructure)?;
    let stream_id: String = row.try_get("stream_id").map_err(infrastructure)?;
    let position: i64 = row.try_get("position").map_err(infrastructure)?;
    Ok(RecordedEvent {
        event_id,
        event_type,
        data,
        metadata,
        created_at,
        stream_id,
        position: to_position(position)?,
    })
}

impl PgStreamStore {
    /// Creates a new `PgStreamStore` over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool sized from `config`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if no database URL is configured and
    /// `DomainError::Infrastructure` if the connection fails.
    pub async fn connect(config: &StoreConfig) -> Result<Self, DomainError> {
        let url = config.database_url.as_deref().ok_or_else(|| {
            DomainError::Validation("a database URL is required for PgStreamStore".into())
        })?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(url)
            .await
            .map_err(infrastructure)?;
        Ok(Self::new(pool))
    }

    /// Creates the stream tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the DDL fails.
    pub async fn ensure_schema(&self) -> Result<(), DomainError> {
        sqlx::raw_sql(CREATE_STREAM_TABLES)
            .execute(&self.pool)
            .await
            .map_err(infrastructure)?;
        Ok(())
    }

    async fn head(&self, stream_id: &str) -> Result<Option<u64>, DomainError> {
        let head: Option<i64> = sqlx::query_scalar("SELECT head FROM streams WHERE stream_id = $1")
            .bind(stream_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(infrastructure)?;
        head.map(to_position).transpose()
    }

    async fn locked_head(
        tx: &mut Transaction<'_, Postgres>,
        stream_id: &str,
    ) -> Result<Option<u64>, DomainError> {
        let head: Option<i64> =
            sqlx::query_scalar("SELECT head FROM streams WHERE stream_id = $1 FOR UPDATE")
                .bind(stream_id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(infrastructure)?;
        head.map(to_position).transpose()
    }

    /// Registers a new stream. Returns `false` if another writer registered
    /// it first; the insert waits for that writer's transaction to finish.
    async fn create_stream(
        tx: &mut Transaction<'_, Postgres>,
        stream_id: &str,
    ) -> Result<bool, DomainError> {
        let created = sqlx::query(
            "INSERT INTO streams (stream_id, head) VALUES ($1, 0) ON CONFLICT (stream_id) DO NOTHING",
        )
        .bind(stream_id)
        .execute(&mut **tx)
        .await
        .map_err(infrastructure)?;
        Ok(created.rows_affected() == 1)
    }

    /// Locks the stream head and checks it against `expected`. A stream that
    /// is still absent is registered; losing that registration to another
    /// writer means re-reading the head it left behind and checking again.
    async fn checked_head(
        tx: &mut Transaction<'_, Postgres>,
        stream_id: &str,
        expected: ExpectedRevision,
        register: bool,
    ) -> Result<Option<u64>, DomainError> {
        let conflict = |actual| DomainError::ConcurrencyConflict {
            stream_id: stream_id.to_owned(),
            expected,
            actual,
        };

        let head = Self::locked_head(tx, stream_id).await?;
        if !expected.matches(head) {
            return Err(conflict(head));
        }
        if head.is_some() || !register || Self::create_stream(tx, stream_id).await? {
            return Ok(head);
        }

        let head = Self::locked_head(tx, stream_id).await?;
        debug!(stream_id, ?head, "stream registered concurrently");
        if expected.matches(head) {
            Ok(head)
        } else {
            Err(conflict(head))
        }
    }
}

/// Maps a failed event insert. The head row lock serializes positions, so a
/// duplicate event id is the only unique violation expected here.
fn insert_error(
    err: sqlx::Error,
    stream_id: &str,
    event_id: Uuid,
    expected: ExpectedRevision,
    head: Option<u64>,
) -> DomainError {
    let violated = match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Some(db.constraint().unwrap_or_default().to_owned())
        }
        _ => None,
    };
    match violated.as_deref() {
        None => infrastructure(err),
        Some(EVENT_ID_CONSTRAINT) => {
            DomainError::Infrastructure(format!("event {event_id} is already recorded"))
        }
        Some(_) => DomainError::ConcurrencyConflict {
            stream_id: stream_id.to_owned(),
            expected,
            actual: head,
        },
    }
}

#[async_trait]
impl StreamStore for PgStreamStore {
    async fn read_stream(
        &self,
        stream_id: &str,
        direction: ReadDirection,
        from: StreamPosition,
        max_count: u64,
    ) -> Result<RecordedEventStream, DomainError> {
        let Some(head) = self.head(stream_id).await? else {
            return Err(DomainError::StreamNotFound(stream_id.to_owned()));
        };

        let (sql, start) = match (direction, from) {
            (ReadDirection::Forwards, StreamPosition::Start) => (SELECT_FORWARDS, 1),
            (ReadDirection::Forwards, StreamPosition::End) => (SELECT_FORWARDS, head),
            (ReadDirection::Backwards, StreamPosition::Start) => (SELECT_BACKWARDS, 1),
            (ReadDirection::Backwards, StreamPosition::End) => (SELECT_BACKWARDS, head),
            (ReadDirection::Forwards, StreamPosition::At(position)) => (SELECT_FORWARDS, position),
            (ReadDirection::Backwards, StreamPosition::At(position)) => {
                (SELECT_BACKWARDS, position)
            }
        };

        let rows = sqlx::query(sql)
            .bind(stream_id)
            .bind(to_column(start))
            .bind(to_column(max_count))
            .fetch_all(&self.pool)
            .await
            .map_err(infrastructure)?;

        let events: Vec<Result<RecordedEvent, DomainError>> =
            rows.iter().map(recorded_from_row).collect();
        Ok(Box::pin(stream::iter(events)))
    }

    async fn append_to_stream(
        &self,
        stream_id: &str,
        expected: ExpectedRevision,
        events: Vec<EventData>,
    ) -> Result<AppendResult, DomainError> {
        let mut tx = self.pool.begin().await.map_err(infrastructure)?;

        let head = Self::checked_head(&mut tx, stream_id, expected, !events.is_empty()).await?;
        if events.is_empty() {
            return Ok(AppendResult {
                next_expected_revision: head.unwrap_or(0),
            });
        }

        let mut position = head.unwrap_or(0);
        for data in events {
            position += 1;
            let event_id = data.event_id;
            sqlx::query(
                r"
INSERT INTO stream_events
    (stream_id, position, event_id, event_type, content_type, data, metadata, created_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
",
            )
            .bind(stream_id)
            .bind(to_column(position))
            .bind(data.event_id)
            .bind(data.event_type)
            .bind(data.content_type)
            .bind(data.data)
            .bind(data.metadata)
            .execute(&mut *tx)
            .await
            .map_err(|err| insert_error(err, stream_id, event_id, expected, head))?;
        }

        sqlx::query("UPDATE streams SET head = $2 WHERE stream_id = $1")
            .bind(stream_id)
            .bind(to_column(position))
            .execute(&mut *tx)
            .await
            .map_err(infrastructure)?;

        tx.commit().await.map_err(infrastructure)?;
        debug!(stream_id, head = position, "events appended");

        Ok(AppendResult {
            next_expected_revision: position,
        })
    }
}
