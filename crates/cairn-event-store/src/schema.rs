//! Stream store database schema.
//!
//! Kept in step with `migrations/0001_create_streams.sql`.

/// SQL to create the stream head and stream event tables.
pub const CREATE_STREAM_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS streams (
    stream_id  VARCHAR(255) PRIMARY KEY,
    head       BIGINT NOT NULL
);

CREATE TABLE IF NOT EXISTS stream_events (
    stream_id    VARCHAR(255) NOT NULL REFERENCES streams (stream_id),
    position     BIGINT NOT NULL,
    event_id     UUID NOT NULL,
    event_type   VARCHAR(255) NOT NULL,
    content_type VARCHAR(255) NOT NULL,
    data         BYTEA NOT NULL,
    metadata     BYTEA NOT NULL,
    created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (stream_id, position),
    CONSTRAINT stream_events_event_id_key UNIQUE (event_id)
);
";
