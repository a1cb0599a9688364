//! SQLite pools for the execution store.
//!
//! Two pools over one database file: a writer pinned to a single connection
//! and a small read-only pool. Pinning the writer is a correctness
//! requirement, not a tuning choice: the one-statement claim in
//! [`super::execution`] marks a batch of rows running and returns them in
//! the same statement, and it is the serialization of every mutation
//! through that one connection that keeps competing claims from ever
//! observing each other's candidate rows. WAL mode keeps readers unblocked
//! while claims and checkpoints flow through the writer.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

/// The writer stays at exactly one connection; the atomic claim depends on
/// every mutation serializing through it.
const WRITER_CONNECTIONS: u32 = 1;

/// Upper bound on concurrent read connections.
const READER_CONNECTIONS: u32 = 8;

/// How long a connection waits on a locked database before erroring.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Reader/writer pool pair for the execution store.
#[derive(Clone)]
pub struct StorePools {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

impl StorePools {
    /// Open both pools and bring the schema up to date.
    ///
    /// The writer opens first and runs migrations on its single connection;
    /// the read-only pool opens afterwards so it never sees a half-migrated
    /// schema.
    pub async fn open(database_url: &str) -> Result<Self, sqlx::Error> {
        let writer = SqlitePoolOptions::new()
            .max_connections(WRITER_CONNECTIONS)
            .connect_with(connect_options(database_url)?)
            .await?;

        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(READER_CONNECTIONS)
            .connect_with(connect_options(database_url)?.read_only(true))
            .await?;

        Ok(Self { reader, writer })
    }
}

fn connect_options(database_url: &str) -> Result<SqliteConnectOptions, sqlx::Error> {
    Ok(SqliteConnectOptions::from_str(database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT)
        .create_if_missing(true))
}
