//! Position store.
//!
//! A single SQLite file shared by every ingestion path and the read API.
//! Writers never coordinate beyond the (mmsi, ts, source) uniqueness
//! constraint: duplicate inserts are silent no-ops and vessel metadata is
//! filled first-writer-wins per field.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::info;

use crate::errors::AisTrackerError;
use crate::models::{Mmsi, PositionRecord, StoredPosition, StoredVessel, VesselUpdate, WatchlistEntry};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS ships(
        mmsi INTEGER PRIMARY KEY,
        imo INTEGER,
        name TEXT,
        ship_type TEXT,
        dwt REAL,
        max_draught REAL,
        company TEXT,
        cargo TEXT
    )",
    "CREATE TABLE IF NOT EXISTS positions(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        mmsi INTEGER,
        ts INTEGER,
        lat REAL,
        lon REAL,
        sog REAL,
        cog REAL,
        heading REAL,
        draught REAL,
        nav_status INTEGER,
        source TEXT,
        UNIQUE(mmsi, ts, source)
    )",
    "CREATE INDEX IF NOT EXISTS idx_positions_mmsi_ts ON positions(mmsi, ts)",
    "CREATE TABLE IF NOT EXISTS watchlist(
        mmsi INTEGER PRIMARY KEY,
        name TEXT,
        ship_class TEXT,
        favorite INTEGER NOT NULL DEFAULT 0
    )",
];

/// Shared handle to the position store
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the store at `path` and ensure the schema exists.
    pub async fn connect(path: &Path) -> Result<Self, AisTrackerError> {
        info!("Opening database at {}", path.display());

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    async fn ensure_schema(&self) -> Result<(), AisTrackerError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Record one decoded observation: vessel upsert plus position insert.
    ///
    /// Returns whether the position was actually inserted (false for a
    /// duplicate delivery).
    pub async fn record_observation(
        &self,
        position: &PositionRecord,
        vessel: &VesselUpdate,
    ) -> Result<bool, AisTrackerError> {
        self.upsert_vessel(position.mmsi, vessel).await?;
        self.insert_position_if_absent(position).await
    }

    /// Insert a vessel row, or fill only currently-null fields of an
    /// existing one. A populated field is never overwritten, regardless of
    /// which source supplied it first.
    pub async fn upsert_vessel(
        &self,
        mmsi: Mmsi,
        update: &VesselUpdate,
    ) -> Result<(), AisTrackerError> {
        sqlx::query(
            "INSERT INTO ships (mmsi, imo, name, ship_type, dwt, max_draught, company, cargo)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(mmsi) DO UPDATE SET
                imo = COALESCE(ships.imo, excluded.imo),
                name = COALESCE(ships.name, excluded.name),
                ship_type = COALESCE(ships.ship_type, excluded.ship_type),
                dwt = COALESCE(ships.dwt, excluded.dwt),
                max_draught = COALESCE(ships.max_draught, excluded.max_draught),
                company = COALESCE(ships.company, excluded.company),
                cargo = COALESCE(ships.cargo, excluded.cargo)",
        )
        .bind(mmsi.value() as i64)
        .bind(update.imo.map(i64::from))
        .bind(update.name.as_deref())
        .bind(update.ship_class.map(|class| class.as_str()))
        .bind(update.dwt)
        .bind(update.max_draught)
        .bind(update.company.as_deref())
        .bind(update.cargo.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert a position unless (mmsi, ts, source) already exists.
    ///
    /// Duplicate delivery is a successful no-op, not an error.
    pub async fn insert_position_if_absent(
        &self,
        record: &PositionRecord,
    ) -> Result<bool, AisTrackerError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO positions
                (mmsi, ts, lat, lon, sog, cog, heading, draught, nav_status, source)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(record.mmsi.value() as i64)
        .bind(record.ts)
        .bind(record.lat)
        .bind(record.lon)
        .bind(record.sog)
        .bind(record.cog)
        .bind(record.heading)
        .bind(record.draught)
        .bind(record.nav_status)
        .bind(record.source.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Most recent position for a vessel, if any has been recorded.
    pub async fn latest_position(
        &self,
        mmsi: Mmsi,
    ) -> Result<Option<StoredPosition>, AisTrackerError> {
        let row = sqlx::query_as::<_, StoredPosition>(
            "SELECT mmsi, ts, lat, lon, sog, cog, heading, draught, nav_status, source
             FROM positions WHERE mmsi = ?1 ORDER BY ts DESC LIMIT 1",
        )
        .bind(mmsi.value() as i64)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Up to `limit` most recent positions for a vessel, newest first.
    pub async fn history(
        &self,
        mmsi: Mmsi,
        limit: u32,
    ) -> Result<Vec<StoredPosition>, AisTrackerError> {
        let rows = sqlx::query_as::<_, StoredPosition>(
            "SELECT mmsi, ts, lat, lon, sog, cog, heading, draught, nav_status, source
             FROM positions WHERE mmsi = ?1 ORDER BY ts DESC LIMIT ?2",
        )
        .bind(mmsi.value() as i64)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Registry entry for a vessel, if it has been sighted by any source.
    pub async fn vessel(&self, mmsi: Mmsi) -> Result<Option<StoredVessel>, AisTrackerError> {
        let row = sqlx::query_as::<_, StoredVessel>(
            "SELECT mmsi, imo, name, ship_type, dwt, max_draught, company, cargo
             FROM ships WHERE mmsi = ?1",
        )
        .bind(mmsi.value() as i64)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// All operator watchlist entries, ordered by MMSI.
    pub async fn watchlist(&self) -> Result<Vec<WatchlistEntry>, AisTrackerError> {
        let rows = sqlx::query_as::<_, WatchlistEntry>(
            "SELECT mmsi, name, ship_class, favorite FROM watchlist ORDER BY mmsi",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Create or replace a watchlist entry. Unlike vessel upserts these are
    /// operator edits, so new values win.
    pub async fn upsert_watchlist_entry(
        &self,
        entry: &WatchlistEntry,
    ) -> Result<(), AisTrackerError> {
        sqlx::query(
            "INSERT INTO watchlist (mmsi, name, ship_class, favorite)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(mmsi) DO UPDATE SET
                name = excluded.name,
                ship_class = excluded.ship_class,
                favorite = excluded.favorite",
        )
        .bind(entry.mmsi)
        .bind(entry.name.as_deref())
        .bind(entry.ship_class.as_deref())
        .bind(entry.favorite)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Remove a watchlist entry; returns whether one existed.
    pub async fn remove_watchlist_entry(&self, mmsi: Mmsi) -> Result<bool, AisTrackerError> {
        let result = sqlx::query("DELETE FROM watchlist WHERE mmsi = ?1")
            .bind(mmsi.value() as i64)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
