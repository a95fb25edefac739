//! Read-only query API over the position store.

use std::net::SocketAddr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::database::Database;
use crate::errors::AisTrackerError;
use crate::models::{Mmsi, StoredPosition, WatchlistEntry};

const DEFAULT_HISTORY_LIMIT: u32 = 200;

type ApiError = (StatusCode, String);

pub fn router(db: Database) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/location/:mmsi", get(location))
        .route("/history/:mmsi", get(history))
        .route("/watchlist", get(watchlist))
        .with_state(db)
}

/// Serve the read API on `listen`, sharing the store pool with ingestion.
pub async fn serve(db: Database, listen: SocketAddr) -> Result<(), AisTrackerError> {
    info!("Read API listening on {listen}");
    let listener = tokio::net::TcpListener::bind(listen).await?;
    axum::serve(listener, router(db)).await?;
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn location(
    State(db): State<Database>,
    Path(mmsi): Path<u32>,
) -> Result<Json<StoredPosition>, ApiError> {
    let mmsi = parse_mmsi(mmsi)?;
    match db.latest_position(mmsi).await.map_err(internal)? {
        Some(position) => Ok(Json(position)),
        None => Err((StatusCode::NOT_FOUND, "No position found".to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    limit: Option<u32>,
}

async fn history(
    State(db): State<Database>,
    Path(mmsi): Path<u32>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<StoredPosition>>, ApiError> {
    let mmsi = parse_mmsi(mmsi)?;
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let rows = db.history(mmsi, limit).await.map_err(internal)?;
    Ok(Json(rows))
}

async fn watchlist(State(db): State<Database>) -> Result<Json<Vec<WatchlistEntry>>, ApiError> {
    let entries = db.watchlist().await.map_err(internal)?;
    Ok(Json(entries))
}

fn parse_mmsi(raw: u32) -> Result<Mmsi, ApiError> {
    Mmsi::try_from(raw).map_err(|_| (StatusCode::BAD_REQUEST, format!("invalid MMSI: {raw}")))
}

fn internal(err: AisTrackerError) -> ApiError {
    error!("Store read failed: {err}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal error".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PositionRecord, VesselUpdate};
    use tempfile::tempdir;

    async fn seeded_db(dir: &tempfile::TempDir) -> Database {
        let db = Database::connect(&dir.path().join("api.db")).await.unwrap();
        let mmsi = Mmsi::try_from(123_456_789u32).unwrap();
        for ts in [100, 200, 300] {
            let record = PositionRecord {
                mmsi,
                ts,
                lat: 10.5,
                lon: -50.2,
                sog: Some(12.3),
                cog: None,
                heading: None,
                draught: None,
                nav_status: None,
                source: "stream".to_string(),
            };
            db.record_observation(&record, &VesselUpdate::default())
                .await
                .unwrap();
        }
        db
    }

    #[tokio::test]
    async fn location_returns_latest_record() {
        let dir = tempdir().unwrap();
        let db = seeded_db(&dir).await;

        let Json(position) = location(State(db), Path(123_456_789)).await.unwrap();
        assert_eq!(position.ts, 300);
        assert_eq!(position.lat, 10.5);
        assert_eq!(position.source, "stream");
    }

    #[tokio::test]
    async fn location_unknown_vessel_is_not_found() {
        let dir = tempdir().unwrap();
        let db = seeded_db(&dir).await;

        let err = location(State(db), Path(999_999_999)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn history_is_newest_first_and_limited() {
        let dir = tempdir().unwrap();
        let db = seeded_db(&dir).await;

        let Json(rows) = history(
            State(db),
            Path(123_456_789),
            Query(HistoryParams { limit: Some(2) }),
        )
        .await
        .unwrap();

        let stamps: Vec<i64> = rows.iter().map(|row| row.ts).collect();
        assert_eq!(stamps, vec![300, 200]);
    }
}
