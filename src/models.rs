//! Data models.

use serde::{Deserialize, Serialize};

use crate::errors::AisTrackerError;

/// Source tag written by the streaming ingestion path.
///
/// Other ingestion paths (poller, scrapers, batch import) write their own
/// tags; the (mmsi, ts, source) uniqueness key keeps them from colliding.
pub const SOURCE_STREAM: &str = "stream";

/// Maritime Mobile Service Identity (MMSI)
///
/// A unique nine-digit number for identifying vessels in AIS messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mmsi(u32);

impl TryFrom<u32> for Mmsi {
    type Error = AisTrackerError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value > 999_999_999 {
            return Err(AisTrackerError::InvalidMmsi(value.to_string()));
        }
        Ok(Self(value))
    }
}

impl TryFrom<i64> for Mmsi {
    type Error = AisTrackerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        let narrowed =
            u32::try_from(value).map_err(|_| AisTrackerError::InvalidMmsi(value.to_string()))?;
        Self::try_from(narrowed)
    }
}

impl Mmsi {
    /// Get the raw MMSI value
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Mmsi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coarse vessel class derived from the AIS ship-type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShipClass {
    Tanker,
    Cargo,
}

impl ShipClass {
    /// Map an AIS ship-type code to a coarse class.
    ///
    /// Codes 80-89 are tankers, 70-79 cargo ships. Everything else is
    /// left unclassified.
    pub fn from_type_code(code: i64) -> Option<Self> {
        match code {
            80..=89 => Some(ShipClass::Tanker),
            70..=79 => Some(ShipClass::Cargo),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShipClass::Tanker => "Tanker",
            ShipClass::Cargo => "Cargo",
        }
    }
}

/// One vessel observation produced by an ingestion path.
///
/// Immutable once stored; duplicate delivery on (mmsi, ts, source) is a
/// silent no-op at the store layer.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionRecord {
    pub mmsi: Mmsi,
    /// Observation timestamp, seconds since Unix epoch.
    pub ts: i64,
    pub lat: f64,
    pub lon: f64,
    /// Speed over ground in knots
    pub sog: Option<f64>,
    /// Course over ground in degrees
    pub cog: Option<f64>,
    /// True heading in degrees
    pub heading: Option<f64>,
    /// Maximum present static draught in m
    pub draught: Option<f64>,
    /// Navigational status code
    pub nav_status: Option<i64>,
    /// Which ingestion path produced this record
    pub source: String,
}

/// Opportunistic vessel metadata carried alongside a position.
///
/// Every field other than the MMSI may be absent; the store fills only
/// fields that are currently null ("first writer wins" per field).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VesselUpdate {
    pub imo: Option<u32>,
    pub name: Option<String>,
    pub ship_class: Option<ShipClass>,
    pub dwt: Option<f64>,
    pub max_draught: Option<f64>,
    pub company: Option<String>,
    pub cargo: Option<String>,
}

/// A position row as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct StoredPosition {
    pub mmsi: i64,
    pub ts: i64,
    pub lat: f64,
    pub lon: f64,
    pub sog: Option<f64>,
    pub cog: Option<f64>,
    pub heading: Option<f64>,
    pub draught: Option<f64>,
    pub nav_status: Option<i64>,
    pub source: String,
}

/// A vessel registry row as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct StoredVessel {
    pub mmsi: i64,
    pub imo: Option<i64>,
    pub name: Option<String>,
    pub ship_type: Option<String>,
    pub dwt: Option<f64>,
    pub max_draught: Option<f64>,
    pub company: Option<String>,
    pub cargo: Option<String>,
}

/// Operator-maintained watchlist entry.
///
/// Independent lifecycle from position records; never written by the
/// ingestion core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WatchlistEntry {
    pub mmsi: i64,
    pub name: Option<String>,
    pub ship_class: Option<String>,
    pub favorite: bool,
}
