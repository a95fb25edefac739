//! Feed decoder.
//!
//! Turns one raw stream frame into at most one normalized position record.
//! Malformed input never escapes this boundary; the single exception is a
//! server error frame, which is surfaced as an error so the supervisor can
//! tear the connection down.

use serde_json::{Map, Value};

use crate::errors::AisTrackerError;
use crate::models::{Mmsi, PositionRecord, ShipClass, VesselUpdate, SOURCE_STREAM};

/// Why a frame produced no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Not parseable as JSON
    Malformed,
    /// MessageType other than the subscribed one
    WrongType,
    /// Ship-type code outside the tanker range while tanker-only is active
    Filtered,
    /// No MMSI in metadata or body, or not coercible to an integer
    NoId,
    /// Coordinates missing or not coercible to floats
    NoPosition,
}

impl Rejection {
    /// Whether the frame counts as unusable input.
    ///
    /// Wrong-type and filtered-out frames are expected traffic and stay
    /// out of the drop counters.
    pub fn is_unusable(&self) -> bool {
        matches!(
            self,
            Rejection::Malformed | Rejection::NoId | Rejection::NoPosition
        )
    }
}

/// Decoding outcome for a single frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Record {
        position: PositionRecord,
        vessel: VesselUpdate,
    },
    Rejected(Rejection),
}

/// Decode one raw inbound frame.
///
/// `now` is the ingestion wall clock in seconds since epoch; records are
/// stamped with it rather than any feed-supplied timestamp, so ordering is
/// local-time consistent across sources.
pub fn decode(raw: &str, tanker_only: bool, now: i64) -> Result<Decoded, AisTrackerError> {
    let frame: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(_) => return Ok(Decoded::Rejected(Rejection::Malformed)),
    };

    // Server error frames are JSON objects carrying "error" / "Error".
    // These terminate the connection rather than dropping a single frame.
    if let Some(object) = frame.as_object() {
        if object.contains_key("error") || object.contains_key("Error") {
            return Err(AisTrackerError::ServerError(frame.to_string()));
        }
    }

    if frame.get("MessageType").and_then(Value::as_str) != Some("PositionReport") {
        return Ok(Decoded::Rejected(Rejection::WrongType));
    }

    let meta = frame.get("MetaData").and_then(Value::as_object);
    let body = frame
        .get("Message")
        .and_then(|m| m.get("PositionReport"))
        .and_then(Value::as_object);

    // MMSI from metadata, falling back to the report body
    let mmsi = match field(meta, "MMSI")
        .or_else(|| field(body, "UserID"))
        .and_then(coerce_i64)
        .and_then(|raw| Mmsi::try_from(raw).ok())
    {
        Some(mmsi) => mmsi,
        None => return Ok(Decoded::Rejected(Rejection::NoId)),
    };

    // Ship type is not reliably present on position reports; the body
    // field wins over metadata when both appear.
    let ship_type = field(body, "Type").or_else(|| field(meta, "ShipType"));
    let type_code = ship_type.and_then(coerce_i64);
    if tanker_only && ship_type.is_some() {
        // A present but unparseable code passes through rather than
        // dropping the frame.
        if let Some(code) = type_code {
            if !(80..=89).contains(&code) {
                return Ok(Decoded::Rejected(Rejection::Filtered));
            }
        }
    }

    // Position: prefer metadata coordinates, fall back to the body pair
    let mut lat = field(meta, "latitude");
    let mut lon = field(meta, "longitude");
    if lat.is_none() || lon.is_none() {
        lat = field(body, "Latitude");
        lon = field(body, "Longitude");
    }
    let (lat, lon) = match (lat.and_then(coerce_f64), lon.and_then(coerce_f64)) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return Ok(Decoded::Rejected(Rejection::NoPosition)),
    };

    let position = PositionRecord {
        mmsi,
        ts: now,
        lat,
        lon,
        sog: field(body, "Sog").and_then(coerce_f64),
        cog: field(body, "Cog").and_then(coerce_f64),
        heading: field(body, "TrueHeading").and_then(coerce_f64),
        draught: field(body, "Draught").and_then(coerce_f64),
        nav_status: field(body, "NavigationalStatus").and_then(coerce_i64),
        source: SOURCE_STREAM.to_string(),
    };

    // Stream frames only ever mark tankers; richer classes come from
    // metadata-bearing sources.
    let vessel = VesselUpdate {
        name: field(meta, "ShipName").and_then(trimmed_string),
        ship_class: type_code
            .and_then(ShipClass::from_type_code)
            .filter(|class| *class == ShipClass::Tanker),
        ..Default::default()
    };

    Ok(Decoded::Record { position, vessel })
}

/// Look up a non-null field in an optional JSON section.
fn field<'a>(section: Option<&'a Map<String, Value>>, key: &str) -> Option<&'a Value> {
    section.and_then(|map| map.get(key)).filter(|v| !v.is_null())
}

/// Coerce a JSON value to an integer, accepting numbers and numeric strings.
fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Coerce a JSON value to a float, accepting numbers and numeric strings.
fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn trimmed_string(value: &Value) -> Option<String> {
    let trimmed = value.as_str()?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn decode_ok(raw: &str, tanker_only: bool) -> Decoded {
        decode(raw, tanker_only, NOW).unwrap()
    }

    #[test]
    fn decodes_position_report() {
        let raw = r#"{
            "MessageType": "PositionReport",
            "MetaData": {"MMSI": 123456789, "latitude": 10.5, "longitude": -50.2},
            "Message": {"PositionReport": {"Sog": 12.3}}
        }"#;

        match decode_ok(raw, false) {
            Decoded::Record { position, vessel } => {
                assert_eq!(position.mmsi.value(), 123456789);
                assert_eq!(position.ts, NOW);
                assert_eq!(position.lat, 10.5);
                assert_eq!(position.lon, -50.2);
                assert_eq!(position.sog, Some(12.3));
                assert_eq!(position.cog, None);
                assert_eq!(position.heading, None);
                assert_eq!(position.source, "stream");
                assert_eq!(vessel.name, None);
                assert_eq!(vessel.ship_class, None);
            }
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn stamps_ingestion_time_not_feed_time() {
        let raw = r#"{
            "MessageType": "PositionReport",
            "MetaData": {"MMSI": 123456789, "latitude": 1.0, "longitude": 2.0,
                         "time_utc": "2022-01-01 00:00:00 UTC"},
            "Message": {"PositionReport": {"Timestamp": 33}}
        }"#;

        match decode_ok(raw, false) {
            Decoded::Record { position, .. } => assert_eq!(position.ts, NOW),
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn ignores_other_message_types() {
        let raw = r#"{"MessageType": "ShipStaticData", "MetaData": {"MMSI": 1}}"#;
        let decoded = decode_ok(raw, false);
        assert_eq!(decoded, Decoded::Rejected(Rejection::WrongType));
        assert!(!Rejection::WrongType.is_unusable());
    }

    #[test]
    fn rejects_non_json() {
        assert_eq!(
            decode_ok("not json at all", false),
            Decoded::Rejected(Rejection::Malformed)
        );
        assert!(Rejection::Malformed.is_unusable());
    }

    #[test]
    fn server_error_frame_escapes() {
        let result = decode(r#"{"error": "rate limited"}"#, false, NOW);
        assert!(matches!(result, Err(AisTrackerError::ServerError(_))));

        let result = decode(r#"{"Error": "Api Key Is Not Valid"}"#, false, NOW);
        assert!(matches!(result, Err(AisTrackerError::ServerError(_))));
    }

    #[test]
    fn mmsi_falls_back_to_body_user_id() {
        let raw = r#"{
            "MessageType": "PositionReport",
            "MetaData": {"latitude": 1.0, "longitude": 2.0},
            "Message": {"PositionReport": {"UserID": 230123456}}
        }"#;

        match decode_ok(raw, false) {
            Decoded::Record { position, .. } => assert_eq!(position.mmsi.value(), 230_123_456),
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn rejects_without_resolvable_mmsi() {
        let raw = r#"{
            "MessageType": "PositionReport",
            "MetaData": {"MMSI": "abc", "latitude": 1.0, "longitude": 2.0},
            "Message": {"PositionReport": {}}
        }"#;
        assert_eq!(decode_ok(raw, false), Decoded::Rejected(Rejection::NoId));
    }

    #[test]
    fn position_falls_back_to_body_pair() {
        let raw = r#"{
            "MessageType": "PositionReport",
            "MetaData": {"MMSI": 123456789, "latitude": 10.0},
            "Message": {"PositionReport": {"Latitude": 3.5, "Longitude": 4.5}}
        }"#;

        // Incomplete metadata pair means both coordinates come from the body
        match decode_ok(raw, false) {
            Decoded::Record { position, .. } => {
                assert_eq!(position.lat, 3.5);
                assert_eq!(position.lon, 4.5);
            }
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn rejects_without_coordinates() {
        let raw = r#"{
            "MessageType": "PositionReport",
            "MetaData": {"MMSI": 123456789},
            "Message": {"PositionReport": {"Sog": 1.0}}
        }"#;
        assert_eq!(
            decode_ok(raw, false),
            Decoded::Rejected(Rejection::NoPosition)
        );
    }

    #[test]
    fn tanker_only_filters_other_classes() {
        let raw = r#"{
            "MessageType": "PositionReport",
            "MetaData": {"MMSI": 123456789, "latitude": 1.0, "longitude": 2.0, "ShipType": 70},
            "Message": {"PositionReport": {}}
        }"#;
        assert_eq!(decode_ok(raw, true), Decoded::Rejected(Rejection::Filtered));
        assert!(!Rejection::Filtered.is_unusable());

        // Same frame passes with the filter off
        assert!(matches!(decode_ok(raw, false), Decoded::Record { .. }));
    }

    #[test]
    fn tanker_only_keeps_tankers_and_marks_class() {
        let raw = r#"{
            "MessageType": "PositionReport",
            "MetaData": {"MMSI": 123456789, "latitude": 1.0, "longitude": 2.0,
                         "ShipType": 84, "ShipName": " SEA PEARL  "},
            "Message": {"PositionReport": {}}
        }"#;

        match decode_ok(raw, true) {
            Decoded::Record { vessel, .. } => {
                assert_eq!(vessel.ship_class, Some(ShipClass::Tanker));
                assert_eq!(vessel.name.as_deref(), Some("SEA PEARL"));
            }
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn unparseable_ship_type_passes_tanker_filter() {
        let raw = r#"{
            "MessageType": "PositionReport",
            "MetaData": {"MMSI": 123456789, "latitude": 1.0, "longitude": 2.0,
                         "ShipType": "unknown"},
            "Message": {"PositionReport": {}}
        }"#;

        // Unknown code: keep the frame, leave the class unset
        match decode_ok(raw, true) {
            Decoded::Record { vessel, .. } => assert_eq!(vessel.ship_class, None),
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn body_type_code_wins_over_metadata() {
        let raw = r#"{
            "MessageType": "PositionReport",
            "MetaData": {"MMSI": 123456789, "latitude": 1.0, "longitude": 2.0, "ShipType": 70},
            "Message": {"PositionReport": {"Type": 82}}
        }"#;
        assert!(matches!(decode_ok(raw, true), Decoded::Record { .. }));
    }

    #[test]
    fn coerces_numeric_strings() {
        let raw = r#"{
            "MessageType": "PositionReport",
            "MetaData": {"MMSI": "123456789", "latitude": "10.5", "longitude": "-50.2"},
            "Message": {"PositionReport": {"Sog": "7.1", "NavigationalStatus": 5}}
        }"#;

        match decode_ok(raw, false) {
            Decoded::Record { position, .. } => {
                assert_eq!(position.mmsi.value(), 123_456_789);
                assert_eq!(position.lat, 10.5);
                assert_eq!(position.sog, Some(7.1));
                assert_eq!(position.nav_status, Some(5));
            }
            other => panic!("expected record, got {:?}", other),
        }
    }
}
