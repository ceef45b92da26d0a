//! Conversion of epoch-second fields into zoned timestamps.

use crate::{PelotonError, Table};
use chrono::{DateTime, SecondsFormat};
use chrono_tz::Tz;
use serde_json::Value;

/// Fields the API reports as epoch seconds.
pub const TIME_FIELDS: &[&str] = &[
    "start_time",
    "end_time",
    "created_at",
    "created",
    "device_time_created_at",
];

/// Interpret `secs` as epoch seconds in UTC and express it in `tz`.
pub fn to_zoned(secs: i64, nanos: u32, tz: Tz) -> Option<DateTime<Tz>> {
    DateTime::from_timestamp(secs, nanos).map(|utc| utc.with_timezone(&tz))
}

/// Render an epoch-seconds cell as an RFC 3339 string in `tz`.
///
/// `null` stays `null`; anything else that is not a number is a schema error.
pub fn zone_cell(value: &Value, tz: Tz) -> Result<Value, PelotonError> {
    let (secs, nanos) = match value {
        Value::Null => return Ok(Value::Null),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(secs), _) => (secs, 0),
            (None, Some(f)) if f.is_finite() => {
                let secs = f.floor();
                (secs as i64, ((f - secs) * 1e9).round().min(999_999_999.0) as u32)
            }
            _ => return Err(PelotonError::Schema(format!("timestamp out of range: {n}"))),
        },
        other => {
            return Err(PelotonError::Schema(format!(
                "expected epoch seconds, got {other}"
            )));
        }
    };
    let zoned = to_zoned(secs, nanos, tz)
        .ok_or_else(|| PelotonError::Schema(format!("timestamp out of range: {value}")))?;
    Ok(Value::String(
        zoned.to_rfc3339_opts(SecondsFormat::AutoSi, false),
    ))
}

/// Convert a string produced by [`zone_cell`] back into epoch seconds.
pub fn parse_zoned(s: &str) -> Result<i64, PelotonError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.timestamp())
        .map_err(|e| PelotonError::Schema(format!("invalid timestamp {s:?}: {e}")))
}

/// Rewrite each of `fields` present in `table` from epoch seconds to `tz`.
/// Fields the table does not have are skipped.
pub fn normalize_timestamps(
    table: &mut Table,
    fields: &[&str],
    tz: Tz,
) -> Result<(), PelotonError> {
    for field in fields {
        let converted = table.try_map_column(field, |cell| zone_cell(cell, tz))?;
        if !converted {
            tracing::trace!(field, "timestamp field absent; skipped");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eastern() -> Tz {
        chrono_tz::US::Eastern
    }

    #[test]
    fn winter_and_summer_offsets() {
        // 2021-01-01T12:00:00Z and 2021-07-01T12:00:00Z
        assert_eq!(
            zone_cell(&json!(1_609_502_400), eastern()).unwrap(),
            json!("2021-01-01T07:00:00-05:00")
        );
        assert_eq!(
            zone_cell(&json!(1_625_140_800), eastern()).unwrap(),
            json!("2021-07-01T08:00:00-04:00")
        );
    }

    #[test]
    fn round_trip_recovers_epoch() {
        for t in [0_i64, 1_609_502_400, 1_636_264_800, 1_700_000_000] {
            let zoned = zone_cell(&json!(t), eastern()).unwrap();
            assert_eq!(parse_zoned(zoned.as_str().unwrap()).unwrap(), t);
        }
    }

    #[test]
    fn null_passes_through_and_strings_fail() {
        assert_eq!(zone_cell(&Value::Null, eastern()).unwrap(), Value::Null);
        assert!(matches!(
            zone_cell(&json!("yesterday"), eastern()),
            Err(PelotonError::Schema(_))
        ));
    }

    #[test]
    fn normalize_skips_absent_fields() {
        let record = json!({"created_at": 1_609_502_400, "title": "Ride"});
        let mut table = Table::from_records(vec![record.as_object().cloned().unwrap()]);
        normalize_timestamps(&mut table, TIME_FIELDS, eastern()).expect("normalize");
        assert_eq!(
            table.cell(0, "created_at"),
            Some(&json!("2021-01-01T07:00:00-05:00"))
        );
        assert_eq!(table.cell(0, "title"), Some(&json!("Ride")));
    }
}
