//! Timestamp parsing and formatting at second granularity.

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};

use crate::error::EngineError;

/// Output format: no fractional seconds, no offset marker.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parse `YYYY-MM-DDTHH:MM:SS` (treated as UTC) or RFC 3339 with an explicit offset.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, EngineError> {
  let s = input.trim();
  if s.is_empty() {
    return Err(EngineError::malformed_timestamp(input, "empty"));
  }

  let ts = match NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT) {
    Ok(naive) => naive.and_utc(),
    Err(naive_err) => DateTime::parse_from_rfc3339(s)
      .map_err(|_| {
        EngineError::malformed_timestamp(
          input,
          format!("expected YYYY-MM-DDTHH:MM:SS or RFC 3339 ({})", naive_err),
        )
      })?
      .with_timezone(&Utc),
  };

  // chrono encodes a leap second as nanosecond >= 1_000_000_000.
  if ts.nanosecond() >= 1_000_000_000 {
    return Err(EngineError::malformed_timestamp(input, "leap seconds are not supported"));
  }
  if ts.nanosecond() != 0 {
    return Err(EngineError::malformed_timestamp(
      input,
      "sub-second precision is not supported",
    ));
  }
  Ok(ts)
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
  ts.format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn naive_input_is_utc() {
    let ts = parse_timestamp("2023-08-10T18:30:30").unwrap();
    assert_eq!(ts, Utc.with_ymd_and_hms(2023, 8, 10, 18, 30, 30).unwrap());
  }

  #[test]
  fn offset_input_is_converted_to_utc() {
    let ts = parse_timestamp("2023-08-10T20:30:30+02:00").unwrap();
    assert_eq!(format_timestamp(&ts), "2023-08-10T18:30:30");

    let z = parse_timestamp("2023-08-10T18:30:30Z").unwrap();
    assert_eq!(z, ts);
  }

  #[test]
  fn rejects_garbage_and_partial_dates() {
    for bad in ["", "   ", "not-a-date", "2023-08-10", "2023-08-10T18:30", "2023-13-10T18:30:30"] {
      let err = parse_timestamp(bad).unwrap_err();
      assert!(matches!(err, EngineError::MalformedTimestamp { .. }), "{}", bad);
    }
  }

  #[test]
  fn rejects_fractional_seconds() {
    let err = parse_timestamp("2023-08-10T18:30:30.250Z").unwrap_err();
    assert!(err.to_string().contains("sub-second"));
  }

  #[test]
  fn rejects_leap_second_with_its_own_reason() {
    for leap in ["2016-12-31T23:59:60", "2016-12-31T23:59:60Z"] {
      let err = parse_timestamp(leap).unwrap_err();
      assert!(matches!(err, EngineError::MalformedTimestamp { .. }), "{}", leap);
      assert!(err.to_string().contains("leap second"), "{}", err);
      assert!(!err.to_string().contains("sub-second"), "{}", err);
    }
  }

  #[test]
  fn format_round_trips_input() {
    let raw = "2023-08-10T18:31:00";
    assert_eq!(format_timestamp(&parse_timestamp(raw).unwrap()), raw);
  }
}
