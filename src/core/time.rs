//! Shared timestamp helpers and the response envelope.

use chrono::{DateTime, Local, Utc};
use serde_json::Value as JsonValue;
use ulid::Ulid;

/// Time source, injectable so TTL behaviour is testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// RFC 3339 UTC timestamp with second precision (e.g. `2026-10-14T09:30:00Z`).
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Local calendar date used for `lastUpdated` (e.g. `2026-10-14`).
pub fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

/// Standard command response envelope shape used across CLI and tool surfaces.
pub fn command_envelope(cmd: &str, status: &str, extra: JsonValue) -> JsonValue {
    let mut base = serde_json::json!({
        "envelope_version": "1.0.0",
        "ts": now_rfc3339(),
        "event_id": new_event_id(),
        "cmd": cmd,
        "status": status
    });
    if let (Some(base_obj), Some(extra_obj)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            base_obj.insert(k.clone(), v.clone());
        }
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_today_format() {
        let d = today();
        assert_eq!(d.len(), 10);
        assert!(chrono::NaiveDate::parse_from_str(&d, "%Y-%m-%d").is_ok());
    }

    #[test]
    fn test_new_event_id_is_valid_ulid() {
        let id = new_event_id();
        assert!(ulid::Ulid::from_string(&id).is_ok());
        assert_ne!(id, new_event_id());
    }

    #[test]
    fn test_command_envelope_with_extra() {
        let envelope = command_envelope("validate", "ok", serde_json::json!({"count": 2}));
        assert_eq!(envelope["cmd"], "validate");
        assert_eq!(envelope["status"], "ok");
        assert_eq!(envelope["count"], 2);
        assert_eq!(envelope["envelope_version"], "1.0.0");
        assert!(envelope["ts"].as_str().unwrap().ends_with('Z'));
    }
}
