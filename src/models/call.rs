use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Best-effort read of the call panel at one instant. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSnapshot {
    pub phone: Option<String>,
    pub duration: Option<String>,
    pub region: Option<String>,
}

impl CallSnapshot {
    /// Decodes an inspector payload. Anything that is not an object of
    /// optional strings is malformed and yields `None`; blank strings count
    /// as absent.
    pub fn from_value(value: Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }

        let raw: CallSnapshot = serde_json::from_value(value).ok()?;
        Some(Self {
            phone: non_blank(raw.phone),
            duration: non_blank(raw.duration),
            region: non_blank(raw.region),
        })
    }

    /// A sample only counts when it carries a phone or a duration; region
    /// alone is not enough to replace an earlier sample.
    pub fn has_call_data(&self) -> bool {
        self.phone.is_some() || self.duration.is_some()
    }
}

fn non_blank(field: Option<String>) -> Option<String> {
    field
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DurationSource {
    /// Timer text read from the desk UI.
    Interface,
    /// Elapsed wall-clock time between the talking and wrap-up observations.
    Calculated,
}

impl DurationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DurationSource::Interface => "interface",
            DurationSource::Calculated => "calculated",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    #[serde(default)]
    pub id: String,
    pub phone: String,
    pub duration: String,
    pub region: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub finalized_at: DateTime<Utc>,
    pub source: DurationSource,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_snapshot_keeps_present_fields() {
        let snapshot = CallSnapshot::from_value(json!({
            "phone": " 89001234567 ",
            "duration": null,
            "region": ""
        }))
        .unwrap();

        assert_eq!(snapshot.phone.as_deref(), Some("89001234567"));
        assert_eq!(snapshot.duration, None);
        assert_eq!(snapshot.region, None);
        assert!(snapshot.has_call_data());
    }

    #[test]
    fn malformed_payloads_are_no_data() {
        assert_eq!(CallSnapshot::from_value(Value::Null), None);
        assert_eq!(CallSnapshot::from_value(json!("00:01:00")), None);
        assert_eq!(CallSnapshot::from_value(json!({ "phone": 42 })), None);
    }

    #[test]
    fn region_only_is_not_call_data() {
        let snapshot = CallSnapshot::from_value(json!({ "region": "Москва" })).unwrap();
        assert!(!snapshot.has_call_data());
    }

    #[test]
    fn record_serializes_in_camel_case() {
        let at = DateTime::parse_from_rfc3339("2026-03-02T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let record = CallRecord {
            id: "a".into(),
            phone: "unknown".into(),
            duration: "00:00:05".into(),
            region: "not specified".into(),
            start_time: at,
            end_time: at,
            finalized_at: at,
            source: DurationSource::Calculated,
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["source"], "calculated");
        assert!(value.get("startTime").is_some());
        assert!(value.get("finalizedAt").is_some());
    }
}
