//! Per-source mapping rules
//!
//! One pure function per known source kind, projecting a raw capture into
//! curated-record candidates. Unknown kinds project to zero records. Each
//! candidate's id is deterministic, so re-mapping the same capture always
//! yields the same ids.

use chrono::{DateTime, Utc};
use serde_json::Value;
use snapflow_common::digest::{content_digest, record_id};
use snapflow_common::types::{CuratedRecord, QueueMessage, RecordPayload, SourceKind};

/// Post-like captures keep only the head of the collection.
const POSTS_PER_CAPTURE: usize = 10;

/// Project a raw capture into curated-record candidates.
pub fn map_records(
    message: &QueueMessage,
    raw: &Value,
    processed_at: DateTime<Utc>,
) -> Vec<CuratedRecord> {
    match message.kind {
        SourceKind::Posts => map_posts(message, raw, processed_at),
        SourceKind::Users => map_users(message, raw, processed_at),
        SourceKind::Unknown => Vec::new(),
    }
}

fn map_posts(
    message: &QueueMessage,
    raw: &Value,
    processed_at: DateTime<Utc>,
) -> Vec<CuratedRecord> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .take(POSTS_PER_CAPTURE)
        .filter_map(|item| {
            let native_id = scalar_to_string(item.get("id")?)?;
            Some(envelope(
                message,
                &native_id,
                item,
                processed_at,
                RecordPayload::Post {
                    title: string_field(item, "title"),
                    body: string_field(item, "body"),
                    user_id: string_field(item, "userId"),
                },
            ))
        })
        .collect()
}

fn map_users(
    message: &QueueMessage,
    raw: &Value,
    processed_at: DateTime<Utc>,
) -> Vec<CuratedRecord> {
    let Some(users) = raw.get("results").and_then(Value::as_array) else {
        return Vec::new();
    };

    users
        .iter()
        .filter_map(|user| {
            // The login uuid is the only field a profile cannot do without.
            let native_id = user
                .get("login")
                .and_then(|login| login.get("uuid"))
                .and_then(Value::as_str)?
                .to_string();

            let first = nested_string(user, &["name", "first"]);
            let last = nested_string(user, &["name", "last"]);
            let name = format!("{first} {last}").trim().to_string();

            Some(envelope(
                message,
                &native_id,
                user,
                processed_at,
                RecordPayload::User {
                    name,
                    email: string_field(user, "email"),
                    country: nested_string(user, &["location", "country"]),
                    gender: string_field(user, "gender"),
                },
            ))
        })
        .collect()
}

/// Wrap a payload in the common record envelope.
fn envelope(
    message: &QueueMessage,
    native_id: &str,
    item: &Value,
    processed_at: DateTime<Utc>,
    payload: RecordPayload,
) -> CuratedRecord {
    // Fingerprints digest the item as captured; a serialization failure is
    // impossible for a Value that was just parsed from JSON.
    let serialized = serde_json::to_vec(item).unwrap_or_default();

    CuratedRecord {
        id: record_id(&message.source, native_id, &message.content_hash),
        source: message.source.clone(),
        captured_at: message.captured_at,
        processed_at,
        fingerprint: content_digest(&serialized),
        raw_key: message.raw_key.clone(),
        payload,
    }
}

fn string_field(item: &Value, key: &str) -> String {
    item.get(key).and_then(scalar_to_string).unwrap_or_default()
}

fn nested_string(item: &Value, path: &[&str]) -> String {
    let mut current = item;
    for key in path {
        match current.get(key) {
            Some(next) => current = next,
            None => return String::new(),
        }
    }
    scalar_to_string(current).unwrap_or_default()
}

/// Stringify a JSON scalar; objects, arrays, and nulls have no scalar form.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn posts_message() -> QueueMessage {
        QueueMessage {
            source: "jsonplaceholder".to_string(),
            kind: SourceKind::Posts,
            raw_key: "raw/source=jsonplaceholder/date=2026-08-01/x.json".to_string(),
            content_hash: "5eb63bbbe01eeed093cb22bb8f5acdc3".to_string(),
            captured_at: Utc::now(),
            record_count: 3,
        }
    }

    #[test]
    fn test_three_posts_map_to_three_records() {
        let raw = json!([
            {"id": 1, "title": "a", "body": "x", "userId": 1},
            {"id": 2, "title": "b", "body": "y", "userId": 1},
            {"id": 3, "title": "c", "body": "z", "userId": 2},
        ]);

        let records = map_records(&posts_message(), &raw, Utc::now());
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.id.starts_with("jsonplaceholder-")));
        assert_eq!(records[0].id, "jsonplaceholder-1-5eb63bbb");
        assert_eq!(
            records[0].payload,
            RecordPayload::Post { title: "a".into(), body: "x".into(), user_id: "1".into() }
        );
    }

    #[test]
    fn test_posts_capture_is_capped() {
        let items: Vec<Value> = (0..25).map(|i| json!({"id": i, "title": "t"})).collect();
        let records = map_records(&posts_message(), &Value::Array(items), Utc::now());
        assert_eq!(records.len(), POSTS_PER_CAPTURE);
    }

    #[test]
    fn test_post_without_native_id_is_skipped() {
        let raw = json!([
            {"title": "no id"},
            {"id": 2, "title": "ok"},
        ]);
        let records = map_records(&posts_message(), &raw, Utc::now());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "jsonplaceholder-2-5eb63bbb");
    }

    #[test]
    fn test_fingerprints_differ_per_item() {
        let raw = json!([
            {"id": 1, "title": "a"},
            {"id": 2, "title": "b"},
        ]);
        let records = map_records(&posts_message(), &raw, Utc::now());
        assert_ne!(records[0].fingerprint, records[1].fingerprint);
    }

    #[test]
    fn test_users_mapping() {
        let message = QueueMessage {
            source: "randomuser".to_string(),
            kind: SourceKind::Users,
            raw_key: "raw/source=randomuser/date=2026-08-01/y.json".to_string(),
            content_hash: "ffff0000ffff0000".to_string(),
            captured_at: Utc::now(),
            record_count: 1,
        };
        let raw = json!({
            "results": [{
                "login": {"uuid": "u-1"},
                "name": {"first": "Ada", "last": "Lovelace"},
                "email": "ada@example.com",
                "location": {"country": "UK"},
                "gender": "female"
            }]
        });

        let records = map_records(&message, &raw, Utc::now());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "randomuser-u-1-ffff0000");
        assert_eq!(
            records[0].payload,
            RecordPayload::User {
                name: "Ada Lovelace".into(),
                email: "ada@example.com".into(),
                country: "UK".into(),
                gender: "female".into(),
            }
        );
    }

    #[test]
    fn test_unknown_kind_maps_to_nothing() {
        let mut message = posts_message();
        message.kind = SourceKind::Unknown;
        let raw = json!([{"id": 1}]);
        assert!(map_records(&message, &raw, Utc::now()).is_empty());
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let raw = json!([{"id": 9, "title": "same"}]);
        let at = Utc::now();
        let message = posts_message();
        let first = map_records(&message, &raw, at);
        let second = map_records(&message, &raw, at);
        assert_eq!(first, second);
    }
}
