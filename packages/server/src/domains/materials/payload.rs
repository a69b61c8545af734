//! Inspection of crawler output payloads.
//!
//! Output files are either a bare JSON array of records or an object with a
//! `data` array (and sometimes a `total`).

use mediacrawler_client::Platform;
use serde_json::{Map, Value};

/// Number of records included in previews.
pub const PREVIEW_SIZE: usize = 5;

/// Records of a payload: the array itself, or the `data` array of an object.
pub fn extract_items(payload: &Value) -> &[Value] {
    match payload {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("data") {
            Some(Value::Array(items)) => items,
            _ => &[],
        },
        _ => &[],
    }
}

fn first_record(payload: &Value) -> Option<&Map<String, Value>> {
    extract_items(payload).iter().find_map(Value::as_object)
}

/// Whether a payload holds something other than content records for the
/// platform, judged from its first record.
pub fn is_non_content_payload(payload: &Value, platform: Platform) -> bool {
    let Some(sample) = first_record(payload) else {
        return false;
    };
    if sample.contains_key("comment_id") {
        return true;
    }
    match platform {
        Platform::Xhs => !sample.contains_key("note_id"),
        Platform::Dy => !sample.contains_key("aweme_id"),
        _ => false,
    }
}

/// Whether the first record of a payload is a comment.
pub fn is_comment_payload(payload: &Value) -> bool {
    first_record(payload).is_some_and(|sample| sample.contains_key("comment_id"))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultSummary {
    pub count: u64,
    pub preview: Value,
}

pub fn summarize(payload: &Value) -> ResultSummary {
    match payload {
        Value::Object(map) if map.contains_key("data") => {
            let items = extract_items(payload);
            let count = map
                .get("total")
                .and_then(|total| total.as_u64().or_else(|| total.as_f64().map(|t| t as u64)))
                .unwrap_or(items.len() as u64);
            ResultSummary {
                count,
                preview: Value::Array(items.iter().take(PREVIEW_SIZE).cloned().collect()),
            }
        }
        Value::Array(items) => ResultSummary {
            count: items.len() as u64,
            preview: Value::Array(items.iter().take(PREVIEW_SIZE).cloned().collect()),
        },
        _ => ResultSummary {
            count: 0,
            preview: Value::Null,
        },
    }
}

/// Rewrite `local:<rest>` strings anywhere in `value` into
/// `<backend_url>/api/materials/file/<rest>`.
pub fn rewrite_local_paths(value: &Value, backend_url: &str) -> Value {
    let base = format!("{}/api/materials/file/", backend_url.trim_end_matches('/'));
    let mut copy = value.clone();
    rewrite_in_place(&mut copy, &base);
    copy
}

fn rewrite_in_place(value: &mut Value, base: &str) {
    match value {
        Value::String(s) => {
            if let Some(rest) = s.strip_prefix("local:") {
                *s = format!("{}{}", base, rest);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|item| rewrite_in_place(item, base)),
        Value::Object(map) => map.values_mut().for_each(|item| rewrite_in_place(item, base)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn items_come_from_array_or_data_field() {
        assert_eq!(extract_items(&json!([1, 2])).len(), 2);
        assert_eq!(extract_items(&json!({"data": [1, 2, 3]})).len(), 3);
        assert!(extract_items(&json!({"data": "nope"})).is_empty());
        assert!(extract_items(&json!("text")).is_empty());
    }

    #[test]
    fn comment_records_are_non_content() {
        let payload = json!([{"comment_id": "c1", "note_id": "n1"}]);
        assert!(is_non_content_payload(&payload, Platform::Xhs));
        assert!(is_non_content_payload(&payload, Platform::Bili));
        assert!(is_comment_payload(&payload));
    }

    #[test]
    fn platform_identifiers_are_required() {
        assert!(!is_non_content_payload(&json!([{"note_id": "n1"}]), Platform::Xhs));
        assert!(is_non_content_payload(&json!([{"aweme_id": "a1"}]), Platform::Xhs));
        assert!(!is_non_content_payload(&json!({"data": [{"aweme_id": "a1"}]}), Platform::Dy));
        assert!(is_non_content_payload(&json!([{"user_id": "u1"}]), Platform::Dy));
        assert!(!is_non_content_payload(&json!([{"user_id": "u1"}]), Platform::Bili));
    }

    #[test]
    fn first_object_record_is_sampled() {
        let payload = json!([null, "x", {"note_id": "n1"}]);
        assert!(!is_non_content_payload(&payload, Platform::Xhs));
        assert!(!is_non_content_payload(&json!([]), Platform::Xhs));
        assert!(!is_comment_payload(&json!([1, 2])));
    }

    #[test]
    fn summary_prefers_total_and_truncates_preview() {
        let payload = json!({"total": 42, "data": [1, 2, 3, 4, 5, 6, 7]});
        let summary = summarize(&payload);
        assert_eq!(summary.count, 42);
        assert_eq!(summary.preview, json!([1, 2, 3, 4, 5]));

        let summary = summarize(&json!({"data": [1, 2]}));
        assert_eq!(summary.count, 2);

        let summary = summarize(&json!([1, 2, 3, 4, 5, 6]));
        assert_eq!(summary.count, 6);
        assert_eq!(summary.preview.as_array().unwrap().len(), 5);

        let summary = summarize(&json!({"items": []}));
        assert_eq!(summary, ResultSummary { count: 0, preview: Value::Null });
    }

    #[test]
    fn local_paths_are_rewritten_everywhere() {
        let payload = json!({
            "data": [{"cover": "local:job_1/cover.jpg", "images": ["local:job_1/a.jpg", "https://cdn/x.jpg"]}],
            "title": "local"
        });
        let rewritten = rewrite_local_paths(&payload, "http://api.test/");
        assert_eq!(
            rewritten["data"][0]["cover"],
            "http://api.test/api/materials/file/job_1/cover.jpg"
        );
        assert_eq!(
            rewritten["data"][0]["images"][0],
            "http://api.test/api/materials/file/job_1/a.jpg"
        );
        assert_eq!(rewritten["data"][0]["images"][1], "https://cdn/x.jpg");
        assert_eq!(rewritten["title"], "local");
        assert_eq!(payload["data"][0]["cover"], "local:job_1/cover.jpg");
    }
}
