//! Response-shape probing for the render service.
//!
//! Backends disagree on where they put things. Every lookup here is an ordered
//! list of JSON pointers; the first pointer that yields a usable value wins.

use serde_json::Value;

/// Where rendered images may live, in probe order.
pub const IMAGE_PATHS: &[&str] = &[
    "/images",
    "/output/images",
    "/output",
    "/image",
    "/output/image",
    "/image_url",
    "/output/image_url",
];

/// Keys inspected when an image entry is an object rather than a string.
const IMAGE_ENTRY_KEYS: &[&str] = &["url", "image", "data", "base64"];

pub const JOB_ID_PATHS: &[&str] = &["/id", "/jobId", "/job_id"];
pub const STATUS_PATHS: &[&str] = &["/status", "/state"];
pub const SEED_PATHS: &[&str] = &["/seed", "/output/seed"];
pub const ERROR_PATHS: &[&str] = &[
    "/error",
    "/error/message",
    "/message",
    "/detail",
    "/output/error",
];

/// Case-insensitive substrings marking a terminal job failure.
pub const FAILURE_MARKERS: &[&str] = &["fail", "error", "cancel"];

/// Extracts the rendered images from a submission or status response.
///
/// Returns an empty list when no probed shape holds a non-empty entry.
pub fn images(body: &Value) -> Vec<String> {
    IMAGE_PATHS
        .iter()
        .filter_map(|path| body.pointer(path))
        .map(images_in)
        .find(|found| !found.is_empty())
        .unwrap_or_default()
}

fn images_in(value: &Value) -> Vec<String> {
    match value {
        Value::Array(entries) => entries.iter().filter_map(image_entry).collect(),
        other => image_entry(other).into_iter().collect(),
    }
}

fn image_entry(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s).map(normalize_image),
        Value::Object(map) => IMAGE_ENTRY_KEYS
            .iter()
            .filter_map(|key| map.get(*key).and_then(Value::as_str))
            .find_map(non_empty)
            .map(normalize_image),
        _ => None,
    }
}

/// Turns bare base64 into a data URL; URLs pass through untouched.
pub fn normalize_image(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with("data:") || raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("data:image/png;base64,{raw}")
    }
}

pub fn job_id(body: &Value) -> Option<String> {
    JOB_ID_PATHS
        .iter()
        .filter_map(|path| body.pointer(path))
        .find_map(|v| match v {
            Value::String(s) => non_empty(s).map(str::to_string),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

pub fn status(body: &Value) -> Option<&str> {
    first_str(body, STATUS_PATHS)
}

pub fn seed(body: &Value) -> Option<i64> {
    SEED_PATHS
        .iter()
        .filter_map(|path| body.pointer(path))
        .find_map(Value::as_i64)
}

/// The upstream's own explanation of a failure, if it gave one.
pub fn error_message(body: &Value) -> Option<String> {
    first_str(body, ERROR_PATHS).map(str::to_string)
}

pub fn is_failure_status(status: &str) -> bool {
    let status = status.to_ascii_lowercase();
    FAILURE_MARKERS.iter().any(|marker| status.contains(marker))
}

fn first_str<'a>(body: &'a Value, paths: &[&str]) -> Option<&'a str> {
    paths
        .iter()
        .filter_map(|path| body.pointer(path))
        .filter_map(Value::as_str)
        .find_map(non_empty)
}

fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
