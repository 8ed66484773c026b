//! Asset record normalization
//!
//! Cloudinary describes assets with loosely-typed JSON objects. This module
//! maps them onto [`FileAttributes`], the uniform shape the filesystem layer
//! works with.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::MetadataError;

/// Optional asset fields carried over into [`FileAttributes::extra`], in output order
pub const EXTRA_METADATA_FIELDS: [&str; 7] = [
    "version",
    "width",
    "height",
    "url",
    "secure_url",
    "next_cursor",
    "public_id",
];

/// Raw asset record as returned by the remote service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetRecord(Map<String, Value>);

impl AssetRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Raw value of a field, including explicit nulls
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Value of a field that is present, not null and not an empty string
    pub fn non_empty(&self, name: &str) -> Option<&Value> {
        match self.0.get(name) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(value) => Some(value),
        }
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

}

impl From<Map<String, Value>> for AssetRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Access level of a file. The backing service only knows public assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extra metadata fields, kept in [`EXTRA_METADATA_FIELDS`] order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtraMetadata {
    entries: Vec<(&'static str, Value)>,
}

impl ExtraMetadata {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.entries.iter().map(|(name, value)| (*name, value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Canonical file attributes for a stored asset
#[derive(Debug, Clone, PartialEq)]
pub struct FileAttributes {
    /// The asset's public ID
    pub path: String,
    /// Size in bytes
    pub size: u64,
    pub visibility: Visibility,
    /// Creation time as epoch seconds, 0 when unknown
    pub last_modified: i64,
    /// `<resource_type>/<format>`, e.g. `image/jpg`
    pub mime_type: String,
    pub extra: ExtraMetadata,
}

/// Normalize a raw asset record into [`FileAttributes`]
pub fn normalize(record: &AssetRecord) -> Result<FileAttributes, MetadataError> {
    let path = match record.field("public_id") {
        None | Some(Value::Null) => return Err(MetadataError::MissingField("public_id")),
        Some(Value::String(s)) if s.is_empty() => {
            return Err(MetadataError::MissingField("public_id"))
        }
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            return Err(MetadataError::InvalidField {
                field: "public_id",
                reason: format!("expected a string, got {}", other),
            })
        }
    };

    let size = parse_size(record.field("bytes"))?;

    let last_modified = match record.str_field("created_at") {
        Some(created_at) => parse_timestamp(created_at).unwrap_or_else(|| {
            warn!("Unparsable created_at {:?} for {}", created_at, path);
            0
        }),
        None => 0,
    };

    let mime_type = format!(
        "{}/{}",
        text_field(record, "resource_type"),
        text_field(record, "format")
    );

    Ok(FileAttributes {
        path,
        size,
        visibility: Visibility::Public,
        last_modified,
        mime_type,
        extra: extract_extra_metadata(record),
    })
}

fn parse_size(value: Option<&Value>) -> Result<u64, MetadataError> {
    let invalid = |reason: String| MetadataError::InvalidField {
        field: "bytes",
        reason,
    };

    match value {
        None | Some(Value::Null) => Err(MetadataError::MissingField("bytes")),
        Some(Value::Number(n)) => {
            if let Some(size) = n.as_u64() {
                Ok(size)
            } else if let Some(f) = n.as_f64().filter(|f| f.is_finite() && *f >= 0.0) {
                Ok(f.trunc() as u64)
            } else {
                Err(invalid(format!("{} is not a byte count", n)))
            }
        }
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| invalid(format!("{:?} is not a byte count", s))),
        Some(other) => Err(invalid(format!("expected a number, got {}", other))),
    }
}

/// Parse a calendar timestamp into epoch seconds.
///
/// Accepts RFC 3339 (what Cloudinary returns), `YYYY-MM-DD HH:MM:SS` and
/// `YYYY-MM-DD`. Zone-less forms are read as UTC.
pub fn parse_timestamp(input: &str) -> Option<i64> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.timestamp());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(naive.and_utc().timestamp());
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp())
}

fn text_field(record: &AssetRecord, name: &str) -> String {
    match record.field(name) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn extract_extra_metadata(record: &AssetRecord) -> ExtraMetadata {
    let entries = EXTRA_METADATA_FIELDS
        .iter()
        .filter_map(|field| record.non_empty(field).map(|v| (*field, v.clone())))
        .collect();
    ExtraMetadata { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> AssetRecord {
        serde_json::from_value(value).unwrap()
    }

    fn full_record() -> AssetRecord {
        record(json!({
            "asset_id": "b5e6d2b39ba3e0869d67141ba7dba6cf",
            "public_id": "photos/a",
            "format": "jpg",
            "version": 1704067200,
            "resource_type": "image",
            "type": "upload",
            "created_at": "2024-01-01T00:00:00Z",
            "bytes": 100,
            "width": 640,
            "height": 480,
            "url": "http://res.cloudinary.com/demo/image/upload/v1704067200/photos/a.jpg",
            "secure_url": "https://res.cloudinary.com/demo/image/upload/v1704067200/photos/a.jpg"
        }))
    }

    #[test]
    fn test_normalize_full_record() {
        let attrs = normalize(&full_record()).unwrap();
        assert_eq!(attrs.path, "photos/a");
        assert_eq!(attrs.size, 100);
        assert_eq!(attrs.visibility, Visibility::Public);
        assert_eq!(attrs.last_modified, 1704067200);
        assert_eq!(attrs.mime_type, "image/jpg");
    }

    #[test]
    fn test_extra_follows_declaration_order() {
        // Input order deliberately differs from the declared field order
        let rec = record(json!({
            "public_id": "x",
            "secure_url": "https://example/x",
            "height": 10,
            "bytes": 1,
            "version": 3,
            "width": 20,
        }));
        let attrs = normalize(&rec).unwrap();
        let keys: Vec<_> = attrs.extra.keys().collect();
        assert_eq!(keys, vec!["version", "width", "height", "secure_url", "public_id"]);
    }

    #[test]
    fn test_extra_drops_unknown_empty_and_null_fields() {
        let rec = record(json!({
            "public_id": "x",
            "bytes": 1,
            "asset_id": "abc",
            "url": "",
            "next_cursor": null,
            "width": 0,
        }));
        let attrs = normalize(&rec).unwrap();
        assert!(!attrs.extra.contains_key("asset_id"));
        assert!(!attrs.extra.contains_key("url"));
        assert!(!attrs.extra.contains_key("next_cursor"));
        // Zero is a value, only the empty string counts as empty
        assert_eq!(attrs.extra.get("width"), Some(&json!(0)));
        assert!(attrs
            .extra
            .keys()
            .all(|k| EXTRA_METADATA_FIELDS.contains(&k)));
    }

    #[test]
    fn test_missing_public_id_fails() {
        let rec = record(json!({ "bytes": 1, "format": "png" }));
        assert_eq!(
            normalize(&rec).unwrap_err(),
            MetadataError::MissingField("public_id")
        );

        let rec = record(json!({ "public_id": "", "bytes": 1 }));
        assert_eq!(
            normalize(&rec).unwrap_err(),
            MetadataError::MissingField("public_id")
        );
    }

    #[test]
    fn test_bytes_must_be_numeric() {
        let rec = record(json!({ "public_id": "x" }));
        assert_eq!(
            normalize(&rec).unwrap_err(),
            MetadataError::MissingField("bytes")
        );

        let rec = record(json!({ "public_id": "x", "bytes": "lots" }));
        assert!(matches!(
            normalize(&rec).unwrap_err(),
            MetadataError::InvalidField { field: "bytes", .. }
        ));

        let rec = record(json!({ "public_id": "x", "bytes": -5 }));
        assert!(normalize(&rec).is_err());
    }

    #[test]
    fn test_bytes_accepts_numeric_string() {
        let rec = record(json!({ "public_id": "x", "bytes": "2048" }));
        assert_eq!(normalize(&rec).unwrap().size, 2048);
    }

    #[test]
    fn test_unparsable_created_at_is_zero() {
        let rec = record(json!({ "public_id": "x", "bytes": 1, "created_at": "yesterday-ish" }));
        assert_eq!(normalize(&rec).unwrap().last_modified, 0);

        let rec = record(json!({ "public_id": "x", "bytes": 1 }));
        assert_eq!(normalize(&rec).unwrap().last_modified, 0);
    }

    #[test]
    fn test_missing_type_components_become_empty() {
        let rec = record(json!({ "public_id": "x", "bytes": 1, "resource_type": "raw" }));
        assert_eq!(normalize(&rec).unwrap().mime_type, "raw/");

        let rec = record(json!({ "public_id": "x", "bytes": 1, "format": "pdf" }));
        assert_eq!(normalize(&rec).unwrap().mime_type, "/pdf");
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(parse_timestamp("2024-01-02T00:00:00Z"), Some(1704153600));
        assert_eq!(parse_timestamp("2024-01-02T01:00:00+01:00"), Some(1704153600));
        assert_eq!(parse_timestamp("2024-01-02 00:00:00"), Some(1704153600));
        assert_eq!(parse_timestamp("2024-01-02"), Some(1704153600));
        assert_eq!(parse_timestamp(""), None);
    }
}
