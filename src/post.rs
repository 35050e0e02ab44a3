use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::text_utils::parse_post_date;

pub const DEFAULT_AUTHOR: &str = "VacatAd Team";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default)]
    pub role: String,
}

/// One entry of the blog index. Serialized field names follow the JSON the
/// website consumes, so older hand-edited records keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    pub id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(deserialize_with = "date_from_string_or_millis")]
    pub date: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_alt: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_time: Option<String>,
    /// First-generation records embed the body here instead of keeping a
    /// standalone document. Read for fallback, dropped on re-save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Fields this tool does not know about survive a round-trip.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl PostRecord {
    pub fn author_name(&self) -> &str {
        self.author.as_ref().map(|a| a.name.as_str()).unwrap_or(DEFAULT_AUTHOR)
    }
}

// Legacy records converted from the first index generation sometimes carry
// the raw Date.now() value in the date field.
fn date_from_string_or_millis<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid date value: {}", other))),
    }
}

/// Parses the index file. The current shape is a bare JSON array; the
/// legacy shape wraps it in an object with a `blog` property.
pub fn parse_index(bytes: &[u8]) -> serde_json::Result<Vec<PostRecord>> {
    let value: Value = serde_json::from_slice(bytes)?;
    let records = match value {
        Value::Object(mut map) => map.remove("blog").unwrap_or(Value::Array(vec![])),
        other => other,
    };
    serde_json::from_value(records)
}

pub fn serialize_index(posts: &[PostRecord]) -> serde_json::Result<Vec<u8>> {
    // Matches the pretty-printed file the previous tooling produced
    serde_json::to_vec_pretty(posts)
}

/// Replaces the record with the same id, or prepends a new one. A replace
/// keeps unknown fields of the previous record; the legacy embedded body
/// does not survive a re-save.
pub fn upsert(posts: &mut Vec<PostRecord>, record: PostRecord) {
    match posts.iter().position(|p| p.id == record.id) {
        Some(idx) => {
            let previous = &posts[idx];
            let mut merged = record;
            for (key, value) in previous.extra.iter() {
                merged.extra.entry(key.clone()).or_insert_with(|| value.clone());
            }
            posts[idx] = merged;
        }
        None => posts.insert(0, record),
    }
}

/// Date-descending copy for display. The stored order is not touched.
pub fn sorted_for_display(posts: &[PostRecord]) -> Vec<PostRecord> {
    let mut sorted = posts.to_vec();
    sorted.sort_by(|a, b| {
        let da = parse_post_date(&a.date).ok();
        let db = parse_post_date(&b.date).ok();
        db.cmp(&da)
    });
    sorted
}
