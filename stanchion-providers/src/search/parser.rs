//! Normalisation of raw search items.
//!
//! The search API is loose about types: counts arrive as numbers, numeric
//! strings or abbreviated strings such as `"1.2万"` or `"3.4k"`, and
//! timestamps as epoch seconds, epoch milliseconds or RFC 3339 strings.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt::Write as _;

use stanchion_core::ContentRecord;

use super::api::RawNote;

/// Characters of body text kept per record in the rendered payload.
pub const PAYLOAD_EXCERPT_CHARS: usize = 200;

/// Parses an engagement counter. Unparseable values count as zero.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn parse_count(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .unwrap_or(0),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| *c != ',' && *c != '+')
                .collect();
            let (digits, factor) = if let Some(rest) = cleaned.strip_suffix(&['万', 'w', 'W'][..]) {
                (rest, 10_000.0)
            } else if let Some(rest) = cleaned.strip_suffix('亿') {
                (rest, 100_000_000.0)
            } else if let Some(rest) = cleaned.strip_suffix(&['k', 'K'][..]) {
                (rest, 1_000.0)
            } else {
                (cleaned.as_str(), 1.0)
            };
            digits
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map_or(0, |f| (f * factor).round() as u64)
        }
        _ => 0,
    }
}

/// Parses a publish timestamp.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(from_epoch),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(n) = s.parse::<i64>() {
                return from_epoch(n);
            }
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }
        _ => None,
    }
}

fn from_epoch(n: i64) -> Option<DateTime<Utc>> {
    // Anything past the year 33658 in seconds is treated as milliseconds.
    if n > 1_000_000_000_000 {
        DateTime::from_timestamp_millis(n)
    } else {
        DateTime::from_timestamp(n, 0)
    }
}

fn parse_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_tag(value: &Value) -> Option<String> {
    let name = match value {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("name").and_then(Value::as_str)?,
        _ => return None,
    };
    let name = name.trim().trim_start_matches('#').trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Normalises one raw item. Items without an id, or with neither title nor
/// body, are dropped.
pub fn normalize(raw: &RawNote) -> Option<ContentRecord> {
    let id = raw.id.as_ref().and_then(parse_id)?;
    let mut record = ContentRecord::new(id, raw.title.as_deref().unwrap_or_default().trim())
        .with_content(raw.content.as_deref().unwrap_or_default().trim())
        .with_engagement(
            raw.likes.as_ref().map_or(0, parse_count),
            raw.comments.as_ref().map_or(0, parse_count),
            raw.collects.as_ref().map_or(0, parse_count),
        );

    record.author = raw
        .user
        .as_ref()
        .and_then(|u| u.nickname.as_deref())
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);
    record.url = raw.url.clone().filter(|u| !u.trim().is_empty());
    record.tags = raw.tags.iter().filter_map(parse_tag).collect();
    record.published_at = raw.published.as_ref().and_then(parse_timestamp);

    record.validate().ok()?;
    Some(record)
}

/// Normalises a batch, dropping invalid items and repeated ids.
pub fn normalize_all<'a>(raws: impl IntoIterator<Item = &'a RawNote>) -> Vec<ContentRecord> {
    let mut seen = HashSet::new();
    raws.into_iter()
        .filter_map(normalize)
        .filter(|record| seen.insert(record.id.clone()))
        .collect()
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut cut: String = flat.chars().take(max_chars).collect();
    cut.push('…');
    cut
}

/// Renders records as the plain-text payload handed to prompts.
///
/// The topic is written into the header so a category fallback can swap it
/// for the requested topic.
pub fn render_payload(topic: &str, records: &[ContentRecord]) -> String {
    let mut out = format!("Topic: {topic}\nNotes: {}\n", records.len());

    for (index, record) in records.iter().enumerate() {
        let _ = write!(
            out,
            "\n{}. {} (likes {}, comments {}, collects {})",
            index + 1,
            if record.title.is_empty() { "(untitled)" } else { &record.title },
            record.likes,
            record.comments,
            record.collects,
        );
        if let Some(ref author) = record.author {
            let _ = write!(out, " by {author}");
        }
        out.push('\n');
        if !record.content.is_empty() {
            let _ = writeln!(out, "   {}", excerpt(&record.content, PAYLOAD_EXCERPT_CHARS));
        }
        if !record.tags.is_empty() {
            let tags: Vec<String> = record.tags.iter().map(|t| format!("#{t}")).collect();
            let _ = writeln!(out, "   tags: {}", tags.join(" "));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_count_forms() {
        assert_eq!(parse_count(&json!(42)), 42);
        assert_eq!(parse_count(&json!("1,024")), 1024);
        assert_eq!(parse_count(&json!("1.2万")), 12_000);
        assert_eq!(parse_count(&json!("3.4k")), 3_400);
        assert_eq!(parse_count(&json!("10w+")), 100_000);
        assert_eq!(parse_count(&json!("2亿")), 200_000_000);
        assert_eq!(parse_count(&json!("n/a")), 0);
        assert_eq!(parse_count(&json!(null)), 0);
        assert_eq!(parse_count(&json!(-5)), 0);
    }

    #[test]
    fn test_parse_timestamp_forms() {
        let secs = parse_timestamp(&json!(1_700_000_000)).unwrap();
        let millis = parse_timestamp(&json!(1_700_000_000_000_i64)).unwrap();
        assert_eq!(secs, millis);
        assert_eq!(parse_timestamp(&json!("1700000000")), Some(secs));
        assert!(parse_timestamp(&json!("2024-05-01T10:00:00Z")).is_some());
        assert!(parse_timestamp(&json!("yesterday")).is_none());
    }

    #[test]
    fn test_normalize_full_item() {
        let raw: RawNote = serde_json::from_value(json!({
            "note_id": "abc",
            "display_title": " Best sunscreen ",
            "desc": "SPF 50 picks",
            "user": {"nickname": "lin"},
            "liked_count": "1.1万",
            "comment_count": 12,
            "collected_count": "300",
            "tag_list": [{"name": "#sunscreen"}, "summer"],
            "time": 1_700_000_000_000_i64
        }))
        .unwrap();

        let record = normalize(&raw).unwrap();
        assert_eq!(record.id, "abc");
        assert_eq!(record.title, "Best sunscreen");
        assert_eq!(record.author.as_deref(), Some("lin"));
        assert_eq!(record.likes, 11_000);
        assert_eq!(record.comments, 12);
        assert_eq!(record.collects, 300);
        assert_eq!(record.tags, vec!["sunscreen", "summer"]);
        assert!(record.published_at.is_some());
    }

    #[test]
    fn test_normalize_drops_unusable_items() {
        let no_id: RawNote = serde_json::from_value(json!({"title": "x"})).unwrap();
        let empty: RawNote = serde_json::from_value(json!({"id": 7})).unwrap();
        assert!(normalize(&no_id).is_none());
        assert!(normalize(&empty).is_none());
    }

    #[test]
    fn test_normalize_all_dedupes() {
        let raws: Vec<RawNote> = serde_json::from_value(json!([
            {"id": "1", "title": "a"},
            {"id": "1", "title": "a again"},
            {"id": 2, "title": "b"}
        ]))
        .unwrap();
        let records = normalize_all(&raws);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, "2");
    }

    #[test]
    fn test_render_payload_mentions_topic() {
        let records = vec![
            ContentRecord::new("1", "Morning routine")
                .with_content("cleanser   then\nsunscreen")
                .with_engagement(5, 1, 2),
        ];
        let payload = render_payload("skincare", &records);
        assert!(payload.starts_with("Topic: skincare\nNotes: 1\n"));
        assert!(payload.contains("1. Morning routine (likes 5, comments 1, collects 2)"));
        assert!(payload.contains("   cleanser then sunscreen"));
    }
}
