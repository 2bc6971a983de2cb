//! Source-dispatched mapping from [`RawJob`] to the canonical [`Job`].

pub mod experience;
pub mod generic;
pub mod salary;
pub mod topdev;
pub mod vieclam24h;
pub mod vietnamworks;

use chrono::{DateTime, TimeZone, Utc};
use html_escape::decode_html_entities;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::{Job, RawJob, SourceId};

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("record carries neither an id nor a url")]
    MissingIdentity,
}

/// Map a raw record onto the canonical schema.
///
/// Dispatches on the source, then applies the common post-processing:
/// entity decoding, experience tagging, the id fallback, and the salary
/// invariants (negotiable postings carry no numeric bounds).
pub fn normalize(raw: &RawJob) -> Result<Job, NormalizeError> {
    if raw.id.is_empty() && raw.url.is_empty() {
        return Err(NormalizeError::MissingIdentity);
    }

    let mut job = Job {
        id: raw.dedup_id().to_string(),
        source: raw.source.to_string(),
        source_url: raw.url.clone(),
        crawled_at: Some(raw.extracted_at),
        ..Job::default()
    };

    match raw.source {
        SourceId::Vietnamworks => vietnamworks::apply(&mut job, &raw.raw_data),
        SourceId::Vieclam24h => vieclam24h::apply(&mut job, &raw.raw_data),
        SourceId::Topdev => topdev::apply(&mut job, &raw.raw_data),
        SourceId::Topcv | SourceId::Careerviet => generic::apply(&mut job, &raw.raw_data),
    }

    job.title = decode_entities(&job.title);
    job.company = decode_entities(&job.company);
    job.location = decode_entities(&job.location);
    job.description = decode_entities(&job.description);
    job.requirements = decode_entities(&job.requirements);
    job.benefits = decode_entities(&job.benefits);

    if job.experience_tags.is_empty() {
        job.experience_tags = experience::tags_for_text(&job.experience);
    }

    if job.is_negotiable {
        job.salary_min = 0;
        job.salary_max = 0;
    }
    if job.salary_max != 0 && job.salary_min > job.salary_max {
        std::mem::swap(&mut job.salary_min, &mut job.salary_max);
    }

    Ok(job)
}

fn decode_entities(text: &str) -> String {
    decode_html_entities(text).into_owned()
}

// ---- field access over the free-form payload --------------------------------

/// First non-empty string under any of `keys`. Numbers are rendered so that
/// sources which send e.g. numeric ids still read as text.
pub(crate) fn get_str(data: &Map<String, Value>, keys: &[&str]) -> String {
    for key in keys {
        match data.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return s.trim().to_string(),
            Some(Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    return i.to_string();
                }
                if let Some(f) = n.as_f64() {
                    return format!("{f:.0}");
                }
            }
            _ => {}
        }
    }
    String::new()
}

pub(crate) fn get_i64(data: &Map<String, Value>, keys: &[&str]) -> i64 {
    for key in keys {
        match data.get(*key) {
            Some(Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    return i;
                }
                if let Some(f) = n.as_f64() {
                    return f as i64;
                }
            }
            Some(Value::String(s)) => {
                if let Ok(i) = s.trim().parse::<i64>() {
                    return i;
                }
            }
            _ => {}
        }
    }
    0
}

pub(crate) fn get_f64(data: &Map<String, Value>, keys: &[&str]) -> f64 {
    for key in keys {
        match data.get(*key) {
            Some(Value::Number(n)) => {
                if let Some(f) = n.as_f64() {
                    return f;
                }
            }
            Some(Value::String(s)) => {
                if let Ok(f) = s.trim().parse::<f64>() {
                    return f;
                }
            }
            _ => {}
        }
    }
    0.0
}

pub(crate) fn get_bool(data: &Map<String, Value>, key: &str) -> bool {
    match data.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
        Some(Value::String(s)) => s == "true" || s == "1",
        _ => false,
    }
}

/// String array under `key`; a bare string becomes a one-element array.
pub(crate) fn get_str_array(data: &Map<String, Value>, key: &str) -> Vec<String> {
    match data.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.to_string())
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Unix-epoch seconds in number or string form.
pub(crate) fn parse_epoch(value: &Value) -> Option<DateTime<Utc>> {
    let secs = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    Utc.timestamp_opt(secs, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(source: SourceId, data: Value) -> RawJob {
        let Value::Object(map) = data else {
            panic!("fixture must be an object")
        };
        RawJob {
            id: "7".into(),
            url: "https://portal.vn/7".into(),
            source,
            raw_data: map,
            html_content: String::new(),
            extracted_at: Utc::now(),
            last_updated_on: "v1".into(),
            expired_on: None,
        }
    }

    #[test]
    fn decodes_entities_in_text_fields() {
        let record = raw(
            SourceId::Topcv,
            json!({ "title": "K&#7871; to&#225;n t&#7893;ng h&#7907;p", "company": "C&ocirc;ng ty A" }),
        );
        let job = normalize(&record).unwrap();
        assert_eq!(job.title, "Kế toán tổng hợp");
        assert_eq!(job.company, "Công ty A");
    }

    #[test]
    fn id_falls_back_to_url() {
        let mut record = raw(SourceId::Topcv, json!({ "title": "x" }));
        record.id = String::new();
        let job = normalize(&record).unwrap();
        assert_eq!(job.id, "https://portal.vn/7");
    }

    #[test]
    fn rejects_records_without_identity() {
        let mut record = raw(SourceId::Topcv, json!({}));
        record.id = String::new();
        record.url = String::new();
        assert!(matches!(
            normalize(&record),
            Err(NormalizeError::MissingIdentity)
        ));
    }

    #[test]
    fn negotiable_postings_carry_no_bounds() {
        let record = raw(
            SourceId::Topcv,
            json!({ "title": "x", "salary": "Lương thỏa thuận" }),
        );
        let job = normalize(&record).unwrap();
        assert!(job.is_negotiable);
        assert_eq!((job.salary_min, job.salary_max), (0, 0));
    }

    #[test]
    fn experience_tags_derived_when_unset() {
        let record = raw(
            SourceId::Topcv,
            json!({ "title": "x", "experience": "2 năm" }),
        );
        let job = normalize(&record).unwrap();
        assert_eq!(job.experience_tags, vec!["D", "E", "F"]);
    }
}
