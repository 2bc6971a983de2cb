use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

/// Upstream portals the pipeline knows how to crawl.
///
/// The string form doubles as the wire representation: dedup keys, queue
/// payloads and indexed documents all carry it verbatim.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SourceId {
    Topcv,
    Vietnamworks,
    Careerviet,
    Topdev,
    Vieclam24h,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Topcv => "topcv",
            SourceId::Vietnamworks => "vietnamworks",
            SourceId::Careerviet => "careerviet",
            SourceId::Topdev => "topdev",
            SourceId::Vieclam24h => "vieclam24h",
        }
    }
}

/// Pre-normalization record as it travels through the broker.
///
/// `raw_data` keeps the source payload untyped so each portal can stash
/// whatever its API returned; the normalizer sorts it out per source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawJob {
    pub id: String,
    pub url: String,
    pub source: SourceId,
    #[serde(default)]
    pub raw_data: Map<String, Value>,
    /// Only populated while the enricher holds the record; stripped before
    /// re-publish to keep broker payloads small.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub html_content: String,
    pub extracted_at: DateTime<Utc>,
    /// Opaque revision token compared byte-for-byte by the deduplicator.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_updated_on: String,
    /// Upstream expiry, drives the dedup TTL. `None` means unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired_on: Option<DateTime<Utc>>,
}

impl RawJob {
    /// Dedup identity: the in-source id, or the URL when the portal has none.
    pub fn dedup_id(&self) -> &str {
        if self.id.is_empty() {
            &self.url
        } else {
            &self.id
        }
    }
}

/// Canonical job posting, the only shape the indexer accepts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub position: String,
    pub salary: String,
    pub salary_min: i64,
    pub salary_max: i64,
    pub is_negotiable: bool,
    pub work_type: String,
    pub industry: Vec<String>,
    pub field: String,
    pub experience: String,
    pub experience_tags: Vec<String>,
    pub description: String,
    pub requirements: String,
    pub benefits: String,
    pub source: String,
    pub source_url: String,
    pub crawled_at: Option<DateTime<Utc>>,

    // Enriched fields (detail scrape / JSON-LD).
    pub total_views: i64,
    pub total_resume_applied: i64,
    pub rate_response: f64,
    pub skills: Vec<String>,
    pub qualifications: String,
    pub company_website: String,
    pub occupational_category: String,
    pub employment_type: String,
    pub location_city: Vec<String>,
    pub location_district: Vec<String>,
    pub expired_at: Option<DateTime<Utc>>,

    /// When the posting was created / last touched on the source itself.
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
