use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CrawlerConfig;
use crate::domain::{RawJob, SourceId};
use crate::sources::{
    build_http_client, jitter, pace, send_with_retry, CrawlError, PageSink, SourceAdapter,
};

const SEARCH_API_URL: &str = "https://ms.vietnamworks.com/job-search/v1.0/search";
const JOBS_PER_PAGE: u32 = 50;
const JITTER_MS: u64 = 2000;

/// VietnamWorks listing adapter over its POST search API.
pub struct VietnamworksAdapter {
    http: reqwest::Client,
    cfg: CrawlerConfig,
}

#[derive(Debug, Serialize)]
struct SearchRequest {
    #[serde(rename = "userId")]
    user_id: i64,
    query: String,
    #[serde(rename = "hitsPerPage")]
    hits_per_page: u32,
    page: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Map<String, Value>>,
    #[serde(default)]
    meta: SearchMeta,
}

#[derive(Debug, Default, Deserialize)]
struct SearchMeta {
    #[serde(rename = "nbPages", default)]
    nb_pages: u32,
}

impl VietnamworksAdapter {
    pub fn new(cfg: CrawlerConfig) -> Result<Self, CrawlError> {
        Ok(Self {
            http: build_http_client(&cfg)?,
            cfg,
        })
    }

    async fn fetch_page(&self, page: u32) -> Result<(Vec<RawJob>, u32), CrawlError> {
        let payload = SearchRequest {
            user_id: 0,
            query: String::new(),
            hits_per_page: JOBS_PER_PAGE,
            page,
        };

        let request = self
            .http
            .post(SEARCH_API_URL)
            .header("Accept-Language", "vi")
            .header("X-Source", "Page-Container")
            .json(&payload);

        let response = send_with_retry(request, self.cfg.max_retries).await?;
        if !response.status().is_success() {
            return Err(CrawlError::Status {
                status: response.status().as_u16(),
                url: SEARCH_API_URL.to_string(),
            });
        }

        let parsed: SearchResponse = response.json().await?;
        let jobs = parsed.data.iter().map(|item| item_to_raw_job(item)).collect();
        Ok((jobs, parsed.meta.nb_pages))
    }
}

/// Map one API hit onto a `RawJob`, keeping the fields the normalizer and
/// dedup care about.
fn item_to_raw_job(item: &Map<String, Value>) -> RawJob {
    let job_id = item
        .get("jobId")
        .and_then(Value::as_i64)
        .map(|id| id.to_string())
        .unwrap_or_default();

    let mut job_url = item
        .get("jobUrl")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if !job_url.starts_with("http") {
        job_url = format!("https://www.vietnamworks.com/{job_url}");
    }

    let last_updated_on = item
        .get("lastUpdatedOn")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let expired_on = item
        .get("expiredOn")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|at| at.with_timezone(&Utc))
        .unwrap_or_else(|| Utc::now() + ChronoDuration::days(30));

    let raw_data = match json!({
        "jobId": item.get("jobId"),
        "jobTitle": item.get("jobTitle"),
        "jobUrl": item.get("jobUrl"),
        "companyName": item.get("companyName"),
        "companyId": item.get("companyId"),
        "companyLogo": item.get("companyLogo"),
        "companySize": item.get("companySize"),
        "address": item.get("address"),
        "workingLocations": item.get("workingLocations"),
        "salaryMin": item.get("salaryMin"),
        "salaryMax": item.get("salaryMax"),
        "prettySalary": item.get("prettySalary"),
        "salaryCurrency": item.get("salaryCurrency"),
        "jobDescription": item.get("jobDescription"),
        "jobRequirement": item.get("jobRequirement"),
        "benefits": item.get("benefits"),
        "skills": item.get("skills"),
        "industriesV3": item.get("industriesV3"),
        "jobFunction": item.get("jobFunction"),
        "jobLevelVI": item.get("jobLevelVI"),
        "yearsOfExperience": item.get("yearsOfExperience"),
        "typeWorkingId": item.get("typeWorkingId"),
        "languageSelectedVI": item.get("languageSelectedVI"),
        "approvedOn": item.get("approvedOn"),
        "expiredOn": item.get("expiredOn"),
        "createdOn": item.get("createdOn"),
        "lastUpdatedOn": item.get("lastUpdatedOn"),
    }) {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    RawJob {
        id: job_id,
        url: job_url,
        source: SourceId::Vietnamworks,
        raw_data,
        html_content: String::new(),
        extracted_at: Utc::now(),
        last_updated_on,
        expired_on: Some(expired_on),
    }
}

#[async_trait]
impl SourceAdapter for VietnamworksAdapter {
    fn source(&self) -> SourceId {
        SourceId::Vietnamworks
    }

    async fn crawl_with_callback(
        &self,
        cancel: &CancellationToken,
        sink: &dyn PageSink,
    ) -> Result<(), CrawlError> {
        let mut total = 0usize;

        for page in 0..self.cfg.max_pages {
            if cancel.is_cancelled() {
                break;
            }

            debug!(page = page + 1, max = self.cfg.max_pages, "fetching page");

            let (jobs, total_pages) = match self.fetch_page(page).await {
                Ok(result) => result,
                Err(err) => {
                    warn!(page = page + 1, error = %err, "page fetch failed, stopping cycle");
                    break;
                }
            };

            if jobs.is_empty() {
                debug!(page = page + 1, "no more jobs");
                break;
            }

            let count = jobs.len();
            if let Err(err) = sink.on_page(jobs).await {
                warn!(page = page + 1, error = %err, "page handler error");
            }
            total += count;

            if total_pages > 0 && page + 1 >= total_pages {
                debug!(total_pages, "reached last page");
                break;
            }

            if !pace(cancel, jitter(self.cfg.request_delay, JITTER_MS)).await {
                break;
            }
        }

        info!(total, "vietnamworks cycle finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_maps_to_raw_job_with_revision_and_expiry() {
        let Value::Object(item) = json!({
            "jobId": 1799999,
            "jobTitle": "Data Engineer",
            "jobUrl": "data-engineer-1799999-jd",
            "companyName": "Ngân hàng ACB",
            "salaryMin": 20_000_000,
            "salaryMax": 35_000_000,
            "lastUpdatedOn": "2026-07-20T08:00:00Z",
            "expiredOn": "2026-09-01T00:00:00Z",
        }) else {
            unreachable!()
        };

        let job = item_to_raw_job(&item);
        assert_eq!(job.id, "1799999");
        assert_eq!(job.url, "https://www.vietnamworks.com/data-engineer-1799999-jd");
        assert_eq!(job.source, SourceId::Vietnamworks);
        assert_eq!(job.last_updated_on, "2026-07-20T08:00:00Z");
        assert_eq!(
            job.expired_on.unwrap().to_rfc3339(),
            "2026-09-01T00:00:00+00:00"
        );
        assert_eq!(job.raw_data["jobTitle"], json!("Data Engineer"));
    }

    #[test]
    fn absolute_urls_pass_through() {
        let Value::Object(item) = json!({
            "jobId": 5,
            "jobUrl": "https://www.vietnamworks.com/abc-5-jd",
        }) else {
            unreachable!()
        };

        let job = item_to_raw_job(&item);
        assert_eq!(job.url, "https://www.vietnamworks.com/abc-5-jd");
    }

    #[test]
    fn missing_expiry_defaults_to_thirty_days() {
        let Value::Object(item) = json!({ "jobId": 9, "jobUrl": "x-9-jd" }) else {
            unreachable!()
        };

        let job = item_to_raw_job(&item);
        let ttl = job.expired_on.unwrap() - Utc::now();
        assert!(ttl > ChronoDuration::days(29));
        assert!(ttl <= ChronoDuration::days(30));
    }

    #[test]
    fn search_response_decodes_pages() {
        let raw = r#"{
            "data": [ { "jobId": 1 }, { "jobId": 2 } ],
            "meta": { "nbHits": 100, "nbPages": 2, "page": 0, "hitsPerPage": 50 }
        }"#;
        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data.len(), 2);
        assert_eq!(parsed.meta.nb_pages, 2);
    }
}
