use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CrawlerConfig;
use crate::domain::{RawJob, SourceId};
use crate::sources::{
    build_http_client, jitter, pace, send_with_retry, CrawlError, PageSink, SourceAdapter,
};

const SEARCH_API_URL: &str = "https://api.topdev.vn/td/v2/jobs";
const JOBS_PER_PAGE: u32 = 20;
const JITTER_MS: u64 = 2000;
const FIELDS: &str = "id,title,slug,company,salary,skills_str,work_locations,\
responsibilities_original,requirements_original,benefits_original";

/// TopDev listing adapter over its public jobs API.
pub struct TopdevAdapter {
    http: reqwest::Client,
    cfg: CrawlerConfig,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<JobData>,
    #[serde(default)]
    meta: SearchMeta,
}

#[derive(Debug, Default, Deserialize)]
struct SearchMeta {
    #[serde(default)]
    last_page: u32,
}

#[derive(Debug, Default, Deserialize)]
struct JobData {
    #[serde(default)]
    id: i64,
    #[serde(default)]
    slug: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    company: Company,
    #[serde(default)]
    salary: Salary,
    #[serde(default)]
    skills_str: String,
    #[serde(default)]
    skills: Vec<Skill>,
    #[serde(default)]
    work_locations: Vec<Location>,
    #[serde(default)]
    responsibilities_original: String,
    #[serde(default)]
    requirements_original: String,
    #[serde(default)]
    benefits_original: Vec<Benefit>,
    #[serde(default)]
    published_at: String,
    #[serde(default)]
    expired_at: String,
    #[serde(default)]
    years_of_experience: Value,
    #[serde(default)]
    job_level: Value,
}

#[derive(Debug, Default, Deserialize)]
struct Company {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    image_logo: String,
}

#[derive(Debug, Default, Deserialize)]
struct Salary {
    #[serde(default)]
    min_filter: i64,
    #[serde(default)]
    max_filter: i64,
    #[serde(default)]
    currency: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct Skill {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct Location {
    #[serde(default)]
    address: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    district: String,
}

#[derive(Debug, Default, Deserialize)]
struct Benefit {
    #[serde(default)]
    value: String,
}

impl TopdevAdapter {
    pub fn new(cfg: CrawlerConfig) -> Result<Self, CrawlError> {
        Ok(Self {
            http: build_http_client(&cfg)?,
            cfg,
        })
    }

    async fn fetch_page(&self, page: u32) -> Result<(Vec<RawJob>, u32), CrawlError> {
        let url = format!(
            "{SEARCH_API_URL}?page={page}&limit={JOBS_PER_PAGE}&locale=vi_VN&fields[job]={FIELDS}"
        );

        let request = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json");

        let response = send_with_retry(request, self.cfg.max_retries).await?;
        if !response.status().is_success() {
            return Err(CrawlError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        let parsed: SearchResponse = response.json().await?;
        let jobs = parsed.data.iter().map(item_to_raw_job).collect();
        Ok((jobs, parsed.meta.last_page))
    }
}

fn item_to_raw_job(item: &JobData) -> RawJob {
    let job_url = if item.slug.is_empty() {
        format!("https://topdev.vn/job/{}", item.id)
    } else {
        format!("https://topdev.vn/job/{}", item.slug)
    };

    // skills_str is the comma-separated canonical list; the structured
    // array is only a fallback.
    let skills: Vec<String> = if item.skills_str.is_empty() {
        item.skills.iter().map(|s| s.name.clone()).collect()
    } else {
        item.skills_str
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()
    };

    let locations: Vec<String> = item
        .work_locations
        .iter()
        .filter_map(|loc| {
            let parts: Vec<&str> = [&loc.address, &loc.district, &loc.city]
                .into_iter()
                .filter(|p| !p.is_empty())
                .map(String::as_str)
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        })
        .collect();

    let benefits: Vec<String> = item
        .benefits_original
        .iter()
        .filter(|b| !b.value.is_empty())
        .map(|b| b.value.clone())
        .collect();

    let raw_data = match json!({
        "title": item.title,
        "company": item.company.display_name,
        "company_logo": item.company.image_logo,
        "salary_min": item.salary.min_filter,
        "salary_max": item.salary.max_filter,
        "salary_text": item.salary.value,
        "currency": item.salary.currency,
        "skills": skills,
        "locations": locations,
        "description": item.responsibilities_original,
        "requirement": item.requirements_original,
        "benefits": benefits,
        "published_at": item.published_at,
        "expired_at": item.expired_at,
        "experience": item.years_of_experience,
        "level": item.job_level,
    }) {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    RawJob {
        id: item.id.to_string(),
        url: job_url,
        source: SourceId::Topdev,
        raw_data,
        html_content: String::new(),
        extracted_at: Utc::now(),
        last_updated_on: String::new(),
        expired_on: None,
    }
}

#[async_trait]
impl SourceAdapter for TopdevAdapter {
    fn source(&self) -> SourceId {
        SourceId::Topdev
    }

    async fn crawl_with_callback(
        &self,
        cancel: &CancellationToken,
        sink: &dyn PageSink,
    ) -> Result<(), CrawlError> {
        let mut total = 0usize;

        for page in 1..=self.cfg.max_pages {
            if cancel.is_cancelled() {
                break;
            }

            debug!(page, max = self.cfg.max_pages, "fetching page");

            let (jobs, last_page) = match self.fetch_page(page).await {
                Ok(result) => result,
                Err(err) => {
                    warn!(page, error = %err, "page fetch failed, stopping cycle");
                    break;
                }
            };

            if jobs.is_empty() {
                debug!(page, "no more jobs");
                break;
            }

            let count = jobs.len();
            if let Err(err) = sink.on_page(jobs).await {
                warn!(page, error = %err, "page handler error");
            }
            total += count;

            if last_page > 0 && page >= last_page {
                debug!(last_page, "reached last page");
                break;
            }

            if count < JOBS_PER_PAGE as usize {
                debug!(page, count, "short page, stopping");
                break;
            }

            if !pace(cancel, jitter(self.cfg.request_delay, JITTER_MS)).await {
                break;
            }
        }

        info!(total, "topdev cycle finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> JobData {
        serde_json::from_value(json!({
            "id": 910_001,
            "slug": "rust-developer-910001",
            "title": "Rust Developer",
            "company": { "display_name": "Startup X", "image_logo": "https://cdn/x.png" },
            "salary": { "min_filter": 25_000_000, "max_filter": 40_000_000,
                        "currency": "VND", "value": "25 - 40 triệu" },
            "skills_str": "Rust, Redis, PostgreSQL",
            "work_locations": [
                { "address": "12 Tôn Đản", "district": "Quận 4", "city": "Hồ Chí Minh" }
            ],
            "benefits_original": [ { "icon": "gift", "value": "Thưởng quý" } ],
        }))
        .unwrap()
    }

    #[test]
    fn builds_url_from_slug() {
        let job = item_to_raw_job(&fixture());
        assert_eq!(job.url, "https://topdev.vn/job/rust-developer-910001");
        assert_eq!(job.id, "910001");
    }

    #[test]
    fn skills_str_splits_on_commas() {
        let job = item_to_raw_job(&fixture());
        assert_eq!(
            job.raw_data["skills"],
            json!(["Rust", "Redis", "PostgreSQL"])
        );
    }

    #[test]
    fn locations_join_address_district_city() {
        let job = item_to_raw_job(&fixture());
        assert_eq!(
            job.raw_data["locations"],
            json!(["12 Tôn Đản, Quận 4, Hồ Chí Minh"])
        );
    }

    #[test]
    fn structured_skills_back_up_missing_skills_str() {
        let mut item = fixture();
        item.skills_str = String::new();
        item.skills = vec![Skill { name: "Go".into() }];
        let job = item_to_raw_job(&item);
        assert_eq!(job.raw_data["skills"], json!(["Go"]));
    }
}
