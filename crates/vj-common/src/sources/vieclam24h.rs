use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CrawlerConfig;
use crate::domain::{RawJob, SourceId};
use crate::sources::{
    build_http_client, jitter, pace, send_with_retry, CrawlError, PageSink, SourceAdapter,
};

const BASE_URL: &str = "https://vieclam24h.vn";
const SEARCH_API: &str = "https://apiv2.vieclam24h.vn/employer/fe/job/get-job-list";
const JOBS_PER_PAGE: u32 = 30;
// This portal throttles harder than the others.
const JITTER_MS: u64 = 3000;

/// vieclam24h listing adapter. Its records flow to the pending queue for a
/// detail scrape, so the listing only carries what the API hands out.
pub struct Vieclam24hAdapter {
    http: reqwest::Client,
    cfg: CrawlerConfig,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: ApiData,
}

#[derive(Debug, Default, Deserialize)]
struct ApiData {
    #[serde(default)]
    items: Vec<JobItem>,
    #[serde(default)]
    pagination: Pagination,
}

#[derive(Debug, Default, Deserialize)]
struct Pagination {
    #[serde(default)]
    last_page: u32,
}

#[derive(Debug, Default, Deserialize)]
struct JobItem {
    #[serde(default)]
    id: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    title_slug: String,
    #[serde(default)]
    occupation_ids_main: Vec<i64>,
    #[serde(default)]
    field_ids_main: i64,
    #[serde(default)]
    field_ids_sub: Value,
    #[serde(default)]
    province_ids: Vec<i64>,
    #[serde(default)]
    district_ids: Vec<i64>,
    #[serde(default)]
    employer_id: i64,
    #[serde(default)]
    employer_info: EmployerInfo,
    #[serde(default)]
    vacancy_quantity: i64,
    #[serde(default)]
    working_method: i64,
    #[serde(default)]
    salary_unit: i64,
    #[serde(default)]
    resume_apply_expired: i64,
    #[serde(default)]
    degree_requirement: i64,
    #[serde(default)]
    gender: i64,
    #[serde(default)]
    experience_range: i64,
    #[serde(default)]
    level_requirement: i64,
    #[serde(default)]
    created_at: i64,
    #[serde(default)]
    updated_at: i64,
    #[serde(default)]
    total_views: i64,
    #[serde(default)]
    total_resume_applied: i64,
    #[serde(default)]
    contact_address: String,
    #[serde(default)]
    job_requirement_html: String,
    #[serde(default)]
    other_requirement_html: String,
    #[serde(default)]
    salary_from: i64,
    #[serde(default)]
    salary_to: i64,
    #[serde(default)]
    salary_text: String,
}

#[derive(Debug, Default, Deserialize)]
struct EmployerInfo {
    #[serde(default)]
    name: String,
    #[serde(default)]
    logo: String,
    #[serde(default)]
    rate_response: i64,
}

impl Vieclam24hAdapter {
    pub fn new(cfg: CrawlerConfig) -> Result<Self, CrawlError> {
        Ok(Self {
            http: build_http_client(&cfg)?,
            cfg,
        })
    }

    async fn fetch_page(&self, page: u32) -> Result<ApiResponse, CrawlError> {
        let url = format!(
            "{SEARCH_API}?page={page}&per_page={JOBS_PER_PAGE}&request_from=search_result_web"
        );

        let request = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .header(
                "Authorization",
                format!("Bearer {}", self.cfg.vl24h_bearer_token),
            )
            .header("X-Branch", self.cfg.vl24h_branch.clone());

        let response = send_with_retry(request, self.cfg.max_retries).await?;
        if !response.status().is_success() {
            return Err(CrawlError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        let parsed: ApiResponse = response.json().await?;
        if parsed.code != 200 {
            return Err(CrawlError::Api(parsed.msg));
        }

        Ok(parsed)
    }
}

fn item_to_raw_job(item: &JobItem) -> RawJob {
    let province = item.province_ids.first().copied().unwrap_or(0);
    let job_url = format!(
        "{BASE_URL}/{}-c{}p{}id{}.html",
        item.title_slug, item.field_ids_main, province, item.id
    );

    let expired_on = if item.resume_apply_expired > 0 {
        Utc.timestamp_opt(item.resume_apply_expired, 0).single()
    } else {
        None
    };

    // The description lives on the detail page; the enricher fills it in
    // from JSON-LD.
    let raw_data = match json!({
        "jobId": item.id,
        "jobTitle": item.title,
        "jobUrl": job_url,
        "companyId": item.employer_id,
        "companyName": item.employer_info.name,
        "companyLogo": item.employer_info.logo,
        "provinceIds": item.province_ids,
        "districtIds": item.district_ids,
        "contactAddress": item.contact_address,
        "salaryFrom": item.salary_from,
        "salaryTo": item.salary_to,
        "salaryText": item.salary_text,
        "salaryUnit": item.salary_unit,
        "jobDescription": "",
        "jobRequirement": item.job_requirement_html,
        "otherRequirement": item.other_requirement_html,
        "occupationIds": item.occupation_ids_main,
        "fieldIdMain": item.field_ids_main,
        "fieldIdsSub": item.field_ids_sub,
        "levelRequirement": item.level_requirement,
        "degreeRequirement": item.degree_requirement,
        "experienceRange": item.experience_range,
        "workingMethod": item.working_method,
        "gender": item.gender,
        "vacancyQuantity": item.vacancy_quantity,
        "totalViews": item.total_views,
        "totalResumeApplied": item.total_resume_applied,
        "rateResponse": item.employer_info.rate_response,
        "createdAt": item.created_at,
        "updatedAt": item.updated_at,
        "expiredAt": item.resume_apply_expired,
    }) {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    RawJob {
        id: item.id.to_string(),
        url: job_url,
        source: SourceId::Vieclam24h,
        raw_data,
        html_content: String::new(),
        extracted_at: Utc::now(),
        last_updated_on: item.updated_at.to_string(),
        expired_on,
    }
}

#[async_trait]
impl SourceAdapter for Vieclam24hAdapter {
    fn source(&self) -> SourceId {
        SourceId::Vieclam24h
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

            debug!(page, "fetching page");

            let response = match self.fetch_page(page).await {
                Ok(response) => response,
                Err(err) => {
                    warn!(page, error = %err, "page fetch failed, stopping cycle");
                    break;
                }
            };

            if response.data.items.is_empty() {
                debug!(page, "no more jobs");
                break;
            }

            let count = response.data.items.len();
            let jobs: Vec<RawJob> = response.data.items.iter().map(item_to_raw_job).collect();
            if let Err(err) = sink.on_page(jobs).await {
                warn!(page, error = %err, "page handler error");
            }
            total += count;

            let last_page = response.data.pagination.last_page;
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

        info!(total, "vieclam24h cycle finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> JobItem {
        serde_json::from_value(json!({
            "id": 200123,
            "title": "Nhân viên kinh doanh",
            "title_slug": "nhan-vien-kinh-doanh",
            "field_ids_main": 24,
            "province_ids": [1, 2],
            "district_ids": [5],
            "employer_id": 998,
            "employer_info": { "name": "Công ty B", "logo": "", "rate_response": 80 },
            "resume_apply_expired": 1_767_200_000,
            "created_at": 1_760_000_000,
            "updated_at": 1_764_000_000,
            "salary_from": 8_000_000,
            "salary_to": 12_000_000,
            "job_requirement_html": "<p>Giao tiếp tốt</p>",
        }))
        .unwrap()
    }

    #[test]
    fn synthesizes_detail_url() {
        let job = item_to_raw_job(&fixture());
        assert_eq!(
            job.url,
            "https://vieclam24h.vn/nhan-vien-kinh-doanh-c24p1id200123.html"
        );
    }

    #[test]
    fn revision_token_is_the_update_epoch() {
        let job = item_to_raw_job(&fixture());
        assert_eq!(job.last_updated_on, "1764000000");
        assert_eq!(job.expired_on.unwrap().timestamp(), 1_767_200_000);
    }

    #[test]
    fn missing_expiry_stays_unknown() {
        let mut item = fixture();
        item.resume_apply_expired = 0;
        let job = item_to_raw_job(&item);
        assert!(job.expired_on.is_none());
    }

    #[test]
    fn api_envelope_decodes() {
        let raw = r#"{
            "code": 200,
            "msg": "ok",
            "data": {
                "items": [ { "id": 1, "title": "x", "title_slug": "x" } ],
                "pagination": { "current_page": 1, "last_page": 4, "per_page": 30, "total": 100 }
            }
        }"#;
        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.code, 200);
        assert_eq!(parsed.data.items.len(), 1);
        assert_eq!(parsed.data.pagination.last_page, 4);
    }
}
