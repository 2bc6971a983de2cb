use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CrawlerConfig;
use crate::domain::{RawJob, SourceId};
use crate::sources::{jitter, pace, send_with_retry, CrawlError, PageSink, SourceAdapter};

const BASE_URL: &str = "https://careerviet.vn";
const LISTING_URL: &str = "https://careerviet.vn/viec-lam/tat-ca-viec-lam-vi.html";
const SEARCH_API: &str = "https://careerviet.vn/vi/search-jobs";
const JITTER_MS: u64 = 2000;

static PAGE_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-vi\.html$").unwrap());
static JOB_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.([A-Z0-9]+)\.html$").unwrap());

static JOB_ITEM: Lazy<Selector> = Lazy::new(|| Selector::parse(".job-item").unwrap());
static JOB_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse(".job_link").unwrap());
static DETAIL_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1.title, h2.title").unwrap());
static DETAIL_COMPANY: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".company-name, .employer-name a").unwrap());
static DETAIL_LOCATION: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".location, .job-location").unwrap());
static DETAIL_SALARY: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".salary, .lbl-salary").unwrap());
static DETAIL_EXPERIENCE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".job-exp, .experience").unwrap());
static DETAIL_BENEFITS: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".content-group .job-tag, .content-group__tag").unwrap());
static DETAIL_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".job-description, .content-tab").unwrap());

/// CareerViet adapter. One listing page holds 50 postings: the first 20 in
/// server-rendered HTML, the remaining 30 behind an XHR search API that
/// shares the site session, so both run over one cookie-keeping client.
pub struct CareervietAdapter {
    http: reqwest::Client,
    cfg: CrawlerConfig,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    result: ApiResult,
}

#[derive(Debug, Default, Deserialize)]
struct ApiResult {
    #[serde(default)]
    data: Vec<ApiJob>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiJob {
    #[serde(rename = "JOB_ID", default)]
    job_id: String,
    #[serde(rename = "JOB_TITLE", default)]
    job_title: String,
    #[serde(rename = "EMP_NAME", default)]
    company_name: String,
    #[serde(rename = "LINK_JOB", default)]
    job_link: String,
    #[serde(rename = "JOB_SALARY_STRING", default)]
    salary: String,
    #[serde(rename = "LOCATION_NAME_ARR", default)]
    locations: Vec<String>,
    #[serde(rename = "BENEFIT_NAME", default)]
    benefits: Vec<String>,
    #[serde(rename = "EXPIRE_DATE", default)]
    expire_date: String,
    #[serde(rename = "LINK_LOGO_EMP", default)]
    company_logo: String,
}

impl CareervietAdapter {
    pub fn new(cfg: CrawlerConfig) -> Result<Self, CrawlError> {
        // Cookie store shared between the HTML and XHR halves of a page.
        let mut builder = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .user_agent(cfg.user_agent.clone())
            .cookie_store(true);

        if !cfg.proxy_url.is_empty() {
            let proxy = reqwest::Proxy::all(&cfg.proxy_url).map_err(CrawlError::Client)?;
            builder = builder.proxy(proxy);
        }

        Ok(Self {
            http: builder.build().map_err(CrawlError::Client)?,
            cfg,
        })
    }

    async fn fetch_html(&self, url: &str) -> Result<String, CrawlError> {
        let request = self
            .http
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml")
            .header("Accept-Language", "vi-VN,vi;q=0.9,en;q=0.8");

        let response = send_with_retry(request, self.cfg.max_retries).await?;
        if !response.status().is_success() {
            return Err(CrawlError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }

    /// The XHR half of the listing: a form-encoded POST the site frontend
    /// issues for the jobs below the fold.
    async fn fetch_api_page(&self, page: u32) -> Result<Vec<RawJob>, CrawlError> {
        let mut form: Vec<(&str, String)> = vec![
            ("dataOne", "a:0:{}".to_string()),
            ("dataTwo", "a:0:{}".to_string()),
        ];
        if page > 1 {
            form.push(("page", page.to_string()));
        }

        let request = self
            .http
            .post(SEARCH_API)
            .header("X-Requested-With", "XMLHttpRequest")
            .header("Accept", "application/json, text/javascript, */*; q=0.01")
            .header("Accept-Language", "vi-VN,vi;q=0.9,en;q=0.8")
            .header("Origin", BASE_URL)
            .header("Referer", LISTING_URL)
            .form(&form);

        let response = send_with_retry(request, self.cfg.max_retries).await?;
        if !response.status().is_success() {
            return Err(CrawlError::Status {
                status: response.status().as_u16(),
                url: SEARCH_API.to_string(),
            });
        }

        let parsed: ApiResponse = response.json().await?;
        Ok(parsed
            .result
            .data
            .iter()
            .filter(|job| !job.job_link.is_empty())
            .map(|job| api_job_to_raw(job, page))
            .collect())
    }

    async fn fetch_detail(&self, url: &str) -> Result<RawJob, CrawlError> {
        let html = self.fetch_html(url).await?;
        Ok(parse_detail(url, &html))
    }
}

/// Pagination URLs look like `tat-ca-viec-lam-trang-2-vi.html`.
fn build_page_url(page: u32) -> String {
    if page <= 1 {
        return LISTING_URL.to_string();
    }
    PAGE_SUFFIX_RE
        .replace(LISTING_URL, format!("-trang-{page}-vi.html"))
        .into_owned()
}

/// Job id is the upper-case token before `.html` in a detail URL.
fn extract_job_id(url: &str) -> String {
    JOB_ID_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

fn parse_listing(html: &str, page: u32) -> Vec<RawJob> {
    let doc = Html::parse_document(html);

    doc.select(&JOB_ITEM)
        .filter_map(|item| {
            let link = item.select(&JOB_LINK).next()?;
            let href = link.value().attr("href")?;
            let url = if href.starts_with("http") {
                href.to_string()
            } else {
                format!("{BASE_URL}{href}")
            };

            let raw_data = match json!({
                "title": element_text(&link),
                "company": child_text(&item, &DETAIL_COMPANY),
                "salary": child_text(&item, &DETAIL_SALARY),
                "location": child_text(&item, &DETAIL_LOCATION),
                "page": page,
                "listing_source": "html",
            }) {
                Value::Object(map) => map,
                _ => Map::new(),
            };

            Some(RawJob {
                id: extract_job_id(&url),
                url,
                source: SourceId::Careerviet,
                raw_data,
                html_content: String::new(),
                extracted_at: Utc::now(),
                last_updated_on: String::new(),
                expired_on: None,
            })
        })
        .collect()
}

fn api_job_to_raw(job: &ApiJob, page: u32) -> RawJob {
    let raw_data = match json!({
        "title": job.job_title,
        "company": job.company_name,
        "salary": job.salary,
        "locations": job.locations,
        "benefits": job.benefits,
        "expire": job.expire_date,
        "logo": job.company_logo,
        "page": page,
        "listing_source": "api",
    }) {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    RawJob {
        id: job.job_id.clone(),
        url: job.job_link.clone(),
        source: SourceId::Careerviet,
        raw_data,
        html_content: String::new(),
        extracted_at: Utc::now(),
        last_updated_on: String::new(),
        expired_on: None,
    }
}

fn parse_detail(url: &str, html: &str) -> RawJob {
    let doc = Html::parse_document(html);

    let benefits: Vec<String> = doc
        .select(&DETAIL_BENEFITS)
        .map(|el| element_text(&el))
        .filter(|text| !text.is_empty())
        .collect();

    let raw_data = match json!({
        "title": doc_text(&doc, &DETAIL_TITLE),
        "company": doc_text(&doc, &DETAIL_COMPANY),
        "location": doc_text(&doc, &DETAIL_LOCATION),
        "salary": doc_text(&doc, &DETAIL_SALARY),
        "experience": doc_text(&doc, &DETAIL_EXPERIENCE),
        "benefits": benefits,
        "description": doc_text(&doc, &DETAIL_DESCRIPTION),
    }) {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    RawJob {
        id: extract_job_id(url),
        url: url.to_string(),
        source: SourceId::Careerviet,
        raw_data,
        html_content: String::new(),
        extracted_at: Utc::now(),
        last_updated_on: String::new(),
        expired_on: None,
    }
}

fn element_text(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn child_text(el: &ElementRef, selector: &Selector) -> String {
    el.select(selector)
        .next()
        .map(|child| element_text(&child))
        .unwrap_or_default()
}

fn doc_text(doc: &Html, selector: &Selector) -> String {
    doc.select(selector)
        .next()
        .map(|el| element_text(&el))
        .unwrap_or_default()
}

#[async_trait]
impl SourceAdapter for CareervietAdapter {
    fn source(&self) -> SourceId {
        SourceId::Careerviet
    }

    async fn crawl_with_callback(
        &self,
        cancel: &CancellationToken,
        sink: &dyn PageSink,
    ) -> Result<(), CrawlError> {
        let mut total = 0usize;

        'pages: for page in 1..=self.cfg.max_pages {
            if cancel.is_cancelled() {
                break;
            }

            debug!(page, "fetching listing page");

            let mut listed = match self.fetch_html(&build_page_url(page)).await {
                Ok(html) => parse_listing(&html, page),
                Err(err) => {
                    warn!(page, error = %err, "listing fetch failed, stopping cycle");
                    break;
                }
            };

            // The API half is best-effort; the HTML jobs already cover the
            // top of the page.
            match self.fetch_api_page(page).await {
                Ok(mut api_jobs) => listed.append(&mut api_jobs),
                Err(err) => warn!(page, error = %err, "api listing failed, html jobs only"),
            }

            if listed.is_empty() {
                debug!(page, "no more jobs");
                break;
            }

            let mut jobs = Vec::with_capacity(listed.len());
            for shallow in &listed {
                if cancel.is_cancelled() {
                    break 'pages;
                }
                if shallow.url.is_empty() {
                    continue;
                }

                match self.fetch_detail(&shallow.url).await {
                    Ok(job) => jobs.push(job),
                    Err(err) => warn!(url = %shallow.url, error = %err, "detail fetch failed"),
                }

                if !pace(cancel, jitter(self.cfg.request_delay, JITTER_MS)).await {
                    break 'pages;
                }
            }

            total += jobs.len();
            if !jobs.is_empty() {
                if let Err(err) = sink.on_page(jobs).await {
                    warn!(page, error = %err, "page handler error");
                }
            }

            if !pace(cancel, jitter(self.cfg.request_delay, JITTER_MS)).await {
                break;
            }
        }

        info!(total, "careerviet cycle finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_url_rewrites_suffix() {
        assert_eq!(build_page_url(1), LISTING_URL);
        assert_eq!(
            build_page_url(3),
            "https://careerviet.vn/viec-lam/tat-ca-viec-lam-trang-3-vi.html"
        );
    }

    #[test]
    fn job_id_comes_from_url_suffix() {
        assert_eq!(
            extract_job_id("https://careerviet.vn/vi/tim-viec-lam/ke-toan.35C1D2E3.html"),
            "35C1D2E3"
        );
        assert_eq!(extract_job_id("https://careerviet.vn/vi/abc.html"), "");
    }

    #[test]
    fn listing_html_yields_shallow_records() {
        let html = r#"
            <div class="job-item">
              <a class="job_link" href="/vi/tim-viec-lam/ke-toan.ABC123.html">Kế toán</a>
              <div class="company-name">Công ty A</div>
              <div class="salary">10 - 12 triệu</div>
              <div class="location">Hà Nội</div>
            </div>
        "#;

        let jobs = parse_listing(html, 1);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, "ABC123");
        assert_eq!(
            jobs[0].url,
            "https://careerviet.vn/vi/tim-viec-lam/ke-toan.ABC123.html"
        );
        assert_eq!(jobs[0].raw_data["company"], json!("Công ty A"));
    }

    #[test]
    fn api_response_decodes_upper_case_keys() {
        let raw = r#"{
            "result": { "data": [ {
                "JOB_ID": "J9",
                "JOB_TITLE": "Sales",
                "EMP_NAME": "ABC Ltd",
                "LINK_JOB": "https://careerviet.vn/vi/tim-viec-lam/sales.J9.html",
                "JOB_SALARY_STRING": "Thỏa thuận",
                "LOCATION_NAME_ARR": ["Hồ Chí Minh"],
                "BENEFIT_NAME": ["Bảo hiểm"],
                "EXPIRE_DATE": "2026-09-30"
            } ] }
        }"#;

        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        let job = api_job_to_raw(&parsed.result.data[0], 2);
        assert_eq!(job.id, "J9");
        assert_eq!(job.raw_data["listing_source"], json!("api"));
        assert_eq!(job.raw_data["locations"], json!(["Hồ Chí Minh"]));
    }

    #[test]
    fn detail_page_extracts_generic_fields() {
        let html = r#"
            <html><body>
              <h1 class="title">Trưởng phòng nhân sự</h1>
              <div class="employer-name"><a>Công ty CP Z</a></div>
              <div class="job-location">Hải Phòng</div>
              <div class="lbl-salary">Trên 20 triệu</div>
              <div class="job-exp">5 năm</div>
              <div class="content-group"><span class="job-tag">Du lịch hàng năm</span></div>
              <div class="job-description">Quản lý đội ngũ tuyển dụng</div>
            </body></html>
        "#;

        let job = parse_detail("https://careerviet.vn/vi/x.HR77.html", html);
        assert_eq!(job.id, "HR77");
        assert_eq!(job.raw_data["title"], json!("Trưởng phòng nhân sự"));
        assert_eq!(job.raw_data["experience"], json!("5 năm"));
        assert_eq!(job.raw_data["benefits"], json!(["Du lịch hàng năm"]));
    }
}
