//! Detail-page enrichment for vieclam24h.
//!
//! Consumes the pending queue one record at a time, fetches the posting's
//! HTML, folds the embedded JSON-LD `JobPosting` and a few DOM fragments
//! into `raw_data`, and re-publishes to the raw queue with the HTML
//! stripped. Raw JSON-LD blobs are forwarded to a diagnostic queue so
//! upstream schema drift can be inspected offline.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CrawlerConfig;
use crate::domain::RawJob;
use crate::queue::{Consumer, Publisher, QueueError};
use crate::sources::{jitter, pace};

const DEFAULT_DELAY: Duration = Duration::from_secs(5);
const JITTER_MS: u64 = 3000;

static JSONLD: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());
static CANONICAL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"link[rel="canonical"]"#).unwrap());
static INFO_COLUMN: Lazy<Selector> = Lazy::new(|| Selector::parse("div.flex.flex-col").unwrap());

/// JSON-LD `JobPosting` as the portal renders it.
#[derive(Debug, Default, Deserialize)]
struct JobPosting {
    #[serde(rename = "@type", default)]
    kind: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "jobBenefits", default)]
    job_benefits: String,
    #[serde(default)]
    skills: String,
    #[serde(default)]
    qualifications: String,
    #[serde(default)]
    industry: String,
    #[serde(rename = "occupationalCategory", default)]
    occupational_category: String,
    #[serde(rename = "employmentType", default)]
    employment_type: String,
    #[serde(rename = "hiringOrganization", default)]
    hiring_organization: Organization,
    #[serde(rename = "jobLocation", default)]
    job_location: Vec<JsonLdLocation>,
    #[serde(rename = "baseSalary", default)]
    base_salary: BaseSalary,
}

#[derive(Debug, Default, Deserialize)]
struct Organization {
    #[serde(rename = "sameAs", default)]
    same_as: String,
}

#[derive(Debug, Default, Deserialize)]
struct JsonLdLocation {
    #[serde(default)]
    address: JsonLdAddress,
}

#[derive(Debug, Default, Deserialize)]
struct JsonLdAddress {
    #[serde(rename = "addressLocality", default)]
    locality: String,
    #[serde(rename = "addressRegion", default)]
    region: String,
}

#[derive(Debug, Default, Deserialize)]
struct BaseSalary {
    #[serde(default)]
    currency: String,
    #[serde(default)]
    value: SalaryValue,
}

#[derive(Debug, Default, Deserialize)]
struct SalaryValue {
    #[serde(rename = "minValue", default)]
    min_value: i64,
    #[serde(rename = "maxValue", default)]
    max_value: i64,
    /// Free text like "Thỏa thuận" when the posting is negotiable.
    #[serde(default)]
    value: String,
}

/// Queue-driven detail scraper.
pub struct DetailScraper {
    consumer: Consumer,
    publisher: Publisher,
    jsonld_publisher: Publisher,
    http: reqwest::Client,
    base_delay: Duration,
}

impl DetailScraper {
    pub fn new(
        consumer: Consumer,
        publisher: Publisher,
        jsonld_publisher: Publisher,
        cfg: &CrawlerConfig,
    ) -> Self {
        let base_delay = if cfg.request_delay.is_zero() {
            DEFAULT_DELAY
        } else {
            cfg.request_delay
        };

        Self {
            consumer,
            publisher,
            jsonld_publisher,
            http: reqwest::Client::new(),
            base_delay,
        }
    }

    pub async fn run(&self, cancel: &CancellationToken) -> Result<(), QueueError> {
        info!(
            pending = self.consumer.queue_name(),
            raw = self.publisher.queue_name(),
            delay_ms = self.base_delay.as_millis() as u64,
            "detail scraper started"
        );

        let token = cancel.clone();
        self.consumer
            .run(cancel, move |job| self.handle(token.clone(), job))
            .await
    }

    async fn handle(&self, cancel: CancellationToken, mut job: RawJob) -> Result<(), QueueError> {
        debug!(job_id = %job.id, url = %job.url, "scraping detail page");

        match self.fetch_html(&job.url).await {
            Ok(html) => {
                job.html_content = html;
                self.forward_jsonld(&job).await;
                enrich_from_html(&mut job);
                // Strip the page before publishing; broker payloads stay small.
                job.html_content = String::new();
            }
            Err(err) => {
                // The listing API data is rich enough to index on its own.
                warn!(job_id = %job.id, error = %err, "detail fetch failed, publishing as-is");
            }
        }

        job.extracted_at = Utc::now();
        self.publisher.publish(&job).await?;
        if let Ok(depth) = self.publisher.len().await {
            debug!(job_id = %job.id, depth, "published to raw queue");
        }

        pace(&cancel, jitter(self.base_delay, JITTER_MS)).await;
        Ok(())
    }

    async fn fetch_html(&self, url: &str) -> Result<String, reqwest::Error> {
        let response = self
            .http
            .get(url)
            .header(
                "User-Agent",
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            )
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            )
            .header("Accept-Language", "vi-VN,vi;q=0.9")
            .timeout(Duration::from_secs(30))
            .send()
            .await?
            .error_for_status()?;

        response.text().await
    }

    /// Push every JSON-LD blob on the page to the diagnostic queue, tagged
    /// with the job id and extraction time.
    async fn forward_jsonld(&self, job: &RawJob) {
        for mut blob in extract_jsonld_blocks(&job.html_content) {
            blob.insert("_jobId".to_string(), json!(job.id));
            blob.insert("_extractedAt".to_string(), json!(Utc::now().to_rfc3339()));

            if let Err(err) = self.jsonld_publisher.publish_raw(&blob).await {
                warn!(job_id = %job.id, error = %err, "failed to forward json-ld");
            }
        }
    }
}

/// Every valid JSON object in a `ld+json` script on the page.
fn extract_jsonld_blocks(html: &str) -> Vec<Map<String, Value>> {
    let doc = Html::parse_document(html);
    doc.select(&JSONLD)
        .filter_map(|script| {
            let text: String = script.text().collect();
            serde_json::from_str::<Map<String, Value>>(text.trim()).ok()
        })
        .collect()
}

/// Fold the detail page into `raw_data`: the canonical URL, the scraped
/// experience text, and every `JobPosting` JSON-LD field worth keeping.
pub fn enrich_from_html(job: &mut RawJob) {
    let html = std::mem::take(&mut job.html_content);
    let doc = Html::parse_document(&html);

    if let Some(canonical) = doc
        .select(&CANONICAL)
        .next()
        .and_then(|link| link.value().attr("href"))
    {
        job.raw_data
            .insert("canonicalUrl".to_string(), json!(canonical));
    }

    // The experience requirement renders as a label/value column pair, and
    // the scraped text beats the API's numeric range code.
    if let Some(text) = extract_experience_text(&doc) {
        job.raw_data.insert("experienceText".to_string(), json!(text));
    }

    for script in doc.select(&JSONLD) {
        let text: String = script.text().collect();
        let Ok(posting) = serde_json::from_str::<JobPosting>(text.trim()) else {
            continue;
        };
        if posting.kind != "JobPosting" {
            continue;
        }
        merge_job_posting(&mut job.raw_data, &posting);
        debug!(job_id = %job.id, description_len = posting.description.len(), "merged json-ld");
    }

    job.html_content = html;
}

fn extract_experience_text(doc: &Html) -> Option<String> {
    for column in doc.select(&INFO_COLUMN) {
        let children: Vec<ElementRef> = column
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "div")
            .collect();

        if children.len() < 2 {
            continue;
        }

        let label: String = children[0].text().collect::<String>().trim().to_string();
        if label == "Kinh nghiệm" {
            let value: String = children[1].text().collect::<String>().trim().to_string();
            return Some(value);
        }
    }
    None
}

fn merge_job_posting(data: &mut Map<String, Value>, posting: &JobPosting) {
    if !posting.description.is_empty() {
        data.insert("jobDescription".to_string(), json!(posting.description));
    }
    if !posting.job_benefits.is_empty() {
        data.insert("jobBenefits".to_string(), json!(posting.job_benefits));
    }
    if !posting.skills.is_empty() {
        data.insert("skills".to_string(), json!(posting.skills));
    }
    if !posting.qualifications.is_empty() {
        data.insert("qualifications".to_string(), json!(posting.qualifications));
    }
    if !posting.industry.is_empty() {
        let industries: Vec<String> = posting
            .industry
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| part.to_string())
            .collect();
        data.insert("industry".to_string(), json!(industries));
    }
    if !posting.occupational_category.is_empty() {
        data.insert(
            "occupationalCategory".to_string(),
            json!(posting.occupational_category),
        );
    }
    if !posting.employment_type.is_empty() {
        data.insert("employmentType".to_string(), json!(posting.employment_type));
    }
    if !posting.hiring_organization.same_as.is_empty() {
        data.insert(
            "companyWebsite".to_string(),
            json!(posting.hiring_organization.same_as),
        );
    }

    if !posting.job_location.is_empty() {
        let mut seen_cities = HashSet::new();
        let mut seen_districts = HashSet::new();
        let mut cities = Vec::new();
        let mut districts = Vec::new();

        for location in &posting.job_location {
            let region = &location.address.region;
            if !region.is_empty() && seen_cities.insert(region.clone()) {
                cities.push(region.clone());
            }
            let locality = &location.address.locality;
            if !locality.is_empty() && seen_districts.insert(locality.clone()) {
                districts.push(locality.clone());
            }
        }

        if !cities.is_empty() {
            data.insert("locationCity".to_string(), json!(cities));
        }
        if !districts.is_empty() {
            data.insert("locationDistrict".to_string(), json!(districts));
        }
    }

    let salary = &posting.base_salary.value;
    if salary.min_value > 0 || salary.max_value > 0 {
        data.insert("salaryMinJsonLd".to_string(), json!(salary.min_value));
        data.insert("salaryMaxJsonLd".to_string(), json!(salary.max_value));
        data.insert(
            "salaryCurrency".to_string(),
            json!(posting.base_salary.currency),
        );
    }
    if !salary.value.is_empty() {
        data.insert("salaryTextJsonLd".to_string(), json!(salary.value));
        data.insert("isNegotiable".to_string(), json!(true));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SourceId;

    fn raw_job_with_html(html: &str) -> RawJob {
        RawJob {
            id: "200123".into(),
            url: "https://vieclam24h.vn/x-c24p1id200123.html".into(),
            source: SourceId::Vieclam24h,
            raw_data: Map::new(),
            html_content: html.to_string(),
            extracted_at: Utc::now(),
            last_updated_on: "1".into(),
            expired_on: None,
        }
    }

    const DETAIL_PAGE: &str = r#"
        <html><head>
          <link rel="canonical" href="https://vieclam24h.vn/canonical-url.html"/>
          <script type="application/ld+json">
          {
            "@context": "https://schema.org/",
            "@type": "JobPosting",
            "description": "Tư vấn và chăm sóc khách hàng",
            "jobBenefits": "Thưởng quý, du lịch",
            "skills": "Bán hàng, Giao tiếp",
            "qualifications": "Trung cấp",
            "industry": "Bán lẻ, Thương mại điện tử",
            "occupationalCategory": "Kinh doanh",
            "employmentType": "FULL_TIME",
            "hiringOrganization": { "@type": "Organization", "sameAs": "https://congtyb.vn" },
            "jobLocation": [
              { "address": { "addressLocality": "Thanh Xuân", "addressRegion": "Hà Nội" } },
              { "address": { "addressLocality": "Cầu Giấy", "addressRegion": "Hà Nội" } }
            ],
            "baseSalary": {
              "currency": "VND",
              "value": { "minValue": 8000000, "maxValue": 12000000 }
            }
          }
          </script>
        </head><body>
          <div class="flex flex-col w-full">
            <div>Kinh nghiệm</div>
            <div>1 năm</div>
          </div>
        </body></html>
    "#;

    #[test]
    fn merges_jsonld_into_raw_data() {
        let mut job = raw_job_with_html(DETAIL_PAGE);
        enrich_from_html(&mut job);

        assert_eq!(
            job.raw_data["jobDescription"],
            json!("Tư vấn và chăm sóc khách hàng")
        );
        assert_eq!(
            job.raw_data["industry"],
            json!(["Bán lẻ", "Thương mại điện tử"])
        );
        assert_eq!(job.raw_data["companyWebsite"], json!("https://congtyb.vn"));
        assert_eq!(job.raw_data["salaryMinJsonLd"], json!(8_000_000));
        assert_eq!(job.raw_data["salaryMaxJsonLd"], json!(12_000_000));
        assert!(job.raw_data.get("isNegotiable").is_none());
    }

    #[test]
    fn deduplicates_locations_across_entries() {
        let mut job = raw_job_with_html(DETAIL_PAGE);
        enrich_from_html(&mut job);

        assert_eq!(job.raw_data["locationCity"], json!(["Hà Nội"]));
        assert_eq!(
            job.raw_data["locationDistrict"],
            json!(["Thanh Xuân", "Cầu Giấy"])
        );
    }

    #[test]
    fn extracts_experience_and_canonical_from_dom() {
        let mut job = raw_job_with_html(DETAIL_PAGE);
        enrich_from_html(&mut job);

        assert_eq!(job.raw_data["experienceText"], json!("1 năm"));
        assert_eq!(
            job.raw_data["canonicalUrl"],
            json!("https://vieclam24h.vn/canonical-url.html")
        );
    }

    #[test]
    fn negotiable_salary_text_sets_the_flag() {
        let html = r#"
            <script type="application/ld+json">
            { "@type": "JobPosting", "description": "x",
              "baseSalary": { "currency": "VND", "value": { "value": "Thỏa thuận" } } }
            </script>
        "#;
        let mut job = raw_job_with_html(html);
        enrich_from_html(&mut job);

        assert_eq!(job.raw_data["isNegotiable"], json!(true));
        assert_eq!(job.raw_data["salaryTextJsonLd"], json!("Thỏa thuận"));
    }

    #[test]
    fn non_jobposting_blocks_are_ignored_but_forwardable() {
        let html = r#"
            <script type="application/ld+json">
            { "@type": "BreadcrumbList", "itemListElement": [] }
            </script>
        "#;
        let mut job = raw_job_with_html(html);

        let blocks = extract_jsonld_blocks(&job.html_content);
        assert_eq!(blocks.len(), 1);

        enrich_from_html(&mut job);
        assert!(job.raw_data.get("jobDescription").is_none());
    }
}
