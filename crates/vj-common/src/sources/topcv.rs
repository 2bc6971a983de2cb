use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CrawlerConfig;
use crate::domain::{RawJob, SourceId};
use crate::sources::{
    build_http_client, jitter, pace, send_with_retry, CrawlError, PageSink, SourceAdapter,
};

const BASE_URL: &str = "https://www.topcv.vn";
const LISTING_URL: &str = "https://www.topcv.vn/tim-viec-lam-moi-nhat";
const JITTER_MS: u64 = 2000;

static JOB_ITEM: Lazy<Selector> = Lazy::new(|| Selector::parse(".job-item").unwrap());
static JOB_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a.job-item-link").unwrap());
static NEXT_DATA: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script#__NEXT_DATA__").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("h1.job-title").unwrap());
static COMPANY: Lazy<Selector> = Lazy::new(|| Selector::parse(".company-name").unwrap());
static LOCATION: Lazy<Selector> = Lazy::new(|| Selector::parse(".job-location").unwrap());
static SALARY: Lazy<Selector> = Lazy::new(|| Selector::parse(".salary-text").unwrap());

/// TopCV adapter. The portal is a Next.js app, so each detail page embeds
/// the full job record in its `__NEXT_DATA__` script; plain CSS selectors
/// are only the fallback.
pub struct TopcvAdapter {
    http: reqwest::Client,
    cfg: CrawlerConfig,
}

#[derive(Debug, Deserialize)]
struct NextData {
    #[serde(default)]
    props: NextProps,
}

#[derive(Debug, Default, Deserialize)]
struct NextProps {
    #[serde(rename = "pageProps", default)]
    page_props: NextPageProps,
}

#[derive(Debug, Default, Deserialize)]
struct NextPageProps {
    #[serde(default)]
    job: Option<Map<String, Value>>,
}

impl TopcvAdapter {
    pub fn new(cfg: CrawlerConfig) -> Result<Self, CrawlError> {
        Ok(Self {
            http: build_http_client(&cfg)?,
            cfg,
        })
    }

    async fn fetch_html(&self, url: &str) -> Result<String, CrawlError> {
        let request = self
            .http
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml")
            .header("Accept-Language", "vi-VN,vi;q=0.9");

        let response = send_with_retry(request, self.cfg.max_retries).await?;
        if !response.status().is_success() {
            return Err(CrawlError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }

    async fn fetch_detail(&self, url: &str) -> Result<RawJob, CrawlError> {
        let html = self.fetch_html(url).await?;
        Ok(parse_detail(url, &html))
    }
}

/// Job links on one listing page, made absolute.
fn parse_listing(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    doc.select(&JOB_ITEM)
        .filter_map(|item| {
            item.select(&JOB_LINK)
                .next()
                .and_then(|link| link.value().attr("href"))
        })
        .map(|href| {
            if href.starts_with("http") {
                href.to_string()
            } else {
                format!("{BASE_URL}{href}")
            }
        })
        .collect()
}

fn parse_detail(url: &str, html: &str) -> RawJob {
    let doc = Html::parse_document(html);

    let raw_data = next_data_job(&doc).unwrap_or_else(|| fallback_fields(&doc));

    RawJob {
        id: String::new(),
        url: url.to_string(),
        source: SourceId::Topcv,
        raw_data,
        html_content: String::new(),
        extracted_at: Utc::now(),
        last_updated_on: String::new(),
        expired_on: None,
    }
}

/// `props.pageProps.job` from the embedded Next.js state.
fn next_data_job(doc: &Html) -> Option<Map<String, Value>> {
    let script = doc.select(&NEXT_DATA).next()?;
    let text: String = script.text().collect();
    let parsed: NextData = serde_json::from_str(text.trim()).ok()?;
    parsed.props.page_props.job
}

fn fallback_fields(doc: &Html) -> Map<String, Value> {
    let select_text = |selector: &Selector| -> String {
        doc.select(selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default()
    };

    match json!({
        "title": select_text(&TITLE),
        "company": select_text(&COMPANY),
        "location": select_text(&LOCATION),
        "salary": select_text(&SALARY),
    }) {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[async_trait]
impl SourceAdapter for TopcvAdapter {
    fn source(&self) -> SourceId {
        SourceId::Topcv
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

            let listing_url = format!("{LISTING_URL}?page={page}");
            let links = match self.fetch_html(&listing_url).await {
                Ok(html) => parse_listing(&html),
                Err(err) => {
                    warn!(page, error = %err, "listing fetch failed, stopping cycle");
                    break;
                }
            };

            if links.is_empty() {
                debug!(page, "no more jobs");
                break;
            }

            let mut jobs = Vec::with_capacity(links.len());
            for link in &links {
                if cancel.is_cancelled() {
                    break 'pages;
                }

                match self.fetch_detail(link).await {
                    Ok(job) => jobs.push(job),
                    Err(err) => warn!(url = %link, error = %err, "detail fetch failed"),
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

        info!(total, "topcv cycle finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_links_become_absolute() {
        let html = r#"
            <div class="job-item">
              <a class="job-item-link" href="/viec-lam/ke-toan/1234.html">Kế toán</a>
            </div>
            <div class="job-item">
              <a class="job-item-link" href="https://www.topcv.vn/viec-lam/sales/5678.html">Sales</a>
            </div>
        "#;

        let links = parse_listing(html);
        assert_eq!(
            links,
            vec![
                "https://www.topcv.vn/viec-lam/ke-toan/1234.html",
                "https://www.topcv.vn/viec-lam/sales/5678.html",
            ]
        );
    }

    #[test]
    fn detail_prefers_next_data_payload() {
        let html = r#"
            <html><body>
            <h1 class="job-title">Fallback title</h1>
            <script id="__NEXT_DATA__" type="application/json">
              {"props":{"pageProps":{"job":{"title":"Kế toán tổng hợp","company":"Công ty A"}}}}
            </script>
            </body></html>
        "#;

        let job = parse_detail("https://www.topcv.vn/viec-lam/x/1.html", html);
        assert_eq!(job.raw_data["title"], json!("Kế toán tổng hợp"));
        assert_eq!(job.raw_data["company"], json!("Công ty A"));
        assert_eq!(job.source, SourceId::Topcv);
    }

    #[test]
    fn detail_falls_back_to_css_selectors() {
        let html = r#"
            <html><body>
              <h1 class="job-title">Nhân viên bán hàng</h1>
              <div class="company-name">Shop ABC</div>
              <div class="job-location">Đà Nẵng</div>
              <div class="salary-text">7 - 9 triệu</div>
            </body></html>
        "#;

        let job = parse_detail("https://www.topcv.vn/viec-lam/y/2.html", html);
        assert_eq!(job.raw_data["title"], json!("Nhân viên bán hàng"));
        assert_eq!(job.raw_data["salary"], json!("7 - 9 triệu"));
    }
}
