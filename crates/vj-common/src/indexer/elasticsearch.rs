use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::EsConfig;
use crate::domain::Job;
use crate::indexer::{IndexError, Indexer};

/// Elasticsearch indexer speaking the plain HTTP bulk API.
pub struct ElasticsearchIndexer {
    http: reqwest::Client,
    base_url: String,
    index: String,
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    errors: bool,
    #[serde(default)]
    items: Vec<BulkItem>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    #[serde(default)]
    index: Option<BulkItemStatus>,
}

#[derive(Debug, Deserialize)]
struct BulkItemStatus {
    #[serde(rename = "_id", default)]
    id: String,
    status: u16,
    #[serde(default)]
    error: Option<BulkItemError>,
}

#[derive(Debug, Deserialize)]
struct BulkItemError {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    reason: String,
}

impl ElasticsearchIndexer {
    /// Verify the cluster is reachable and create the index (with the
    /// Vietnamese folding analyzer) if it does not exist yet.
    pub async fn connect(cfg: &EsConfig) -> Result<Self, IndexError> {
        let indexer = Self {
            http: reqwest::Client::new(),
            base_url: cfg.url.trim_end_matches('/').to_string(),
            index: cfg.index.clone(),
        };

        let info = indexer.http.get(&indexer.base_url).send().await?;
        if !info.status().is_success() {
            return Err(IndexError::Backend(format!(
                "cluster info returned {}",
                info.status()
            )));
        }

        indexer.ensure_index().await?;
        info!(index = %indexer.index, "elasticsearch indexer ready");
        Ok(indexer)
    }

    async fn ensure_index(&self) -> Result<(), IndexError> {
        let url = format!("{}/{}", self.base_url, self.index);

        let head = self.http.head(&url).send().await?;
        if head.status() == StatusCode::OK {
            return Ok(());
        }

        // Vietnamese text folds case and diacritics so "Ke toan" matches
        // "Kế toán"; identifiers and facets stay as keywords.
        let mapping = json!({
            "settings": {
                "analysis": {
                    "analyzer": {
                        "vietnamese_analyzer": {
                            "type": "custom",
                            "tokenizer": "standard",
                            "filter": ["lowercase", "asciifolding"]
                        }
                    }
                }
            },
            "mappings": {
                "properties": {
                    "id": {"type": "keyword"},
                    "title": {
                        "type": "text",
                        "analyzer": "vietnamese_analyzer",
                        "fields": {"keyword": {"type": "keyword"}}
                    },
                    "company": {"type": "text", "analyzer": "vietnamese_analyzer"},
                    "location": {"type": "text", "analyzer": "vietnamese_analyzer"},
                    "location_city": {"type": "keyword"},
                    "location_district": {"type": "keyword"},
                    "position": {"type": "keyword"},
                    "salary": {"type": "text", "fields": {"keyword": {"type": "keyword"}}},
                    "salary_min": {"type": "long"},
                    "salary_max": {"type": "long"},
                    "is_negotiable": {"type": "boolean"},
                    "work_type": {"type": "keyword"},
                    "industry": {"type": "keyword"},
                    "experience": {"type": "keyword"},
                    "experience_tags": {"type": "keyword"},
                    "qualifications": {"type": "keyword"},
                    "description": {"type": "text", "analyzer": "vietnamese_analyzer"},
                    "requirements": {"type": "text", "analyzer": "vietnamese_analyzer"},
                    "benefits": {"type": "text", "analyzer": "vietnamese_analyzer"},
                    "skills": {"type": "keyword"},
                    "source": {"type": "keyword"},
                    "source_url": {"type": "keyword"},
                    "expired_at": {"type": "date"},
                    "crawled_at": {"type": "date"}
                }
            }
        });

        let created = self.http.put(&url).json(&mapping).send().await?;
        if !created.status().is_success() {
            return Err(IndexError::Backend(format!(
                "create index returned {}",
                created.status()
            )));
        }

        Ok(())
    }
}

/// NDJSON body for the `_bulk` endpoint: an `index` action line (keyed by
/// job id, which makes re-indexing an overwrite) followed by the document.
fn bulk_body(index: &str, jobs: &[Job]) -> Result<String, serde_json::Error> {
    let mut body = String::new();
    for job in jobs {
        let action = json!({ "index": { "_index": index, "_id": job.id } });
        body.push_str(&action.to_string());
        body.push('\n');
        body.push_str(&serde_json::to_string(job)?);
        body.push('\n');
    }
    Ok(body)
}

#[async_trait]
impl Indexer for ElasticsearchIndexer {
    async fn bulk_index(&self, jobs: &[Job]) -> Result<(), IndexError> {
        if jobs.is_empty() {
            return Ok(());
        }

        let body = bulk_body(&self.index, jobs)?;
        let response = self
            .http
            .post(format!("{}/_bulk", self.base_url))
            .header("content-type", "application/x-ndjson")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IndexError::Backend(format!(
                "bulk returned {}",
                response.status()
            )));
        }

        let parsed: BulkResponse = response.json().await?;
        if parsed.errors {
            for item in parsed.items {
                let Some(status) = item.index else { continue };
                if status.status >= 400 {
                    let (kind, reason) = status
                        .error
                        .map(|e| (e.kind, e.reason))
                        .unwrap_or_default();
                    warn!(
                        job_id = %status.id,
                        status = status.status,
                        error_type = %kind,
                        reason = %reason,
                        "bulk item rejected"
                    );
                }
            }
        }

        debug!(total = jobs.len(), index = %self.index, "elasticsearch bulk finished");
        Ok(())
    }
}
