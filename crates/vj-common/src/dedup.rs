use chrono::{DateTime, Duration as ChronoDuration, Utc};
use redis::AsyncCommands;
use thiserror::Error;

use crate::broker::Broker;

const DEFAULT_PREFIX: &str = "job:seen";
const DEFAULT_TTL_DAYS: i64 = 30;
const EXPIRY_BUFFER_DAYS: i64 = 1;

/// Classification of a crawled record against the seen-store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Never seen before.
    New,
    /// Seen, but the revision token changed.
    Updated,
    /// Seen with the same revision token.
    Unchanged,
}

impl CheckOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckOutcome::New => "NEW",
            CheckOutcome::Updated => "UPDATED",
            CheckOutcome::Unchanged => "UNCHANGED",
        }
    }
}

#[derive(Debug, Error)]
pub enum DedupError {
    #[error("seen-store read failed: {0}")]
    Read(redis::RedisError),
    #[error("seen-store write failed: {0}")]
    Write(redis::RedisError),
}

/// Revision-token change detector over the broker's TTL keyspace.
///
/// Keys are `prefix:source:id`; the stored value is the last revision token
/// published for that posting. Concurrent writes for one key are
/// last-write-wins, which is fine because the token is monotonic upstream.
#[derive(Clone)]
pub struct Deduplicator {
    conn: Broker,
    prefix: String,
    default_ttl: ChronoDuration,
}

impl Deduplicator {
    pub fn new(conn: Broker) -> Self {
        Self {
            conn,
            prefix: DEFAULT_PREFIX.to_string(),
            default_ttl: ChronoDuration::days(DEFAULT_TTL_DAYS),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Compare `revision_token` with the stored value for `(source, job_id)`.
    /// A missing key is `New`, not an error.
    pub async fn check(
        &self,
        source: &str,
        job_id: &str,
        revision_token: &str,
    ) -> Result<CheckOutcome, DedupError> {
        let key = self.make_key(source, job_id);
        let mut conn = self.conn.clone();

        let stored: Option<String> = conn.get(&key).await.map_err(DedupError::Read)?;

        Ok(match stored {
            None => CheckOutcome::New,
            Some(token) if token == revision_token => CheckOutcome::Unchanged,
            Some(_) => CheckOutcome::Updated,
        })
    }

    /// Record `revision_token` under the key, expiring one day past the
    /// upstream expiry (or past the default window when expiry is unknown
    /// or already in the past).
    pub async fn mark_seen(
        &self,
        source: &str,
        job_id: &str,
        revision_token: &str,
        expired_on: Option<DateTime<Utc>>,
    ) -> Result<(), DedupError> {
        let key = self.make_key(source, job_id);
        let ttl = compute_ttl(expired_on, Utc::now(), self.default_ttl);
        let mut conn = self.conn.clone();

        conn.set_ex::<_, _, ()>(&key, revision_token, ttl.num_seconds() as u64)
            .await
            .map_err(DedupError::Write)
    }

    fn make_key(&self, source: &str, id: &str) -> String {
        seen_key(&self.prefix, source, id)
    }
}

fn seen_key(prefix: &str, source: &str, id: &str) -> String {
    format!("{prefix}:{source}:{id}")
}

/// TTL formula: `max(expired_on − now, default_ttl) + 1 day`. Falls back to
/// the default window when the posting already expired or carries no expiry.
fn compute_ttl(
    expired_on: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    default_ttl: ChronoDuration,
) -> ChronoDuration {
    let remaining = expired_on
        .map(|at| at - now)
        .filter(|d| *d > ChronoDuration::zero())
        .unwrap_or(default_ttl);

    remaining + ChronoDuration::days(EXPIRY_BUFFER_DAYS)
}
