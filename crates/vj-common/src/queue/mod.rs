//! Typed enqueue/dequeue over Redis lists.
//!
//! LPUSH + BRPOP/RPOP gives FIFO per queue. Delivery is at-most-once: a
//! popped record belongs to the consumer, and a consumer crash loses it.

pub mod consumer;
pub mod publisher;

use thiserror::Error;

pub use consumer::Consumer;
pub use publisher::Publisher;

/// Default name of the shared raw queue; overridable from configuration.
pub const DEFAULT_RAW_QUEUE: &str = "jobs:raw";

/// Pending queue for a source whose records need a detail fetch.
pub fn pending_queue_name(source: &str) -> String {
    format!("jobs:pending:{source}")
}

/// Diagnostic queue carrying raw JSON-LD blobs for offline validation.
pub fn jsonld_queue_name(source: &str) -> String {
    format!("jobs:jsonld:{source}")
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("broker command failed: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("failed to encode queue payload: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_names_embed_the_source() {
        assert_eq!(pending_queue_name("vieclam24h"), "jobs:pending:vieclam24h");
        assert_eq!(jsonld_queue_name("vieclam24h"), "jobs:jsonld:vieclam24h");
    }
}
