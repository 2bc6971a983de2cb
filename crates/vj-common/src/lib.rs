//! Shared core of the vietjobs crawl pipeline: broker plumbing, change
//! detection, sanitization, per-source listing adapters, normalization and
//! the indexing backends. The service binaries (`vj-crawler`,
//! `vj-enricher`, `vj-worker`) are thin wiring around these modules.

pub mod broker;
pub mod config;
pub mod dedup;
pub mod domain;
pub mod indexer;
pub mod logging;
pub mod normalize;
pub mod queue;
pub mod sanitize;
pub mod scheduler;
pub mod scrape;
pub mod shutdown;
pub mod sources;
pub mod worker;
