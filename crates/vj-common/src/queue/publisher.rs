use redis::AsyncCommands;
use serde::Serialize;

use crate::broker::Broker;
use crate::domain::RawJob;
use crate::queue::QueueError;

/// Left-pushes serialized records onto a named list.
#[derive(Clone)]
pub struct Publisher {
    conn: Broker,
    queue: String,
}

impl Publisher {
    pub fn new(conn: Broker, queue: impl Into<String>) -> Self {
        Self {
            conn,
            queue: queue.into(),
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue
    }

    /// Push a single record.
    pub async fn publish(&self, job: &RawJob) -> Result<(), QueueError> {
        let payload = serde_json::to_string(job)?;
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(&self.queue, payload).await?;
        Ok(())
    }

    /// Push a batch through one pipelined round trip.
    pub async fn publish_batch(&self, jobs: &[RawJob]) -> Result<(), QueueError> {
        if jobs.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for job in jobs {
            pipe.lpush(&self.queue, serde_json::to_string(job)?).ignore();
        }

        let mut conn = self.conn.clone();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    /// Push arbitrary serializable data. Used for the JSON-LD diagnostic
    /// queue, which carries upstream blobs rather than `RawJob`s.
    pub async fn publish_raw<T: Serialize>(&self, data: &T) -> Result<(), QueueError> {
        let payload = serde_json::to_string(data)?;
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(&self.queue, payload).await?;
        Ok(())
    }

    /// Current queue depth.
    pub async fn len(&self) -> Result<i64, QueueError> {
        let mut conn = self.conn.clone();
        Ok(conn.llen(&self.queue).await?)
    }
}
