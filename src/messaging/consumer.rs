use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer, StreamConsumer},
    error::{KafkaError, KafkaResult},
    message::BorrowedMessage,
    Message, Offset,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

use crate::ingestion::{Disposition, IngestionPipeline};

// ============================================================================
// Order Stream Consumer - Kafka adapter for the ingestion pipeline
// ============================================================================
//
// Acknowledgment is an explicit offset commit (auto-commit is off):
// - Ack / Drop  -> commit the message offset
// - Redeliver   -> seek the partition back to the message and pause
//
// Each worker handles its partitions strictly in order, so a commit never
// covers an offset that has not been dispositioned. If the partition cannot
// be rewound the worker stops without committing anything further; the
// group then resumes from the last committed offset. Parallelism comes from
// running several workers in the same consumer group.
//
// ============================================================================

const SEEK_TIMEOUT: Duration = Duration::from_secs(5);
const SEEK_ATTEMPTS: u32 = 5;
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
    pub workers: usize,
    /// How long a worker waits for one message before handing it back
    pub ack_wait: Duration,
    /// Pause after a rewind before the partition is read again
    pub redelivery_delay: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error("failed to create Kafka consumer: {0}")]
    Create(#[source] KafkaError),

    #[error("failed to subscribe to topic {topic}: {source}")]
    Subscribe {
        topic: String,
        #[source]
        source: KafkaError,
    },

    #[error("brokers unreachable for topic {topic}: {source}")]
    Metadata {
        topic: String,
        #[source]
        source: KafkaError,
    },
}

pub struct OrderConsumer {
    consumer: StreamConsumer,
    worker: usize,
    settings: ConsumerSettings,
}

impl OrderConsumer {
    /// Create and subscribe one consumer per configured worker.
    ///
    /// Blocks while broker metadata is fetched once, so an unreachable
    /// cluster fails startup instead of stalling silently.
    pub fn connect_group(settings: &ConsumerSettings) -> Result<Vec<Self>, ConsumerError> {
        let consumers = (0..settings.workers)
            .map(|worker| Self::connect(settings, worker))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(first) = consumers.first() {
            first
                .consumer
                .fetch_metadata(Some(settings.topic.as_str()), METADATA_TIMEOUT)
                .map_err(|source| ConsumerError::Metadata {
                    topic: settings.topic.clone(),
                    source,
                })?;
        }

        tracing::info!(
            topic = %settings.topic,
            group_id = %settings.group_id,
            workers = consumers.len(),
            "Subscribed to order stream"
        );

        Ok(consumers)
    }

    fn connect(settings: &ConsumerSettings, worker: usize) -> Result<Self, ConsumerError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &settings.brokers)
            .set("group.id", &settings.group_id)
            .set("client.id", format!("{}-{}", settings.group_id, worker))
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(ConsumerError::Create)?;

        consumer
            .subscribe(&[&settings.topic])
            .map_err(|source| ConsumerError::Subscribe {
                topic: settings.topic.clone(),
                source,
            })?;

        Ok(Self {
            consumer,
            worker,
            settings: settings.clone(),
        })
    }

    /// Receive and disposition messages until the future is dropped
    pub async fn run(self, pipeline: Arc<IngestionPipeline>) {
        tracing::info!(worker = self.worker, "Order consumer worker started");

        loop {
            match self.consumer.recv().await {
                Ok(message) => {
                    if let Err(e) = self.process(&message, &pipeline).await {
                        tracing::error!(
                            worker = self.worker,
                            partition = message.partition(),
                            offset = message.offset(),
                            error = %e,
                            "Cannot rewind partition, stopping worker"
                        );
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        worker = self.worker,
                        error = %e,
                        "Failed to receive from order stream"
                    );
                    sleep(self.settings.redelivery_delay).await;
                }
            }
        }
    }

    async fn process(
        &self,
        message: &BorrowedMessage<'_>,
        pipeline: &Arc<IngestionPipeline>,
    ) -> KafkaResult<()> {
        let payload = message.payload().unwrap_or_default().to_vec();

        tracing::debug!(
            worker = self.worker,
            partition = message.partition(),
            offset = message.offset(),
            payload_bytes = payload.len(),
            "Received order message"
        );

        // Processing runs on its own task: when the ack window elapses the
        // worker stops waiting, but an insert already in flight still
        // finishes and mirrors into the cache.
        let pipeline = pipeline.clone();
        let task = tokio::spawn(async move { pipeline.handle(&payload).await });

        let disposition = match timeout(self.settings.ack_wait, task).await {
            Ok(Ok(disposition)) => disposition,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Order processing task failed");
                Disposition::Redeliver
            }
            Err(_) => {
                tracing::warn!(
                    partition = message.partition(),
                    offset = message.offset(),
                    ack_wait_ms = self.settings.ack_wait.as_millis(),
                    "Acknowledgment window elapsed"
                );
                Disposition::Redeliver
            }
        };

        match disposition {
            Disposition::Ack | Disposition::Drop => {
                self.commit(message);
                Ok(())
            }
            Disposition::Redeliver => self.rewind(message).await,
        }
    }

    fn commit(&self, message: &BorrowedMessage<'_>) {
        if let Err(e) = self.consumer.commit_message(message, CommitMode::Async) {
            // The next commit on this partition covers this offset too
            tracing::warn!(
                partition = message.partition(),
                offset = message.offset(),
                error = %e,
                "Failed to commit order message"
            );
        }
    }

    async fn rewind(&self, message: &BorrowedMessage<'_>) -> KafkaResult<()> {
        let seek = || {
            self.consumer.seek(
                message.topic(),
                message.partition(),
                Offset::Offset(message.offset()),
                SEEK_TIMEOUT,
            )
        };

        seek_with_retry(seek, SEEK_ATTEMPTS, self.settings.redelivery_delay).await?;
        sleep(self.settings.redelivery_delay).await;
        Ok(())
    }
}

/// Repeat a failed seek; the worker must not read past the message until it
/// has been handed back.
async fn seek_with_retry<F>(mut seek: F, attempts: u32, pause: Duration) -> KafkaResult<()>
where
    F: FnMut() -> KafkaResult<()>,
{
    let mut attempt = 1;
    loop {
        match seek() {
            Ok(()) => return Ok(()),
            Err(e) if attempt >= attempts => return Err(e),
            Err(e) => {
                tracing::warn!(attempt, error = %e, "Failed to rewind partition, retrying");
                attempt += 1;
                sleep(pause).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing_seek(failures: u32, calls: &mut u32) -> KafkaResult<()> {
        *calls += 1;
        if *calls <= failures {
            Err(KafkaError::Seek("Local: Erroneous state".to_string()))
        } else {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_seek_succeeds_after_transient_failures() {
        let mut calls = 0;
        let result = seek_with_retry(|| failing_seek(2, &mut calls), 5, Duration::from_millis(1)).await;

        assert!(result.is_ok());
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_seek_gives_up_after_attempts() {
        let mut calls = 0;
        let result =
            seek_with_retry(|| failing_seek(u32::MAX, &mut calls), 3, Duration::from_millis(1)).await;

        assert!(matches!(result, Err(KafkaError::Seek(_))));
        assert_eq!(calls, 3);
    }
}
