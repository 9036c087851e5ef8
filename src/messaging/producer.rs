use rdkafka::{
    admin::{AdminClient, AdminOptions, NewTopic, TopicReplication},
    client::DefaultClientContext,
    config::ClientConfig,
    error::RDKafkaErrorCode,
    producer::{FutureProducer, FutureRecord},
};
use anyhow::Result;
use std::time::Duration;

use crate::models::Order;

// ============================================================================
// Order Publisher - writes orders onto the inbound stream
// ============================================================================
//
// Used by the publish_orders tool to seed the topic the service consumes.
// Messages are keyed by order_uid so redeliveries of one order always land
// on the same partition.
//
// ============================================================================

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

pub struct OrderPublisher {
    producer: FutureProducer,
    brokers: String,
}

impl OrderPublisher {
    pub fn new(brokers: &str) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| anyhow::anyhow!("Failed to create order producer: {}", e))?;

        Ok(Self {
            producer,
            brokers: brokers.to_string(),
        })
    }

    /// Create the topic if it does not exist yet
    pub async fn ensure_topic(&self, topic: &str, partitions: i32) -> Result<()> {
        let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .create()
            .map_err(|e| anyhow::anyhow!("Failed to create admin client: {}", e))?;

        let new_topic = NewTopic::new(topic, partitions, TopicReplication::Fixed(1));
        let results = admin
            .create_topics(&[new_topic], &AdminOptions::new())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create topic {}: {}", topic, e))?;

        for result in results {
            match result {
                Ok(name) => tracing::info!(topic = %name, partitions, "Created topic"),
                Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    tracing::info!(topic = %name, "Topic already exists")
                }
                Err((name, code)) => {
                    return Err(anyhow::anyhow!("Failed to create topic {}: {}", name, code));
                }
            }
        }

        Ok(())
    }

    pub async fn publish(&self, topic: &str, order: &Order) -> Result<()> {
        let payload = order.to_json()?;
        let record = FutureRecord::to(topic)
            .key(&order.order_uid)
            .payload(&payload);

        self.producer
            .send(record, rdkafka::util::Timeout::After(SEND_TIMEOUT))
            .await
            .map_err(|(e, _)| anyhow::anyhow!("Kafka send error: {}", e))?;

        tracing::debug!(
            topic = %topic,
            order_uid = %order.order_uid,
            "Published order"
        );

        Ok(())
    }
}
