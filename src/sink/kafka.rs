use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rskafka::{
    client::{
        error::Error as KafkaError,
        partition::{Compression, PartitionClient, UnknownTopicHandling},
        ClientBuilder,
    },
    record::Record,
};
use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};
use tokio::time::timeout;
use tracing::{debug, info};

use super::{PublishError, PublishSink};

/// How long `configure` waits for the bootstrap brokers and topic metadata.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Kafka producer for a single topic, spreading messages over its partitions.
pub struct KafkaSink {
    topic: String,
    partitions: Vec<PartitionClient>,
    next: AtomicUsize,
    headers: BTreeMap<String, Vec<u8>>,
}

impl KafkaSink {
    /// Connect to `brokers` and prepare a producer for every partition of `topic`.
    pub async fn configure(brokers: Vec<String>, topic: &str) -> Result<Self, PublishError> {
        Self::configure_within(brokers, topic, DEFAULT_CONNECT_TIMEOUT).await
    }

    pub async fn configure_within(
        brokers: Vec<String>,
        topic: &str,
        connect_timeout: Duration,
    ) -> Result<Self, PublishError> {
        match timeout(connect_timeout, Self::connect(brokers, topic)).await {
            Ok(res) => res,
            Err(_) => Err(PublishError::SinkUnavailable(format!(
                "no broker answered within {:?}",
                connect_timeout
            ))),
        }
    }

    async fn connect(brokers: Vec<String>, topic: &str) -> Result<Self, PublishError> {
        info!(?brokers, topic, "connecting to kafka");
        let client = ClientBuilder::new(brokers)
            .build()
            .await
            .map_err(classify)?;

        let partition_ids = client
            .list_topics()
            .await
            .map_err(classify)?
            .into_iter()
            .find(|t| t.name == topic)
            .map(|t| t.partitions)
            .ok_or_else(|| {
                PublishError::SinkUnavailable(format!("topic {topic} does not exist"))
            })?;

        let mut partitions = Vec::with_capacity(partition_ids.len());
        for id in partition_ids {
            let pc = client
                .partition_client(topic.to_string(), id, UnknownTopicHandling::Error)
                .await
                .map_err(classify)?;
            partitions.push(pc);
        }
        if partitions.is_empty() {
            return Err(PublishError::SinkUnavailable(format!(
                "topic {topic} has no partitions"
            )));
        }

        info!(topic, partitions = partitions.len(), "kafka producer ready");
        Ok(Self {
            topic: topic.to_string(),
            partitions,
            next: AtomicUsize::new(0),
            headers: BTreeMap::new(),
        })
    }

    /// Attach a header to every record this sink produces.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl PublishSink for KafkaSink {
    async fn publish(
        &self,
        key: Option<Vec<u8>>,
        payload: Vec<u8>,
        timestamp: DateTime<Utc>,
    ) -> Result<(), PublishError> {
        let idx = round_robin(&self.next, self.partitions.len());
        let record = Record {
            key,
            value: Some(payload),
            headers: self.headers.clone(),
            timestamp,
        };
        let offsets = self.partitions[idx]
            .produce(vec![record], Compression::NoCompression)
            .await
            .map_err(classify)?;
        debug!(topic = self.topic(), partition = idx, ?offsets, "produced");
        Ok(())
    }
}

fn round_robin(next: &AtomicUsize, len: usize) -> usize {
    next.fetch_add(1, Ordering::Relaxed) % len
}

/// Broker-side error codes mean the message was refused; everything else is
/// treated as the broker being out of reach.
fn classify(err: KafkaError) -> PublishError {
    match &err {
        KafkaError::ServerError { .. } => PublishError::Rejected(err.to_string()),
        _ => PublishError::SinkUnavailable(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rskafka::client::error::{ProtocolError, RequestContext};
    use tokio::net::TcpListener;

    #[test]
    fn round_robin_cycles_partitions() {
        let next = AtomicUsize::new(0);
        let picks: Vec<usize> = (0..7).map(|_| round_robin(&next, 3)).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn broker_error_codes_are_rejections() {
        let err = KafkaError::ServerError {
            protocol_error: ProtocolError::MessageTooLarge,
            error_message: Some("record batch too large".into()),
            request: RequestContext::Topic("covid19".into()),
            response: None,
            is_virtual: false,
        };
        assert!(matches!(classify(err), PublishError::Rejected(_)));
    }

    #[test]
    fn garbled_responses_are_unavailable() {
        let err = KafkaError::InvalidResponse("short read on produce response".into());
        assert!(matches!(classify(err), PublishError::SinkUnavailable(_)));
    }

    #[tokio::test]
    async fn unreachable_broker_is_sink_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let res = KafkaSink::configure_within(
            vec![addr.to_string()],
            "covid19",
            Duration::from_millis(500),
        )
        .await;
        assert!(matches!(res, Err(PublishError::SinkUnavailable(_))));
    }
}
