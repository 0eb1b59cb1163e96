use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use super::{PublishError, PublishSink};

/// Logs every message instead of sending it anywhere.
#[derive(Debug, Default)]
pub struct DryRunSink {
    seen: AtomicU64,
}

impl DryRunSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self) -> u64 {
        self.seen.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PublishSink for DryRunSink {
    async fn publish(
        &self,
        _key: Option<Vec<u8>>,
        payload: Vec<u8>,
        timestamp: DateTime<Utc>,
    ) -> Result<(), PublishError> {
        let n = self.seen.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            n,
            %timestamp,
            payload = %String::from_utf8_lossy(&payload),
            "dry run"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_every_message() {
        let sink = DryRunSink::new();
        for i in 0..3 {
            sink.publish(None, format!("{{\"n\":{i}}}").into_bytes(), Utc::now())
                .await
                .unwrap();
        }
        assert_eq!(sink.seen(), 3);
    }
}
