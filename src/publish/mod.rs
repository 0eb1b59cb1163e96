// src/publish/mod.rs
use chrono::Utc;
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::{
    task::{JoinError, JoinSet},
    time::{timeout, Instant},
};
use tracing::{debug, error, info};

use crate::process::Observation;
use crate::sink::{PublishError, PublishSink};

/// Bumped whenever the payload layout changes in a way consumers can notice.
pub const PAYLOAD_VERSION: u32 = 1;

#[derive(Serialize)]
struct Envelope<'a> {
    version: u32,
    #[serde(flatten)]
    observation: &'a Observation,
}

/// Encode one observation as the versioned JSON message body.
pub fn encode(observation: &Observation) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&Envelope {
        version: PAYLOAD_VERSION,
        observation,
    })
}

#[derive(Clone, Debug)]
pub struct PublishOptions {
    /// Upper bound on publish tasks alive at once.
    pub max_in_flight: usize,
    /// Deadline for a single record's publish call.
    pub publish_timeout: Duration,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            max_in_flight: 64,
            publish_timeout: Duration::from_secs(30),
        }
    }
}

/// Why a single record did not make it to the sink.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("could not encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("publish did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("publish task panicked: {0}")]
    Panicked(String),
}

/// Outcome tally of one `publish_all` batch. `attempted == succeeded + failed`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl PublishReport {
    pub fn all_delivered(&self) -> bool {
        self.failed == 0
    }
}

/// Publish every record to `sink`, one task per record, at most
/// `options.max_in_flight` at a time.
///
/// A failing record is logged and counted; it never stops the others. Returns
/// once every task has finished.
pub async fn publish_all(
    records: Vec<Observation>,
    sink: Arc<dyn PublishSink>,
    options: &PublishOptions,
) -> PublishReport {
    let start = Instant::now();
    let max_in_flight = options.max_in_flight.max(1);
    let mut report = PublishReport {
        attempted: records.len(),
        ..Default::default()
    };
    info!(records = records.len(), max_in_flight, "publishing");

    let mut tasks = JoinSet::new();
    for (idx, observation) in records.into_iter().enumerate() {
        // hold off spawning until a slot frees up
        while tasks.len() >= max_in_flight {
            if let Some(joined) = tasks.join_next().await {
                tally(&mut report, joined);
            }
        }

        let sink = Arc::clone(&sink);
        let limit = options.publish_timeout;
        tasks.spawn(async move {
            let res = publish_one(&observation, sink.as_ref(), limit).await;
            (idx, observation, res)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        tally(&mut report, joined);
    }

    info!(
        attempted = report.attempted,
        succeeded = report.succeeded,
        failed = report.failed,
        elapsed = ?start.elapsed(),
        "publish finished"
    );
    report
}

async fn publish_one(
    observation: &Observation,
    sink: &dyn PublishSink,
    limit: Duration,
) -> Result<(), RecordError> {
    let payload = encode(observation)?;
    match timeout(limit, sink.publish(None, payload, Utc::now())).await {
        Ok(res) => res.map_err(RecordError::from),
        Err(_) => Err(RecordError::TimedOut(limit)),
    }
}

fn tally(
    report: &mut PublishReport,
    joined: Result<(usize, Observation, Result<(), RecordError>), JoinError>,
) {
    match joined {
        Ok((idx, _, Ok(()))) => {
            debug!(record = idx, "published");
            report.succeeded += 1;
        }
        Ok((idx, obs, Err(e))) => {
            error!(
                record = idx,
                region = %obs.region,
                sub_region = %obs.sub_region,
                observed_on = %obs.observed_on,
                error = %e,
                "failed to send record"
            );
            report.failed += 1;
        }
        Err(join_err) => {
            let e = RecordError::Panicked(join_err.to_string());
            error!(error = %e, "publish task did not complete");
            report.failed += 1;
        }
    }
}
