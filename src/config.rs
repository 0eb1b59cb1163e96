//! Command-line and environment configuration for a feed run.

use clap::Parser;
use std::time::Duration;
use url::Url;

use crate::fetch::CertificatePolicy;
use crate::publish::PublishOptions;

pub const DEFAULT_DATA_ENDPOINT: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_19-covid-Confirmed.csv";
pub const DEFAULT_KAFKA_BROKERS: &str = "kafka-headless.kafka-cluster:9092";
pub const DEFAULT_KAFKA_TOPIC: &str = "covid19";

/// Fetch the wide time series, reshape it, and publish one message per observation.
#[derive(Debug, Clone, Parser)]
#[command(name = "covid-feed", version, about)]
pub struct Config {
    /// CSV document to ingest.
    #[arg(long, env = "DATA_ENDPOINT", default_value = DEFAULT_DATA_ENDPOINT)]
    pub data_endpoint: Url,

    /// Comma-separated Kafka bootstrap brokers.
    #[arg(
        long,
        env = "KAFKA_BROKERS",
        value_delimiter = ',',
        default_value = DEFAULT_KAFKA_BROKERS
    )]
    pub kafka_brokers: Vec<String>,

    /// Topic every observation is published to.
    #[arg(long, env = "KAFKA_TOPIC", default_value = DEFAULT_KAFKA_TOPIC)]
    pub kafka_topic: String,

    /// Maximum number of publishes in flight at once.
    #[arg(long, env = "MAX_IN_FLIGHT", default_value_t = 64)]
    pub max_in_flight: usize,

    /// Per-record publish deadline in seconds.
    #[arg(long, env = "PUBLISH_TIMEOUT_SECS", default_value_t = 30)]
    pub publish_timeout_secs: u64,

    /// Deadline for downloading the source document, in seconds.
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 60)]
    pub fetch_timeout_secs: u64,

    /// Require a valid certificate chain from the source mirror.
    ///
    /// Off by default: the mirror is public and read-only. This only affects
    /// the document download, never the broker connection.
    #[arg(long, env = "VERIFY_SOURCE_CERTS")]
    pub verify_source_certs: bool,

    /// Log payloads instead of sending them to Kafka.
    #[arg(long, env = "DRY_RUN")]
    pub dry_run: bool,
}

impl Config {
    pub fn certificate_policy(&self) -> CertificatePolicy {
        if self.verify_source_certs {
            CertificatePolicy::Verify
        } else {
            CertificatePolicy::AcceptInvalid
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn publish_options(&self) -> PublishOptions {
        PublishOptions {
            max_in_flight: self.max_in_flight,
            publish_timeout: Duration::from_secs(self.publish_timeout_secs),
        }
    }

    /// Broker list with blanks from stray commas removed.
    pub fn brokers(&self) -> Vec<String> {
        self.kafka_brokers
            .iter()
            .map(|b| b.trim())
            .filter(|b| !b.is_empty())
            .map(str::to_string)
            .collect()
    }
}
