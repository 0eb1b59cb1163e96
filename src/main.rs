use anyhow::{Context, Result};
use clap::Parser;
use covid_feed::{
    config::Config,
    fetch, process,
    publish::{self, PublishReport},
    sink::{DryRunSink, KafkaSink, PublishSink},
};
use std::{process::ExitCode, sync::Arc};
use tokio::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Exit status when the batch ran to completion but dropped some records.
const EXIT_PARTIAL_DELIVERY: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    std::panic::set_hook(Box::new(|info| {
        error!("panic: {}", info);
    }));

    let cfg = Config::parse();
    info!(endpoint = %cfg.data_endpoint, topic = %cfg.kafka_topic, dry_run = cfg.dry_run, "startup");
    let start = Instant::now();

    // ─── 2) fetch the wide table ─────────────────────────────────────
    let client = fetch::build_client(cfg.certificate_policy(), cfg.fetch_timeout())
        .context("building source HTTP client")?;
    let rows = fetch::fetch(&client, &cfg.data_endpoint)
        .await
        .with_context(|| format!("fetching {}", cfg.data_endpoint))?;

    // ─── 3) wide → long ──────────────────────────────────────────────
    let observations = tokio::task::spawn_blocking(move || process::reshape(&rows))
        .await
        .context("reshape task")?
        .context("reshaping document")?;

    // ─── 4) connect the sink ─────────────────────────────────────────
    let sink: Arc<dyn PublishSink> = if cfg.dry_run {
        Arc::new(DryRunSink::new())
    } else {
        let sink = KafkaSink::configure(cfg.brokers(), &cfg.kafka_topic)
            .await
            .context("configuring kafka")?
            .with_header("content-type", "application/json");
        Arc::new(sink)
    };

    // ─── 5) fan out publishes ────────────────────────────────────────
    let report = publish::publish_all(observations, sink, &cfg.publish_options()).await;

    let PublishReport {
        attempted,
        succeeded,
        failed,
    } = report;
    if report.all_delivered() {
        info!(attempted, succeeded, elapsed = ?start.elapsed(), "all done");
        Ok(ExitCode::SUCCESS)
    } else {
        warn!(attempted, succeeded, failed, elapsed = ?start.elapsed(), "done with dropped records");
        Ok(ExitCode::from(EXIT_PARTIAL_DELIVERY))
    }
}
