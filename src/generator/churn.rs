// src/generator/churn.rs
use crate::config::GeneratorConfig;
use crate::metrics::MetricsCollector;
use crate::store::{Connector, StoreError};
use futures::future::join_all;
use rand::Rng;
use tokio::time::{sleep, Duration};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChurnReport {
    pub opened: usize,
    pub held: Duration,
}

/// Open a random handful of fresh connections, hold them idle, then close
/// every one before returning. Nothing is reused across rounds; the point is
/// connection churn on the server's counters, not throughput.
pub async fn churn_round(
    connector: &dyn Connector,
    rng: &mut impl Rng,
    config: &GeneratorConfig,
    metrics: Option<&MetricsCollector>,
) -> Result<ChurnReport, StoreError> {
    let count = rng.gen_range(0..=config.max_churn_connections);
    let held = Duration::from_secs(rng.gen_range(0..=config.max_churn_hold_secs));

    let mut open = Vec::with_capacity(count);
    for _ in 0..count {
        open.push(connector.open().await?);
    }

    if let Some(m) = metrics {
        m.record_churn_opened(count);
    }
    debug!(connections = count, held_secs = held.as_secs(), "churn round");

    sleep(held).await;

    let results = join_all(open.iter_mut().map(|conn| conn.close())).await;
    if let Some(m) = metrics {
        m.record_churn_closed();
    }
    for result in results {
        result?;
    }

    Ok(ChurnReport { opened: count, held })
}
