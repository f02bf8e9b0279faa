// src/generator/runner.rs
use super::batch::{self, BatchPlan, TargetSelector};
use super::churn::churn_round;
use super::pressure::{self, PressureDraw};
use crate::config::{Config, GeneratorConfig, PressureConfig};
use crate::metrics::MetricsCollector;
use crate::store::{Connector, DocumentStore, StoreError, Target};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tracing::{debug, info};

/// The load generator: an unbounded loop of randomized operation batches,
/// connection churn, and short pauses against one primary store connection.
///
/// Runs until the shutdown handle fires or the configured iteration bound is
/// reached; store errors end the run immediately.
pub struct LoadGenerator {
    config: GeneratorConfig,
    pressure: PressureConfig,
    targets: TargetSelector,
    pressure_target: Target,
    store: Arc<dyn DocumentStore>,
    connector: Arc<dyn Connector>,
    metrics: Option<Arc<MetricsCollector>>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Cooperative cancellation for the run loop; replaces relying on OS signals.
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub iterations: u64,
    pub ops_issued: u64,
    pub connections_churned: u64,
    pub pressure_rounds: u64,
}

impl RunSummary {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            iterations: 0,
            ops_issued: 0,
            connections_churned: 0,
            pressure_rounds: 0,
        }
    }
}

impl LoadGenerator {
    pub fn new(
        config: &Config,
        store: Arc<dyn DocumentStore>,
        connector: Arc<dyn Connector>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> (Self, ShutdownHandle) {
        let (tx, rx) = watch::channel(false);

        let generator = Self {
            config: config.generator.clone(),
            pressure: config.pressure.clone(),
            targets: TargetSelector::new(&config.targets),
            pressure_target: Target::new(
                config.pressure.database.clone(),
                config.pressure.collection.clone(),
            ),
            store,
            connector,
            metrics,
            shutdown_rx: rx,
        };

        (generator, ShutdownHandle { tx })
    }

    pub async fn run(self) -> Result<RunSummary, StoreError> {
        let mut rng = StdRng::from_entropy();
        let mut shutdown_rx = self.shutdown_rx.clone();
        let mut summary = RunSummary::new();

        info!(
            databases = self.targets.databases().len(),
            collections = self.targets.collections().len(),
            pressure = self.pressure.enabled,
            "starting load generator"
        );

        loop {
            if let Some(limit) = self.config.max_iterations {
                if summary.iterations >= limit {
                    info!(iterations = summary.iterations, "iteration bound reached");
                    break;
                }
            }
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("load generator shutting down");
                        break;
                    }
                }
                result = self.iterate(&mut rng, &mut summary) => {
                    result?;
                }
            }
        }

        Ok(summary)
    }

    async fn iterate(
        &self,
        rng: &mut StdRng,
        summary: &mut RunSummary,
    ) -> Result<(), StoreError> {
        let target = self.targets.pick(rng);
        let plan = BatchPlan::draw(rng, self.config.max_ops_per_kind);
        debug!(%target, ops = plan.total_ops(), "issuing batch");

        let report = batch::execute(self.store.as_ref(), &target, &plan).await?;
        if let Some(m) = &self.metrics {
            m.record_batch(&target, &report);
        }
        summary.ops_issued += report.total();

        let churn = churn_round(
            self.connector.as_ref(),
            rng,
            &self.config,
            self.metrics.as_deref(),
        )
        .await?;
        summary.connections_churned += churn.opened as u64;

        if self.pressure.enabled {
            let drawn = PressureDraw::draw(rng, &self.pressure);
            let pressed =
                pressure::apply(self.store.as_ref(), &self.pressure_target, drawn).await?;
            if let Some(m) = &self.metrics {
                m.record_pressure(pressed.action, pressed.documents);
            }
            summary.pressure_rounds += 1;
        }

        summary.iterations += 1;
        if let Some(m) = &self.metrics {
            m.record_iteration();
        }

        let pause = Duration::from_secs(rng.gen_range(0..=self.config.max_pause_secs));
        sleep(pause).await;
        Ok(())
    }
}
