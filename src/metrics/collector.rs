// src/metrics/collector.rs
use crate::generator::BatchReport;
use crate::store::Target;
use anyhow::Result;
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Vec<u8> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap();
        buffer
    }
}

/// Counters for everything the generator throws at the server. There is no
/// exposition endpoint; the dashboard under test reads the server side, and
/// these totals are gathered for the exit log.
pub struct MetricsCollector {
    // Generator metrics
    pub iterations_total: IntCounter,
    pub ops_issued_total: IntCounterVec,

    // Connection churn metrics
    pub churn_connections_total: IntCounter,
    pub churn_open_connections: IntGauge,

    // Pressure metrics
    pub pressure_documents_total: IntCounterVec,

    // Worker metrics
    pub workers_spawned_total: IntCounter,
    pub workers_active: IntGauge,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let iterations_total = IntCounter::new(
            "loadgen_iterations_total",
            "Total generator loop iterations",
        )?;
        registry.register(Box::new(iterations_total.clone()))?;

        let ops_issued_total = IntCounterVec::new(
            Opts::new("loadgen_ops_issued_total", "Operations issued per target"),
            &["database", "collection", "op"],
        )?;
        registry.register(Box::new(ops_issued_total.clone()))?;

        let churn_connections_total = IntCounter::new(
            "loadgen_churn_connections_total",
            "Short-lived connections opened for churn",
        )?;
        registry.register(Box::new(churn_connections_total.clone()))?;

        let churn_open_connections = IntGauge::new(
            "loadgen_churn_open_connections",
            "Churn connections currently held open",
        )?;
        registry.register(Box::new(churn_open_connections.clone()))?;

        let pressure_documents_total = IntCounterVec::new(
            Opts::new(
                "loadgen_pressure_documents_total",
                "Documents moved by pressure rounds",
            ),
            &["action"],
        )?;
        registry.register(Box::new(pressure_documents_total.clone()))?;

        let workers_spawned_total = IntCounter::new(
            "loadgen_workers_spawned_total",
            "Read-storm workers spawned",
        )?;
        registry.register(Box::new(workers_spawned_total.clone()))?;

        let workers_active = IntGauge::new(
            "loadgen_workers_active",
            "Read-storm workers currently tracked",
        )?;
        registry.register(Box::new(workers_active.clone()))?;

        Ok(Self {
            iterations_total,
            ops_issued_total,
            churn_connections_total,
            churn_open_connections,
            pressure_documents_total,
            workers_spawned_total,
            workers_active,
        })
    }

    pub fn record_iteration(&self) {
        self.iterations_total.inc();
    }

    pub fn record_batch(&self, target: &Target, report: &BatchReport) {
        let counts = [
            ("update", report.increments),
            ("read", report.reads),
            ("insert", report.inserts),
            ("delete", report.deletes),
        ];
        for (op, count) in counts {
            self.ops_issued_total
                .with_label_values(&[&target.database, &target.collection, op])
                .inc_by(count);
        }
    }

    pub fn record_churn_opened(&self, count: usize) {
        self.churn_connections_total.inc_by(count as u64);
        self.churn_open_connections.set(count as i64);
    }

    pub fn record_churn_closed(&self) {
        self.churn_open_connections.set(0);
    }

    pub fn record_pressure(&self, action: &str, documents: u64) {
        self.pressure_documents_total
            .with_label_values(&[action])
            .inc_by(documents);
    }

    pub fn record_worker_spawned(&self) {
        self.workers_spawned_total.inc();
    }

    pub fn set_workers_active(&self, count: usize) {
        self.workers_active.set(count as i64);
    }
}
