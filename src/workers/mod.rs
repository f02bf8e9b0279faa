// src/workers/mod.rs
use crate::config::WorkerConfig;
use crate::generator::TargetSelector;
use crate::metrics::MetricsCollector;
use crate::store::{Connector, DocumentStore, StoreError};
use dashmap::DashMap;
use mongodb::bson::doc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StormReport {
    pub reads: u32,
}

/// Spawns periodic read storms, each on its own store connection, and keeps
/// a handle to every one so they can be joined or cancelled. Results are
/// discarded by default, but never the handles.
pub struct WorkerPool {
    config: WorkerConfig,
    targets: TargetSelector,
    connector: Arc<dyn Connector>,
    metrics: Option<Arc<MetricsCollector>>,
    storms: DashMap<Uuid, JoinHandle<Result<StormReport, StoreError>>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl WorkerPool {
    pub fn new(
        config: WorkerConfig,
        targets: TargetSelector,
        connector: Arc<dyn Connector>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            config,
            targets,
            connector,
            metrics,
            storms: DashMap::new(),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Spawn loop: a new storm every few seconds until shut down.
    pub async fn run(self: Arc<Self>) {
        let mut shutdown_rx = self.shutdown_rx.clone();

        info!(
            min_secs = self.config.spawn_interval_min_secs,
            max_secs = self.config.spawn_interval_max_secs,
            "starting read-storm worker pool"
        );

        loop {
            let wait = {
                let mut rng = rand::thread_rng();
                rng.gen_range(
                    self.config.spawn_interval_min_secs..=self.config.spawn_interval_max_secs,
                )
            };

            tokio::select! {
                _ = sleep(Duration::from_secs(wait)) => {
                    self.reap_finished();
                    if let Err(e) = self.spawn_storm().await {
                        error!("failed to start read storm: {e}");
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("worker pool shutting down");
                        break;
                    }
                }
            }
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Launch one read storm on a fresh connection and track its handle.
    pub async fn spawn_storm(&self) -> Result<Uuid, StoreError> {
        let store = self.connector.open_store().await?;
        let id = Uuid::new_v4();
        let config = self.config.clone();
        let targets = self.targets.clone();

        let handle = tokio::spawn(async move {
            let mut rng = StdRng::from_entropy();
            read_storm(store.as_ref(), &targets, &config, &mut rng).await
        });

        self.storms.insert(id, handle);
        if let Some(m) = &self.metrics {
            m.record_worker_spawned();
            m.set_workers_active(self.storms.len());
        }
        debug!(%id, "read storm spawned");
        Ok(id)
    }

    pub fn active_storms(&self) -> usize {
        self.storms.len()
    }

    /// Drop handles of storms that already ran to completion.
    fn reap_finished(&self) {
        self.storms.retain(|_, handle| !handle.is_finished());
        if let Some(m) = &self.metrics {
            m.set_workers_active(self.storms.len());
        }
    }

    /// Join every tracked storm. Failures are logged, not propagated: storms
    /// are load noise, and a dead one has nothing to clean up.
    pub async fn drain(&self) -> Vec<StormReport> {
        let ids: Vec<Uuid> = self.storms.iter().map(|entry| *entry.key()).collect();
        let mut reports = Vec::new();

        for id in ids {
            if let Some((id, handle)) = self.storms.remove(&id) {
                match handle.await {
                    Ok(Ok(report)) => reports.push(report),
                    Ok(Err(e)) => warn!(%id, "read storm failed: {e}"),
                    Err(e) => warn!(%id, "read storm panicked: {e}"),
                }
            }
        }

        if let Some(m) = &self.metrics {
            m.set_workers_active(0);
        }
        reports
    }

    /// Cancel every in-flight storm without waiting for it.
    pub fn abort_all(&self) {
        for entry in self.storms.iter() {
            entry.value().abort();
        }
    }
}

/// One storm: pick a target, then trickle a bounded number of point-reads at
/// it with a random pacing delay, and exit.
async fn read_storm(
    store: &dyn DocumentStore,
    targets: &TargetSelector,
    config: &WorkerConfig,
    rng: &mut StdRng,
) -> Result<StormReport, StoreError> {
    let target = targets.pick(rng);
    let reads = rng.gen_range(0..=config.max_reads);
    debug!(%target, reads, "read storm running");

    for _ in 0..reads {
        store.find_one(&target, doc! { "x": 1 }).await?;
        let delay = Duration::from_millis(rng.gen_range(0..=config.max_read_delay_ms));
        sleep(delay).await;
    }

    Ok(StormReport { reads })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetsConfig;
    use crate::store::{Connection, StoreError, Target};
    use async_trait::async_trait;
    use mongodb::bson::Document;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct NullStore {
        reads: Arc<AtomicU32>,
    }

    #[async_trait]
    impl DocumentStore for NullStore {
        async fn increment_one(
            &self,
            _target: &Target,
            _filter: Document,
            _field: &str,
            _by: i64,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn find_one(
            &self,
            _target: &Target,
            _filter: Document,
        ) -> Result<Option<Document>, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        async fn insert_one(&self, _target: &Target, _doc: Document) -> Result<(), StoreError> {
            Ok(())
        }

        async fn delete_one(&self, _target: &Target, _filter: Document) -> Result<(), StoreError> {
            Ok(())
        }

        async fn insert_many(
            &self,
            _target: &Target,
            _docs: Vec<Document>,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn delete_many(
            &self,
            _target: &Target,
            _filter: Document,
        ) -> Result<u64, StoreError> {
            Ok(0)
        }

        async fn drop_collection(&self, _target: &Target) -> Result<(), StoreError> {
            Ok(())
        }
    }

    struct NullConnector {
        reads: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Connector for NullConnector {
        async fn open(&self) -> Result<Box<dyn Connection>, StoreError> {
            unimplemented!("workers only open stores")
        }

        async fn open_store(&self) -> Result<Box<dyn DocumentStore>, StoreError> {
            Ok(Box::new(NullStore {
                reads: self.reads.clone(),
            }))
        }
    }

    fn fast_pool(reads: Arc<AtomicU32>) -> WorkerPool {
        let config = WorkerConfig {
            enabled: true,
            max_reads: 10,
            max_read_delay_ms: 0,
            ..WorkerConfig::default()
        };
        WorkerPool::new(
            config,
            TargetSelector::new(&TargetsConfig::default()),
            Arc::new(NullConnector { reads }),
            None,
        )
    }

    #[tokio::test]
    async fn drain_joins_every_tracked_storm() {
        let reads = Arc::new(AtomicU32::new(0));
        let pool = fast_pool(reads.clone());

        for _ in 0..5 {
            pool.spawn_storm().await.unwrap();
        }
        assert_eq!(pool.active_storms(), 5);

        let reports = pool.drain().await;

        assert_eq!(reports.len(), 5);
        assert_eq!(pool.active_storms(), 0);
        let issued: u32 = reports.iter().map(|r| r.reads).sum();
        assert_eq!(issued, reads.load(Ordering::SeqCst));
        assert!(reports.iter().all(|r| r.reads <= 10));
    }

    #[tokio::test]
    async fn abort_then_drain_leaves_no_handles() {
        let reads = Arc::new(AtomicU32::new(0));
        let pool = fast_pool(reads.clone());

        pool.spawn_storm().await.unwrap();
        pool.spawn_storm().await.unwrap();
        pool.abort_all();
        pool.drain().await;

        assert_eq!(pool.active_storms(), 0);
    }
}
