// src/generator/batch.rs
use crate::config::TargetsConfig;
use crate::store::{DocumentStore, StoreError, Target};
use mongodb::bson::doc;
use rand::Rng;

/// Field every batch operation revolves around. Updates increment it, reads
/// and deletes filter on it, inserts seed it.
const COUNTER_FIELD: &str = "x";

/// Uniform random choice of a (database, collection) pair, one independent
/// index per list. One pick serves a whole batch.
#[derive(Debug, Clone)]
pub struct TargetSelector {
    databases: Vec<String>,
    collections: Vec<String>,
}

impl TargetSelector {
    pub fn new(config: &TargetsConfig) -> Self {
        Self {
            databases: config.databases.clone(),
            collections: config.collections.clone(),
        }
    }

    pub fn pick(&self, rng: &mut impl Rng) -> Target {
        let database = &self.databases[rng.gen_range(0..self.databases.len())];
        let collection = &self.collections[rng.gen_range(0..self.collections.len())];
        Target::new(database.clone(), collection.clone())
    }

    pub fn databases(&self) -> &[String] {
        &self.databases
    }

    pub fn collections(&self) -> &[String] {
        &self.collections
    }
}

/// One iteration's operation counts, each drawn independently and uniformly
/// from [0, max]. A count of zero skips that kind entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    pub increments: u32,
    /// Three repeated passes of the same point-read; each pass draws its own
    /// count and the reads are deliberately not deduplicated.
    pub read_passes: [u32; 3],
    pub inserts: u32,
    pub deletes: u32,
}

impl BatchPlan {
    pub fn draw(rng: &mut impl Rng, max: u32) -> Self {
        Self {
            increments: rng.gen_range(0..=max),
            read_passes: [
                rng.gen_range(0..=max),
                rng.gen_range(0..=max),
                rng.gen_range(0..=max),
            ],
            inserts: rng.gen_range(0..=max),
            deletes: rng.gen_range(0..=max),
        }
    }

    pub fn total_ops(&self) -> u64 {
        let reads: u64 = self.read_passes.iter().map(|&n| u64::from(n)).sum();
        u64::from(self.increments) + reads + u64::from(self.inserts) + u64::from(self.deletes)
    }
}

/// Counts actually issued, for metrics and the run summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub increments: u64,
    pub reads: u64,
    pub inserts: u64,
    pub deletes: u64,
}

impl BatchReport {
    pub fn total(&self) -> u64 {
        self.increments + self.reads + self.inserts + self.deletes
    }
}

/// Issue a planned batch against one target, in the fixed order: increments,
/// three read passes, inserts, deletes. Errors propagate immediately.
pub async fn execute(
    store: &dyn DocumentStore,
    target: &Target,
    plan: &BatchPlan,
) -> Result<BatchReport, StoreError> {
    let mut report = BatchReport::default();

    for _ in 0..plan.increments {
        store
            .increment_one(target, doc! { COUNTER_FIELD: 1 }, COUNTER_FIELD, 1)
            .await?;
        report.increments += 1;
    }

    for &pass in &plan.read_passes {
        for _ in 0..pass {
            store.find_one(target, doc! { COUNTER_FIELD: 1 }).await?;
            report.reads += 1;
        }
    }

    for _ in 0..plan.inserts {
        store.insert_one(target, doc! { COUNTER_FIELD: 1 }).await?;
        report.inserts += 1;
    }

    for _ in 0..plan.deletes {
        store.delete_one(target, doc! { COUNTER_FIELD: 1 }).await?;
        report.deletes += 1;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Target;
    use async_trait::async_trait;
    use mongodb::bson::Document;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Mutex;

    /// Records the kind of every operation, in issue order.
    #[derive(Default)]
    struct RecordingStore {
        ops: Mutex<Vec<&'static str>>,
    }

    impl RecordingStore {
        fn record(&self, op: &'static str) {
            self.ops.lock().unwrap().push(op);
        }

        fn recorded(&self) -> Vec<&'static str> {
            self.ops.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DocumentStore for RecordingStore {
        async fn increment_one(
            &self,
            _target: &Target,
            _filter: Document,
            _field: &str,
            _by: i64,
        ) -> Result<(), StoreError> {
            self.record("inc");
            Ok(())
        }

        async fn find_one(
            &self,
            _target: &Target,
            _filter: Document,
        ) -> Result<Option<Document>, StoreError> {
            self.record("read");
            Ok(None)
        }

        async fn insert_one(&self, _target: &Target, _doc: Document) -> Result<(), StoreError> {
            self.record("insert");
            Ok(())
        }

        async fn delete_one(&self, _target: &Target, _filter: Document) -> Result<(), StoreError> {
            self.record("delete");
            Ok(())
        }

        async fn insert_many(
            &self,
            _target: &Target,
            _docs: Vec<Document>,
        ) -> Result<(), StoreError> {
            self.record("insert_many");
            Ok(())
        }

        async fn delete_many(
            &self,
            _target: &Target,
            _filter: Document,
        ) -> Result<u64, StoreError> {
            self.record("delete_many");
            Ok(0)
        }

        async fn drop_collection(&self, _target: &Target) -> Result<(), StoreError> {
            self.record("drop");
            Ok(())
        }
    }

    #[tokio::test]
    async fn batch_runs_in_fixed_order() {
        let store = RecordingStore::default();
        let target = Target::new("db1", "coll1");
        let plan = BatchPlan {
            increments: 2,
            read_passes: [1, 2, 1],
            inserts: 1,
            deletes: 2,
        };

        let report = execute(&store, &target, &plan).await.unwrap();

        assert_eq!(
            store.recorded(),
            vec!["inc", "inc", "read", "read", "read", "read", "insert", "delete", "delete"]
        );
        assert_eq!(report.increments, 2);
        assert_eq!(report.reads, 4);
        assert_eq!(report.inserts, 1);
        assert_eq!(report.deletes, 2);
        assert_eq!(report.total(), plan.total_ops());
    }

    #[tokio::test]
    async fn zero_counts_issue_nothing() {
        let store = RecordingStore::default();
        let target = Target::new("db1", "coll1");
        let plan = BatchPlan {
            increments: 0,
            read_passes: [0, 0, 0],
            inserts: 0,
            deletes: 0,
        };

        let report = execute(&store, &target, &plan).await.unwrap();

        assert!(store.recorded().is_empty());
        assert_eq!(report.total(), 0);
    }

    proptest! {
        #[test]
        fn drawn_counts_stay_within_bounds(seed: u64) {
            let mut rng = StdRng::seed_from_u64(seed);
            let plan = BatchPlan::draw(&mut rng, 100);

            prop_assert!(plan.increments <= 100);
            prop_assert!(plan.read_passes.iter().all(|&n| n <= 100));
            prop_assert!(plan.inserts <= 100);
            prop_assert!(plan.deletes <= 100);
        }

        #[test]
        fn picked_targets_come_from_the_lists(seed: u64) {
            let mut rng = StdRng::seed_from_u64(seed);
            let selector = TargetSelector::new(&crate::config::TargetsConfig::default());

            let target = selector.pick(&mut rng);

            prop_assert!(selector.databases().contains(&target.database));
            prop_assert!(selector.collections().contains(&target.collection));
        }
    }
}
