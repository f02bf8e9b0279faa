// src/config/models.rs
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Top-level configuration for the load generator.
///
/// Every section has serde defaults so a config file only needs to name the
/// fields it changes; the no-file case is `Config::default()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub targets: TargetsConfig,
    pub generator: GeneratorConfig,
    pub pressure: PressureConfig,
    pub workers: WorkerConfig,
    pub supervisor: Option<SupervisorConfig>,
    pub malformed_args: MalformedArgsPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            targets: TargetsConfig::default(),
            generator: GeneratorConfig::default(),
            pressure: PressureConfig::default(),
            workers: WorkerConfig::default(),
            supervisor: None,
            malformed_args: MalformedArgsPolicy::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.connection.uri.scheme() != "mongodb" {
            bail!(
                "connection URI must use the mongodb scheme, got {}",
                self.connection.uri.scheme()
            );
        }
        if self.connection.uri.host_str().is_none() {
            bail!("connection URI has no host");
        }
        if self.targets.databases.is_empty() {
            bail!("at least one database name is required");
        }
        if self.targets.collections.is_empty() {
            bail!("at least one collection name is required");
        }
        if self.workers.spawn_interval_min_secs > self.workers.spawn_interval_max_secs {
            bail!(
                "worker spawn interval is inverted: {} > {}",
                self.workers.spawn_interval_min_secs,
                self.workers.spawn_interval_max_secs
            );
        }
        if self.pressure.drop_odds == 0 {
            bail!("pressure drop_odds must be at least 1");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub uri: Url,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            uri: Url::parse("mongodb://localhost:27017").expect("default URI is valid"),
        }
    }
}

/// The fixed name lists a target is drawn from, one uniform index per list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetsConfig {
    pub databases: Vec<String>,
    pub collections: Vec<String>,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            databases: vec!["db1".into(), "db2".into(), "db3".into()],
            collections: vec!["coll1".into(), "coll2".into(), "coll3".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Upper bound (inclusive) for each per-kind operation count in a batch.
    pub max_ops_per_kind: u32,
    /// Upper bound (inclusive) on fresh connections per churn round.
    pub max_churn_connections: usize,
    /// Upper bound (inclusive) in seconds for holding churned connections open.
    pub max_churn_hold_secs: u64,
    /// Upper bound (inclusive) in seconds for the pause between iterations.
    pub max_pause_secs: u64,
    /// Bounded run for tests; `None` runs until shut down.
    pub max_iterations: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_ops_per_kind: 100,
            max_churn_connections: 5,
            max_churn_hold_secs: 2,
            max_pause_secs: 3,
            max_iterations: None,
        }
    }
}

/// Bulk insert/delete rounds that push memory around. Disabled by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PressureConfig {
    pub enabled: bool,
    pub database: String,
    pub collection: String,
    /// Documents per bulk insert round.
    pub document_count: usize,
    /// Length of the random field name and value.
    pub token_len: usize,
    /// One round in `drop_odds` drops the pressure collection outright.
    pub drop_odds: u32,
}

impl Default for PressureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            database: "test".into(),
            collection: "coll".into(),
            document_count: 1000,
            token_len: 100,
            drop_odds: 1001,
        }
    }
}

/// Concurrent read-storm workers. Disabled by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub enabled: bool,
    pub spawn_interval_min_secs: u64,
    pub spawn_interval_max_secs: u64,
    /// Upper bound (inclusive) on point-reads per storm.
    pub max_reads: u32,
    /// Upper bound (inclusive) in milliseconds on the pacing delay per read.
    pub max_read_delay_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            spawn_interval_min_secs: 3,
            spawn_interval_max_secs: 5,
            max_reads: 100,
            max_read_delay_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Storage directory, wiped and recreated before the server starts.
    pub dbpath: PathBuf,
    /// Server executable to spawn.
    pub binary: String,
    /// Extra arguments placed before the --dbpath flag.
    pub args: Vec<String>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            dbpath: PathBuf::from("./testdata"),
            binary: "mongod".into(),
            args: Vec::new(),
        }
    }
}

/// What to do after printing the usage message for malformed arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MalformedArgsPolicy {
    /// Print usage and continue with defaults (what the original tool did).
    #[default]
    Proceed,
    /// Print usage and exit cleanly.
    Exit,
}
