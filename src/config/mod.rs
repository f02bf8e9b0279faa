// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a file (YAML or JSON)
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .context("Failed to read config file")?;

    let config: Config = if path.extension().and_then(|s| s.to_str()) == Some("yaml")
        || path.extension().and_then(|s| s.to_str()) == Some("yml") {
        serde_yaml::from_str(&contents).context("Failed to parse YAML config")?
    } else {
        serde_json::from_str(&contents).context("Failed to parse JSON config")?
    };

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.targets.databases, vec!["db1", "db2", "db3"]);
        assert_eq!(config.targets.collections, vec!["coll1", "coll2", "coll3"]);
        assert_eq!(config.connection.uri.as_str(), "mongodb://localhost:27017");
        assert!(!config.pressure.enabled);
        assert!(!config.workers.enabled);
        assert!(config.supervisor.is_none());
    }

    #[test]
    fn empty_target_lists_rejected() {
        let mut config = Config::default();
        config.targets.databases.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_mongodb_scheme_rejected() {
        let mut config = Config::default();
        config.connection.uri = "http://localhost:8080".parse().unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_worker_interval_rejected() {
        let mut config = Config::default();
        config.workers.spawn_interval_min_secs = 10;
        config.workers.spawn_interval_max_secs = 3;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn load_yaml_config() {
        let path = std::env::temp_dir().join(format!(
            "mongo-loadgen-config-{}.yaml",
            uuid::Uuid::new_v4()
        ));
        let yaml = r#"
connection:
  uri: "mongodb://localhost:27018"
targets:
  databases: ["demo"]
  collections: ["events", "samples"]
generator:
  max_pause_secs: 1
pressure:
  enabled: true
"#;
        tokio::fs::write(&path, yaml).await.unwrap();

        let config = load_config(&path).await.unwrap();
        assert_eq!(config.connection.uri.port(), Some(27018));
        assert_eq!(config.targets.databases, vec!["demo"]);
        assert_eq!(config.generator.max_pause_secs, 1);
        // Untouched sections keep their defaults
        assert_eq!(config.generator.max_ops_per_kind, 100);
        assert!(config.pressure.enabled);
        assert_eq!(config.pressure.document_count, 1000);

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
