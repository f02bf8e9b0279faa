// src/supervisor/mod.rs
use crate::config::SupervisorConfig;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::{Child, Command};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("failed to reset data directory: {0}")]
    Io(#[from] io::Error),

    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: io::Error,
    },
}

/// Owns at most one database server child process for the lifetime of the
/// run loop. Started before the loop, killed exactly once on any exit path,
/// never restarted.
#[derive(Debug)]
pub struct ProcessSupervisor {
    child: Option<Child>,
    dbpath: PathBuf,
}

impl ProcessSupervisor {
    /// Wipe and recreate the data directory, then spawn the server against it.
    pub async fn start(config: &SupervisorConfig) -> Result<Self, SupervisorError> {
        reset_dbpath(&config.dbpath).await?;

        let mut command = Command::new(&config.binary);
        command
            .args(&config.args)
            .arg(format!("--dbpath={}", config.dbpath.display()))
            // Backstop: if the handle is dropped without shutdown, the child
            // must not outlive us
            .kill_on_drop(true);

        let child = command.spawn().map_err(|source| SupervisorError::Spawn {
            binary: config.binary.clone(),
            source,
        })?;

        info!(
            binary = %config.binary,
            dbpath = %config.dbpath.display(),
            pid = child.id(),
            "database server started"
        );

        Ok(Self {
            child: Some(child),
            dbpath: config.dbpath.clone(),
        })
    }

    pub fn dbpath(&self) -> &Path {
        &self.dbpath
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    /// Kill the child if one is still held. The `Option` take makes a second
    /// call a no-op, so every exit path can invoke this safely.
    pub async fn shutdown(&mut self) -> Result<(), SupervisorError> {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                debug!("server child already exited: {e}");
            }
            info!("database server terminated");
        }
        Ok(())
    }
}

/// Recursively remove the data directory (absence is fine) and recreate it
/// empty, so no state from a prior run is visible.
pub async fn reset_dbpath(dir: &Path) -> Result<(), SupervisorError> {
    match fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    fs::create_dir_all(dir).await?;
    Ok(())
}
