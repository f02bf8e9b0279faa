// src/main.rs
use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use mongo_loadgen::{
    cli::{self, Invocation},
    config::{self, Config, MalformedArgsPolicy},
    generator::{LoadGenerator, RunSummary, TargetSelector},
    metrics::{MetricsCollector, MetricsRegistry},
    store::{DocumentStore, MongoConnector, MongoStore},
    supervisor::ProcessSupervisor,
    workers::WorkerPool,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mongo_loadgen=debug".parse()?)
                .add_directive("mongodb=info".parse()?),
        )
        .init();

    let invocation = cli::parse(std::env::args().skip(1));

    // Load configuration
    let mut config = match std::env::var("MONGO_LOADGEN_CONFIG") {
        Ok(path) => {
            info!("Loading configuration from: {}", path);
            config::load_config(&path).await?
        }
        Err(_) => Config::default(),
    };

    if let Invocation::Malformed { given } = &invocation {
        println!("{}", cli::USAGE);
        if config.malformed_args == MalformedArgsPolicy::Exit {
            info!(arguments = given, "malformed arguments, exiting per policy");
            return Ok(());
        }
        info!(arguments = given, "malformed arguments, proceeding with defaults");
    }

    cli::apply_invocation(&mut config, &invocation)?;
    config.validate()?;

    // Initialize metrics
    let metrics_registry = MetricsRegistry::new()?;
    let metrics = metrics_registry.collector();

    // Start the supervised server first so the loop has something to hit
    let mut supervisor = match &config.supervisor {
        Some(supervisor_config) => Some(ProcessSupervisor::start(supervisor_config).await?),
        None => None,
    };

    let result = run(&config, metrics).await;

    // Every exit path funnels through here: interrupt, iteration bound, or a
    // propagated error all kill the supervised server before we leave
    if let Some(supervisor) = supervisor.as_mut() {
        if let Err(e) = supervisor.shutdown().await {
            error!("failed to stop database server: {e}");
        }
    }

    match &result {
        Ok(summary) => info!(
            iterations = summary.iterations,
            ops = summary.ops_issued,
            connections = summary.connections_churned,
            started_at = %summary.started_at,
            "load generator finished"
        ),
        Err(e) => error!("load generator failed: {e}"),
    }
    info!(
        "final counters:\n{}",
        String::from_utf8_lossy(&metrics_registry.gather())
    );

    result.map(|_| ())
}

async fn run(config: &Config, metrics: Arc<MetricsCollector>) -> Result<RunSummary> {
    let connector = Arc::new(MongoConnector::new(config.connection.uri.clone()));
    let store: Arc<dyn DocumentStore> =
        Arc::new(MongoStore::connect(&config.connection.uri).await?);

    // Optional concurrent read storms, tracked so shutdown can join them
    let worker_pool = if config.workers.enabled {
        let pool = Arc::new(WorkerPool::new(
            config.workers.clone(),
            TargetSelector::new(&config.targets),
            connector.clone(),
            Some(metrics.clone()),
        ));
        tokio::spawn(pool.clone().run());
        Some(pool)
    } else {
        None
    };

    let (generator, shutdown) =
        LoadGenerator::new(config, store, connector, Some(metrics));
    let mut generator_task = tokio::spawn(generator.run());

    let outcome = tokio::select! {
        joined = &mut generator_task => joined,
        _ = shutdown_signal() => {
            shutdown.shutdown();
            generator_task.await
        }
    };

    // Join the storms on every path; a failed run cancels instead of waiting
    if let Some(pool) = worker_pool {
        pool.shutdown();
        if !matches!(&outcome, Ok(Ok(_))) {
            pool.abort_all();
        }
        let storms = pool.drain().await;
        info!(storms = storms.len(), "read storms joined");
    }

    Ok(outcome??)
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
