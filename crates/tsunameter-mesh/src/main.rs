//! Tsunameter binary
//!
//! Runs one simulated sensor mesh configured from `TSUNAMETER_*` variables.

use anyhow::Context;
use tsunameter_mesh::{FileLog, Mesh, MeshConfig, StopCause};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tsunameter=info,tsunameter_mesh=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MeshConfig::from_env().context("invalid configuration")?;
    let sink = FileLog::open(&config.log_path, config.log_format)
        .with_context(|| format!("cannot open log {}", config.log_path.display()))?;
    let log_path = config.log_path.clone();

    let mesh = Mesh::new(config).context("cannot build sensor grid")?;
    tracing::info!(
        "Starting Tsunameter: {}x{} grid, logging to {}",
        mesh.topology().rows(),
        mesh.topology().cols(),
        log_path.display()
    );

    let stop = mesh.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping");
            stop.trigger(StopCause::UserRequested);
        }
    });

    let report = mesh.run(Box::new(sink)).await.context("mesh run failed")?;
    let summary = &report.summary;
    tracing::info!(
        "Stopped ({}) after {} iterations: {} true, {} false alerts, {} messages",
        summary.cause,
        summary.iterations,
        summary.total_true,
        summary.total_false,
        summary.total_messages
    );

    Ok(())
}
