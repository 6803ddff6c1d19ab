//! Driver Drowsiness Monitor - Main Entry Point

use api::{init_logging, run_server, Settings};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1);
    let settings = Settings::load(path.as_deref())?;
    init_logging(&settings.server.log_level);

    info!("=== Driver Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Rule set {:?}, eye closure scale {:?}",
        settings.dms.decision.rule_set, settings.dms.aggregator.eye_closure_scale
    );

    run_server(settings)
        .await
        .map_err(|e| anyhow::anyhow!("server error: {}", e))?;

    Ok(())
}
