//! Application entry point.
//!
//! Startup order: logging, configuration (fatal on validation failure),
//! pipeline wiring, then wait for Ctrl+C/SIGTERM and stop gracefully.

use anyhow::Result;
use tracing::info;

use monsrv::app::App;
use monsrv::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    if std::env::args().any(|a| a == "--print-config") {
        print!("{}", Config::generate_default_config());
        return Ok(());
    }

    info!("Starting {} v{}", monsrv::SERVICE_NAME, monsrv::VERSION);

    let config = Config::load()?;
    let app = App::start(config)?;

    app.shutdown_handle().listen_for_signals().await;
    info!("Shutdown signal received");

    app.stop().await;
    Ok(())
}

/// Initialize the global tracing subscriber. `RUST_LOG` controls
/// verbosity; the default is `info`.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
