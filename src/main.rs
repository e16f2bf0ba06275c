//! Lane Clash Server
//!
//! Listens for line-oriented TCP clients and runs their matches until Ctrl-C.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use lane_clash::{GameServer, ServerConfig, MATCH_DURATION_TICKS, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    let config = ServerConfig::from_env()?;

    info!("Lane Clash Server v{}", VERSION);
    info!(
        "Tick: {:?}, match length: {} ticks (default {})",
        config.session.tick_interval, config.session.match_config.duration_ticks, MATCH_DURATION_TICKS
    );
    match &config.profile_path {
        Some(path) => info!("Profiles: {}", path.display()),
        None => info!("Profiles: in memory"),
    }

    let server = GameServer::new(config);
    let serving = server.run();
    tokio::pin!(serving);

    tokio::select! {
        result = &mut serving => result?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            server.shutdown();
            serving.await?;
        }
    }

    info!("Server stopped");
    Ok(())
}
