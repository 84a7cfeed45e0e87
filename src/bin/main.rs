use std::sync::Arc;

use chrono::Utc;
use swapbot::{
    agent::{AgentSettings, Collaborators, SwapAgent},
    api::{start_server, ApiState},
    audit::InterventionLog,
    config::Config,
    directory::AssetDirectory,
    gateway::{FswapClient, LocalTransport, NdjsonEventSource, StaticAssetLookup},
    state::InMemorySessionStore,
};
use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    info!(bot_id = %config.bot_id, swap_api = %config.swap_api_base_url, "Swap bot starting");

    // The catalog is required: without it no symbol resolves
    let fswap = Arc::new(FswapClient::new(config.swap_api_base_url.clone())?);
    let catalog = fswap.read_assets().await.map_err(|e| {
        error!(error = %e, "Asset catalog unavailable");
        e
    })?;

    let directory = Arc::new(AssetDirectory::from_catalog(catalog.iter().cloned()));
    let assets = Arc::new(StaticAssetLookup::from_catalog(&catalog));
    let sessions = Arc::new(InMemorySessionStore::with_ttl(config.session_ttl));
    let interventions = Arc::new(InterventionLog::new());
    let transport = LocalTransport::new();

    let api_state = ApiState {
        bot_id: config.bot_id,
        sessions: sessions.clone(),
        directory: directory.clone(),
        interventions: interventions.clone(),
        started_at: Utc::now(),
    };
    let api_port = config.api_port;
    tokio::spawn(async move {
        if let Err(e) = start_server(api_state, api_port).await {
            error!(error = %e, "API server stopped");
        }
    });

    let agent = Arc::new(SwapAgent::new(
        directory,
        sessions,
        interventions,
        Collaborators {
            messenger: Arc::new(transport.clone()),
            wallet: Arc::new(transport),
            assets,
            groups: fswap,
        },
        AgentSettings {
            bot_id: config.bot_id,
            minimum_output: config.minimum_output,
            max_in_flight: config.max_in_flight,
        },
    ));

    info!("Reading events from stdin");
    let mut source = NdjsonEventSource::new(BufReader::new(tokio::io::stdin()));

    loop {
        match agent.run(&mut source).await {
            Ok(()) => break,
            Err(e) => {
                warn!(
                    error = %e,
                    delay_ms = config.bus_retry_delay.as_millis() as u64,
                    "Event loop failed, restarting"
                );
                tokio::time::sleep(config.bus_retry_delay).await;
            }
        }
    }

    info!("Event stream closed, shutting down");
    Ok(())
}
