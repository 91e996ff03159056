use tracing::{error, info};

use mailreward::web::{AppState, WebServer};
use mailreward::Config;

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env(CONFIG_PATH) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {CONFIG_PATH}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = mailreward::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        mailreward::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = run(config).await {
        error!("Mail reward service stopped: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> mailreward::Result<()> {
    config.validate()?;

    info!("Mail reward service starting");
    info!(
        "Web API configured on {}:{}",
        config.web.host, config.web.port
    );

    let state = AppState::open(&config).await?;
    let server = WebServer::new(&config.web, &config.claim, state)?;
    server.run().await?;
    Ok(())
}
