use std::path::PathBuf;

use clap::Parser;

use content_server::config::loader::load_config;
use content_server::config::validation::validate_config;
use content_server::config::AppConfig;
use content_server::lifecycle::startup;
use content_server::observability::logging;

#[derive(Parser)]
#[command(name = "content-server")]
#[command(about = "Content server with an admin UI and live static directories", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Wipe storage on startup and seed known test data
    #[arg(long)]
    dev: bool,

    /// Log at debug level
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let config = AppConfig::default();
            if let Err(errors) = validate_config(&config) {
                for error in &errors {
                    eprintln!("invalid default configuration: {}", error);
                }
                return Err("invalid configuration".into());
            }
            config
        }
    };

    logging::init(&config.observability.log_level, cli.debug);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "content-server starting");
    tracing::info!(
        bind_address = %config.server.bind_address,
        static_dir = %config.static_assets.dir,
        persistent = config.storage.path.is_some(),
        "Configuration loaded"
    );
    if cli.dev {
        tracing::warn!(
            username = content_server::storage::seed::DEV_USERNAME,
            "Development mode enabled"
        );
    }

    startup::run(config, cli.dev).await?;
    Ok(())
}
