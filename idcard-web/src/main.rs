use idcard_backend::CardController;
use idcard_backend::config::{self, AppConfig};

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};

mod page;
mod routes;

#[derive(Parser)]
#[command(name = "idcard-web")]
#[command(about = "Browse member ID cards and download them", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (TOML)
    #[arg(short, long, env = "IDCARD_CONFIG", default_value = config::DEFAULT_CONFIG_PATH)]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load_or_default(&cli.config)?;

    // Initialize logging
    let _logging_guard = idcard_backend::logging::init_logging(
        &config.log_dir,
        "idcard-web",
        &config.log_level,
    )?;

    info!("ID card web starting...");

    let controller = Arc::new(CardController::from_config(&config).await?);

    let photo_dir = &config.card.photo_base;
    if !photo_dir.exists() {
        warn!("Photo directory does not exist: {}", photo_dir.display());
    }
    info!("Serving photos from: {}", photo_dir.display());

    let app = routes::router(controller, photo_dir, &config.card.photo_url_prefix);

    let addr = config.server_address();
    info!("Starting web server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
