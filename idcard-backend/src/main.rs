use idcard_backend::config::{self, AppConfig};
use idcard_backend::CardController;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "idcard-backend")]
#[command(about = "Render member ID cards and export them as PNG / zip", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (TOML)
    #[arg(short, long, env = "IDCARD_CONFIG", default_value = config::DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the members parsed from the directory file
    List,

    /// Export one member card as PNG (first member when no selector is given)
    ExportOne {
        /// Select by display name
        #[arg(long, conflicts_with = "index")]
        name: Option<String>,
        /// Select by position in the directory (0-based)
        #[arg(long)]
        index: Option<usize>,
    },

    /// Export every member card into a single zip archive
    ExportAll,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load_or_default(&cli.config)?;

    // Initialize logging
    let _logging_guard = idcard_backend::logging::init_logging(
        &config.log_dir,
        "idcard-backend",
        &config.log_level,
    )?;

    tracing::info!("ID card backend starting...");

    let controller = CardController::from_config(&config).await?;

    match cli.command {
        Command::List => {
            for (i, member) in controller.members().iter().enumerate() {
                println!("{:>3}  {}  [{}] {}", i, member.display_name, member.cohort, member.region);
            }
            println!("{} members", controller.members().len());
        }
        Command::ExportOne { name, index } => {
            let selected = match (name, index) {
                (Some(name), _) => controller.select_by_name(&name),
                (None, Some(index)) => controller.select(index),
                (None, None) => controller.selected_index().is_some(),
            };
            if !selected {
                anyhow::bail!("No matching member to export");
            }

            let artifact = controller
                .export_selected()
                .await
                .context("Failed to export card")?;
            let path = artifact.save_to(&config.export.output_dir).await?;
            println!("Saved {}", path.display());
        }
        Command::ExportAll => {
            let artifact = controller
                .export_all()
                .await
                .context("Failed to export cards")?;
            let path = artifact.save_to(&config.export.output_dir).await?;
            println!("Saved {} ({} cards)", path.display(), controller.export_status().done);
        }
    }

    Ok(())
}
