use crate::batch::Artifact;
use crate::config::Config;
use crate::logging::{setup_logging, LogLevel};
use crate::mode::Mode;
use crate::place::Place;
use crate::services::{monitor, refresh_all, status_table};
use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use comfy_table::Table;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strum::IntoEnumIterator;
use tracing::{debug, info};

fn default(path: &Path) -> String {
    format!("[default: {}]", path.as_os_str().to_string_lossy())
}
/// Satellite and cloud forecast videos
#[derive(Parser, Debug, Serialize, Deserialize)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[arg(short, long, value_name = "DIR", help = default(&Config::default_dirs().data))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    #[arg(short, long = "config", value_name = "FILE", help = default(&Config::default_path()))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<PathBuf>,

    /// [default: info]
    #[arg(short, long)]
    #[serde(skip)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    #[serde(skip)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Refresh every video now and then on the configured interval
    Monitor,
    /// Build videos once
    Generate {
        /// Place id or name [default: all places]
        #[arg(short, long)]
        place: Option<String>,
        /// [default: all modes]
        #[arg(short, long)]
        mode: Option<Mode>,
    },
    /// Print the path of the latest video
    Latest {
        #[arg(short, long)]
        place: String,
        #[arg(short, long)]
        mode: Mode,
    },
    /// Show the age of every video
    Status,
    /// List configured places
    Places,
    /// Remove downloads and encodes that were interrupted
    Clean,
    /// Write the current configuration to the config file
    WriteConfig,
}

pub fn cli() -> Result<()> {
    let args = Cli::parse();

    let mut config = Config::from_cli(&args)?;
    if let Some(level) = args.log_level {
        config.main.logging.console_level = level;
        config.main.logging.file_level = level;
    }
    let _guard = setup_logging(&config.main.logging);
    debug!("Command line arguments: {:#?}", &args);
    debug!("Config: {:#?}", &config);

    match &args.command {
        Some(Commands::Monitor) => {
            let pipeline = config.pipeline()?;
            monitor(&pipeline, &config.main.places, config.main.refresh_interval)?
        }
        Some(Commands::Generate { place, mode }) => generate(&config, place.as_deref(), *mode)?,
        Some(Commands::Latest { place, mode }) => latest(&config, place, *mode)?,
        Some(Commands::Status) => {
            let pipeline = config.storage();
            println!("{}", status_table(&pipeline, &config.main.places, Utc::now()));
        }
        Some(Commands::Places) => print_places(&config.main.places),
        Some(Commands::Clean) => {
            let removed = config.storage().clean_partial_files()?;
            info!("Removed {removed} partial files");
        }
        Some(Commands::WriteConfig) => {
            config.write_config_file()?;
            info!("Wrote {}", config.config_path.display());
        }
        None => {}
    }
    Ok(())
}

fn generate(config: &Config, place: Option<&str>, mode: Option<Mode>) -> Result<()> {
    let pipeline = config.pipeline()?;
    let places = match place {
        Some(key) => vec![config.place(key)?.clone()],
        None => config.main.places.clone(),
    };

    let Some(mode) = mode else {
        let summary = refresh_all(&pipeline, &places, Utc::now());
        info!("Built {} videos, {} failed", summary.built, summary.failed);
        return Ok(());
    };

    let mut failed = Vec::new();
    for place in &places {
        match pipeline.assemble_batch(place, mode)? {
            Some(path) => println!("{}", path.display()),
            None => failed.push(place.id.as_str()),
        }
    }
    if !failed.is_empty() {
        return Err(anyhow!("No {mode} video built for {}", failed.join(", ")));
    }
    Ok(())
}

fn latest(config: &Config, place: &str, mode: Mode) -> Result<()> {
    let place = config.place(place)?;
    let pipeline = config.storage();
    match pipeline.latest(place, mode) {
        Artifact::Ready(path) => println!("{}", path.display()),
        Artifact::NotReady => println!("{}", Artifact::NOT_READY_MESSAGE),
    }
    Ok(())
}

fn print_places(places: &[Place]) {
    let mut table = Table::new();
    table.set_header(vec!["Id", "Name", "Code", "Commands"]);
    for place in places {
        let commands: Vec<String> = Mode::iter()
            .map(|mode| format!("generate -p {} -m {mode}", place.id))
            .collect();
        table.add_row(vec![
            place.id.clone(),
            place.name.clone(),
            place.code.to_string(),
            commands.join("\n"),
        ]);
    }
    println!("{table}");
}
