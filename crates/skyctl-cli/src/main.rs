mod doctor;
mod replay;
mod store;
mod upload;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use skyctl_fc::{MemoryStore, PresetStore, SessionConfig};
use tracing::info;

use crate::replay::UploadSim;
use crate::store::JsonFileStore;

#[derive(Debug, Parser)]
#[command(name = "skyctl", version, about = "Drone control-plane session tooling")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check the configuration and the preset store.
    Doctor,
    /// Drive a session from a scenario file and print what it sends.
    Replay {
        scenario: PathBuf,
        /// Start from built-in defaults instead of the preset store.
        #[arg(long)]
        fresh: bool,
    },
    Presets {
        #[command(subcommand)]
        cmd: PresetsCmd,
    },
}

#[derive(Debug, Subcommand)]
enum PresetsCmd {
    Show,
    /// Forget device-reported values; `--all` drops user presets too.
    Clear {
        #[arg(long)]
        all: bool,
    },
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    #[serde(default)]
    session: SessionConfig,
    store: StoreCfg,
    #[serde(default)]
    upload: UploadCfg,
}

#[derive(Debug, serde::Deserialize)]
struct StoreCfg {
    path: String,
}

#[derive(Debug, Default, serde::Deserialize)]
struct UploadCfg {
    #[serde(default)]
    simulated_delay_ms: u64,
    /// Fail every upload with HTTP 500.
    #[serde(default)]
    fail: bool,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    toml::from_str(&s).context("parse config toml")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => run_doctor(&cfg)?,
        Command::Replay { scenario, fresh } => replay_cmd(&cfg, &scenario, fresh).await?,
        Command::Presets { cmd } => presets(&cfg, cmd)?,
    }
    Ok(())
}

fn run_doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");
    doctor::check_session(&cfg.session)?;
    doctor::check_upload(cfg.upload.simulated_delay_ms, cfg.upload.fail)?;
    doctor::check_store(&cfg.store.path)?;
    info!("doctor: OK");
    Ok(())
}

async fn replay_cmd(cfg: &Config, scenario: &Path, fresh: bool) -> Result<()> {
    doctor::check_session(&cfg.session)?;
    let scenario = replay::load_scenario(scenario)?;
    if let Some(name) = &scenario.name {
        info!("replay: {}", name);
    }
    let store: Box<dyn PresetStore> = if fresh {
        Box::new(MemoryStore::default())
    } else {
        Box::new(JsonFileStore::open(Path::new(&cfg.store.path))?)
    };
    let upload =
        UploadSim { delay: Duration::from_millis(cfg.upload.simulated_delay_ms), fail: cfg.upload.fail };
    replay::replay(scenario, &cfg.session, store, upload).await?;
    Ok(())
}

fn presets(cfg: &Config, cmd: PresetsCmd) -> Result<()> {
    let mut store = JsonFileStore::open(Path::new(&cfg.store.path))?;
    match cmd {
        PresetsCmd::Show => {
            println!("{}", serde_json::to_string_pretty(store.doc()).context("encode store")?);
        }
        PresetsCmd::Clear { all } => {
            store.clear_device_settings();
            if all {
                store.clear_presets();
            }
            store.save()?;
            info!("presets: cleared{}", if all { " (all)" } else { "" });
        }
    }
    Ok(())
}
