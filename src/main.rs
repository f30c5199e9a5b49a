mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use conduit::config::ConduitConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "conduit")]
#[command(about = "Pair a handheld wand with an altar display and drive it with gestures")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CONDUIT_GIT_SHA"), ")"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.conduit/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the altar and wait for a wand
    Host {
        /// Room code to listen under (generated when omitted)
        #[arg(long)]
        room: Option<String>,

        /// YAML file with the content library
        #[arg(long)]
        library: Option<PathBuf>,
    },

    /// Run a wand that reads gestures from stdin
    Wand {
        /// Room code or pairing URL
        #[arg(long)]
        room: String,
    },

    /// Run an altar and a wand in-process with scripted gestures
    Demo,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("conduit=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = ConduitConfig::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Host { room, library } => cli::run_host(&config, room, library).await,
        Commands::Wand { room } => cli::run_wand(&config, &room).await,
        Commands::Demo => {
            let responses = cli::run_demo(&config).await?;
            for response in responses {
                println!("{}", response.encode()?);
            }
            Ok(())
        }
    }
}
