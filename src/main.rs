use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use torrent_refresher::config::{JsonFileStore, RpcSettings, TrackerSettings};
use torrent_refresher::core::manager::WalkOutcome;
use torrent_refresher::logging::setup_logging;
use torrent_refresher::toolbox::Toolbox;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings document.
    #[arg(long, env = "TORRENT_REFRESHER_CONFIG", default_value = "torrent-refresher.json")]
    config: PathBuf,

    /// off, trace, debug, info, warn or error.
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Checks registered torrents for updates.
    Walk {
        /// Ignore the walk interval.
        #[arg(long)]
        forced: bool,
        /// Leave outdated torrents in the clients.
        #[arg(long)]
        keep_outdated: bool,
    },
    /// Registers the torrent published at a tracker page URL.
    AddTorrent {
        url: String,
        #[arg(long)]
        download_to: Option<String>,
    },
    RemoveTorrent {
        hash: String,
        /// Delete downloaded data too.
        #[arg(long)]
        with_data: bool,
    },
    ConfigureTracker {
        alias: String,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    ConfigureRpc {
        alias: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    SetWalkInterval {
        hours: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level)?;

    let store = Arc::new(JsonFileStore::new(&cli.config));
    let mut toolbox = Toolbox::bootstrap(store)?;

    match cli.command {
        Command::Walk { forced, keep_outdated } => match toolbox.walk(forced, !keep_outdated).await? {
            WalkOutcome::NotDue => info!("Walk is not due yet"),
            WalkOutcome::Done(report) => {
                for (old, new) in report.updated {
                    info!("Updated {} -> {}", old, new);
                }
            }
        },
        Command::AddTorrent { url, download_to } => {
            let record = toolbox.add_torrent_from_url(&url, download_to).await?;
            println!("{} {}", record.hash(), record.name());
        }
        Command::RemoveTorrent { hash, with_data } => {
            toolbox.remove_torrent(&hash, with_data).await?;
        }
        Command::ConfigureTracker { alias, username, password } => {
            let settings = TrackerSettings {
                username,
                password,
                ..Default::default()
            };
            if !toolbox.configure_tracker(&alias, settings).await? {
                anyhow::bail!("Tracker `{}` configuration test failed", alias);
            }
        }
        Command::ConfigureRpc { alias, url, username, password } => {
            let settings = RpcSettings {
                url,
                username,
                password,
                enabled: true,
            };
            if !toolbox.configure_rpc(&alias, settings).await? {
                anyhow::bail!("RPC `{}` configuration test failed", alias);
            }
        }
        Command::SetWalkInterval { hours } => toolbox.set_walk_interval(hours)?,
    }

    Ok(())
}
