use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vault_core::paths;
use vault_core::{ObjectStore, SessionController, VaultSettings};

mod commands;
mod mime;
mod prompt;

const DEFAULT_LOG_FILTER: &str = "warn,vault_store=info,vault_core=info,obsidian_vault=info";

#[derive(Parser)]
#[command(name = "obsidian-vault")]
#[command(about = "Passcode-gated local file vault", long_about = None)]
struct Cli {
    /// Vault data directory (defaults to the platform data dir)
    #[arg(long, global = true, env = paths::DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct UnlockArgs {
    /// Unlock with the biometric override instead of a passcode
    #[arg(long)]
    pub biometric: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show whether the vault needs setup or login
    Status,

    /// Create the vault passcode
    Init {
        /// Skip the enrollment scan prompt
        #[arg(long)]
        yes: bool,
    },

    /// Store files in the vault
    Add {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// MIME type for every file (guessed from the extension otherwise)
        #[arg(long)]
        mime: Option<String>,

        #[command(flatten)]
        unlock: UnlockArgs,
    },

    /// List stored files, newest first
    List {
        /// Case-insensitive name filter
        #[arg(short, long)]
        search: Option<String>,

        /// Print metadata as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        unlock: UnlockArgs,
    },

    /// Write stored files into a directory under their stored names
    Export {
        #[arg(required = true)]
        ids: Vec<String>,

        /// Destination directory, created if missing
        #[arg(long, value_name = "DIR")]
        to: PathBuf,

        #[command(flatten)]
        unlock: UnlockArgs,
    },

    /// Delete stored files by id
    Rm {
        #[arg(required = true)]
        ids: Vec<String>,

        #[command(flatten)]
        unlock: UnlockArgs,
    },

    /// Wipe every file and the passcode
    Reset {
        /// Required; there is no undo
        #[arg(long)]
        yes: bool,

        #[command(flatten)]
        unlock: UnlockArgs,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => paths::data_dir()?,
    };
    let settings = VaultSettings::load(&data_dir)?;
    let store = ObjectStore::new(settings.store_config(&data_dir));
    let mut session = SessionController::new(store);

    match cli.command {
        Commands::Status => commands::status(&mut session, &data_dir).await,
        Commands::Init { yes } => commands::init(&mut session, &data_dir, &settings, yes).await,
        Commands::Add { paths, mime, unlock } => {
            commands::unlock(&mut session, unlock).await?;
            commands::add(&session, &paths, mime.as_deref()).await
        }
        Commands::List { search, json, unlock } => {
            commands::unlock(&mut session, unlock).await?;
            commands::list(&session, search.as_deref(), json).await
        }
        Commands::Export { ids, to, unlock } => {
            commands::unlock(&mut session, unlock).await?;
            commands::export(&session, &ids, &to).await
        }
        Commands::Rm { ids, unlock } => {
            commands::unlock(&mut session, unlock).await?;
            commands::remove(&session, &ids).await
        }
        Commands::Reset { yes, unlock } => {
            if !yes {
                anyhow::bail!("reset deletes every file and the passcode; pass --yes to confirm");
            }
            commands::unlock(&mut session, unlock).await?;
            commands::reset(&session).await
        }
    }
}
