use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use modlist::{
    Compiler, CompilerConfig, Conventions, InstallPhase, InstallProgress, Installer, InstallerConfig, ModList,
};

#[derive(Parser, Debug)]
#[command(version, about = "Compile and install modlists", long_about = None)]
struct Args {
    /// JSON file overriding directory names and classification rules
    #[arg(long, global = true, env = "MODLIST_CONVENTIONS")]
    conventions: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a modlist from a mod manager installation
    Compile {
        /// Root of the mod manager installation
        #[arg(short, long, env = "MODLIST_SOURCE")]
        source: PathBuf,

        /// Game installation directory
        #[arg(short, long, env = "MODLIST_GAME")]
        game: PathBuf,

        /// Directory holding the downloaded archives
        #[arg(short, long, env = "MODLIST_DOWNLOADS")]
        downloads: PathBuf,

        /// Where to write the modlist package
        #[arg(short, long, default_value = "output.modlist")]
        output: PathBuf,

        /// Profiles to include; all profiles when omitted
        #[arg(short, long)]
        profile: Vec<String>,

        #[arg(short, long, default_value = "Unnamed modlist")]
        name: String,

        #[arg(long, default_value = "")]
        author: String,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long, default_value = "1.0.0")]
        version: String,

        /// Name of the game the list targets
        #[arg(long, default_value = "")]
        game_name: String,
    },
    /// Install a modlist package
    Install {
        /// The modlist package to install
        #[arg(short, long)]
        modlist: PathBuf,

        /// Directory to install into
        #[arg(short, long, env = "MODLIST_INSTALL_DIR")]
        install_dir: PathBuf,

        /// Directory holding the downloaded archives
        #[arg(short, long, env = "MODLIST_DOWNLOADS")]
        downloads: PathBuf,

        /// Game installation directory
        #[arg(short, long, env = "MODLIST_GAME")]
        game: PathBuf,

        /// Maximum number of files installed at once
        #[arg(long)]
        max_concurrency: Option<usize>,

        /// Maximum number of archives extracted at once
        #[arg(long, default_value_t = 2)]
        max_extractions: usize,
    },
    /// Show a summary of a modlist package
    Info {
        #[arg(short, long)]
        modlist: PathBuf,
    },
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after in-flight work");
            child.cancel();
        }
    });
    token
}

fn load_conventions(path: Option<&PathBuf>) -> Result<Conventions> {
    match path {
        Some(path) => Conventions::from_json_file(path).context("Failed to load conventions"),
        None => Ok(Conventions::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok(); // Ignore error if .env not present
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let conventions = load_conventions(args.conventions.as_ref())?;

    match args.command {
        Commands::Compile {
            source,
            game,
            downloads,
            output,
            profile,
            name,
            author,
            description,
            version,
            game_name,
        } => {
            let mut config = CompilerConfig::new(source, game, downloads)
                .with_name(name)
                .with_author(author)
                .with_description(description)
                .with_version(version)
                .with_game(game_name)
                .with_conventions(conventions);
            for p in profile {
                config = config.with_profile(p);
            }

            let compiler = Compiler::new(config).with_cancellation_token(cancel_on_ctrl_c());
            let list = tokio::task::spawn_blocking(move || compiler.compile())
                .await
                .context("Compile task panicked")?
                .context("Compilation failed")?;
            list.save(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!(
                "Wrote {} ({} directives, {} archives)",
                output.display(),
                list.directives.len(),
                list.archives.len()
            );
        }
        Commands::Install {
            modlist,
            install_dir,
            downloads,
            game,
            max_concurrency,
            max_extractions,
        } => {
            let list = ModList::load(&modlist).with_context(|| format!("Failed to read {}", modlist.display()))?;
            let mut config = InstallerConfig::new(install_dir, downloads, game)
                .with_max_concurrent_extractions(max_extractions)
                .with_conventions(conventions);
            if let Some(max) = max_concurrency {
                config = config.with_max_concurrency(max);
            }

            let progress = Arc::new(|p: InstallProgress| {
                if p.phase == InstallPhase::InstallingFiles && p.total_items > 0 {
                    let percent = p.processed_items as f64 / p.total_items as f64 * 100.0;
                    info!("{}/{} files ({:.1}%)", p.processed_items, p.total_items, percent);
                } else {
                    info!("[{}/{}] {}", p.current_step, p.total_steps, p.message);
                }
            });
            let report = Installer::new(config, list)
                .with_progress_callback(progress)
                .with_cancellation_token(cancel_on_ctrl_c())
                .install()
                .await
                .context("Installation failed")?;
            info!(
                "Done: {} written, {} unchanged, {} left to the override directory, {} removed",
                report.written, report.unchanged, report.overridden, report.deleted
            );
        }
        Commands::Info { modlist } => {
            let list = ModList::load(&modlist).with_context(|| format!("Failed to read {}", modlist.display()))?;
            println!("{} {} by {}", list.name, list.version, list.author);
            if !list.description.is_empty() {
                println!("{}", list.description);
            }
            println!("Game: {}", list.game);
            println!("Archives: {}", list.archives.len());
            for archive in &list.archives {
                println!("  {} ({} bytes, {})", archive.name, archive.size, archive.hash);
            }
            println!("Directives: {}", list.directives.len());
            for (kind, count) in list.directive_counts() {
                println!("  {}: {}", kind, count);
            }
            println!("Inline data: {} bytes", list.blobs.total_size());
        }
    }
    Ok(())
}
