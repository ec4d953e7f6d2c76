mod commands;
mod settings;

use clap::{Parser, Subcommand};
use commands::Context;
use settings::Settings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use virtmachines::VmStore;

#[derive(Parser)]
#[command(name = "virtmachines")]
#[command(about = "Create, configure and run QEMU virtual machines")]
#[command(version)]
struct Cli {
    /// Directory holding VM records and their folders [default: ~/Virtual Machines]
    #[arg(long, global = true, env = "VIRTMACHINES_HOME")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored virtual machines
    List(commands::list::ListArgs),

    /// Create a new virtual machine
    Create(commands::create::CreateArgs),

    /// Change settings of an existing virtual machine
    Edit(commands::edit::EditArgs),

    /// Print a virtual machine's stored record
    Show(commands::show::ShowArgs),

    /// Print the QEMU command a virtual machine runs
    Command(commands::command::CommandArgs),

    /// Run a virtual machine
    Run(commands::run::RunArgs),

    /// Remove a virtual machine from the list
    Delete(commands::delete::DeleteArgs),

    /// Add a virtual machine from a record file
    Import(commands::import::ImportArgs),

    /// Save a virtual machine under a new name
    Rename(commands::rename::RenameArgs),

    /// Create a blank disk image for a virtual machine
    Disk(commands::disk::DiskArgs),

    /// Show version information
    Version(commands::version::VersionArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    std::process::exit(0);
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Version(args) = cli.command {
        commands::version::run(args);
        return Ok(());
    }

    let dir = match cli.config_dir {
        Some(dir) => dir,
        None => settings::default_config_dir()?,
    };
    let ctx = Context {
        store: VmStore::open(&dir)?,
        settings: Settings::load(&dir)?,
    };
    tracing::debug!(dir = %dir.display(), "opened VM store");

    match cli.command {
        Commands::List(args) => commands::list::run(&ctx, args),
        Commands::Create(args) => commands::create::run(&ctx, args).await,
        Commands::Edit(args) => commands::edit::run(&ctx, args),
        Commands::Show(args) => commands::show::run(&ctx, args),
        Commands::Command(args) => commands::command::run(&ctx, args),
        Commands::Run(args) => commands::run::run(&ctx, args).await,
        Commands::Delete(args) => commands::delete::run(&ctx, args),
        Commands::Import(args) => commands::import::run(&ctx, args),
        Commands::Rename(args) => commands::rename::run(&ctx, args),
        Commands::Disk(args) => commands::disk::run(&ctx, args).await,
        Commands::Version(_) => Ok(()),
    }
}
