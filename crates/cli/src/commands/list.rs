//! The `list` command - shows stored VMs.

use super::Context;
use clap::Args;
use virtmachines::{Error, VmConfig};

#[derive(Args)]
pub struct ListArgs {
    /// Print names only
    #[arg(long, short)]
    quiet: bool,
}

pub fn run(ctx: &Context, args: ListArgs) -> anyhow::Result<()> {
    let names = ctx.store.list()?;
    if names.is_empty() {
        if !args.quiet {
            println!("No virtual machines in {}.", ctx.store.dir().display());
        }
        return Ok(());
    }

    for name in names {
        if args.quiet {
            println!("{name}");
            continue;
        }
        match ctx.store.load(&name) {
            Ok(config) => println!("{}", summary(&config)),
            Err(Error::CorruptData { path, reason }) => {
                tracing::warn!(path = %path.display(), "skipping corrupt record: {}", reason);
                println!("{name}  (unreadable: {reason})");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn summary(config: &VmConfig) -> String {
    let disk = config
        .disk_image()
        .map(|p| format!("{} ({})", p.display(), config.disk_format))
        .unwrap_or_else(|| "no disk".to_string());
    format!(
        "{}  {} MB, {} CPU(s), {}",
        config.name, config.memory_mb, config.cpus, disk
    )
}
