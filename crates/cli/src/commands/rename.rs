//! The `rename` command - saves a record under a new name.

use super::Context;
use clap::Args;

#[derive(Args)]
pub struct RenameArgs {
    /// Current VM name
    old: String,

    /// New VM name
    new: String,
}

pub fn run(ctx: &Context, args: RenameArgs) -> anyhow::Result<()> {
    let renamed = ctx.store.rename(&args.old, &args.new)?;
    println!("Renamed '{}' to '{}'", args.old, renamed.name);
    if ctx.store.workdir(&args.old).is_dir() {
        eprintln!(
            "Note: files in {} were not moved",
            ctx.store.workdir(&args.old).display()
        );
    }
    Ok(())
}
