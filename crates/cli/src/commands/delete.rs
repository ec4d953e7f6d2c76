//! The `delete` command - removes a VM from the list, optionally with its files.

use super::Context;
use clap::Args;

#[derive(Args)]
pub struct DeleteArgs {
    /// VM name
    name: String,

    /// Also delete the VM's folder (disk images, logs)
    #[arg(long)]
    files: bool,
}

pub fn run(ctx: &Context, args: DeleteArgs) -> anyhow::Result<()> {
    ctx.store.delete(&args.name)?;
    println!("Removed '{}'", args.name);

    if args.files {
        if ctx.store.remove_workdir(&args.name)? {
            println!("Deleted {}", ctx.store.workdir(&args.name).display());
        }
    } else if ctx.store.workdir(&args.name).is_dir() {
        println!(
            "Kept {} (use --files to delete it)",
            ctx.store.workdir(&args.name).display()
        );
    }
    Ok(())
}
