//! The `import` command - adds a record file from elsewhere.

use super::Context;
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct ImportArgs {
    /// Record file to import; the VM keeps the name stored inside it
    file: PathBuf,
}

pub fn run(ctx: &Context, args: ImportArgs) -> anyhow::Result<()> {
    let config = ctx.store.import(&args.file)?;
    println!("Imported '{}'", config.name);
    Ok(())
}
