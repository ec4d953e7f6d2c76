//! The `command` command - prints the QEMU invocation a VM would run.

use super::Context;
use clap::Args;
use virtmachines::compile;

#[derive(Args)]
pub struct CommandArgs {
    /// VM name
    name: String,
}

pub fn run(ctx: &Context, args: CommandArgs) -> anyhow::Result<()> {
    let config = ctx.store.load(&args.name)?;
    println!("{}", compile(&config)?);
    Ok(())
}
