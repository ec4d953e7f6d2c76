//! The `show` command - prints a stored record.

use super::Context;
use clap::Args;

#[derive(Args)]
pub struct ShowArgs {
    /// VM name
    name: String,
}

pub fn run(ctx: &Context, args: ShowArgs) -> anyhow::Result<()> {
    let config = ctx.store.load(&args.name)?;
    print!("{}", config.to_toml()?);
    Ok(())
}
