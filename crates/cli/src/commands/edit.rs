//! The `edit` command - changes an existing VM record.

use super::Context;
use super::config::ConfigArgs;
use clap::Args;

#[derive(Args)]
pub struct EditArgs {
    /// VM name
    name: String,

    #[command(flatten)]
    config: ConfigArgs,
}

pub fn run(ctx: &Context, args: EditArgs) -> anyhow::Result<()> {
    let original = ctx.store.load(&args.name)?;
    let config = args.config.apply(original.clone())?;
    if config == original {
        println!("No changes to '{}'", args.name);
        return Ok(());
    }
    ctx.store.save(&config)?;
    println!("Updated '{}'", config.name);
    Ok(())
}
