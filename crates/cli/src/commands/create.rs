//! The `create` command - adds a new VM record.

use super::Context;
use super::config::ConfigArgs;
use clap::Args;
use virtmachines::{DiskSize, Error, VmConfig, validate_name};

#[derive(Args)]
pub struct CreateArgs {
    /// VM name
    name: String,

    /// Also create a blank disk of this size (e.g. 20G) in the VM's folder
    #[arg(long, conflicts_with = "disk")]
    disk_size: Option<DiskSize>,

    #[command(flatten)]
    config: ConfigArgs,
}

pub async fn run(ctx: &Context, args: CreateArgs) -> anyhow::Result<()> {
    validate_name(&args.name)?;
    if ctx.store.contains(&args.name) {
        return Err(Error::AlreadyExists { name: args.name }.into());
    }

    let mut config = args.config.apply(VmConfig::new(&args.name))?;
    if let Some(size) = args.disk_size {
        let path = ctx
            .settings
            .disk_tool()
            .create_for(&ctx.store, &mut config, size)
            .await?;
        println!("Created disk {}", path.display());
    }

    ctx.store.create(&config)?;
    println!("Created '{}'", config.name);
    Ok(())
}
