//! The `disk` command - creates a blank disk image for a VM.

use super::Context;
use clap::Args;
use virtmachines::{DiskSize, ImageFormat};

#[derive(Args)]
pub struct DiskArgs {
    /// VM name
    name: String,

    /// Image size, e.g. 512M, 20G or 1T (bare numbers are gigabytes)
    #[arg(long)]
    size: DiskSize,

    /// Image format; defaults to the VM's disk format
    #[arg(long)]
    format: Option<ImageFormat>,

    /// Attach the new image even if the VM already has a disk
    #[arg(long)]
    replace: bool,
}

pub async fn run(ctx: &Context, args: DiskArgs) -> anyhow::Result<()> {
    let mut config = ctx.store.load(&args.name)?;
    if let Some(existing) = config.disk_image() {
        if !args.replace {
            anyhow::bail!(
                "'{}' already has disk {}; pass --replace to attach a new one",
                config.name,
                existing.display()
            );
        }
    }
    if let Some(format) = args.format {
        config.disk_format = format;
    }

    let path = ctx
        .settings
        .disk_tool()
        .create_for(&ctx.store, &mut config, args.size)
        .await?;
    ctx.store.save(&config)?;

    println!(
        "Created {} disk {} ({}) for '{}'",
        args.size,
        path.display(),
        config.disk_format,
        config.name
    );
    Ok(())
}
