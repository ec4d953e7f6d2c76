//! Hardware flags shared by `create` and `edit`.

use clap::Args;
use std::path::PathBuf;
use virtmachines::{
    AudioDevice, DiskInterface, DisplayDevice, ImageFormat, NetworkDevice, SharedFolder,
    VIDEO_MEMORY_CHOICES, VmConfig,
};

const MAX_CPUS: u32 = 256;
const MAX_MEMORY_MB: u32 = 1024 * 1024; // 1 TB

#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// Memory in MB (1-1048576)
    #[arg(long, value_parser = parse_memory)]
    memory: Option<u32>,

    /// Number of CPUs (1-256)
    #[arg(long, value_parser = parse_cpus)]
    cpus: Option<u32>,

    /// Graphics adapter: std, qxl, virtio or cirrus
    #[arg(long)]
    display: Option<DisplayDevice>,

    /// Video memory in MB (usually 16, 32, 64, 128 or 256)
    #[arg(long, value_parser = parse_video_memory)]
    video_memory: Option<u32>,

    /// Primary disk image
    #[arg(long, conflicts_with = "no_disk")]
    disk: Option<PathBuf>,

    /// Disk image format; guessed from the --disk extension when omitted
    #[arg(long)]
    disk_format: Option<ImageFormat>,

    /// Disk bus: ide or virtio
    #[arg(long)]
    disk_interface: Option<DiskInterface>,

    /// Detach the primary disk
    #[arg(long)]
    no_disk: bool,

    /// CD-ROM image to boot from
    #[arg(long, conflicts_with = "no_cdrom")]
    cdrom: Option<PathBuf>,

    #[arg(long)]
    no_cdrom: bool,

    /// Floppy image, attached read-only when the file exists at launch
    #[arg(long, conflicts_with = "no_floppy")]
    floppy: Option<PathBuf>,

    #[arg(long)]
    no_floppy: bool,

    /// Second CD-ROM for guest drivers
    #[arg(long, conflicts_with = "no_driver_iso")]
    driver_iso: Option<PathBuf>,

    #[arg(long)]
    no_driver_iso: bool,

    /// Sound card: none, ac97, es1370, sb16 or hda
    #[arg(long)]
    audio: Option<AudioDevice>,

    /// Network card: rtl8139, e1000, virtio-net or ne2k_pci
    #[arg(long)]
    network: Option<NetworkDevice>,

    /// Shared folder as host:tag (repeatable; leave the tag empty to generate one)
    #[arg(long, value_parser = parse_share)]
    share: Vec<SharedFolder>,

    /// File with one host:tag shared folder per line; malformed lines are skipped
    #[arg(long)]
    shares_file: Option<PathBuf>,

    /// Remove all shared folders before adding new ones
    #[arg(long)]
    clear_shares: bool,

    /// Enable the SPICE graphics console
    #[arg(long, value_name = "BOOL")]
    graphics_console: Option<bool>,

    /// SPICE port
    #[arg(long)]
    spice_port: Option<u16>,

    /// Request the guest agent channel (stored only)
    #[arg(long, value_name = "BOOL")]
    guest_agent: Option<bool>,

    /// Attach the QEMU monitor to the terminal when running
    #[arg(long, value_name = "BOOL")]
    interactive_monitor: Option<bool>,
}

impl ConfigArgs {
    /// Applies every given flag to `config`, leaving the rest untouched.
    pub fn apply(&self, mut config: VmConfig) -> anyhow::Result<VmConfig> {
        if let Some(memory) = self.memory {
            config.memory_mb = memory;
        }
        if let Some(cpus) = self.cpus {
            config.cpus = cpus;
        }
        if let Some(display) = self.display {
            config.display = display;
        }
        if let Some(video_memory) = self.video_memory {
            if !VIDEO_MEMORY_CHOICES.contains(&video_memory) {
                tracing::warn!(
                    "video memory {} MB is not one of {:?}",
                    video_memory,
                    VIDEO_MEMORY_CHOICES
                );
            }
            config.video_memory_mb = video_memory;
        }

        if self.no_disk {
            config.disk_path = None;
        }
        if let Some(disk) = &self.disk {
            let format = self
                .disk_format
                .or_else(|| ImageFormat::from_extension(disk))
                .unwrap_or(config.disk_format);
            config = config.disk(disk, format);
        } else if let Some(format) = self.disk_format {
            config.disk_format = format;
        }
        if let Some(interface) = self.disk_interface {
            config.disk_interface = interface;
        }

        apply_path(&mut config.cdrom_path, &self.cdrom, self.no_cdrom);
        apply_path(&mut config.floppy_path, &self.floppy, self.no_floppy);
        apply_path(&mut config.driver_iso_path, &self.driver_iso, self.no_driver_iso);

        if let Some(audio) = &self.audio {
            if !audio.is_known() {
                tracing::warn!("unknown audio device '{}' will not be emulated", audio);
            }
            config.audio = audio.clone();
        }
        if let Some(network) = self.network {
            config.network = network;
        }

        if self.clear_shares {
            config.shared_folders.clear();
        }
        if let Some(path) = &self.shares_file {
            let text = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
            config
                .shared_folders
                .extend(SharedFolder::parse_lines(&text));
        }
        config.shared_folders.extend(self.share.iter().cloned());

        if let Some(enabled) = self.graphics_console {
            config.graphics_console = enabled;
        }
        if let Some(port) = self.spice_port {
            config.spice_port = port;
        }
        if let Some(enabled) = self.guest_agent {
            config.guest_agent = enabled;
        }
        if let Some(enabled) = self.interactive_monitor {
            config.interactive_monitor = enabled;
        }

        Ok(config)
    }
}

fn apply_path(field: &mut Option<PathBuf>, value: &Option<PathBuf>, clear: bool) {
    if clear {
        *field = None;
    }
    if let Some(path) = value {
        *field = Some(path.clone());
    }
}

fn parse_cpus(s: &str) -> Result<u32, String> {
    let cpus: u32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if cpus == 0 {
        return Err("cpus must be at least 1".to_string());
    }
    if cpus > MAX_CPUS {
        return Err(format!("cpus cannot exceed {MAX_CPUS}"));
    }
    Ok(cpus)
}

fn parse_memory(s: &str) -> Result<u32, String> {
    let memory: u32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if memory == 0 {
        return Err("memory must be at least 1 MB".to_string());
    }
    if memory > MAX_MEMORY_MB {
        return Err(format!("memory cannot exceed {MAX_MEMORY_MB} MB"));
    }
    Ok(memory)
}

fn parse_video_memory(s: &str) -> Result<u32, String> {
    let mb: u32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if mb == 0 {
        return Err("video memory must be at least 1 MB".to_string());
    }
    Ok(mb)
}

fn parse_share(s: &str) -> Result<SharedFolder, String> {
    let share = SharedFolder::parse_line(s)
        .ok_or_else(|| "share format must be 'host:tag' (tag may be empty)".to_string())?;
    if !share.has_host_path() {
        return Err("host path cannot be empty".to_string());
    }
    Ok(share)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::Path;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: ConfigArgs,
    }

    fn parse(args: &[&str]) -> ConfigArgs {
        let argv = std::iter::once("test").chain(args.iter().copied());
        TestCli::try_parse_from(argv).unwrap().config
    }

    mod parsers {
        use super::*;

        #[test]
        fn cpus_bounds() {
            assert_eq!(parse_cpus("4"), Ok(4));
            assert!(parse_cpus("0").is_err());
            assert!(parse_cpus("257").is_err());
            assert!(parse_cpus("many").is_err());
        }

        #[test]
        fn memory_bounds() {
            assert_eq!(parse_memory("2048"), Ok(2048));
            assert!(parse_memory("0").is_err());
        }

        #[test]
        fn share_allows_empty_tag() {
            let share = parse_share("/srv/data:").unwrap();
            assert_eq!(share.host_path, Path::new("/srv/data"));
            assert_eq!(share.mount_tag, None);
        }

        #[test]
        fn share_needs_colon_and_host() {
            assert!(parse_share("/srv/data").is_err());
            assert!(parse_share(":tag").is_err());
        }
    }

    mod apply {
        use super::*;

        #[test]
        fn no_flags_changes_nothing() {
            let original = VmConfig::new("vm").memory_mb(4096).cdrom("/a.iso");
            let config = ConfigArgs::default().apply(original.clone()).unwrap();
            assert_eq!(config, original);
        }

        #[test]
        fn sets_hardware() {
            let args = parse(&[
                "--memory",
                "1024",
                "--cpus",
                "4",
                "--display",
                "qxl",
                "--audio",
                "hda",
                "--network",
                "virtio-net",
                "--graphics-console",
                "true",
            ]);
            let config = args.apply(VmConfig::new("vm")).unwrap();
            assert_eq!(config.memory_mb, 1024);
            assert_eq!(config.cpus, 4);
            assert_eq!(config.display, DisplayDevice::Qxl);
            assert_eq!(config.audio, AudioDevice::Hda);
            assert_eq!(config.network, NetworkDevice::VirtioNet);
            assert!(config.graphics_console);
        }

        #[test]
        fn disk_format_follows_extension() {
            let config = parse(&["--disk", "/vms/a.vdi"])
                .apply(VmConfig::new("vm"))
                .unwrap();
            assert_eq!(config.disk_image(), Some(Path::new("/vms/a.vdi")));
            assert_eq!(config.disk_format, ImageFormat::Vdi);
        }

        #[test]
        fn explicit_disk_format_wins() {
            let config = parse(&["--disk", "/vms/a.img", "--disk-format", "raw"])
                .apply(VmConfig::new("vm"))
                .unwrap();
            assert_eq!(config.disk_format, ImageFormat::Raw);
        }

        #[test]
        fn clear_flags_detach_media() {
            let original = VmConfig::new("vm")
                .disk("/a.qcow2", ImageFormat::Qcow2)
                .cdrom("/a.iso")
                .floppy("/a.flp");
            let config = parse(&["--no-disk", "--no-cdrom", "--no-floppy"])
                .apply(original)
                .unwrap();
            assert_eq!(config.disk_path, None);
            assert_eq!(config.cdrom_path, None);
            assert_eq!(config.floppy_path, None);
        }

        #[test]
        fn conflicting_media_flags_are_rejected() {
            let argv = ["test", "--cdrom", "/a.iso", "--no-cdrom"];
            assert!(TestCli::try_parse_from(argv).is_err());
        }

        #[test]
        fn shares_append_unless_cleared() {
            let original = VmConfig::new("vm").share(SharedFolder::new("/old"));

            let config = parse(&["--share", "/new:docs"]).apply(original.clone()).unwrap();
            assert_eq!(config.shared_folders.len(), 2);

            let config = parse(&["--clear-shares", "--share", "/new:docs"])
                .apply(original)
                .unwrap();
            assert_eq!(
                config.shared_folders,
                vec![SharedFolder::with_tag("/new", "docs")]
            );
        }

        #[test]
        fn shares_file_skips_malformed_lines() {
            let dir = tempfile::TempDir::new().unwrap();
            let file = dir.path().join("shares.txt");
            std::fs::write(&file, "/srv/a:a\nno colon here\n\n/srv/b:\n").unwrap();

            let config = parse(&["--shares-file", file.to_str().unwrap()])
                .apply(VmConfig::new("vm"))
                .unwrap();
            assert_eq!(
                config.shared_folders,
                vec![SharedFolder::with_tag("/srv/a", "a"), SharedFolder::new("/srv/b")]
            );
        }
    }
}
