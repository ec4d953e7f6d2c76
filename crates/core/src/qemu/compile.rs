use super::command::{OptList, QemuCommand, escape_opt_value};
use crate::error::{Error, Result};
use crate::types::{DEFAULT_TAG_PREFIX, SharedFolder, VmConfig};
use std::collections::BTreeSet;
use std::path::Path;

/// Hypervisor binary every record compiles for.
pub const QEMU_BINARY: &str = "qemu-system-x86_64";

/// Id linking the user-mode network backend to its device.
pub const NETDEV_ID: &str = "net0";

const DRIVER_ISO_INDEX: &str = "3";
const SPICE_CHANNEL: &str = "com.redhat.spice.0";

/// Translates a record into the hypervisor invocation.
///
/// Output depends only on the record, except for the floppy drive, which is
/// included only when its image exists at compile time. Blank or absent
/// optional fields contribute no arguments.
///
/// Fails with [`Error::Validation`] when a path is not valid UTF-8 or two
/// shared folders carry the same explicit tag.
pub fn compile(config: &VmConfig) -> Result<QemuCommand> {
    let mut cmd = QemuCommand::new(QEMU_BINARY);

    cmd.arg("-name").arg(name_value(&config.name));
    cmd.arg("-m").arg(config.memory_mb.to_string());
    cmd.arg("-smp").arg(config.cpus.to_string());
    cmd.arg("-vga").arg(config.display.as_str());
    cmd.arg("-global").arg(format!(
        "{}.vgamem_mb={}",
        config.display.vgamem_driver(),
        config.video_memory_mb
    ));

    push_audio(&mut cmd, config);
    push_network(&mut cmd, config);
    push_drives(&mut cmd, config)?;
    push_shares(&mut cmd, &config.shared_folders)?;

    if config.graphics_console {
        push_spice(&mut cmd, config.spice_port);
    }

    if config.interactive_monitor {
        cmd.arg("-monitor").arg("stdio");
    }

    tracing::debug!(vm = %config.name, "compiled command: {}", cmd);
    Ok(cmd)
}

/// `-name` value. QEMU only reads a bare value as the guest name when no `=`
/// comes before the first `,`, so names containing `=` get the key spelled out.
fn name_value(name: &str) -> String {
    let escaped = escape_opt_value(name);
    if name.contains('=') {
        format!("guest={escaped}")
    } else {
        escaped
    }
}

fn utf8_path<'a>(path: &'a Path, what: &str) -> Result<&'a str> {
    path.to_str().ok_or_else(|| {
        Error::Validation(format!(
            "{what} path {} is not valid UTF-8",
            path.display()
        ))
    })
}

fn push_audio(cmd: &mut QemuCommand, config: &VmConfig) {
    match config.audio.models() {
        Some(models) => {
            for model in models {
                cmd.arg("-device").arg(*model);
            }
        }
        None if !config.audio.is_known() => {
            tracing::debug!(
                vm = %config.name,
                audio = %config.audio,
                "skipping unknown audio device"
            );
        }
        None => {}
    }
}

fn push_network(cmd: &mut QemuCommand, config: &VmConfig) {
    let mut netdev = OptList::with_head("user");
    netdev.arg("id", NETDEV_ID);
    cmd.opt("-netdev", &netdev);

    let mut device = OptList::with_head(config.network.model());
    device.arg("netdev", NETDEV_ID);
    cmd.opt("-device", &device);
}

fn push_drives(cmd: &mut QemuCommand, config: &VmConfig) -> Result<()> {
    if let Some(disk) = config.disk_image() {
        let mut drive = OptList::new();
        drive
            .arg("file", utf8_path(disk, "disk")?)
            .arg("format", config.disk_format.as_str())
            .arg("if", config.disk_interface.as_str())
            .arg("index", "0")
            .arg("media", "disk");
        cmd.opt("-drive", &drive);
    }

    if let Some(cdrom) = config.cdrom_image() {
        cmd.arg("-cdrom").arg(utf8_path(cdrom, "cdrom")?);
        cmd.arg("-boot").arg("order=d");
    }

    if let Some(iso) = config.driver_iso_image() {
        let mut drive = OptList::new();
        drive
            .arg("file", utf8_path(iso, "driver ISO")?)
            .arg("if", "ide")
            .arg("index", DRIVER_ISO_INDEX)
            .arg("media", "cdrom")
            .arg("readonly", "on");
        cmd.opt("-drive", &drive);
    }

    if let Some(floppy) = config.floppy_image() {
        let file = utf8_path(floppy, "floppy")?;
        if floppy.is_file() {
            let mut drive = OptList::new();
            drive
                .arg("file", file)
                .arg("if", "floppy")
                .arg("index", "0")
                .arg("format", "raw")
                .arg("readonly", "on");
            cmd.opt("-drive", &drive);
        } else {
            tracing::debug!(
                vm = %config.name,
                path = %floppy.display(),
                "floppy image missing, leaving drive out"
            );
        }
    }
    Ok(())
}

fn push_shares(cmd: &mut QemuCommand, shares: &[SharedFolder]) -> Result<()> {
    let mut taken = BTreeSet::new();
    for share in shares.iter().filter(|s| s.has_host_path()) {
        if let Some(tag) = share.explicit_tag() {
            if !taken.insert(tag.to_string()) {
                return Err(Error::Validation(format!(
                    "shared folder tag '{tag}' is used more than once"
                )));
            }
        }
    }

    for (index, share) in shares.iter().enumerate() {
        if !share.has_host_path() {
            continue;
        }
        let tag = match share.explicit_tag() {
            Some(tag) => tag.to_string(),
            None => free_tag(&mut taken, index),
        };
        let mut virtfs = OptList::with_head("local");
        virtfs
            .arg("path", utf8_path(&share.host_path, "shared folder")?)
            .arg("mount_tag", tag.as_str())
            .arg("security_model", "mapped-xattr")
            .arg("id", tag.as_str());
        cmd.opt("-virtfs", &virtfs);
    }
    Ok(())
}

/// `hostshare<index>`, or the next free number above it when an explicit tag
/// already has that name.
fn free_tag(taken: &mut BTreeSet<String>, index: usize) -> String {
    let mut n = index;
    loop {
        let tag = format!("{DEFAULT_TAG_PREFIX}{n}");
        if taken.insert(tag.clone()) {
            return tag;
        }
        n += 1;
    }
}

fn push_spice(cmd: &mut QemuCommand, port: u16) {
    let mut spice = OptList::new();
    spice
        .arg("port", port.to_string())
        .arg("disable-ticketing", "on");
    cmd.opt("-spice", &spice);

    cmd.arg("-device").arg("virtio-serial-pci");

    let mut chardev = OptList::with_head("spicevmc");
    chardev.arg("id", "vdagent").arg("name", "vdagent");
    cmd.opt("-chardev", &chardev);

    let mut serial_port = OptList::with_head("virtserialport");
    serial_port
        .arg("chardev", "vdagent")
        .arg("name", SPICE_CHANNEL);
    cmd.opt("-device", &serial_port);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AudioDevice, DiskInterface, DisplayDevice, ImageFormat, NetworkDevice};
    use std::io::Write;

    fn compiled(config: &VmConfig) -> QemuCommand {
        compile(config).unwrap()
    }

    fn args(cmd: &QemuCommand) -> Vec<&str> {
        cmd.get_args().iter().map(String::as_str).collect()
    }

    mod golden {
        use super::*;

        #[test]
        fn minimal_record() {
            let cmd = compiled(&VmConfig::new("bare"));
            assert_eq!(
                cmd.tokens(),
                vec![
                    "qemu-system-x86_64",
                    "-name",
                    "bare",
                    "-m",
                    "2048",
                    "-smp",
                    "2",
                    "-vga",
                    "std",
                    "-global",
                    "VGA.vgamem_mb=16",
                    "-device",
                    "AC97",
                    "-netdev",
                    "user,id=net0",
                    "-device",
                    "rtl8139,netdev=net0",
                ]
            );
        }

        #[test]
        fn alpine_with_raw_disk() {
            let config = VmConfig::new("alpine")
                .memory_mb(512)
                .cpus(1)
                .disk("/tmp/a.img", ImageFormat::Raw);
            let cmd = compiled(&config);
            let tokens = cmd.tokens();

            assert_eq!(
                &tokens[..9],
                [
                    "qemu-system-x86_64",
                    "-name",
                    "alpine",
                    "-m",
                    "512",
                    "-smp",
                    "1",
                    "-vga",
                    "std"
                ]
            );
            let drive_pos = tokens.iter().position(|t| t == "-drive").unwrap();
            assert!(drive_pos > 8);
            assert_eq!(
                tokens[drive_pos + 1],
                "file=/tmp/a.img,format=raw,if=ide,index=0,media=disk"
            );
            assert!(!cmd.contains("-cdrom"));
            assert!(!cmd.contains("-boot"));
            assert!(!cmd.contains("-virtfs"));
            assert_eq!(cmd.values_of("-drive").count(), 1);
        }

        #[test]
        fn everything_enabled_keeps_section_order() {
            let floppy = tempfile::NamedTempFile::new().unwrap();
            let config = VmConfig::new("full")
                .display(DisplayDevice::Qxl)
                .video_memory_mb(64)
                .audio(AudioDevice::Hda)
                .network(NetworkDevice::VirtioNet)
                .disk("/vms/full.qcow2", ImageFormat::Qcow2)
                .disk_interface(DiskInterface::Virtio)
                .cdrom("/isos/os.iso")
                .driver_iso("/isos/drivers.iso")
                .floppy(floppy.path())
                .share(SharedFolder::new("/srv"))
                .graphics_console(true)
                .interactive_monitor(true);
            let cmd = compiled(&config);
            let floppy_opts = format!(
                "file={},if=floppy,index=0,format=raw,readonly=on",
                floppy.path().display()
            );

            assert_eq!(
                args(&cmd),
                vec![
                    "-name",
                    "full",
                    "-m",
                    "2048",
                    "-smp",
                    "2",
                    "-vga",
                    "qxl",
                    "-global",
                    "qxl-vga.vgamem_mb=64",
                    "-device",
                    "intel-hda",
                    "-device",
                    "hda-duplex",
                    "-netdev",
                    "user,id=net0",
                    "-device",
                    "virtio-net-pci,netdev=net0",
                    "-drive",
                    "file=/vms/full.qcow2,format=qcow2,if=virtio,index=0,media=disk",
                    "-cdrom",
                    "/isos/os.iso",
                    "-boot",
                    "order=d",
                    "-drive",
                    "file=/isos/drivers.iso,if=ide,index=3,media=cdrom,readonly=on",
                    "-drive",
                    floppy_opts.as_str(),
                    "-virtfs",
                    "local,path=/srv,mount_tag=hostshare0,security_model=mapped-xattr,id=hostshare0",
                    "-spice",
                    "port=5930,disable-ticketing=on",
                    "-device",
                    "virtio-serial-pci",
                    "-chardev",
                    "spicevmc,id=vdagent,name=vdagent",
                    "-device",
                    "virtserialport,chardev=vdagent,name=com.redhat.spice.0",
                    "-monitor",
                    "stdio",
                ]
            );
        }
    }

    mod determinism {
        use super::*;

        #[test]
        fn same_record_same_command() {
            let config = VmConfig::new("twice")
                .cdrom("/isos/a.iso")
                .share(SharedFolder::with_tag("/a", "a"))
                .graphics_console(true);
            assert_eq!(compiled(&config), compiled(&config));
            assert_eq!(compiled(&config.clone()).tokens(), compiled(&config).tokens());
        }
    }

    mod omission {
        use super::*;

        #[test]
        fn blank_paths_emit_nothing() {
            let config = VmConfig::new("blank")
                .disk("  ", ImageFormat::Raw)
                .cdrom("")
                .driver_iso(" ")
                .floppy("");
            let cmd = compiled(&config);
            assert!(!cmd.contains("-drive"));
            assert!(!cmd.contains("-cdrom"));
            assert!(!cmd.contains("-boot"));
            assert!(cmd.get_args().iter().all(|a| !a.is_empty()));
        }

        #[test]
        fn disk_format_ignored_without_disk() {
            let config = VmConfig {
                disk_format: ImageFormat::Vmdk,
                ..VmConfig::new("nodisk")
            };
            assert!(!compiled(&config).to_string().contains("vmdk"));
        }

        #[test]
        fn guest_agent_adds_nothing() {
            let plain = VmConfig::new("agent");
            let with_agent = plain.clone().guest_agent(true);
            assert_eq!(compiled(&plain), compiled(&with_agent));
        }

        #[test]
        fn monitor_only_when_requested() {
            assert!(!compiled(&VmConfig::new("vm")).contains("-monitor"));
            let cmd = compiled(&VmConfig::new("vm").interactive_monitor(true));
            assert_eq!(cmd.values_of("-monitor").collect::<Vec<_>>(), ["stdio"]);
        }

        #[test]
        fn spice_only_when_enabled() {
            let cmd = compiled(&VmConfig::new("vm"));
            assert!(!cmd.contains("-spice"));
            assert!(!cmd.contains("-chardev"));
        }

        #[test]
        fn spice_uses_configured_port() {
            let cmd = compiled(&VmConfig::new("vm").graphics_console(true).spice_port(6001));
            assert_eq!(
                cmd.values_of("-spice").collect::<Vec<_>>(),
                ["port=6001,disable-ticketing=on"]
            );
        }
    }

    mod audio {
        use super::*;

        #[test]
        fn none_emits_nothing() {
            let cmd = compiled(&VmConfig::new("vm").audio(AudioDevice::None));
            assert_eq!(cmd.values_of("-device").count(), 1);
        }

        #[test]
        fn unknown_is_skipped() {
            let cmd = compiled(&VmConfig::new("vm").audio(AudioDevice::from("gus".to_string())));
            assert!(!cmd.to_string().contains("gus"));
            assert_eq!(
                cmd.values_of("-device").collect::<Vec<_>>(),
                ["rtl8139,netdev=net0"]
            );
        }

        #[test]
        fn known_models_map_to_qemu_names() {
            let cmd = compiled(&VmConfig::new("vm").audio(AudioDevice::Es1370));
            assert_eq!(cmd.values_of("-device").next(), Some("ES1370"));
        }
    }

    mod floppy {
        use super::*;

        #[test]
        fn missing_file_is_left_out() {
            let dir = tempfile::tempdir().unwrap();
            let config = VmConfig::new("vm").floppy(dir.path().join("absent.img"));
            let cmd = compiled(&config);
            assert!(!cmd.contains("-drive"));
            assert!(!cmd.to_string().contains("floppy"));
        }

        #[test]
        fn existing_file_is_included_read_only() {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            file.write_all(&[0u8; 512]).unwrap();
            let cmd = compiled(&VmConfig::new("vm").floppy(file.path()));
            let drive = cmd.values_of("-drive").next().unwrap();
            assert!(drive.contains("if=floppy"));
            assert!(drive.ends_with("readonly=on"));
        }

        #[test]
        fn directory_is_not_a_floppy() {
            let dir = tempfile::tempdir().unwrap();
            let cmd = compiled(&VmConfig::new("vm").floppy(dir.path()));
            assert!(!cmd.contains("-drive"));
        }
    }

    mod shares {
        use super::*;

        #[test]
        fn blank_tags_are_generated_in_order() {
            let config = VmConfig::new("vm")
                .share(SharedFolder::new("/first"))
                .share(SharedFolder::new("/second"));
            let cmd = compiled(&config);
            let virtfs: Vec<_> = cmd.values_of("-virtfs").collect();
            assert_eq!(virtfs.len(), 2);
            assert!(virtfs[0].starts_with("local,path=/first,mount_tag=hostshare0,"));
            assert!(virtfs[1].starts_with("local,path=/second,mount_tag=hostshare1,"));
        }

        #[test]
        fn generated_tag_uses_sequence_position() {
            let config = VmConfig::new("vm")
                .share(SharedFolder::new(""))
                .share(SharedFolder::with_tag("/named", "code"))
                .share(SharedFolder::new("/third"));
            let cmd = compiled(&config);
            let virtfs: Vec<_> = cmd.values_of("-virtfs").collect();
            assert_eq!(virtfs.len(), 2);
            assert!(virtfs[0].contains("mount_tag=code"));
            assert!(virtfs[1].contains("mount_tag=hostshare2"));
        }

        #[test]
        fn generated_tag_skips_explicit_one() {
            let config = VmConfig::new("vm")
                .share(SharedFolder::with_tag("/named", "hostshare1"))
                .share(SharedFolder::new("/blank"));
            let cmd = compiled(&config);
            let virtfs: Vec<_> = cmd.values_of("-virtfs").collect();
            assert!(virtfs[0].ends_with("id=hostshare1"));
            assert!(virtfs[1].ends_with("id=hostshare2"));
        }

        #[test]
        fn explicit_tag_later_in_list_is_not_reused() {
            let config = VmConfig::new("vm")
                .share(SharedFolder::new("/blank"))
                .share(SharedFolder::with_tag("/named", "hostshare0"));
            let cmd = compiled(&config);
            let virtfs: Vec<_> = cmd.values_of("-virtfs").collect();
            assert!(virtfs[0].ends_with("id=hostshare1"));
            assert!(virtfs[1].ends_with("id=hostshare0"));
        }

        #[test]
        fn duplicate_explicit_tags_are_rejected() {
            let config = VmConfig::new("vm")
                .share(SharedFolder::with_tag("/a", "code"))
                .share(SharedFolder::with_tag("/b", " code "));
            assert!(matches!(compile(&config), Err(Error::Validation(_))));
        }

        #[test]
        fn blank_host_path_is_skipped() {
            let cmd = compiled(&VmConfig::new("vm").share(SharedFolder::with_tag(" ", "tag")));
            assert!(!cmd.contains("-virtfs"));
        }
    }

    mod escaping {
        use super::*;

        #[test]
        fn comma_in_disk_path_cannot_inject_options() {
            let config = VmConfig::new("vm").disk("/vms/evil,if=none.img", ImageFormat::Raw);
            let cmd = compiled(&config);
            assert_eq!(
                cmd.values_of("-drive").next(),
                Some("file=/vms/evil,,if=none.img,format=raw,if=ide,index=0,media=disk")
            );
        }

        #[test]
        fn comma_in_name_is_doubled() {
            let cmd = compiled(&VmConfig::new("a,b"));
            assert_eq!(cmd.values_of("-name").next(), Some("a,,b"));

            let cmd = compiled(&VmConfig::new("a,debug-threads=on"));
            assert_eq!(
                cmd.values_of("-name").next(),
                Some("guest=a,,debug-threads=on")
            );
        }

        #[test]
        fn equals_in_name_spells_out_guest_key() {
            let cmd = compiled(&VmConfig::new("win=98"));
            assert_eq!(cmd.values_of("-name").next(), Some("guest=win=98"));

            let cmd = compiled(&VmConfig::new("a=b,c"));
            assert_eq!(cmd.values_of("-name").next(), Some("guest=a=b,,c"));
        }

        #[cfg(unix)]
        #[test]
        fn non_utf8_path_is_rejected() {
            use std::ffi::OsStr;
            use std::os::unix::ffi::OsStrExt;

            let path = OsStr::from_bytes(b"/isos/caf\xe9.iso");
            let err = compile(&VmConfig::new("vm").cdrom(path)).unwrap_err();
            assert!(matches!(err, Error::Validation(message) if message.contains("cdrom")));

            let share = SharedFolder::new(OsStr::from_bytes(b"/srv/\xff"));
            let err = compile(&VmConfig::new("vm").share(share)).unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }

        #[test]
        fn shell_metacharacters_stay_one_argument() {
            let path = "/isos/$(reboot) `id` & more.iso";
            let cmd = compiled(&VmConfig::new("vm").cdrom(path));
            assert_eq!(cmd.values_of("-cdrom").next(), Some(path));
        }
    }
}
