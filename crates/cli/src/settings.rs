//! Optional per-user settings kept next to the VM records.

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use virtmachines::{DiskImageTool, QemuLauncher};

/// Dot-prefixed so the record store never lists it as a VM.
pub const SETTINGS_FILE: &str = ".settings.toml";

/// Directory name under `$HOME` used when no config dir is given.
pub const DEFAULT_DIR_NAME: &str = "Virtual Machines";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Hypervisor binary, a path or a name looked up on `PATH`.
    pub qemu_binary: Option<PathBuf>,
    pub qemu_img_binary: Option<PathBuf>,
    /// How long `run` waits after asking a VM to stop before killing it.
    pub stop_grace_secs: u64,
    /// Window after launch in which an exiting hypervisor counts as a failed
    /// start. `0` disables the check.
    pub startup_probe_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            qemu_binary: None,
            qemu_img_binary: None,
            stop_grace_secs: 30,
            startup_probe_ms: 500,
        }
    }
}

impl Settings {
    /// Reads `<dir>/.settings.toml`, or the defaults when it does not exist.
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let path = dir.join(SETTINGS_FILE);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        let settings = Self::from_toml(&text)
            .with_context(|| format!("invalid settings in {}", path.display()))?;
        tracing::debug!(path = %path.display(), ?settings, "loaded settings");
        Ok(settings)
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn launcher(&self) -> QemuLauncher {
        let mut launcher = QemuLauncher::new();
        if let Some(binary) = &self.qemu_binary {
            launcher = launcher.with_binary(binary);
        }
        if self.startup_probe_ms > 0 {
            launcher = launcher.with_startup_probe(Duration::from_millis(self.startup_probe_ms));
        }
        launcher
    }

    pub fn disk_tool(&self) -> DiskImageTool {
        match &self.qemu_img_binary {
            Some(binary) => DiskImageTool::new().with_binary(binary),
            None => DiskImageTool::new(),
        }
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }
}

/// `$HOME/Virtual Machines`.
pub fn default_config_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory; pass --config-dir"))?;
    Ok(PathBuf::from(home).join(DEFAULT_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Settings::load(dir.path()).unwrap(), Settings::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let settings = Settings::from_toml("qemu_binary = \"/opt/qemu/bin/qemu-system-x86_64\"\n").unwrap();
        assert_eq!(
            settings.qemu_binary.as_deref(),
            Some(Path::new("/opt/qemu/bin/qemu-system-x86_64"))
        );
        assert_eq!(settings.stop_grace_secs, 30);
        assert_eq!(settings.startup_probe_ms, 500);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Settings::from_toml("qemu_bin = \"x\"\n").is_err());
    }

    #[test]
    fn load_reports_path_on_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "stop_grace_secs = \"soon\"").unwrap();
        let err = Settings::load(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains(SETTINGS_FILE));
    }

    #[test]
    fn stop_grace_is_seconds() {
        let settings = Settings {
            stop_grace_secs: 5,
            ..Settings::default()
        };
        assert_eq!(settings.stop_grace(), Duration::from_secs(5));
    }
}
