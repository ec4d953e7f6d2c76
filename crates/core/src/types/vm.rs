use super::{AudioDevice, DiskInterface, DisplayDevice, ImageFormat, NetworkDevice, SharedFolder};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name used when a record is created without one.
pub const UNNAMED: &str = "unnamed";

pub const DEFAULT_MEMORY_MB: u32 = 2048;
pub const DEFAULT_CPUS: u32 = 2;
pub const DEFAULT_VIDEO_MEMORY_MB: u32 = 16;
pub const DEFAULT_SPICE_PORT: u16 = 5930;

/// Desired hardware and boot configuration of one virtual machine.
///
/// This is plain data: it never refers to a running process. Fields missing
/// from a stored record are filled from [`VmConfig::default`], so records
/// written by older versions keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    pub name: String,
    pub memory_mb: u32,
    pub cpus: u32,
    pub display: DisplayDevice,
    pub video_memory_mb: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_path: Option<PathBuf>,
    pub disk_format: ImageFormat,
    pub disk_interface: DiskInterface,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cdrom_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floppy_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_iso_path: Option<PathBuf>,
    pub audio: AudioDevice,
    pub network: NetworkDevice,
    pub graphics_console: bool,
    pub spice_port: u16,
    /// Accepted and stored, but compiles to nothing.
    pub guest_agent: bool,
    pub interactive_monitor: bool,
    // Tables go last so the TOML document stays flat for every scalar key.
    pub shared_folders: Vec<SharedFolder>,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            name: UNNAMED.to_string(),
            memory_mb: DEFAULT_MEMORY_MB,
            cpus: DEFAULT_CPUS,
            display: DisplayDevice::default(),
            video_memory_mb: DEFAULT_VIDEO_MEMORY_MB,
            disk_path: None,
            disk_format: ImageFormat::default(),
            disk_interface: DiskInterface::default(),
            cdrom_path: None,
            floppy_path: None,
            driver_iso_path: None,
            audio: AudioDevice::default(),
            network: NetworkDevice::default(),
            graphics_console: false,
            spice_port: DEFAULT_SPICE_PORT,
            guest_agent: false,
            interactive_monitor: false,
            shared_folders: Vec::new(),
        }
    }
}

impl VmConfig {
    /// Creates a record with default hardware. A blank name becomes `"unnamed"`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let name = name.trim();
        Self {
            name: if name.is_empty() {
                UNNAMED.to_string()
            } else {
                name.to_string()
            },
            ..Self::default()
        }
    }

    pub fn memory_mb(mut self, memory_mb: u32) -> Self {
        self.memory_mb = memory_mb;
        self
    }

    pub fn cpus(mut self, cpus: u32) -> Self {
        self.cpus = cpus;
        self
    }

    pub fn display(mut self, display: DisplayDevice) -> Self {
        self.display = display;
        self
    }

    pub fn video_memory_mb(mut self, video_memory_mb: u32) -> Self {
        self.video_memory_mb = video_memory_mb;
        self
    }

    /// Attaches the primary disk. Path and format are always set together.
    pub fn disk(mut self, path: impl Into<PathBuf>, format: ImageFormat) -> Self {
        self.disk_path = Some(path.into());
        self.disk_format = format;
        self
    }

    pub fn disk_interface(mut self, interface: DiskInterface) -> Self {
        self.disk_interface = interface;
        self
    }

    pub fn cdrom(mut self, path: impl Into<PathBuf>) -> Self {
        self.cdrom_path = Some(path.into());
        self
    }

    pub fn floppy(mut self, path: impl Into<PathBuf>) -> Self {
        self.floppy_path = Some(path.into());
        self
    }

    pub fn driver_iso(mut self, path: impl Into<PathBuf>) -> Self {
        self.driver_iso_path = Some(path.into());
        self
    }

    pub fn audio(mut self, audio: AudioDevice) -> Self {
        self.audio = audio;
        self
    }

    pub fn network(mut self, network: NetworkDevice) -> Self {
        self.network = network;
        self
    }

    pub fn share(mut self, share: SharedFolder) -> Self {
        self.shared_folders.push(share);
        self
    }

    pub fn graphics_console(mut self, enabled: bool) -> Self {
        self.graphics_console = enabled;
        self
    }

    pub fn spice_port(mut self, port: u16) -> Self {
        self.spice_port = port;
        self
    }

    pub fn guest_agent(mut self, enabled: bool) -> Self {
        self.guest_agent = enabled;
        self
    }

    pub fn interactive_monitor(mut self, enabled: bool) -> Self {
        self.interactive_monitor = enabled;
        self
    }

    /// Copy of this record under another name (save-as). The original is
    /// left untouched.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Disk path if set and non-blank.
    pub fn disk_image(&self) -> Option<&Path> {
        non_blank(self.disk_path.as_deref())
    }

    pub fn cdrom_image(&self) -> Option<&Path> {
        non_blank(self.cdrom_path.as_deref())
    }

    pub fn floppy_image(&self) -> Option<&Path> {
        non_blank(self.floppy_path.as_deref())
    }

    pub fn driver_iso_image(&self) -> Option<&Path> {
        non_blank(self.driver_iso_path.as_deref())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Serialize(e.to_string()))
    }

    /// Parses a record. Source location is unknown here, so parse failures
    /// carry an empty path; [`crate::VmStore`] fills in the real one.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::CorruptData {
            path: PathBuf::new(),
            reason: e.message().to_string(),
        })
    }
}

fn non_blank(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| !p.as_os_str().to_string_lossy().trim().is_empty())
}
