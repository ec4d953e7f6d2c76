use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Video memory sizes offered by the editor, in MB.
pub const VIDEO_MEMORY_CHOICES: [u32; 5] = [16, 32, 64, 128, 256];

/// Emulated graphics adapter (`-vga`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayDevice {
    #[default]
    Std,
    Qxl,
    Virtio,
    Cirrus,
}

impl DisplayDevice {
    pub const ALL: [DisplayDevice; 4] = [Self::Std, Self::Qxl, Self::Virtio, Self::Cirrus];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Std => "std",
            Self::Qxl => "qxl",
            Self::Virtio => "virtio",
            Self::Cirrus => "cirrus",
        }
    }

    /// QEMU driver whose `vgamem_mb` property sizes this adapter's memory.
    pub fn vgamem_driver(&self) -> &'static str {
        match self {
            Self::Std => "VGA",
            Self::Qxl => "qxl-vga",
            Self::Virtio => "virtio-vga",
            Self::Cirrus => "cirrus-vga",
        }
    }
}

impl fmt::Display for DisplayDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayDevice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|device| device.as_str() == s)
            .ok_or_else(|| {
                Error::Validation(format!(
                    "unknown display '{s}', expected one of std, qxl, virtio, cirrus"
                ))
            })
    }
}

/// Emulated network card, always paired with a user-mode backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NetworkDevice {
    #[default]
    #[serde(rename = "rtl8139")]
    Rtl8139,
    #[serde(rename = "e1000")]
    E1000,
    #[serde(rename = "virtio-net")]
    VirtioNet,
    #[serde(rename = "ne2k_pci")]
    Ne2kPci,
}

impl NetworkDevice {
    pub const ALL: [NetworkDevice; 4] = [Self::Rtl8139, Self::E1000, Self::VirtioNet, Self::Ne2kPci];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rtl8139 => "rtl8139",
            Self::E1000 => "e1000",
            Self::VirtioNet => "virtio-net",
            Self::Ne2kPci => "ne2k_pci",
        }
    }

    /// QEMU `-device` model name.
    pub fn model(&self) -> &'static str {
        match self {
            Self::VirtioNet => "virtio-net-pci",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for NetworkDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkDevice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|device| device.as_str() == s)
            .ok_or_else(|| {
                Error::Validation(format!(
                    "unknown network device '{s}', expected one of rtl8139, e1000, virtio-net, ne2k_pci"
                ))
            })
    }
}

/// Emulated sound card.
///
/// Stored as a free string so a record written by a newer version with an
/// audio model this build does not know still loads and saves unchanged.
/// Unknown models compile to nothing. [`AudioDevice::Other`] can only be
/// built by parsing, so it never holds a name that parses back to another
/// variant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AudioDevice {
    None,
    #[default]
    Ac97,
    Es1370,
    Sb16,
    Hda,
    Other(UnknownAudio),
}

/// Name of a sound card this build does not know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAudio(String);

impl UnknownAudio {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AudioDevice {
    pub fn as_str(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Ac97 => "ac97",
            Self::Es1370 => "es1370",
            Self::Sb16 => "sb16",
            Self::Hda => "hda",
            Self::Other(name) => name.as_str(),
        }
    }

    /// QEMU `-device` models for this card, or `None` when nothing should be
    /// emitted.
    pub fn models(&self) -> Option<&'static [&'static str]> {
        match self {
            Self::Ac97 => Some(&["AC97"]),
            Self::Es1370 => Some(&["ES1370"]),
            Self::Sb16 => Some(&["sb16"]),
            Self::Hda => Some(&["intel-hda", "hda-duplex"]),
            Self::None | Self::Other(_) => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<String> for AudioDevice {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "none" | "" => Self::None,
            "ac97" => Self::Ac97,
            "es1370" => Self::Es1370,
            "sb16" => Self::Sb16,
            "hda" | "intel-hda" => Self::Hda,
            _ => Self::Other(UnknownAudio(value)),
        }
    }
}

impl From<AudioDevice> for String {
    fn from(value: AudioDevice) -> Self {
        match value {
            AudioDevice::Other(name) => name.0,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioDevice {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_string()))
    }
}
