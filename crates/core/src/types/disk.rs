use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// On-disk format of a disk image, as understood by `qemu-img` and `-drive format=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Qcow2,
    Raw,
    Vdi,
    Vmdk,
}

impl ImageFormat {
    pub const ALL: [ImageFormat; 4] = [Self::Qcow2, Self::Raw, Self::Vdi, Self::Vmdk];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qcow2 => "qcow2",
            Self::Raw => "raw",
            Self::Vdi => "vdi",
            Self::Vmdk => "vmdk",
        }
    }

    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        match ext.to_lowercase().as_str() {
            "raw" | "img" => Some(Self::Raw),
            "qcow2" => Some(Self::Qcow2),
            "vdi" => Some(Self::Vdi),
            "vmdk" => Some(Self::Vmdk),
            _ => None,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.as_str() == s)
            .ok_or_else(|| {
                Error::Validation(format!(
                    "unknown disk format '{s}', expected one of qcow2, raw, vdi, vmdk"
                ))
            })
    }
}

/// Bus the primary disk is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskInterface {
    #[default]
    Ide,
    Virtio,
}

impl DiskInterface {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ide => "ide",
            Self::Virtio => "virtio",
        }
    }
}

impl fmt::Display for DiskInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiskInterface {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ide" => Ok(Self::Ide),
            "virtio" => Ok(Self::Virtio),
            other => Err(Error::Validation(format!(
                "unknown disk interface '{other}', expected 'ide' or 'virtio'"
            ))),
        }
    }
}

/// Size argument for `qemu-img create`, e.g. `10G`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskSize {
    amount: u64,
    unit: char,
}

impl DiskSize {
    pub fn gigabytes(amount: u64) -> Self {
        Self { amount, unit: 'G' }
    }

    pub fn megabytes(amount: u64) -> Self {
        Self { amount, unit: 'M' }
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn unit(&self) -> char {
        self.unit
    }
}

impl fmt::Display for DiskSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit)
    }
}

impl FromStr for DiskSize {
    type Err = Error;

    /// Accepts `<digits>[K|M|G|T]`, case-insensitive. A bare number is gigabytes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || Error::Validation(format!("invalid disk size '{s}', expected e.g. 10G"));

        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (digits, suffix) = s.split_at(split);
        let amount: u64 = digits.parse().map_err(|_| invalid())?;
        if amount == 0 {
            return Err(Error::Validation("disk size must be positive".to_string()));
        }

        let unit = match suffix.to_uppercase().as_str() {
            "" => 'G',
            "K" | "KB" => 'K',
            "M" | "MB" => 'M',
            "G" | "GB" => 'G',
            "T" | "TB" => 'T',
            _ => return Err(invalid()),
        };

        Ok(Self { amount, unit })
    }
}
