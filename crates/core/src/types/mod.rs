mod device;
mod disk;
mod share;
mod vm;

pub use device::{AudioDevice, DisplayDevice, NetworkDevice, UnknownAudio, VIDEO_MEMORY_CHOICES};
pub use disk::{DiskInterface, DiskSize, ImageFormat};
pub use share::{DEFAULT_TAG_PREFIX, SharedFolder};
pub use vm::{
    DEFAULT_CPUS, DEFAULT_MEMORY_MB, DEFAULT_SPICE_PORT, DEFAULT_VIDEO_MEMORY_MB, UNNAMED,
    VmConfig,
};
