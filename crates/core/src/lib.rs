//! Core of virtmachines: VM configuration records, the QEMU command compiler
//! and the on-disk record store.
//!
//! Everything here is synchronous and free of process management, so it can
//! be driven headlessly from tests or any front-end.
//!
//! ```
//! use virtmachines_core::{ImageFormat, VmConfig, compile};
//!
//! let config = VmConfig::new("alpine")
//!     .memory_mb(512)
//!     .cpus(1)
//!     .disk("/tmp/a.img", ImageFormat::Raw);
//!
//! let command = compile(&config)?;
//! assert_eq!(command.program(), "qemu-system-x86_64");
//! assert!(command.contains("-drive"));
//! # Ok::<(), virtmachines_core::Error>(())
//! ```

pub mod error;
pub mod qemu;
pub mod store;
pub mod types;

pub use error::{Error, Result};
pub use qemu::{OptList, QEMU_BINARY, QemuCommand, compile};
pub use store::{RECORD_EXTENSION, VmStore, validate_name};
pub use types::{
    AudioDevice, DEFAULT_TAG_PREFIX, DiskInterface, DiskSize, DisplayDevice, ImageFormat,
    NetworkDevice, SharedFolder, UNNAMED, UnknownAudio, VIDEO_MEMORY_CHOICES, VmConfig,
};
