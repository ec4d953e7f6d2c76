//! Desktop-style management of QEMU virtual machines.
//!
//! A VM is described by a [`VmConfig`] record kept in a [`VmStore`]. Launching
//! it compiles the record into a [`QemuCommand`] and hands that to a
//! [`Launcher`], which returns a [`VmHandle`] for the running process.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use virtmachines::{ImageFormat, Launcher, QemuLauncher, VmConfig, VmStore};
//!
//! # async fn example() -> virtmachines::Result<()> {
//! let store = VmStore::open("/home/me/Virtual Machines")?;
//! let config = VmConfig::new("alpine")
//!     .memory_mb(1024)
//!     .disk("/home/me/Virtual Machines/alpine/alpine.img", ImageFormat::Qcow2)
//!     .cdrom("/isos/alpine.iso");
//! store.create(&config)?;
//!
//! let vm = QemuLauncher::new().start(&config).await?;
//! vm.wait().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Interactive monitor
//!
//! Records with `interactive_monitor` set launch with the QEMU monitor on the
//! child's standard streams. Read it with [`VmHandle::take_output`] and type
//! into it with [`VmHandle::send_line`]:
//!
//! ```rust,no_run
//! # use virtmachines::{Launcher, QemuLauncher, VmConfig};
//! # async fn example() -> virtmachines::Result<()> {
//! let config = VmConfig::new("alpine").interactive_monitor(true);
//! let vm = QemuLauncher::new().start(&config).await?;
//!
//! let mut output = vm.take_output()?;
//! vm.send_line("info status").await?;
//! while let Some(line) = output.next_line().await {
//!     println!("{}", line.text);
//! }
//! # Ok(())
//! # }
//! ```

mod backend;
mod console;
pub mod disk;
mod handle;

pub use backend::{LaunchMode, Launcher, QemuLauncher};
pub use console::{ConsoleLine, ConsoleOutput, OutputStream};
pub use disk::{DiskImageTool, QEMU_IMG_BINARY};
pub use handle::{DEFAULT_STOP_GRACE, VmHandle, VmStatus};

pub use virtmachines_core::{
    AudioDevice, DiskInterface, DiskSize, DisplayDevice, Error, ImageFormat, NetworkDevice,
    QEMU_BINARY, QemuCommand, RECORD_EXTENSION, Result, SharedFolder, UnknownAudio,
    VIDEO_MEMORY_CHOICES, VmConfig, VmStore, compile, validate_name,
};
