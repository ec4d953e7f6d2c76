//! Translation of a [`VmConfig`](crate::VmConfig) into a QEMU argument vector.

mod command;
mod compile;

pub use command::{OptArg, OptList, QemuCommand, escape_opt_value};
pub use compile::{NETDEV_ID, QEMU_BINARY, compile};
