mod qemu;

pub use qemu::QemuLauncher;

use crate::handle::VmHandle;
use async_trait::async_trait;
use virtmachines_core::{QemuCommand, Result, VmConfig, compile};

/// How the hypervisor's standard streams are wired up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaunchMode {
    /// No input; stdout discarded; stderr logged.
    #[default]
    Detached,
    /// All three streams piped to the caller through the [`VmHandle`].
    Interactive,
}

impl LaunchMode {
    /// Interactive exactly when the record asks for the monitor on stdio.
    pub fn for_config(config: &VmConfig) -> Self {
        if config.interactive_monitor {
            Self::Interactive
        } else {
            Self::Detached
        }
    }
}

/// Starts compiled hypervisor commands as child processes.
#[async_trait]
pub trait Launcher: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_available(&self) -> bool;

    async fn launch(&self, command: &QemuCommand, mode: LaunchMode) -> Result<VmHandle>;

    /// Compiles `config` and launches it in the mode it asks for.
    async fn start(&self, config: &VmConfig) -> Result<VmHandle> {
        let command = compile(config)?;
        self.launch(&command, LaunchMode::for_config(config)).await
    }
}
