use super::{LaunchMode, Launcher};
use crate::handle::{VmHandle, VmStatus};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use virtmachines_core::{Error, QemuCommand, Result};

/// Launches compiled commands with a local QEMU installation.
///
/// The program named by the command is looked up on `PATH` unless a binary
/// override is configured. Arguments are passed to the process as-is; no
/// shell is involved.
#[derive(Debug, Clone, Default)]
pub struct QemuLauncher {
    binary: Option<PathBuf>,
    startup_probe: Option<Duration>,
}

impl QemuLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `binary` (a path or a program name) instead of the command's own
    /// program.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    /// Watches the process for `window` after spawning. If it exits with a
    /// failure status in that time the launch fails with its stderr.
    pub fn with_startup_probe(mut self, window: Duration) -> Self {
        self.startup_probe = Some(window);
        self
    }

    fn resolve(&self, program: &str) -> Result<PathBuf> {
        let wanted = self.binary.as_deref().unwrap_or(Path::new(program));
        which::which(wanted).map_err(|e| Error::BackendUnavailable {
            name: wanted.display().to_string(),
            reason: e.to_string(),
        })
    }

    async fn probe(&self, handle: &VmHandle, program: &Path) -> Result<()> {
        let Some(window) = self.startup_probe else {
            return Ok(());
        };

        let status = match handle.wait_timeout(window).await? {
            None | Some(VmStatus::Stopped { exit_code: Some(0) }) => return Ok(()),
            Some(status) => status,
        };

        let outcome = match status {
            VmStatus::Stopped {
                exit_code: Some(code),
            } => format!("exit code {code}"),
            VmStatus::Stopped { exit_code: None } => "a signal".to_string(),
            other => format!("{other:?}"),
        };
        let stderr = handle.stderr_diagnostic().await;
        let mut message = format!("{} exited during startup with {}", program.display(), outcome);
        if !stderr.is_empty() {
            message.push_str(": ");
            message.push_str(&stderr);
        }
        Err(Error::LaunchFailed(message))
    }
}

#[async_trait]
impl Launcher for QemuLauncher {
    fn name(&self) -> &'static str {
        "qemu"
    }

    fn is_available(&self) -> bool {
        self.resolve(virtmachines_core::QEMU_BINARY).is_ok()
    }

    async fn launch(&self, command: &QemuCommand, mode: LaunchMode) -> Result<VmHandle> {
        let program = self.resolve(command.program())?;
        let label = vm_label(command);

        tracing::debug!("Starting {} with args: {:?}", program.display(), command.get_args());

        let mut cmd = Command::new(&program);
        cmd.args(command.get_args());
        match mode {
            LaunchMode::Detached => {
                cmd.stdin(Stdio::null());
                cmd.stdout(Stdio::null());
            }
            LaunchMode::Interactive => {
                cmd.stdin(Stdio::piped());
                cmd.stdout(Stdio::piped());
            }
        }
        cmd.stderr(Stdio::piped());
        // Own process group, so a terminal Ctrl+C reaches the caller and not
        // QEMU; stopping goes through the handle.
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|e| {
            Error::LaunchFailed(format!("failed to spawn {}: {}", program.display(), e))
        })?;
        let handle = VmHandle::new(child, mode, label);

        self.probe(&handle, &program).await?;

        tracing::info!(vm = %handle.label(), pid = ?handle.id(), ?mode, "VM started");
        Ok(handle)
    }
}

/// Name passed with `-name`, unescaped and without a `guest=` key, falling
/// back to the program name.
fn vm_label(command: &QemuCommand) -> String {
    command
        .values_of("-name")
        .next()
        .map(|name| {
            name.strip_prefix("guest=")
                .unwrap_or(name)
                .replace(",,", ",")
        })
        .unwrap_or_else(|| command.program().to_string())
}
