//! Disk image creation through `qemu-img`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use virtmachines_core::{DiskSize, Error, ImageFormat, Result, VmConfig, VmStore};

pub const QEMU_IMG_BINARY: &str = "qemu-img";

/// Creates blank disk images.
#[derive(Debug, Clone, Default)]
pub struct DiskImageTool {
    binary: Option<PathBuf>,
}

impl DiskImageTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    pub fn is_available(&self) -> bool {
        self.resolve().is_ok()
    }

    fn resolve(&self) -> Result<PathBuf> {
        let wanted = self
            .binary
            .as_deref()
            .unwrap_or(Path::new(QEMU_IMG_BINARY));
        which::which(wanted).map_err(|e| Error::BackendUnavailable {
            name: wanted.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Creates a new image at `path`. An existing file is never overwritten.
    pub async fn create(&self, path: &Path, format: ImageFormat, size: DiskSize) -> Result<()> {
        if path.exists() {
            return Err(Error::Validation(format!(
                "disk image {} already exists",
                path.display()
            )));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let program = self.resolve()?;
        let args = create_args(path, format, size);
        tracing::debug!("Running {} with args: {:?}", program.display(), args);

        let output = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                Error::LaunchFailed(format!("failed to spawn {}: {}", program.display(), e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::LaunchFailed(format!(
                "{} create failed ({}): {}",
                program.display(),
                output.status,
                stderr.trim()
            )));
        }

        tracing::info!(path = %path.display(), %format, %size, "created disk image");
        Ok(())
    }

    /// Creates `<workdir>/<name>.img` in the record's own format and
    /// attaches it as the primary disk. The record is not saved.
    pub async fn create_for(
        &self,
        store: &VmStore,
        config: &mut VmConfig,
        size: DiskSize,
    ) -> Result<PathBuf> {
        let path = disk_path_for(store, &config.name);
        self.create(&path, config.disk_format, size).await?;
        config.disk_path = Some(path.clone());
        Ok(path)
    }
}

/// Where [`DiskImageTool::create_for`] puts a VM's disk.
pub fn disk_path_for(store: &VmStore, name: &str) -> PathBuf {
    store.workdir(name).join(format!("{name}.img"))
}

fn create_args(path: &Path, format: ImageFormat, size: DiskSize) -> Vec<OsString> {
    vec![
        "create".into(),
        "-f".into(),
        format.to_string().into(),
        path.into(),
        size.to_string().into(),
    ]
}
