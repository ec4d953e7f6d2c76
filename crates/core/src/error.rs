use std::path::PathBuf;

/// Errors that can occur when managing virtual machines.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Validation(String),

    #[error("virtual machine '{name}' not found")]
    NotFound { name: String },

    #[error("virtual machine '{name}' already exists")]
    AlreadyExists { name: String },

    #[error("corrupt record at {}: {reason}", path.display())]
    CorruptData { path: PathBuf, reason: String },

    #[error("failed to serialize record: {0}")]
    Serialize(String),

    #[error("hypervisor '{name}' is not available: {reason}")]
    BackendUnavailable { name: String, reason: String },

    #[error("VM failed to start: {0}")]
    LaunchFailed(String),

    #[error("VM is not running")]
    NotRunning,

    #[error("console not enabled for this VM")]
    ConsoleNotEnabled,

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_validation() {
        let err = Error::Validation("name must not be blank".to_string());
        assert_eq!(
            err.to_string(),
            "invalid configuration: name must not be blank"
        );
    }

    #[test]
    fn error_display_not_found() {
        let err = Error::NotFound {
            name: "alpine".to_string(),
        };
        assert_eq!(err.to_string(), "virtual machine 'alpine' not found");
    }

    #[test]
    fn error_display_already_exists() {
        let err = Error::AlreadyExists {
            name: "alpine".to_string(),
        };
        assert_eq!(err.to_string(), "virtual machine 'alpine' already exists");
    }

    #[test]
    fn error_display_corrupt_data() {
        let err = Error::CorruptData {
            path: PathBuf::from("/vms/alpine.toml"),
            reason: "expected `=`".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "corrupt record at /vms/alpine.toml: expected `=`"
        );
    }

    #[test]
    fn error_display_backend_unavailable() {
        let err = Error::BackendUnavailable {
            name: "qemu-system-x86_64".to_string(),
            reason: "not found in PATH".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "hypervisor 'qemu-system-x86_64' is not available: not found in PATH"
        );
    }

    #[test]
    fn error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("read-only"));
    }
}
