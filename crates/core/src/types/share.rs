use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Prefix for mount tags generated for shares without an explicit tag.
pub const DEFAULT_TAG_PREFIX: &str = "hostshare";

/// A host directory exposed to the guest over 9p, identified by a mount tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedFolder {
    pub host_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_tag: Option<String>,
}

impl SharedFolder {
    pub fn new(host_path: impl Into<PathBuf>) -> Self {
        Self {
            host_path: host_path.into(),
            mount_tag: None,
        }
    }

    pub fn with_tag(host_path: impl Into<PathBuf>, tag: impl Into<String>) -> Self {
        Self {
            host_path: host_path.into(),
            mount_tag: Some(tag.into()),
        }
    }

    /// Parses a `host:tag` line. The split happens at the last `:`, so the
    /// tag never contains one. A line without `:` is malformed.
    pub fn parse_line(line: &str) -> Option<Self> {
        let (host, tag) = line.trim().rsplit_once(':')?;
        let tag = tag.trim();
        Some(Self {
            host_path: PathBuf::from(host.trim()),
            mount_tag: (!tag.is_empty()).then(|| tag.to_string()),
        })
    }

    /// Parses one share per line, dropping malformed lines and lines with a
    /// blank host path.
    pub fn parse_lines(text: &str) -> Vec<Self> {
        text.lines()
            .filter_map(Self::parse_line)
            .filter(|share| share.has_host_path())
            .collect()
    }

    pub fn has_host_path(&self) -> bool {
        !self.host_path.as_os_str().to_string_lossy().trim().is_empty()
    }

    /// The tag set by the user, trimmed, if it is not blank.
    pub fn explicit_tag(&self) -> Option<&str> {
        self.mount_tag
            .as_deref()
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
    }

}
