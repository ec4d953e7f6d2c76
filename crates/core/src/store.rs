//! On-disk registry of VM records.
//!
//! One TOML file per VM lives directly under the store directory, named
//! `<name>.toml`. Each VM may also own a working directory `<dir>/<name>/`
//! holding disk images and logs; that directory is managed separately and is
//! never touched by [`VmStore::delete`].
//!
//! Writes go to a temporary file in the same directory which is then renamed
//! over the final name, so readers only ever see a complete record. There is
//! no locking between processes: the last writer wins.

use crate::error::{Error, Result};
use crate::types::VmConfig;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File extension of stored records.
pub const RECORD_EXTENSION: &str = "toml";

#[derive(Debug, Clone)]
pub struct VmStore {
    dir: PathBuf,
}

impl VmStore {
    /// Opens the store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{RECORD_EXTENSION}"))
    }

    /// Working directory for a VM's disk images and logs. Not created here.
    pub fn workdir(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Names of all stored records. Files whose stem is not a valid name,
    /// such as dotfiles, are ignored.
    pub fn list(&self) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_name(stem).is_ok() {
                    names.insert(stem.to_string());
                }
            }
        }
        Ok(names)
    }

    pub fn contains(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.record_path(name).is_file()
    }

    /// Loads the record stored under `name`. The file name is the record's
    /// identity: a `name` field inside the file that disagrees with it (or is
    /// missing) is replaced, so saving the result writes back to the same file.
    pub fn load(&self, name: &str) -> Result<VmConfig> {
        validate_name(name)?;
        let path = self.record_path(name);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound {
                    name: name.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let mut config = parse_record(&text, &path)?;
        if config.name != name {
            tracing::warn!(
                vm = %name,
                stored = %config.name,
                path = %path.display(),
                "record name does not match its file, using the file name"
            );
            config.name = name.to_string();
        }
        Ok(config)
    }

    /// Writes the record, replacing any existing one with the same name.
    pub fn save(&self, config: &VmConfig) -> Result<()> {
        validate_name(&config.name)?;
        let path = self.record_path(&config.name);
        let tmp = self.write_temp(config)?;
        tmp.persist(&path).map_err(|e| Error::Io(e.error))?;
        tracing::debug!(vm = %config.name, path = %path.display(), "saved record");
        Ok(())
    }

    /// Writes a new record, refusing to replace an existing one.
    pub fn create(&self, config: &VmConfig) -> Result<()> {
        validate_name(&config.name)?;
        let path = self.record_path(&config.name);
        if path.exists() {
            return Err(Error::AlreadyExists {
                name: config.name.clone(),
            });
        }
        let tmp = self.write_temp(config)?;
        tmp.persist_noclobber(&path).map_err(|e| {
            if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                Error::AlreadyExists {
                    name: config.name.clone(),
                }
            } else {
                Error::Io(e.error)
            }
        })?;
        tracing::debug!(vm = %config.name, path = %path.display(), "created record");
        Ok(())
    }

    /// Adds a record file from elsewhere on disk. The record keeps the name
    /// stored inside it; a collision with an existing record is rejected and
    /// the existing file is left untouched.
    pub fn import(&self, source: &Path) -> Result<VmConfig> {
        let text = match std::fs::read_to_string(source) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound {
                    name: source.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let config = parse_record(&text, source)?;
        self.create(&config)?;
        tracing::info!(vm = %config.name, from = %source.display(), "imported record");
        Ok(config)
    }

    /// Save-as under `new_name`, then drop the old record. The working
    /// directory is not moved.
    pub fn rename(&self, old_name: &str, new_name: &str) -> Result<VmConfig> {
        let renamed = self.load(old_name)?.renamed(new_name.trim());
        self.create(&renamed)?;
        self.delete(old_name)?;
        Ok(renamed)
    }

    /// Removes the record file only.
    pub fn delete(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        match std::fs::remove_file(self.record_path(name)) {
            Ok(()) => {
                tracing::debug!(vm = %name, "deleted record");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort removal of a VM's working directory. Returns whether a
    /// directory was removed.
    pub fn remove_workdir(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        let workdir = self.workdir(name);
        if !workdir.is_dir() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&workdir)?;
        tracing::debug!(vm = %name, path = %workdir.display(), "removed working directory");
        Ok(true)
    }

    fn write_temp(&self, config: &VmConfig) -> Result<NamedTempFile> {
        let text = config.to_toml()?;
        let mut tmp = tempfile::Builder::new()
            .prefix(".vm-")
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.as_file().sync_all()?;
        Ok(tmp)
    }
}

fn parse_record(text: &str, path: &Path) -> Result<VmConfig> {
    VmConfig::from_toml(text).map_err(|e| match e {
        Error::CorruptData { reason, .. } => Error::CorruptData {
            path: path.to_path_buf(),
            reason,
        },
        other => other,
    })
}

/// Checks that `name` can be used both as a record file name and a QEMU `-name`.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Validation("name must not be blank".to_string()));
    }
    if name != name.trim() {
        return Err(Error::Validation(format!(
            "name '{name}' must not start or end with whitespace"
        )));
    }
    if name.starts_with('.') {
        return Err(Error::Validation(format!("name '{name}' must not start with '.'")));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(Error::Validation(format!(
            "name '{name}' must not contain path separators"
        )));
    }
    Ok(())
}
