pub mod command;
pub mod config;
pub mod create;
pub mod delete;
pub mod disk;
pub mod edit;
pub mod import;
pub mod list;
pub mod rename;
pub mod run;
pub mod show;
pub mod version;

use crate::settings::Settings;
use virtmachines::VmStore;

/// State every command works against, built once in `main`.
pub struct Context {
    pub store: VmStore,
    pub settings: Settings,
}

#[cfg(test)]
pub(crate) fn test_context() -> (tempfile::TempDir, Context) {
    let dir = tempfile::TempDir::new().unwrap();
    let ctx = Context {
        store: VmStore::open(dir.path()).unwrap(),
        settings: Settings::default(),
    };
    (dir, ctx)
}
