// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Filesystem locations and the supervisor address, fixed at startup.

use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_SERVICE_DIR: &str = "/etc/svcd/services";
pub const DEFAULT_RUN_DIR: &str = "/run/svcd";
pub const DEFAULT_ADDRESS: &str = "svcd";

pub const ENV_SERVICE_DIR: &str = "SVCD_SERVICE_DIR";
pub const ENV_RUN_DIR: &str = "SVCD_RUN_DIR";
pub const ENV_ADDRESS: &str = "SVCD_ADDRESS";

/// Extension of service config files.
pub const CONFIG_EXT: &str = "conf";

/// Where configs are read from, where runtime files go, and which abstract
/// address the supervisor listens on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub service_dir: PathBuf,
    pub run_dir: PathBuf,
    pub address: String,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            service_dir: PathBuf::from(DEFAULT_SERVICE_DIR),
            run_dir: PathBuf::from(DEFAULT_RUN_DIR),
            address: DEFAULT_ADDRESS.to_owned(),
        }
    }
}

impl Paths {
    /// Defaults overridden by `SVCD_SERVICE_DIR`, `SVCD_RUN_DIR` and
    /// `SVCD_ADDRESS` when set and non-empty.
    pub fn from_env() -> Self {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        let mut paths = Self::default();
        if let Some(dir) = var(ENV_SERVICE_DIR) {
            paths.service_dir = dir.into();
        }
        if let Some(dir) = var(ENV_RUN_DIR) {
            paths.run_dir = dir.into();
        }
        if let Some(addr) = var(ENV_ADDRESS) {
            paths.address = addr;
        }
        paths
    }

    /// Everything under one directory: `<root>/services` and `<root>/run`.
    /// The address is derived from the root so parallel instances do not
    /// collide.
    pub fn with_root(root: &Path) -> Self {
        let address = crate::addr::fit(&format!("svcd-{}", root.display()));
        Self {
            service_dir: root.join("services"),
            run_dir: root.join("run"),
            address,
        }
    }

    /// `<service_dir>/<name>.conf`
    pub fn config_path(&self, name: &str) -> PathBuf {
        self.service_dir.join(format!("{name}.{CONFIG_EXT}"))
    }

    /// Directory holding pid files.
    pub fn pid_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Default pid file of a service.
    pub fn pid_file(&self, name: &str) -> PathBuf {
        self.pid_dir().join(format!("{name}.pid"))
    }

    pub fn script_dir(&self) -> PathBuf {
        self.run_dir.join("scripts")
    }

    /// Generated script of a `script` service.
    pub fn script_path(&self, name: &str) -> PathBuf {
        self.script_dir().join(name)
    }

    /// Persisted `name:pid` list of tracked services.
    pub fn registry_file(&self) -> PathBuf {
        self.run_dir.join("services.list")
    }

    /// Create the run, pid and script directories.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.pid_dir())?;
        std::fs::create_dir_all(self.script_dir())
    }
}

/// Whether `path` names an existing regular file.
pub fn is_regular_file(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_locations() {
        let p = Paths::default();
        assert_eq!(p.config_path("web"), Path::new("/etc/svcd/services/web.conf"));
        assert_eq!(p.pid_file("web"), Path::new("/run/svcd/web.pid"));
        assert_eq!(p.script_path("web"), Path::new("/run/svcd/scripts/web"));
        assert_eq!(p.registry_file(), Path::new("/run/svcd/services.list"));
    }

    #[test]
    fn rooted_paths_get_distinct_addresses() {
        let a = Paths::with_root(Path::new("/tmp/a"));
        let b = Paths::with_root(Path::new("/tmp/b"));
        assert_ne!(a.address, b.address);
        assert_eq!(a.service_dir, Path::new("/tmp/a/services"));
    }
}
