// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Tracked services, ordered by name, persisted as `name:pid` lines.
//
// The list file is rewritten in full (temp sibling + rename) whenever
// membership or a pid changes, so a restarted supervisor can re-adopt the
// daemons that are still alive.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::paths::Paths;
use crate::platform;
use crate::service::{ManagedService, ServiceConfig};

const SEPARATOR: char = ':';

#[derive(Debug)]
pub struct ServiceRegistry {
    path: PathBuf,
    services: BTreeMap<String, ManagedService>,
}

/// Parse one `name:pid` line.
fn parse_line(line: &str) -> Option<(&str, i32)> {
    let (name, pid) = line.split_once(SEPARATOR)?;
    let name = name.trim();
    let pid = pid.trim().parse::<i32>().ok()?;
    (!name.is_empty()).then_some((name, pid))
}

impl ServiceRegistry {
    /// An empty registry persisted at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            services: BTreeMap::new(),
        }
    }

    /// Rebuild from the list file: entries whose pid is still alive and
    /// whose config still imports are adopted, everything else is dropped.
    pub fn load(paths: &Paths) -> Self {
        let mut reg = Self::new(paths.registry_file());
        let text = match fs::read_to_string(&reg.path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return reg,
            Err(e) => {
                warn!(path = %reg.path.display(), error = %e, "could not read service list");
                return reg;
            }
        };
        for line in text.lines() {
            let Some((name, pid)) = parse_line(line) else {
                continue;
            };
            if !platform::pid_alive(pid) {
                continue;
            }
            match ManagedService::load(paths, name) {
                Ok(mut s) => {
                    s.pid = pid;
                    info!(service = name, pid, "re-adopting running service");
                    reg.services.insert(s.cfg.name.clone(), s);
                }
                Err(e) => debug!(service = name, error = %e, "not adopting service"),
            }
        }
        reg
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the list file with every running service.
    pub fn persist(&self) -> io::Result<()> {
        let mut text = String::new();
        for s in self.services.values().filter(|s| s.is_running()) {
            text.push_str(&format!("{}{SEPARATOR}{}\n", s.cfg.name, s.pid));
        }
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "service list updated");
        Ok(())
    }

    /// [`persist`](Self::persist), logging instead of failing.
    pub fn save(&self) {
        if let Err(e) = self.persist() {
            error!(path = %self.path.display(), error = %e, "could not save service list");
        }
    }

    // --- membership ---

    pub fn get(&self, name: &str) -> Option<&ManagedService> {
        self.services.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ManagedService> {
        self.services.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    /// Insert or replace the entry named after the service.
    pub fn insert(&mut self, service: ManagedService) -> Option<ManagedService> {
        self.services.insert(service.cfg.name.clone(), service)
    }

    pub fn remove(&mut self, name: &str) -> Option<ManagedService> {
        self.services.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManagedService> {
        self.services.values()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    // --- supervision phases ---

    /// Arm respawn deadlines for exited services and evict the ones that
    /// may not come back. Returns the evicted names.
    pub fn health_check(&mut self, now: Instant) -> Vec<String> {
        let mut evicted = Vec::new();
        for s in self.services.values_mut() {
            if s.is_running() {
                continue;
            }
            if !s.cfg.respawn {
                info!(service = %s.cfg.name, "service exited");
                evicted.push(s.cfg.name.clone());
            } else if !s.respawn_armed() {
                if s.can_respawn() {
                    s.arm_respawn(now);
                    debug!(service = %s.cfg.name, interval = s.cfg.respawn_interval, "respawn scheduled");
                } else {
                    warn!(service = %s.cfg.name, attempts = s.respawn_count, "respawn limit reached");
                    evicted.push(s.cfg.name.clone());
                }
            }
        }
        for name in &evicted {
            self.services.remove(name);
        }
        if !evicted.is_empty() {
            self.save();
        }
        evicted
    }

    /// Restart every service whose respawn deadline has passed, re-reading
    /// its config first. Returns the number of attempts made.
    pub fn respawn_due(&mut self, paths: &Paths, now: Instant) -> usize {
        let mut attempts = 0;
        let mut changed = false;
        for s in self.services.values_mut().filter(|s| s.respawn_due(now)) {
            warn!(service = %s.cfg.name, attempt = s.respawn_count + 1, "respawning service");
            match ServiceConfig::load(paths, &s.cfg.name) {
                Ok(cfg) => {
                    s.cfg = cfg;
                    match s.start() {
                        Ok(()) => changed = true,
                        Err(e) => error!(service = %s.cfg.name, error = %e, "could not respawn service"),
                    }
                }
                Err(e) => error!(service = %s.cfg.name, error = %e, "could not respawn service"),
            }
            s.respawn_count += 1;
            s.disarm_respawn();
            attempts += 1;
        }
        if changed {
            self.save();
        }
        attempts
    }
}
