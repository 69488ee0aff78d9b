// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// One supervised service: its config plus runtime state (pid, respawn
// attempts, respawn deadline) and the start/stop/liveness operations.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::config::ServiceConfig;
use super::daemon::{Launch, DEFAULT_SHELL};
use crate::error::{ConfigError, ProcessError, WireError};
use crate::paths::Paths;
use crate::platform;
use crate::proto::{WireMessage, WireRecord};

/// How long `start` waits for the daemon to publish its pid.
pub const START_TIMEOUT: Duration = Duration::from_millis(3000);
/// How long `stop` waits after SIGTERM before escalating to SIGKILL.
pub const STOP_TIMEOUT: Duration = Duration::from_millis(3000);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

const STOPPED_BANNER: &str = "service: stopped.\n";

#[derive(Debug, Clone)]
pub struct ManagedService {
    pub cfg: ServiceConfig,
    /// Daemon pid, negative when none.
    pub pid: i32,
    pub respawn_count: i32,
    respawn_at: Option<Instant>,
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn read_pid(path: &Path) -> Option<i32> {
    fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse::<i32>().ok())
        .filter(|pid| *pid > 0)
}

impl ManagedService {
    pub fn new(cfg: ServiceConfig) -> Self {
        Self {
            cfg,
            pid: -1,
            respawn_count: 0,
            respawn_at: None,
        }
    }

    /// Import `<service_dir>/<name>.conf` into a fresh, not running entry.
    pub fn load(paths: &Paths, name: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(ServiceConfig::load(paths, name)?))
    }

    pub fn name(&self) -> &str {
        &self.cfg.name
    }

    pub fn is_running(&self) -> bool {
        platform::pid_alive(self.pid)
    }

    // --- lifecycle ---

    /// Launch the service as a daemon and wait for its pid file.
    pub fn start(&mut self) -> Result<(), ProcessError> {
        if !self.cfg.is_valid() {
            return Err(ProcessError::InvalidConfig);
        }
        if self.is_running() {
            return Err(ProcessError::AlreadyRunning);
        }

        let pidfile = self.cfg.pidfile.clone();
        remove_if_exists(&pidfile).map_err(|source| ProcessError::Io {
            path: pidfile.clone(),
            source,
        })?;
        if let Some(dir) = pidfile.parent() {
            Self::create_dir(dir)?;
        }
        if self.cfg.is_script {
            self.write_script()?;
        }

        let launch = Launch::prepare(&self.cfg)?;
        launch.spawn()?;

        let deadline = Instant::now() + START_TIMEOUT;
        loop {
            if let Some(pid) = read_pid(&pidfile) {
                self.pid = pid;
                info!(service = %self.cfg.name, pid, "service started");
                return Ok(());
            }
            if Instant::now() >= deadline {
                self.pid = -1;
                warn!(service = %self.cfg.name, pidfile = %pidfile.display(), "no pid published");
                return Err(ProcessError::PidTimeout(START_TIMEOUT.as_millis() as u64));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// SIGTERM, then SIGKILL once the grace period runs out.
    pub fn stop(&mut self) -> Result<(), ProcessError> {
        if !self.is_running() {
            return Err(ProcessError::NotRunning);
        }
        let pid = self.pid;

        let mut running = true;
        match platform::send_signal(pid, libc::SIGTERM) {
            Ok(()) => {
                let deadline = Instant::now() + STOP_TIMEOUT;
                while Instant::now() < deadline {
                    if !self.is_running() {
                        running = false;
                        break;
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
            }
            Err(e) => warn!(service = %self.cfg.name, pid, error = %e, "SIGTERM failed"),
        }

        if running {
            debug!(service = %self.cfg.name, pid, "escalating to SIGKILL");
            match platform::send_signal(pid, libc::SIGKILL) {
                Ok(()) => {}
                Err(e) if e.raw_os_error() == Some(libc::ESRCH) => {}
                Err(source) => return Err(ProcessError::Sys { call: "kill", source }),
            }
        }

        self.pid = -1;
        if let Err(e) = remove_if_exists(&self.cfg.pidfile) {
            warn!(service = %self.cfg.name, error = %e, "could not remove pid file");
        }
        info!(service = %self.cfg.name, pid, "service stopped");
        self.on_stopped();
        Ok(())
    }

    /// Log banner and the `onstop exec` command.
    fn on_stopped(&self) {
        if !self.cfg.logs_to_null() {
            let appended = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.cfg.logfile)
                .and_then(|mut f| f.write_all(STOPPED_BANNER.as_bytes()));
            if let Err(e) = appended {
                debug!(service = %self.cfg.name, error = %e, "could not append to log");
            }
        }
        if self.cfg.onstop_exec.is_empty() {
            return;
        }
        match Command::new(DEFAULT_SHELL)
            .arg("-c")
            .arg(&self.cfg.onstop_exec)
            .status()
        {
            Ok(status) => debug!(service = %self.cfg.name, %status, "onstop command finished"),
            Err(e) => warn!(service = %self.cfg.name, error = %e, "onstop command failed"),
        }
    }

    fn create_dir(dir: &Path) -> Result<(), ProcessError> {
        fs::create_dir_all(dir).map_err(|source| ProcessError::Io {
            path: dir.to_owned(),
            source,
        })
    }

    fn write_script(&self) -> Result<(), ProcessError> {
        let path = &self.cfg.script_path;
        let io_err = |source| ProcessError::Io {
            path: path.clone(),
            source,
        };
        if let Some(dir) = path.parent() {
            Self::create_dir(dir)?;
        }
        fs::write(path, self.cfg.script_contents()).map_err(io_err)?;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(io_err)
    }

    // --- respawn backoff ---

    /// Whether another restart fits in the respawn budget.
    pub fn can_respawn(&self) -> bool {
        self.respawn_count < self.cfg.respawn_limit
    }

    pub fn respawn_armed(&self) -> bool {
        self.respawn_at.is_some()
    }

    /// Schedule a restart `respawn_interval` seconds after `now`.
    pub fn arm_respawn(&mut self, now: Instant) {
        let interval = Duration::from_secs(self.cfg.respawn_interval.max(0) as u64);
        self.respawn_at = Some(now + interval);
    }

    pub fn disarm_respawn(&mut self) {
        self.respawn_at = None;
    }

    /// Armed and past its deadline.
    pub fn respawn_due(&self, now: Instant) -> bool {
        self.respawn_at.is_some_and(|at| now >= at)
    }
}

impl WireRecord for ManagedService {
    fn write_to(&self, msg: &mut WireMessage) -> Result<(), WireError> {
        self.cfg.write_to(msg)?;
        msg.put_int(self.pid).put_int(self.respawn_count);
        Ok(())
    }

    fn read_from(msg: &mut WireMessage) -> Result<Self, WireError> {
        let cfg = ServiceConfig::read_from(msg)?;
        let pid = msg.get_int()?;
        let respawn_count = msg.get_int()?;
        Ok(Self {
            cfg,
            pid,
            respawn_count,
            respawn_at: None,
        })
    }
}

impl fmt::Display for ManagedService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_running() { "running" } else { "stopped" };
        let c = &self.cfg;
        writeln!(f, "name                  = {}", c.name)?;
        writeln!(f, "status                = {status}")?;
        writeln!(f, "pid                   = {}", self.pid)?;
        writeln!(f, "cfg.exec              = {}", c.exec)?;
        writeln!(f, "cfg.onstop_exec       = {}", c.onstop_exec)?;
        writeln!(f, "cfg.wipe_log          = {}", c.wipe_log)?;
        writeln!(f, "cfg.logfile           = {}", c.logfile.display())?;
        writeln!(f, "cfg.pidfile           = {}", c.pidfile.display())?;
        writeln!(f, "cfg.respawn           = {}", c.respawn)?;
        writeln!(f, "cfg.respawn_limit     = {}", c.respawn_limit)?;
        writeln!(f, "cfg.respawn_interval  = {}", c.respawn_interval)?;
        writeln!(f, "respawn_count         = {}", self.respawn_count)
    }
}
