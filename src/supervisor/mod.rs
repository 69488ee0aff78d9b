// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The supervisor control loop.
//
// One thread, fixed phase order per cycle:
//   health check -> respawn -> drain commands -> sleep 10 ms
// The registry is reloaded from disk once, when the supervisor is created.

pub mod commands;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::error::TransportError;
use crate::paths::Paths;
use crate::registry::ServiceRegistry;
use crate::transport::Transport;

pub use commands::{dispatch, handler, Handler};

/// Pause between two loop cycles.
pub const CYCLE_SLEEP: Duration = Duration::from_millis(10);

#[derive(Debug)]
pub struct Supervisor {
    paths: Paths,
    registry: ServiceRegistry,
    transport: Transport,
}

impl Supervisor {
    /// Bind the supervisor address and adopt the services recorded by a
    /// previous run. Failing to bind is the only fatal startup error.
    pub fn new(paths: Paths) -> Result<Self, TransportError> {
        info!(
            pid = std::process::id(),
            address = %paths.address,
            service_dir = %paths.service_dir.display(),
            run_dir = %paths.run_dir.display(),
            "supervisor starting"
        );
        if let Err(e) = paths.ensure_dirs() {
            warn!(run_dir = %paths.run_dir.display(), error = %e, "could not create runtime directories");
        }

        let transport = Transport::bind(&paths.address).map_err(|e| {
            error!(address = %paths.address, error = %e, "could not open supervisor socket");
            e
        })?;
        transport.set_blocking(false)?;

        let registry = ServiceRegistry::load(&paths);
        if !registry.is_empty() {
            info!(adopted = registry.len(), "re-adopted running services");
        }
        Ok(Self {
            paths,
            registry,
            transport,
        })
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ServiceRegistry {
        &mut self.registry
    }

    /// Run forever.
    pub fn run(&mut self) {
        let never = AtomicBool::new(false);
        self.run_until(&never);
    }

    /// Run cycles until `stop` is set.
    pub fn run_until(&mut self, stop: &AtomicBool) {
        while !stop.load(Ordering::Relaxed) {
            self.run_cycle();
            std::thread::sleep(CYCLE_SLEEP);
        }
        debug!("supervisor loop stopped");
    }

    /// One pass over every phase.
    pub fn run_cycle(&mut self) {
        let now = Instant::now();
        self.registry.health_check(now);
        self.registry.respawn_due(&self.paths, now);
        self.drain_commands();
    }

    /// Answer every queued request. Returns the number of datagrams read.
    pub fn drain_commands(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let mut request = match self.transport.try_receive() {
                Ok(Some((peer, request))) => {
                    debug!(%peer, request = %request.describe(), "request");
                    request
                }
                Ok(None) => break,
                Err(TransportError::Decode(e)) => {
                    warn!(error = %e, "dropping malformed datagram");
                    handled += 1;
                    continue;
                }
                Err(e) => {
                    error!(error = %e, "receive failed");
                    break;
                }
            };
            handled += 1;

            let Some(reply) = dispatch(&self.paths, &mut self.registry, &mut request) else {
                continue;
            };
            if let Err(e) = self.transport.reply(&reply) {
                warn!(error = %e, "could not send reply");
            }
        }
        handled
    }
}
