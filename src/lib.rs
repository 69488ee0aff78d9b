// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Single-host service supervisor.
// Services are launched as double-forked daemons from declarative config
// files, watched for exit, respawned under a bounded policy and controlled
// through a typed message protocol over abstract Unix datagram sockets.

#[cfg(not(target_os = "linux"))]
compile_error!("svcd relies on Linux abstract-namespace Unix sockets");

pub mod error;
pub use error::{
    ClientError, CommandError, ConfigError, DispatchError, ProcessError, ScanError,
    TransportError, WireError,
};

pub mod addr;

mod platform;

pub mod proto;
pub use proto::{Command, WireMessage, WireRecord};

pub mod transport;
pub use transport::Transport;

pub mod paths;
pub use paths::Paths;

pub mod service;
pub use service::{ManagedService, ServiceConfig};

pub mod registry;
pub use registry::ServiceRegistry;

pub mod supervisor;
pub use supervisor::Supervisor;

pub mod client;
pub use client::Client;
