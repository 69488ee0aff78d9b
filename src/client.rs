// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Client side of the command protocol: send one request to the supervisor,
// check the success flag and render the payload for humans.

use std::fmt::Write as _;
use std::time::Duration;

use tracing::debug;

use crate::error::{ClientError, TransportError};
use crate::proto::{Command, TypeTag, WireMessage};
use crate::service::ManagedService;
use crate::transport::Transport;

/// How long the command-line client waits for the supervisor.
pub const QUERY_TIMEOUT: Duration = Duration::from_millis(5000);

const LIST_SEPARATOR: &str = "---------------------------------------";

#[derive(Debug)]
pub struct Client {
    transport: Transport,
    address: String,
    timeout: Duration,
}

impl Client {
    /// Open a client endpoint talking to the supervisor at `address`.
    pub fn connect(address: &str) -> Result<Self, TransportError> {
        Ok(Self {
            transport: Transport::client()?,
            address: address.to_owned(),
            timeout: QUERY_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send `command` and return the reply payload after the success flag.
    pub fn call(&mut self, command: Command, name: Option<&str>) -> Result<WireMessage, ClientError> {
        let request = command.request(name)?;
        debug!(%command, address = %self.address, client = self.transport.name(), "query");
        let mut reply = self.transport.query(&self.address, &request, self.timeout)?;
        if reply.get_bool()? {
            return Ok(reply);
        }
        let reason = if reply.peek_next_type() == TypeTag::String {
            reply.get_string()?
        } else {
            String::new()
        };
        Err(ClientError::Rejected(reason))
    }
}

/// Human-readable output for a successful reply.
pub fn render(
    command: Command,
    name: &str,
    verbose: bool,
    payload: &mut WireMessage,
) -> Result<String, ClientError> {
    let mut out = String::new();
    match command {
        Command::Start => out = format!("{name} is started.\n"),
        Command::Stop => out = format!("{name} is stopped.\n"),
        Command::Restart => out = format!("{name} is restarted.\n"),
        Command::Status => {
            let state = if payload.get_bool()? { "running" } else { "stopped" };
            out = format!("{name} is {state}.\n");
        }
        Command::Show => {
            let service: ManagedService = payload.get_record()?;
            out = format!("{service}\n");
        }
        Command::List => {
            while !payload.is_empty() {
                let s: ManagedService = payload.get_record()?;
                // Writing to a String cannot fail.
                let _ = if verbose {
                    writeln!(out, "{LIST_SEPARATOR}\n{s}")
                } else if s.is_running() {
                    writeln!(out, "{}: running, process {}", s.cfg.name, s.pid)
                } else {
                    writeln!(out, "{}: stopped.", s.cfg.name)
                };
            }
        }
    }
    Ok(out)
}
