// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Connectionless local transport over abstract-namespace Unix datagram
// sockets.
//
// One `Transport` type covers both roles:
// - `bind(name)`: a fixed, well-known address (the supervisor)
// - `client()`:   an auto-generated unique address (command-line clients)
//
// Each endpoint remembers the last peer it sent to or received from, so a
// server can answer with `reply()` right after `receive()`.

use std::io;
use std::os::linux::net::SocketAddrExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::{SocketAddr, UnixDatagram};
use std::time::Duration;

use tracing::{debug, warn};

use crate::addr;
use crate::error::TransportError;
use crate::platform;
use crate::proto::WireMessage;

/// Size of the reusable receive/send scratch buffer.
pub const SCRATCH_SIZE: usize = 16 * 1024;

pub struct Transport {
    socket: UnixDatagram,
    name: String,
    last_peer: Option<String>,
    scratch: Vec<u8>,
}

fn abstract_addr(name: &str) -> Result<SocketAddr, TransportError> {
    addr::validate(name)?;
    Ok(SocketAddr::from_abstract_name(name.as_bytes())?)
}

fn peer_name(addr: &SocketAddr) -> Option<String> {
    addr.as_abstract_name()
        .map(|n| String::from_utf8_lossy(n).into_owned())
        .filter(|n| !n.is_empty())
}

impl Transport {
    /// Bind a server endpoint at the abstract address `name`.
    pub fn bind(name: &str) -> Result<Self, TransportError> {
        let addr = abstract_addr(name)?;
        let socket = UnixDatagram::bind_addr(&addr)?;
        debug!(address = name, "transport bound");
        Ok(Self {
            socket,
            name: name.to_owned(),
            last_peer: None,
            scratch: vec![0u8; SCRATCH_SIZE],
        })
    }

    /// Open a client endpoint under a freshly generated unique address.
    pub fn client() -> Result<Self, TransportError> {
        Self::bind(&addr::next_client_name())
    }

    /// Own address.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address of the most recent peer, if any.
    pub fn last_peer(&self) -> Option<&str> {
        self.last_peer.as_deref()
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }

    pub fn set_blocking(&self, blocking: bool) -> Result<(), TransportError> {
        platform::set_blocking(self.as_raw_fd(), blocking)?;
        Ok(())
    }

    pub fn is_blocking(&self) -> Result<bool, TransportError> {
        Ok(platform::is_blocking(self.as_raw_fd())?)
    }

    // --- send ---

    /// Send raw bytes to `dst`, or to the last peer when `dst` is empty.
    pub fn send_bytes(&mut self, dst: &str, payload: &[u8]) -> Result<usize, TransportError> {
        let target = if dst.is_empty() {
            self.last_peer.clone().ok_or(TransportError::NoPeer)?
        } else {
            dst.to_owned()
        };
        let addr = abstract_addr(&target)?;
        self.last_peer = Some(target);
        let n = self.socket.send_to_addr(payload, &addr).map_err(|e| {
            warn!(dst = self.last_peer.as_deref(), error = %e, "send failed");
            e
        })?;
        Ok(n)
    }

    /// Send an encoded message. The whole unread region goes out as one
    /// datagram.
    pub fn send(&mut self, dst: &str, msg: &WireMessage) -> Result<(), TransportError> {
        let len = msg.byte_count();
        let sent = if len <= self.scratch.len() {
            let mut scratch = std::mem::take(&mut self.scratch);
            let n = msg.export(&mut scratch)?;
            let res = self.send_bytes(dst, &scratch[..n]);
            self.scratch = scratch;
            res?
        } else {
            self.send_bytes(dst, msg.as_bytes())?
        };
        if sent != len {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "short datagram write").into());
        }
        Ok(())
    }

    /// Send to the last peer.
    pub fn reply(&mut self, msg: &WireMessage) -> Result<(), TransportError> {
        self.send("", msg)
    }

    // --- receive ---

    /// Receive one datagram into `buf`, returning its length and source.
    /// An unnamed source leaves no peer to reply to.
    pub fn receive_bytes(&mut self, buf: &mut [u8]) -> Result<(usize, String), TransportError> {
        let (n, from) = self.socket.recv_from(buf)?;
        self.last_peer = peer_name(&from);
        if self.last_peer.is_none() {
            debug!("datagram from an unnamed peer");
        }
        Ok((n, self.last_peer.clone().unwrap_or_default()))
    }

    /// Receive and decode one message, returning the source address.
    ///
    /// Datagrams larger than the scratch buffer are read into a buffer sized
    /// for them.
    pub fn receive(&mut self) -> Result<(String, WireMessage), TransportError> {
        let pending = platform::next_datagram_len(self.as_raw_fd())?;
        if pending > self.scratch.len() {
            let mut big = vec![0u8; pending];
            let (n, src) = self.receive_bytes(&mut big)?;
            return Ok((src, WireMessage::from_bytes(&big[..n])?));
        }
        let mut scratch = std::mem::take(&mut self.scratch);
        let res = self.receive_bytes(&mut scratch);
        let out = res.and_then(|(n, src)| Ok((src, WireMessage::from_bytes(&scratch[..n])?)));
        self.scratch = scratch;
        out
    }

    /// Non-blocking variant of [`receive`](Self::receive): `Ok(None)` when
    /// nothing is queued. Requires the endpoint to be in non-blocking mode.
    pub fn try_receive(&mut self) -> Result<Option<(String, WireMessage)>, TransportError> {
        match self.receive() {
            Ok(m) => Ok(Some(m)),
            Err(TransportError::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Drop one queued datagram, if any.
    pub fn clear(&mut self) {
        let fd = self.as_raw_fd();
        match platform::bytes_available(fd) {
            Ok(0) => {}
            Ok(n) => {
                if let Err(e) = platform::discard(fd, n) {
                    debug!(error = %e, "discarding stale datagram failed");
                }
            }
            Err(e) => debug!(error = %e, "FIONREAD failed"),
        }
    }

    /// Send `request` to `dst` and wait up to `timeout` for one response.
    pub fn query(
        &mut self,
        dst: &str,
        request: &WireMessage,
        timeout: Duration,
    ) -> Result<WireMessage, TransportError> {
        self.clear();
        self.send(dst, request)?;
        if !platform::poll_readable(self.as_raw_fd(), timeout)? {
            return Err(TransportError::Timeout);
        }
        let (_, response) = self.receive()?;
        Ok(response)
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("name", &self.name)
            .field("last_peer", &self.last_peer)
            .finish()
    }
}
