// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Error taxonomy for the wire codec, the datagram transport, config import,
// process control and command dispatch.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::proto::TypeTag;

// ---------------------------------------------------------------------------
// Wire protocol
// ---------------------------------------------------------------------------

/// Structural problem found by [`crate::proto::scan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("type tag {tag} out of range at offset {offset}")]
    BadTag { offset: usize, tag: u8 },

    #[error("group at offset {offset} runs past the end of the buffer")]
    Overrun { offset: usize },
}

impl ScanError {
    /// Negative result code: -1 for a bad tag, -2 for an overrun.
    pub fn code(&self) -> i32 {
        match self {
            ScanError::BadTag { .. } => -1,
            ScanError::Overrun { .. } => -2,
        }
    }
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("no groups left to read")]
    Exhausted,

    #[error("expected {expected:?} group, found {found:?}")]
    TypeMismatch { expected: TypeTag, found: TypeTag },

    #[error("expected a single element, found {0}")]
    CountMismatch(usize),

    #[error("{tag:?} element declares {len} bytes, expected {expected}")]
    LengthMismatch {
        tag: TypeTag,
        len: usize,
        expected: usize,
    },

    #[error("string element is not valid UTF-8")]
    InvalidUtf8,

    #[error("{what} of {len} exceeds the 65535 limit")]
    TooLarge { what: &'static str, len: usize },

    #[error("destination holds {available} bytes, message needs {needed}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("malformed buffer: {0}")]
    Malformed(#[from] ScanError),
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("socket error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid address '{0}' (expected 1..={max} bytes without NUL)", max = crate::addr::MAX_ADDR_LEN)]
    InvalidAddress(String),

    #[error("no previous peer to send to")]
    NoPeer,

    #[error("timed out waiting for a response")]
    Timeout,

    #[error("undecodable payload: {0}")]
    Decode(#[from] WireError),
}

// ---------------------------------------------------------------------------
// Service config
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {0} not found")]
    NotFound(PathBuf),

    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("line {line}: command already defined")]
    DuplicateCommand { line: usize },

    #[error("line {line}: malformed 'respawn limit' ({text})")]
    RespawnLimit { line: usize, text: String },

    #[error("line {line}: unknown directive '{text}'")]
    UnknownDirective { line: usize, text: String },

    #[error("line {line}: '{directive}' needs an argument")]
    MissingArgument { line: usize, directive: &'static str },

    #[error("no command or script defined")]
    MissingCommand,

    #[error("cannot derive a service name from {0}")]
    BadFileName(PathBuf),
}

// ---------------------------------------------------------------------------
// Process control
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("service config is not valid")]
    InvalidConfig,

    #[error("service is already running")]
    AlreadyRunning,

    #[error("service is not running")]
    NotRunning,

    #[error("{call} failed: {source}")]
    Sys {
        call: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("argument contains an interior NUL byte")]
    NulByte,

    #[error("detaching child failed (wait status {0:#x})")]
    Detach(i32),

    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("daemon did not publish its pid within {0} ms")]
    PidTimeout(u64),
}

impl ProcessError {
    pub(crate) fn last_os(call: &'static str) -> Self {
        ProcessError::Sys {
            call,
            source: io::Error::last_os_error(),
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Failures reported back to the client. The `Display` text is the reason
/// string carried in the reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command")]
    UnknownCommand,

    #[error("invalid argument")]
    InvalidArgument,

    #[error("config file not found")]
    ConfigNotFound,

    #[error("error in config file")]
    ConfigInvalid,

    #[error("start failed")]
    StartFailed,

    #[error("stop failed")]
    StopFailed,

    #[error("could not read services")]
    ListFailed,
}

/// Failure seen by a command-line client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not get response: {0}")]
    Transport(#[from] TransportError),

    #[error("command failed: {0}")]
    Rejected(String),

    #[error("unexpected response: {0}")]
    Wire(#[from] WireError),
}

/// Outcome of a failed handler: command failures are answered, anything else
/// is logged and the request goes unanswered.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("malformed request: {0}")]
    Wire(#[from] WireError),
}
