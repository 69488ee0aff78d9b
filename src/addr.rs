// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Abstract socket address names.
//
// An abstract address lives in `sun_path` after a leading NUL byte, so the
// usable length is one less than the 108-byte path buffer and no filesystem
// entry is ever created.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::TransportError;

/// Largest usable abstract name (sun_path minus the leading NUL).
pub const MAX_ADDR_LEN: usize = 107;

/// Per-process counter distinguishing client endpoints.
static CLIENT_ID: AtomicU32 = AtomicU32::new(0);

/// FNV-1a 64-bit hash.
pub fn fnv1a_64(data: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in data {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Check that `name` fits in an abstract address.
pub fn validate(name: &str) -> Result<(), TransportError> {
    if name.is_empty() || name.len() > MAX_ADDR_LEN || name.as_bytes().contains(&0) {
        return Err(TransportError::InvalidAddress(name.to_owned()));
    }
    Ok(())
}

/// Shorten `name` to fit [`MAX_ADDR_LEN`], keeping a readable prefix and
/// appending `_<16-hex-FNV-1a-hash>` of the full name.
pub fn fit(name: &str) -> String {
    if name.len() <= MAX_ADDR_LEN {
        return name.to_owned();
    }
    const HASH_SUFFIX_LEN: usize = 1 + 16;
    let mut take = MAX_ADDR_LEN - HASH_SUFFIX_LEN;
    while !name.is_char_boundary(take) {
        take -= 1;
    }
    format!("{}_{:016x}", &name[..take], fnv1a_64(name.as_bytes()))
}

/// Name of the running program, used as the client address prefix.
fn program_name() -> String {
    let arg0 = std::env::args_os().next();
    arg0.as_deref()
        .map(std::path::Path::new)
        .and_then(|p| p.file_name())
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| "svcd".to_owned())
}

/// Build `<program>__<pid>_<thread>_<counter>` from explicit parts.
pub fn client_name(program: &str, pid: u32, thread: u64, id: u32) -> String {
    fit(&format!("{program}__{pid:06}_{thread:06}_{id:06}"))
}

/// Generate a fresh client address for the calling thread.
///
/// Two calls in the same process never return the same name.
pub fn next_client_name() -> String {
    let id = CLIENT_ID.fetch_add(1, Ordering::Relaxed) + 1;
    let thread = unsafe { libc::pthread_self() } as u64;
    client_name(&program_name(), std::process::id(), thread, id)
}
