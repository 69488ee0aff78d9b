// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Thin wrappers over the POSIX calls used by the transport and the process
// lifecycle code: descriptor flags, queued-byte queries, readiness polling
// and signal delivery.

use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

fn cvt(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

// ---------------------------------------------------------------------------
// Descriptor flags
// ---------------------------------------------------------------------------

/// Toggle `O_NONBLOCK` on `fd`.
pub fn set_blocking(fd: RawFd, blocking: bool) -> io::Result<()> {
    let flags = cvt(unsafe { libc::fcntl(fd, libc::F_GETFL) })?;
    let flags = if blocking {
        flags & !libc::O_NONBLOCK
    } else {
        flags | libc::O_NONBLOCK
    };
    cvt(unsafe { libc::fcntl(fd, libc::F_SETFL, flags) })?;
    Ok(())
}

/// Whether `fd` is in blocking mode.
pub fn is_blocking(fd: RawFd) -> io::Result<bool> {
    let flags = cvt(unsafe { libc::fcntl(fd, libc::F_GETFL) })?;
    Ok(flags & libc::O_NONBLOCK == 0)
}

// ---------------------------------------------------------------------------
// Queued data
// ---------------------------------------------------------------------------

/// Bytes currently queued for reading (`FIONREAD`). For a datagram socket
/// this is the size of the next datagram.
pub fn bytes_available(fd: RawFd) -> io::Result<usize> {
    let mut n: libc::c_int = 0;
    cvt(unsafe { libc::ioctl(fd, libc::FIONREAD, &mut n) })?;
    Ok(n.max(0) as usize)
}

/// Full length of the next datagram without consuming it. Blocks like a
/// normal receive when the descriptor is blocking.
pub fn next_datagram_len(fd: RawFd) -> io::Result<usize> {
    let ret = unsafe {
        libc::recv(
            fd,
            std::ptr::null_mut(),
            0,
            libc::MSG_PEEK | libc::MSG_TRUNC,
        )
    };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(ret as usize)
}

/// Read and drop exactly `len` bytes (one datagram) from `fd`.
pub fn discard(fd: RawFd, len: usize) -> io::Result<usize> {
    let mut sink = vec![0u8; len.max(1)];
    let ret = unsafe { libc::recv(fd, sink.as_mut_ptr().cast(), len, libc::MSG_DONTWAIT) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(ret as usize)
}

/// Wait until `fd` is readable or `timeout` elapses.
///
/// Returns `Ok(false)` on timeout. Interrupted waits are resumed with the
/// remaining time.
pub fn poll_readable(fd: RawFd, timeout: Duration) -> io::Result<bool> {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        let left = deadline.saturating_duration_since(std::time::Instant::now());
        let ms = left.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let rc = unsafe { libc::poll(&mut pfd, 1, ms) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        if rc == 0 {
            return Ok(false);
        }
        return Ok(pfd.revents & libc::POLLIN != 0);
    }
}

// ---------------------------------------------------------------------------
// Processes
// ---------------------------------------------------------------------------

/// Zero-signal liveness probe. `EPERM` means the process exists but belongs
/// to another user, so it counts as alive. A zombie still waiting to be
/// reaped by its new parent counts as exited.
pub fn pid_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    if unsafe { libc::kill(pid, 0) } != 0
        && io::Error::last_os_error().raw_os_error() != Some(libc::EPERM)
    {
        return false;
    }
    !is_zombie(pid)
}

/// Whether `/proc/<pid>/stat` reports state `Z`. Unreadable entries count as
/// not a zombie.
fn is_zombie(pid: i32) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return false;
    };
    // The command name is parenthesised and may itself contain ") ".
    stat.rfind(')')
        .and_then(|i| stat[i + 1..].split_whitespace().next())
        .is_some_and(|state| state == "Z")
}

/// Deliver `sig` to `pid`.
pub fn send_signal(pid: i32, sig: libc::c_int) -> io::Result<()> {
    cvt(unsafe { libc::kill(pid, sig) })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_pid_is_alive() {
        assert!(pid_alive(std::process::id() as i32));
    }

    #[test]
    fn init_is_alive_for_any_user() {
        // Unprivileged callers get EPERM from kill(1, 0).
        assert!(pid_alive(1));
    }

    #[test]
    fn bogus_pids_are_dead() {
        assert!(!pid_alive(-1));
        assert!(!pid_alive(0));
        assert!(!pid_alive(i32::MAX));
    }

    #[test]
    fn exited_child_is_dead_before_and_after_reaping() {
        let mut child = std::process::Command::new("/bin/true").spawn().unwrap();
        let pid = child.id() as i32;
        // Exits at once and stays a zombie until waited on.
        std::thread::sleep(Duration::from_millis(200));
        assert!(!pid_alive(pid));
        child.wait().unwrap();
        assert!(!pid_alive(pid));
    }
}
