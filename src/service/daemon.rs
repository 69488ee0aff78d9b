// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Double-fork daemonization.
//
// Everything the daemon needs is turned into C strings by `Launch::prepare`
// in the calling process. Between `fork` and `exec` the children only make
// async-signal-safe libc calls: no allocation and no locks, so launching from
// a multi-threaded process is sound.

use std::ffi::{CString, OsStr};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::Path;

use libc::c_char;

use super::config::ServiceConfig;
use crate::error::ProcessError;

/// Environment variable holding the supervisor's own log filter. It is not
/// passed on to services.
pub const LOG_ENV: &str = "SVCD_LOG";

pub const DEFAULT_SHELL: &str = "/bin/sh";

const STARTED_BANNER: &[u8] = b"service: started.\n";

fn cstr(bytes: &[u8]) -> Result<CString, ProcessError> {
    CString::new(bytes).map_err(|_| ProcessError::NulByte)
}

fn cpath(p: &Path) -> Result<CString, ProcessError> {
    cstr(p.as_os_str().as_bytes())
}

/// Null-terminated pointer array over `strings`.
fn ptr_array(strings: &[CString]) -> Vec<*const c_char> {
    strings
        .iter()
        .map(|s| s.as_ptr())
        .chain(std::iter::once(std::ptr::null()))
        .collect()
}

/// Decimal rendering without allocation.
fn format_pid(mut pid: u32, buf: &mut [u8; 12]) -> &[u8] {
    let mut i = buf.len();
    loop {
        i -= 1;
        buf[i] = b'0' + (pid % 10) as u8;
        pid /= 10;
        if pid == 0 {
            break;
        }
    }
    &buf[i..]
}

/// A fully prepared daemon launch.
#[derive(Debug)]
pub(crate) struct Launch {
    program: CString,
    argv: Vec<CString>,
    envp: Vec<CString>,
    /// Search `PATH` for `program` (shell commands) instead of executing it
    /// directly (scripts).
    search_path: bool,
    logfile: CString,
    log_flags: libc::c_int,
    banner: bool,
    pidfile: CString,
    max_fd: libc::c_int,
}

impl Launch {
    pub(crate) fn prepare(cfg: &ServiceConfig) -> Result<Self, ProcessError> {
        let (program, argv, search_path) = if cfg.is_script {
            let program = cpath(&cfg.script_path)?;
            let argv0 = cstr(format!("{}-service", cfg.name).as_bytes())?;
            (program, vec![argv0], false)
        } else {
            let shell = std::env::var_os("SHELL")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SHELL.into());
            let program = cstr(shell.as_bytes())?;
            let argv = vec![program.clone(), cstr(b"-c")?, cstr(cfg.exec.as_bytes())?];
            (program, argv, true)
        };

        let envp = std::env::vars_os()
            .filter(|(k, _)| k != OsStr::new(LOG_ENV))
            .map(|(k, v)| {
                let mut kv = k.into_vec();
                kv.push(b'=');
                kv.extend_from_slice(v.as_bytes());
                cstr(&kv)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut log_flags = libc::O_CREAT | libc::O_WRONLY | libc::O_APPEND;
        if cfg.wipe_log {
            log_flags |= libc::O_TRUNC;
        }

        let max_fd = match unsafe { libc::sysconf(libc::_SC_OPEN_MAX) } {
            n if n > 0 => n.min(libc::c_int::MAX as libc::c_long) as libc::c_int,
            _ => 1024,
        };

        Ok(Self {
            program,
            argv,
            envp,
            search_path,
            logfile: cpath(&cfg.logfile)?,
            log_flags,
            banner: !cfg.logs_to_null(),
            pidfile: cpath(&cfg.pidfile)?,
            max_fd,
        })
    }

    /// Fork the daemon and reap the intermediate child.
    ///
    /// Returns once the intermediate process has exited; the daemon itself is
    /// reparented and publishes its pid through the pid file.
    pub(crate) fn spawn(&self) -> Result<(), ProcessError> {
        let argv = ptr_array(&self.argv);
        let envp = ptr_array(&self.envp);

        let child = unsafe { libc::fork() };
        if child == -1 {
            return Err(ProcessError::last_os("fork"));
        }
        if child == 0 {
            unsafe { self.detach(&argv, &envp) }
        }

        let mut status: libc::c_int = 0;
        loop {
            if unsafe { libc::waitpid(child, &mut status, 0) } != -1 {
                break;
            }
            let err = std::io::Error::last_os_error();
            if err.kind() != std::io::ErrorKind::Interrupted {
                return Err(ProcessError::Sys {
                    call: "waitpid",
                    source: err,
                });
            }
        }
        if libc::WIFEXITED(status) && libc::WEXITSTATUS(status) == 0 {
            Ok(())
        } else {
            Err(ProcessError::Detach(status))
        }
    }

    /// First child: new session, second fork.
    unsafe fn detach(&self, argv: &[*const c_char], envp: &[*const c_char]) -> ! {
        if libc::setsid() == -1 {
            libc::_exit(1);
        }
        libc::signal(libc::SIGHUP, libc::SIG_IGN);
        match libc::fork() {
            -1 => libc::_exit(1),
            0 => self.exec_daemon(argv, envp),
            _ => libc::_exit(0),
        }
    }

    /// Grandchild: detach from the filesystem, rewire stdio, publish the pid
    /// and exec.
    unsafe fn exec_daemon(&self, argv: &[*const c_char], envp: &[*const c_char]) -> ! {
        if libc::chdir(b"/\0".as_ptr().cast()) == -1 {
            libc::_exit(1);
        }
        libc::umask(0);

        self.close_inherited();

        let null = libc::open(b"/dev/null\0".as_ptr().cast(), libc::O_RDONLY);
        if null >= 0 {
            libc::dup2(null, libc::STDIN_FILENO);
            if null > libc::STDERR_FILENO {
                libc::close(null);
            }
        }

        let log = libc::open(self.logfile.as_ptr(), self.log_flags, 0o644 as libc::c_uint);
        if log >= 0 {
            libc::dup2(log, libc::STDOUT_FILENO);
            libc::dup2(log, libc::STDERR_FILENO);
            if log > libc::STDERR_FILENO {
                libc::close(log);
            }
        }

        let pidfd = libc::open(
            self.pidfile.as_ptr(),
            libc::O_CREAT | libc::O_WRONLY | libc::O_TRUNC,
            0o644 as libc::c_uint,
        );
        if pidfd >= 0 {
            let mut buf = [0u8; 12];
            let text = format_pid(libc::getpid() as u32, &mut buf);
            libc::write(pidfd, text.as_ptr().cast(), text.len());
            libc::close(pidfd);
        }

        if self.banner && log >= 0 {
            libc::write(
                libc::STDOUT_FILENO,
                STARTED_BANNER.as_ptr().cast(),
                STARTED_BANNER.len(),
            );
        }

        let rc = if self.search_path {
            libc::execvpe(self.program.as_ptr(), argv.as_ptr(), envp.as_ptr())
        } else {
            libc::execve(self.program.as_ptr(), argv.as_ptr(), envp.as_ptr())
        };
        libc::_exit(rc)
    }

    /// Close every descriptor above stderr.
    unsafe fn close_inherited(&self) {
        let rc = libc::syscall(
            libc::SYS_close_range,
            3 as libc::c_uint,
            libc::c_uint::MAX,
            0 as libc::c_uint,
        );
        if rc == 0 {
            return;
        }
        for fd in 3..self.max_fd {
            libc::close(fd);
        }
    }
}
