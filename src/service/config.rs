// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Declarative service definitions.
//
// A config file `<service_dir>/<name>.conf` is a list of directives, one per
// line:
//
//   exec <command>              single shell command
//   script / ... / end script   multi-line script body
//   onstop exec <command>       run through /bin/sh after the service stops
//   log <path>                  stdout/stderr target (default /dev/null)
//   wipe log                    truncate the log on every start
//   pidfile <path>              default <run_dir>/<name>.pid
//   respawn                     restart the service when it exits
//   respawn limit <n> <secs>    bound the restarts and space them out
//
// Blank lines and lines starting with `#` are ignored.

use std::path::{Path, PathBuf};

use crate::error::{ConfigError, WireError};
use crate::paths::{self, Paths};
use crate::proto::{WireMessage, WireRecord};

pub const NULL_DEVICE: &str = "/dev/null";

/// Restart budget used when `respawn` is given without a limit.
pub const UNLIMITED_RESPAWNS: i32 = i32::MAX;

const DEFAULT_SHEBANG: &str = "#!/bin/sh\n\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub name: String,
    /// Command line, or the script body when `is_script` is set.
    pub exec: String,
    pub is_script: bool,
    pub script_path: PathBuf,
    pub onstop_exec: String,
    pub logfile: PathBuf,
    pub wipe_log: bool,
    pub pidfile: PathBuf,
    pub respawn: bool,
    pub respawn_limit: i32,
    /// Seconds between a service exiting and its restart.
    pub respawn_interval: i32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            exec: String::new(),
            is_script: false,
            script_path: PathBuf::new(),
            onstop_exec: String::new(),
            logfile: PathBuf::from(NULL_DEVICE),
            wipe_log: false,
            pidfile: PathBuf::new(),
            respawn: false,
            respawn_limit: 0,
            respawn_interval: 0,
        }
    }
}

/// Text after the directive keyword, trimmed.
fn argument<'a>(line: &'a str, keyword: &str) -> &'a str {
    line[keyword.len()..].trim()
}

fn keyword_is(line: &str, keyword: &str) -> bool {
    line == keyword
        || line
            .strip_prefix(keyword)
            .is_some_and(|rest| rest.starts_with(char::is_whitespace))
}

fn positive(text: &str) -> Option<i32> {
    text.parse::<i32>().ok().filter(|v| *v > 0)
}

impl ServiceConfig {
    /// Read `<service_dir>/<name>.conf`.
    pub fn load(paths: &Paths, name: &str) -> Result<Self, ConfigError> {
        Self::import(&paths.config_path(name), paths)
    }

    /// Read and parse a config file. The service name is the file stem.
    pub fn import(path: &Path, paths: &Paths) -> Result<Self, ConfigError> {
        if !paths::is_regular_file(path) {
            return Err(ConfigError::NotFound(path.to_owned()));
        }
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::BadFileName(path.to_owned()))?;
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(name, &text, paths)
    }

    /// Parse config text for the service `name`.
    pub fn parse(name: &str, text: &str, paths: &Paths) -> Result<Self, ConfigError> {
        let mut cfg = Self {
            name: name.to_owned(),
            ..Self::default()
        };
        let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l));

        while let Some((lineno, raw)) = lines.next() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if keyword_is(line, "onstop") {
                let rest = argument(line, "onstop");
                if !keyword_is(rest, "exec") {
                    return Err(ConfigError::UnknownDirective {
                        line: lineno,
                        text: line.to_owned(),
                    });
                }
                cfg.onstop_exec = argument(rest, "exec").to_owned();
            } else if keyword_is(line, "exec") {
                if !cfg.exec.is_empty() {
                    return Err(ConfigError::DuplicateCommand { line: lineno });
                }
                let cmd = argument(line, "exec");
                if cmd.is_empty() {
                    return Err(ConfigError::MissingArgument {
                        line: lineno,
                        directive: "exec",
                    });
                }
                cfg.exec = cmd.to_owned();
                cfg.is_script = false;
            } else if line == "script" {
                if !cfg.exec.is_empty() {
                    return Err(ConfigError::DuplicateCommand { line: lineno });
                }
                let mut body = String::new();
                for (_, inner) in lines.by_ref() {
                    if inner.trim() == "end script" {
                        break;
                    }
                    body.push_str(inner);
                    body.push('\n');
                }
                cfg.exec = body.trim().to_owned();
                cfg.is_script = true;
            } else if line == "wipe log" {
                cfg.wipe_log = true;
            } else if keyword_is(line, "log") {
                cfg.logfile = Self::path_argument(line, "log", lineno)?;
            } else if keyword_is(line, "pidfile") {
                cfg.pidfile = Self::path_argument(line, "pidfile", lineno)?;
            } else if line == "respawn" {
                cfg.respawn = true;
                cfg.respawn_limit = UNLIMITED_RESPAWNS;
                cfg.respawn_interval = 0;
            } else if keyword_is(line, "respawn") {
                let parts: Vec<&str> = line.split_whitespace().collect();
                let parsed = match parts.as_slice() {
                    ["respawn", "limit", n, secs] => positive(n).zip(positive(secs)),
                    ["respawn", "limit", ..] => None,
                    _ => {
                        return Err(ConfigError::UnknownDirective {
                            line: lineno,
                            text: line.to_owned(),
                        })
                    }
                };
                let (limit, interval) = parsed.ok_or_else(|| ConfigError::RespawnLimit {
                    line: lineno,
                    text: line.to_owned(),
                })?;
                cfg.respawn_limit = limit;
                cfg.respawn_interval = interval;
            } else {
                return Err(ConfigError::UnknownDirective {
                    line: lineno,
                    text: line.to_owned(),
                });
            }
        }

        if !cfg.is_valid() {
            return Err(ConfigError::MissingCommand);
        }
        if cfg.pidfile.as_os_str().is_empty() {
            cfg.pidfile = paths.pid_file(name);
        }
        if cfg.is_script {
            cfg.script_path = paths.script_path(name);
        }
        Ok(cfg)
    }

    fn path_argument(line: &str, keyword: &'static str, lineno: usize) -> Result<PathBuf, ConfigError> {
        let arg = argument(line, keyword);
        if arg.is_empty() {
            return Err(ConfigError::MissingArgument {
                line: lineno,
                directive: keyword,
            });
        }
        Ok(PathBuf::from(arg))
    }

    /// A config is usable once it has something to run.
    pub fn is_valid(&self) -> bool {
        !self.exec.is_empty()
    }

    pub fn logs_to_null(&self) -> bool {
        self.logfile == Path::new(NULL_DEVICE)
    }

    /// Contents of the generated script file, with a `/bin/sh` shebang when
    /// the body has none.
    pub fn script_contents(&self) -> String {
        if self.exec.starts_with("#!") {
            format!("{}\n", self.exec)
        } else {
            format!("{DEFAULT_SHEBANG}{}\n", self.exec)
        }
    }
}

fn path_str(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

impl WireRecord for ServiceConfig {
    fn write_to(&self, msg: &mut WireMessage) -> Result<(), WireError> {
        msg.put_str(&self.name)?
            .put_str(&self.exec)?
            .put_str(&self.onstop_exec)?
            .put_bool(self.wipe_log)
            .put_str(&path_str(&self.logfile))?
            .put_str(&path_str(&self.pidfile))?
            .put_bool(self.respawn)
            .put_int(self.respawn_limit)
            .put_int(self.respawn_interval);
        Ok(())
    }

    fn read_from(msg: &mut WireMessage) -> Result<Self, WireError> {
        Ok(Self {
            name: msg.get_string()?,
            exec: msg.get_string()?,
            onstop_exec: msg.get_string()?,
            wipe_log: msg.get_bool()?,
            logfile: msg.get_string()?.into(),
            pidfile: msg.get_string()?.into(),
            respawn: msg.get_bool()?,
            respawn_limit: msg.get_int()?,
            respawn_interval: msg.get_int()?,
            ..Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> Paths {
        Paths::with_root(Path::new("/srv/test"))
    }

    #[test]
    fn exec_with_defaults() {
        let cfg = ServiceConfig::parse("web", "exec /usr/bin/web --port 80\n", &paths()).unwrap();
        assert_eq!(cfg.exec, "/usr/bin/web --port 80");
        assert!(!cfg.is_script);
        assert!(cfg.logs_to_null());
        assert_eq!(cfg.pidfile, Path::new("/srv/test/run/web.pid"));
        assert!(!cfg.respawn);
    }

    #[test]
    fn script_block() {
        let text = "# comment\nscript\n  echo one\n  echo two\nend script\nlog /tmp/x.log\n";
        let cfg = ServiceConfig::parse("job", text, &paths()).unwrap();
        assert!(cfg.is_script);
        assert_eq!(cfg.exec, "echo one\n  echo two");
        assert_eq!(cfg.script_path, Path::new("/srv/test/run/scripts/job"));
        assert!(cfg.script_contents().starts_with("#!/bin/sh\n"));
        assert_eq!(cfg.logfile, Path::new("/tmp/x.log"));
    }

    #[test]
    fn bare_respawn_resets_the_limit() {
        // Last directive wins: a later bare `respawn` lifts an earlier limit.
        let cfg = ServiceConfig::parse("a", "exec x\nrespawn limit 3 5\nrespawn\n", &paths()).unwrap();
        assert!(cfg.respawn);
        assert_eq!((cfg.respawn_limit, cfg.respawn_interval), (UNLIMITED_RESPAWNS, 0));

        let cfg = ServiceConfig::parse("a", "exec x\nrespawn\nrespawn limit 3 5\n", &paths()).unwrap();
        assert!(cfg.respawn);
        assert_eq!((cfg.respawn_limit, cfg.respawn_interval), (3, 5));
    }

    #[test]
    fn rejects_bad_input() {
        let p = paths();
        assert!(matches!(
            ServiceConfig::parse("a", "exec x\nexec y\n", &p),
            Err(ConfigError::DuplicateCommand { line: 2 })
        ));
        assert!(matches!(
            ServiceConfig::parse("a", "exec x\nrespawn limit 0 1\n", &p),
            Err(ConfigError::RespawnLimit { line: 2, .. })
        ));
        assert!(matches!(
            ServiceConfig::parse("a", "exec x\nrespawn limit 3\n", &p),
            Err(ConfigError::RespawnLimit { .. })
        ));
        assert!(matches!(
            ServiceConfig::parse("a", "exec x\nfrobnicate\n", &p),
            Err(ConfigError::UnknownDirective { line: 2, .. })
        ));
        assert!(matches!(
            ServiceConfig::parse("a", "log /tmp/a\n", &p),
            Err(ConfigError::MissingCommand)
        ));
    }
}
