// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Command handlers.
//
// Each handler receives the request with its command tag already consumed
// and returns the full reply. `CommandError`s become `[false, reason]`
// replies; a `WireError` while building a reply is logged and the request
// goes unanswered.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::io;

use tracing::{debug, info, warn};

use crate::error::{CommandError, ConfigError, DispatchError};
use crate::paths::{self, Paths, CONFIG_EXT};
use crate::proto::{failure, success, Command, TypeTag, WireMessage};
use crate::registry::ServiceRegistry;
use crate::service::{ManagedService, ServiceConfig};

pub type Handler =
    fn(&Paths, &mut ServiceRegistry, &mut WireMessage) -> Result<WireMessage, DispatchError>;

/// Handler table keyed by command.
pub fn handler(command: Command) -> Handler {
    match command {
        Command::Start => start,
        Command::Stop => stop,
        Command::Restart => restart,
        Command::Status => status,
        Command::Show => show,
        Command::List => list,
    }
}

/// Decode the command tag of `request` and run its handler.
///
/// Returns the reply to send, or `None` when the request must go unanswered.
pub fn dispatch(
    paths: &Paths,
    registry: &mut ServiceRegistry,
    request: &mut WireMessage,
) -> Option<WireMessage> {
    let command = match request.get_string() {
        Ok(tag) => tag.parse::<Command>(),
        Err(e) => {
            debug!(error = %e, "request does not start with a command tag");
            Err(CommandError::UnknownCommand)
        }
    };
    let command = match command {
        Ok(c) => c,
        Err(e) => {
            warn!("unknown command");
            return Some(failure(&e));
        }
    };

    match handler(command)(paths, registry, request) {
        Ok(reply) => Some(reply),
        Err(DispatchError::Command(e)) => {
            info!(%command, reason = %e, "command failed");
            Some(failure(&e))
        }
        Err(DispatchError::Wire(e)) => {
            warn!(%command, error = %e, "could not build reply");
            None
        }
    }
}

/// The single service-name argument of a named command.
fn take_name(args: &mut WireMessage) -> Result<String, CommandError> {
    if args.count() != 1 || args.peek_next_type() != TypeTag::String {
        return Err(CommandError::InvalidArgument);
    }
    let name = args
        .get_string()
        .map_err(|_| CommandError::InvalidArgument)?;
    if name.is_empty() || name.contains('/') {
        return Err(CommandError::InvalidArgument);
    }
    Ok(name)
}

fn load(paths: &Paths, name: &str) -> Result<ManagedService, CommandError> {
    ManagedService::load(paths, name).map_err(|e| match e {
        ConfigError::NotFound(_) => CommandError::ConfigNotFound,
        e => {
            warn!(service = name, error = %e, "config rejected");
            CommandError::ConfigInvalid
        }
    })
}

fn launch(service: &mut ManagedService) -> Result<(), CommandError> {
    service.start().map_err(|e| {
        warn!(service = %service.cfg.name, error = %e, "start failed");
        CommandError::StartFailed
    })
}

fn halt(service: &mut ManagedService) -> Result<(), CommandError> {
    service.stop().map_err(|e| {
        warn!(service = %service.cfg.name, error = %e, "stop failed");
        CommandError::StopFailed
    })
}

fn start(
    paths: &Paths,
    registry: &mut ServiceRegistry,
    args: &mut WireMessage,
) -> Result<WireMessage, DispatchError> {
    let name = take_name(args)?;
    if registry.get(&name).is_some_and(ManagedService::is_running) {
        return Ok(success());
    }
    let mut service = load(paths, &name)?;
    launch(&mut service)?;
    registry.insert(service);
    registry.save();
    Ok(success())
}

fn stop(
    paths: &Paths,
    registry: &mut ServiceRegistry,
    args: &mut WireMessage,
) -> Result<WireMessage, DispatchError> {
    let name = take_name(args)?;
    let found = paths::is_regular_file(&paths.config_path(&name));
    let tracked = registry.get_mut(&name);
    let service = match (tracked, found) {
        (None, true) => return Ok(success()),
        (_, false) => return Err(CommandError::ConfigNotFound.into()),
        (Some(s), true) => s,
    };
    if service.is_running() {
        halt(service)?;
    }
    registry.remove(&name);
    registry.save();
    Ok(success())
}

fn restart(
    paths: &Paths,
    registry: &mut ServiceRegistry,
    args: &mut WireMessage,
) -> Result<WireMessage, DispatchError> {
    let name = take_name(args)?;
    if let Some(service) = registry.get_mut(&name) {
        halt(service)?;
    }
    let mut service = load(paths, &name)?;
    launch(&mut service)?;
    registry.insert(service);
    registry.save();
    Ok(success())
}

fn status(
    _paths: &Paths,
    registry: &mut ServiceRegistry,
    args: &mut WireMessage,
) -> Result<WireMessage, DispatchError> {
    let name = take_name(args)?;
    let running = registry.get(&name).is_some_and(ManagedService::is_running);
    let mut reply = success();
    reply.put_bool(running);
    Ok(reply)
}

fn show(
    paths: &Paths,
    registry: &mut ServiceRegistry,
    args: &mut WireMessage,
) -> Result<WireMessage, DispatchError> {
    let name = take_name(args)?;
    let mut reply = success();
    match registry.get(&name) {
        Some(service) => reply.put_record(service)?,
        None => reply.put_record(&load(paths, &name)?)?,
    };
    Ok(reply)
}

fn list(
    paths: &Paths,
    registry: &mut ServiceRegistry,
    args: &mut WireMessage,
) -> Result<WireMessage, DispatchError> {
    if !args.is_empty() {
        return Err(CommandError::InvalidArgument.into());
    }
    let all = all_services(paths, registry).map_err(|e| {
        warn!(dir = %paths.service_dir.display(), error = %e, "could not read services");
        CommandError::ListFailed
    })?;
    let mut reply = success();
    for service in all.values() {
        reply.put_record(&**service)?;
    }
    Ok(reply)
}

/// Tracked services plus every importable config file, by name. Tracked
/// entries win.
fn all_services<'a>(
    paths: &Paths,
    registry: &'a ServiceRegistry,
) -> io::Result<BTreeMap<String, Cow<'a, ManagedService>>> {
    let mut all: BTreeMap<String, Cow<'a, ManagedService>> = registry
        .iter()
        .map(|s| (s.cfg.name.clone(), Cow::Borrowed(s)))
        .collect();

    let entries = match fs::read_dir(&paths.service_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(all),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(CONFIG_EXT) {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if all.contains_key(name) {
            continue;
        }
        match ServiceConfig::import(&path, paths) {
            Ok(cfg) => {
                all.insert(cfg.name.clone(), Cow::Owned(ManagedService::new(cfg)));
            }
            Err(e) => debug!(path = %path.display(), error = %e, "skipping config"),
        }
    }
    Ok(all)
}
