// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Service definitions and the supervised-process lifecycle.

pub mod config;
mod daemon;
pub mod managed;

pub use config::{ServiceConfig, NULL_DEVICE, UNLIMITED_RESPAWNS};
pub use daemon::LOG_ENV;
pub use managed::{ManagedService, START_TIMEOUT, STOP_TIMEOUT};
