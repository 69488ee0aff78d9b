// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Wire protocol: the typed group codec and the supervisor command set.

pub mod command;
pub mod message;

pub use command::{failure, success, Command};
pub use message::{scan, scan_code, Element, TypeTag, WireMessage, WireRecord, MAX_FIELD};
