// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Retry wrapper for transient store errors (§4.1: "transient connection
//! errors retry up to 3 times with exponential backoff (2s,4s,8s)").
//! `rusqlite::Error::SqliteFailure` with a `Busy`/`Locked` code is the only
//! transient condition the embedded store can hit under concurrent writers;
//! anything else is treated as persistent and bubbles up immediately.

use std::thread::sleep;
use std::time::Duration;

use obrador_types::{ObradorError, Result};
use tracing::warn;

const BACKOFF: [Duration; 3] = [
    Duration::from_secs(2),
    Duration::from_secs(4),
    Duration::from_secs(8),
];

pub fn retry_on_busy<F>(mut op: F) -> Result<()>
where
    F: FnMut() -> Result<()>,
{
    let mut attempt = 0;
    loop {
        match op() {
            Ok(()) => return Ok(()),
            Err(ObradorError::StoreUnavailable(msg)) if is_transient(&msg) && attempt < BACKOFF.len() => {
                warn!(attempt, %msg, "store busy, retrying");
                sleep(BACKOFF[attempt]);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn is_transient(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("busy") || lower.contains("locked")
}
