// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Size-based rotation with a bounded backup chain.
//!
//! ```text
//! before:  app.jsonl  app.jsonl.1  app.jsonl.2  (max_backups = 2)
//! after:   ---------  app.jsonl.1  app.jsonl.2
//!              └──────────┘   └───────┘   (old .2 deleted)
//! ```
//!
//! `.1` is always the newest backup. With `max_backups == 0` the live file is deleted and
//! no history is kept. The next append recreates the live file.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

/// `{path}.{index}`.
#[must_use]
pub fn backup_path(path: &Path, index: u32) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

/// Moves the live file into the backup chain. A missing live file is not an error.
pub(crate) async fn rotate(path: &Path, max_backups: u32) -> io::Result<()> {
    if !fs::try_exists(path).await? {
        return Ok(());
    }

    if max_backups == 0 {
        debug!(path = %path.display(), "Rotating without backups, removing live file");
        return fs::remove_file(path).await;
    }

    let oldest = backup_path(path, max_backups);
    if fs::try_exists(&oldest).await? {
        fs::remove_file(&oldest).await?;
    }

    for index in (1..max_backups).rev() {
        let from = backup_path(path, index);
        if fs::try_exists(&from).await? {
            fs::rename(&from, backup_path(path, index + 1)).await?;
        }
    }

    debug!(path = %path.display(), max_backups, "Rotating live file");
    fs::rename(path, backup_path(path, 1)).await
}
