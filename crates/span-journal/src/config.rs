// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::path::PathBuf;

use crate::entities::EntityPattern;
use crate::error::ConfigError;
use crate::writer::WriterConfig;

/// Toggle read on every emit by [`crate::telemetry::EnvGuard`], so it is not part of
/// [`JournalConfig`].
pub const ENABLED_ENV: &str = "SPAN_JOURNAL_ENABLED";

pub const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_BACKUPS: u32 = 5;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration for the journal writer and its diagnostic logging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalConfig {
    /// Directory holding the live file and its backups
    pub directory: PathBuf,
    /// Name of the live file
    pub file_name: String,
    /// Rotation threshold in bytes, 0 disables rotation
    pub max_size: u64,
    /// Number of backups kept, 0 keeps none
    pub max_backups: u32,
    /// Tag prepended to records echoed in fallback mode
    pub fallback_prefix: String,
    /// Level of the library's own diagnostic logs
    pub log_level: String,
    /// Path segments whose following UUID is recorded on request events
    pub entity_patterns: Vec<EntityPattern>,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            file_name: "telemetry.jsonl".to_string(),
            max_size: DEFAULT_MAX_SIZE,
            max_backups: DEFAULT_MAX_BACKUPS,
            fallback_prefix: "[telemetry]".to_string(),
            log_level: "info".to_string(),
            entity_patterns: Vec::new(),
        }
    }
}

impl JournalConfig {
    /// Create configuration from environment variables
    ///
    /// Unparseable sizes fall back to their defaults; malformed entity patterns are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let directory = env::var("SPAN_JOURNAL_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.directory);
        let file_name = env::var("SPAN_JOURNAL_FILE").unwrap_or(defaults.file_name);
        let max_size = env::var("SPAN_JOURNAL_MAX_SIZE")
            .ok()
            .and_then(|val| val.trim().parse::<u64>().ok())
            .unwrap_or(defaults.max_size);
        let max_backups = env::var("SPAN_JOURNAL_MAX_BACKUPS")
            .ok()
            .and_then(|val| val.trim().parse::<u32>().ok())
            .unwrap_or(defaults.max_backups);
        let fallback_prefix =
            env::var("SPAN_JOURNAL_FALLBACK_PREFIX").unwrap_or(defaults.fallback_prefix);
        let log_level = env::var("SPAN_JOURNAL_LOG_LEVEL")
            .map(|val| val.trim().to_lowercase())
            .unwrap_or(defaults.log_level);
        let entity_patterns = match env::var("SPAN_JOURNAL_ENTITY_PATTERNS") {
            Ok(val) => parse_entity_patterns(&val)?,
            Err(_) => defaults.entity_patterns,
        };

        let config = Self {
            directory,
            file_name,
            max_size,
            max_backups,
            fallback_prefix,
            log_level,
            entity_patterns,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let file_name = self.file_name.trim();
        if file_name.is_empty() {
            return Err(ConfigError::Invalid(
                "SPAN_JOURNAL_FILE cannot be empty".to_string(),
            ));
        }
        if file_name.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "SPAN_JOURNAL_FILE '{}' must be a file name, not a path",
                self.file_name
            )));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }

    #[must_use]
    pub fn writer_config(&self) -> WriterConfig {
        WriterConfig {
            directory: self.directory.clone(),
            file_name: self.file_name.trim().to_string(),
            max_size: self.max_size,
            max_backups: self.max_backups,
            fallback_prefix: self.fallback_prefix.clone(),
        }
    }
}

/// Parses `users:userId,orders:orderId`. Empty entries are skipped.
pub fn parse_entity_patterns(value: &str) -> Result<Vec<EntityPattern>, ConfigError> {
    value
        .split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(str::parse)
        .collect()
}
