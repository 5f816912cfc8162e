// Copyright (c) The casesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for casesync.
//!
//! Configuration is layered: the built-in [default config](CasesyncConfig::DEFAULT_CONFIG), then
//! the repository's config file, then a small set of environment variables.

use crate::{
    api::RunStatus,
    errors::{ConfigParseError, ConfigValidationError},
};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, SecondsFormat, TimeZone};
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::{fmt, num::NonZeroUsize, time::Duration};

/// Overall configuration for casesync.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CasesyncConfig {
    /// Print debug-level diagnostics.
    #[serde(default)]
    pub debug: bool,

    /// How to reach the remote API.
    pub api: ApiConfig,

    /// Which remote project, environment and cycle the run belongs to.
    pub run: RunConfig,

    /// Synchronization toggles and sizes.
    pub sync: SyncConfig,

    /// Fields for automatically filed defects.
    pub defects: DefectConfig,

    /// Defaults for automatically created test cases.
    pub test_cases: TestCaseDefaults,
}

impl CasesyncConfig {
    /// The default location of the config within a directory.
    pub const CONFIG_PATH: &'static str = ".config/casesync.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Environment variables that override individual config keys, as `(key, variable)` pairs.
    pub const ENV_OVERRIDES: &'static [(&'static str, &'static str)] = &[
        ("api.url", "CASESYNC_API_URL"),
        ("api.token", "CASESYNC_API_TOKEN"),
        ("run.project-key", "CASESYNC_PROJECT_KEY"),
        ("run.name", "CASESYNC_RUN_NAME"),
        ("debug", "CASESYNC_DEBUG"),
    ];

    /// Reads the config from the given file, or if not specified from `.config/casesync.toml`
    /// within `dir`, then applies environment overrides.
    ///
    /// If no file is specified and `dir` doesn't contain `.config/casesync.toml`, uses the default
    /// config options.
    pub fn from_sources(
        dir: &Utf8Path,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        Self::from_sources_with_env(dir, config_file, |var| std::env::var(var).ok())
    }

    /// Returns the default config.
    pub fn default_config() -> Self {
        Self::make_default_config()
            .build()
            .expect("default config is always valid")
            .try_deserialize()
            .expect("default config is always valid")
    }

    /// Checks that the config has everything required to synchronize a run.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let required = [
            (self.api.url.as_str(), "api.url", "CASESYNC_API_URL"),
            (self.api.token.as_str(), "api.token", "CASESYNC_API_TOKEN"),
            (
                self.run.project_key.as_str(),
                "run.project-key",
                "CASESYNC_PROJECT_KEY",
            ),
        ];
        for (value, key, env_var) in required {
            if value.trim().is_empty() {
                return Err(ConfigValidationError::MissingKey { key, env_var });
            }
        }
        Ok(())
    }

    // ---
    // Helper methods
    // ---

    pub(crate) fn from_sources_with_env(
        dir: &Utf8Path,
        config_file: Option<&Utf8Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigParseError> {
        let (config_file, source): (Utf8PathBuf, _) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = dir.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let mut builder = Self::make_default_config().add_source(source);
        for &(key, var) in Self::ENV_OVERRIDES {
            builder = builder
                .set_override_option(key, env(var))
                .map_err(|err| ConfigParseError::new(config_file.clone(), err))?;
        }

        builder
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|err| ConfigParseError::new(config_file, err))
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }
}

/// Connection settings for the remote API.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ApiConfig {
    /// The base URL of the API.
    pub url: String,

    /// The bearer token sent with every request.
    pub token: String,

    /// The timeout applied to every request.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("url", &self.url)
            .field(
                "token",
                &if self.token.is_empty() {
                    "(unset)"
                } else {
                    "(redacted)"
                },
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Identifies where the run's results go.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RunConfig {
    /// The key of the remote project.
    pub project_key: String,

    /// The name of the remote run.
    #[serde(default)]
    pub name: Option<String>,

    /// The name of the environment to associate the run with.
    #[serde(default)]
    pub environment: Option<String>,

    /// The name of the cycle to associate the run with.
    #[serde(default)]
    pub cycle: Option<String>,
}

impl RunConfig {
    /// Returns the configured run name, or a name derived from `started_at`.
    pub fn run_name<Tz>(&self, started_at: DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => format!(
                "Automated run {}",
                started_at.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
        }
    }

    /// Returns the configured environment name, if it is set and non-empty.
    pub fn environment_name(&self) -> Option<&str> {
        non_empty(self.environment.as_deref())
    }

    /// Returns the configured cycle name, if it is set and non-empty.
    pub fn cycle_name(&self) -> Option<&str> {
        non_empty(self.cycle.as_deref())
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Toggles and sizes for synchronization.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SyncConfig {
    /// Create remote test cases for tests that match nothing.
    pub auto_create_test_cases: bool,

    /// Upload captured output.
    pub upload_logs: bool,

    /// File defects for failed results.
    pub auto_create_defects: bool,

    /// The number of results submitted per request.
    pub batch_size: NonZeroUsize,

    /// The maximum number of characters per uploaded log chunk.
    pub log_chunk_size: NonZeroUsize,

    /// The status a run finalizes with if every result was skipped.
    pub all_skipped_status: AllSkippedStatus,
}

/// The status a run consisting solely of skipped results finalizes with.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AllSkippedStatus {
    /// Treat the run as passed.
    #[default]
    Passed,

    /// Finalize the run as skipped.
    Skipped,
}

impl AllSkippedStatus {
    /// Returns the run status this policy maps to.
    pub fn to_run_status(self) -> RunStatus {
        match self {
            Self::Passed => RunStatus::Passed,
            Self::Skipped => RunStatus::Skipped,
        }
    }
}

/// Fields used for automatically filed defects.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DefectConfig {
    /// Prefixed to the test title to form the defect title.
    pub title_prefix: String,

    /// The defect severity.
    pub severity: String,

    /// The defect priority.
    pub priority: String,

    /// The defect type.
    pub defect_type: String,
}

/// Defaults for automatically created test cases.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TestCaseDefaults {
    /// The case priority.
    pub priority: String,

    /// The case type.
    pub case_type: String,
}
