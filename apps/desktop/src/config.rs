use std::{collections::HashMap, path::Path, time::Duration};

use anyhow::Context;
use client_core::{source::DEFAULT_BASE_URL, BrowserSettings};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "browser.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub github_user: String,
    /// `0` disables the load ceiling.
    pub load_timeout_ms: u64,
    pub sensor_interval_ms: u64,
    pub origin_latitude: f64,
    pub origin_longitude: f64,
    /// `0` runs until Ctrl-C.
    pub run_for_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            github_user: "octocat".into(),
            load_timeout_ms: 2_000,
            sensor_interval_ms: 1_000,
            origin_latitude: 52.52,
            origin_longitude: 13.405,
            run_for_secs: 5,
        }
    }
}

impl Settings {
    pub fn browser(&self) -> BrowserSettings {
        BrowserSettings {
            load_timeout: (self.load_timeout_ms > 0)
                .then(|| Duration::from_millis(self.load_timeout_ms)),
        }
    }

    pub fn sensor_interval(&self) -> Duration {
        Duration::from_millis(self.sensor_interval_ms)
    }

    pub fn run_for(&self) -> Option<Duration> {
        (self.run_for_secs > 0).then(|| Duration::from_secs(self.run_for_secs))
    }
}

/// Defaults, then `path` if it exists, then `APP__*` variables.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    build_settings(path, None)
}

fn build_settings(path: &Path, env: Option<HashMap<String, String>>) -> anyhow::Result<Settings> {
    let defaults = Config::try_from(&Settings::default()).context("encode default settings")?;
    let environment = Environment::with_prefix("APP")
        .separator("__")
        .try_parsing(true)
        .source(env);

    Config::builder()
        .add_source(defaults)
        .add_source(File::from(path).required(false))
        .add_source(environment)
        .build()
        .and_then(Config::try_deserialize)
        .with_context(|| format!("failed to load settings from '{}'", path.display()))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
