//! Configuration types for outdial

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Queue behavior (engine concurrency, post-drain grace period)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Concurrency limit passed to the engine — the maximum number of jobs
    /// it will execute simultaneously (default: 10)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Grace period between the last job draining and process exit,
    /// allowing in-flight report writes and logging to flush (default: 10s)
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

/// Input CSV parsing options, passed through to the reader
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CsvConfig {
    /// Field delimiter byte (default: `,`)
    #[serde(default = "default_delimiter")]
    pub delimiter: u8,

    /// Quote byte (default: `"`)
    #[serde(default = "default_quote")]
    pub quote: u8,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            quote: default_quote(),
        }
    }
}

/// Fixed per-conversation settings applied before executing a ready job
///
/// Pass-through configuration values; the coordinator never computes them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationSettings {
    /// Ambient-noise volume mixed into the call audio (default: 0.1)
    #[serde(default = "default_noise_volume")]
    pub noise_volume: f64,

    /// Named telephony transport profile (default: "default")
    #[serde(default = "default_profile")]
    pub sip_profile: String,

    /// Named speech-synthesis profile (default: "default")
    #[serde(default = "default_profile")]
    pub tts_profile: String,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            noise_volume: default_noise_volume(),
            sip_profile: default_profile(),
            tts_profile: default_profile(),
        }
    }
}

/// Application deployment options
///
/// The project directory holds the dialog application and the platform
/// connection manifest; see [`crate::engine::platform`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Path to the dialog application project (default: "./app")
    #[serde(default = "default_project_path")]
    pub project_path: PathBuf,

    /// Application group to deploy into (default: "Default")
    #[serde(default = "default_group_name")]
    pub group_name: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            project_path: default_project_path(),
            group_name: default_group_name(),
        }
    }
}

/// Main configuration for a batch run
///
/// Fields are organized into logical sub-configs:
/// - [`queue`](QueueConfig) — engine concurrency, shutdown grace
/// - [`csv`](CsvConfig) — input parsing options
/// - [`conversation`](ConversationSettings) — per-call pass-through settings
/// - [`deploy`](DeployConfig) — application project and group
///
/// Sub-config fields are flattened for serialization, so the JSON/TOML
/// format stays flat (no nesting).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Queue behavior settings
    #[serde(flatten)]
    pub queue: QueueConfig,

    /// Input CSV parsing options
    #[serde(flatten)]
    pub csv: CsvConfig,

    /// Per-conversation pass-through settings
    #[serde(flatten)]
    pub conversation: ConversationSettings,

    /// Application deployment options
    #[serde(flatten)]
    pub deploy: DeployConfig,
}

fn default_concurrency() -> usize {
    10
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(10)
}

fn default_delimiter() -> u8 {
    b','
}

fn default_quote() -> u8 {
    b'"'
}

fn default_noise_volume() -> f64 {
    0.1
}

fn default_profile() -> String {
    "default".to_string()
}

fn default_project_path() -> PathBuf {
    PathBuf::from("./app")
}

fn default_group_name() -> String {
    "Default".to_string()
}
