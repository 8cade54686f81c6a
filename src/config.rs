use anyhow::{Context, Result};
use serde::Deserialize;

/// Application configuration
///
/// Loaded from a config file (any format the `config` crate understands,
/// selected by stem) with `INTERVIEW__SECTION__KEY` environment overrides.
/// Every section falls back to its defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub audio: AudioConfig,
    pub session: SessionSettings,
    pub control: ControlConfig,
}

/// Interview REST API the core talks to
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Bearer token, issued and refreshed elsewhere
    pub token: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            token: String::new(),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub frame_duration_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            echo_cancellation: true,
            noise_suppression: true,
            frame_duration_ms: 100,
        }
    }
}

/// Timing of the interview flow, in seconds (tick in milliseconds)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub segment_window_secs: u64,
    pub budget_secs: u64,
    pub timeout_grace_secs: u64,
    pub advance_grace_secs: u64,
    pub tick_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            segment_window_secs: 11,
            budget_secs: 20 * 60,
            timeout_grace_secs: 10,
            advance_grace_secs: 2,
            tick_ms: 1000,
        }
    }
}

/// Local control API used by the host shell
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 7310,
        }
    }
}

impl AppConfig {
    /// Load `path` (file stem, extension optional). A missing file is not an
    /// error; defaults and environment overrides still apply.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("INTERVIEW").separator("__"))
            .build()
            .with_context(|| format!("Failed to read config {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }
}
