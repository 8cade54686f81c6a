use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::SessionSettings;

/// Configuration for one interview session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session identifier the API scopes uploads and follow-ups to
    pub session_id: String,

    /// Total time for the whole interview
    /// Default: 20 minutes
    pub budget: Duration,

    /// Length of each self-contained audio segment
    /// Default: 11 seconds
    pub segment_window: Duration,

    /// Wait after time-out before finishing, for trailing transcriptions
    pub timeout_grace: Duration,

    /// Wait after stopping recording on advance
    pub advance_grace: Duration,

    /// Timer tick period
    pub tick_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("interview-{}", uuid::Uuid::new_v4()),
            budget: Duration::from_secs(20 * 60),
            segment_window: Duration::from_secs(11),
            timeout_grace: Duration::from_secs(10),
            advance_grace: Duration::from_secs(2),
            tick_interval: Duration::from_secs(1),
        }
    }
}

impl SessionConfig {
    pub fn from_settings(session_id: impl Into<String>, settings: &SessionSettings) -> Self {
        Self {
            session_id: session_id.into(),
            budget: Duration::from_secs(settings.budget_secs),
            segment_window: Duration::from_secs(settings.segment_window_secs.max(1)),
            timeout_grace: Duration::from_secs(settings.timeout_grace_secs),
            advance_grace: Duration::from_secs(settings.advance_grace_secs),
            tick_interval: Duration::from_millis(settings.tick_ms.max(1)),
        }
    }
}
