//! Filter configuration surface.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_buffer_limit() -> usize {
    1024 * 1024
}

fn default_stale_session_timeout_secs() -> u64 {
    5 * 60
}

/// Construction-time configuration for one filter instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Path to a serialized `FileDescriptorSet`, read fully into memory
    /// at filter construction.
    pub descriptor_path: PathBuf,

    /// Fully qualified name of the service to bridge,
    /// e.g. `pkg.Greeter`.
    pub service_name: String,

    /// Ceiling for buffered request or response bytes per call.
    /// Exceeding it aborts the call; there is no streaming fallback.
    #[serde(default = "default_buffer_limit")]
    pub buffer_limit: usize,

    /// Idle time after which an abandoned session is swept.
    #[serde(default = "default_stale_session_timeout_secs")]
    pub stale_session_timeout_secs: u64,
}

impl FilterConfig {
    pub fn new(descriptor_path: impl Into<PathBuf>, service_name: impl Into<String>) -> Self {
        Self {
            descriptor_path: descriptor_path.into(),
            service_name: service_name.into(),
            buffer_limit: default_buffer_limit(),
            stale_session_timeout_secs: default_stale_session_timeout_secs(),
        }
    }

    pub fn stale_session_timeout(&self) -> Duration {
        Duration::from_secs(self.stale_session_timeout_secs)
    }
}

/// Per-route configuration: one boolean forcing pass-through for the
/// route regardless of content-type detection.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RouteConfig {
    #[serde(default)]
    pub disabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_when_omitted() {
        let config: FilterConfig = serde_json::from_str(
            r#"{"descriptor_path": "/etc/bridge/hello.pb", "service_name": "pkg.Greeter"}"#,
        )
        .unwrap();

        assert_eq!(config.buffer_limit, 1024 * 1024);
        assert_eq!(config.stale_session_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_route_config_default_is_enabled() {
        let route: RouteConfig = serde_json::from_str("{}").unwrap();
        assert!(!route.disabled);
    }
}
