// Settings - plain container configuration loaded from file and environment

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::application::worker::constants::DEFAULT_YIELD_EVERY;
use crate::error::Result;

/// Environment variable prefix (`SURGE_KIND`, `SURGE_MSG_LEN`, ...)
pub const ENV_PREFIX: &str = "SURGE";

/// Serializable container settings
///
/// Turned into a typed `ContainerConfig` by `ContainerConfig::from_settings`,
/// which is where an unknown `kind` is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSettings {
    /// `channel` or `cache`
    pub kind: String,
    /// Channel: buffer capacity. Cache: length threshold (0 = unbounded).
    pub msg_len: i64,
    /// Channel: idle keep-alive. Cache: read timeout. Seconds, <= 0 = default.
    pub idle_keep_alive_secs: i64,
    pub yield_every: u32,
    pub max_restarts: Option<u64>,
    pub queue_key: Option<String>,
    pub redis_url: Option<String>,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            kind: "channel".to_string(),
            msg_len: 64,
            idle_keep_alive_secs: 0,
            yield_every: DEFAULT_YIELD_EVERY,
            max_restarts: None,
            queue_key: None,
            redis_url: None,
        }
    }
}

/// Load settings: defaults, then the optional file, then `SURGE_*` variables
pub fn load_settings(path: Option<&Path>) -> Result<ContainerSettings> {
    load_settings_from(path, None)
}

/// Same as `load_settings` with an explicit environment (None = process env)
pub fn load_settings_from(
    path: Option<&Path>,
    env: Option<config::Map<String, String>>,
) -> Result<ContainerSettings> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }
    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .source(env),
    );

    let settings = builder.build()?.try_deserialize::<ContainerSettings>()?;
    tracing::debug!(?settings, "Settings loaded");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> Option<config::Map<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_defaults_without_sources() {
        let settings = load_settings_from(None, env(&[])).unwrap();
        assert_eq!(settings, ContainerSettings::default());
    }

    #[test]
    fn test_file_then_env_override() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "kind = \"cache\"\nmsg_len = 5\nidle_keep_alive_secs = 2\nredis_url = \"redis://127.0.0.1:6379\""
        )
        .unwrap();

        let from_file = load_settings_from(Some(file.path()), env(&[])).unwrap();
        assert_eq!(from_file.kind, "cache");
        assert_eq!(from_file.msg_len, 5);
        assert_eq!(from_file.idle_keep_alive_secs, 2);
        assert_eq!(from_file.redis_url.as_deref(), Some("redis://127.0.0.1:6379"));
        assert_eq!(from_file.yield_every, DEFAULT_YIELD_EVERY);

        let overridden =
            load_settings_from(Some(file.path()), env(&[("SURGE_MSG_LEN", "12")])).unwrap();
        assert_eq!(overridden.msg_len, 12);
        assert_eq!(overridden.kind, "cache");
    }

    #[test]
    fn test_env_only() {
        let settings =
            load_settings_from(None, env(&[("SURGE_KIND", "cache"), ("SURGE_MAX_RESTARTS", "3")]))
                .unwrap();
        assert_eq!(settings.kind, "cache");
        assert_eq!(settings.max_restarts, Some(3));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = load_settings_from(Some(Path::new("/nonexistent/surge.toml")), env(&[]))
            .unwrap_err();
        assert!(matches!(err, crate::AppError::Config(_)));
    }
}
