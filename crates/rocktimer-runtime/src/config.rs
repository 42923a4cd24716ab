//! Service configuration
//!
//! Layered: built-in defaults, then an optional file (format from its
//! extension), then `ROCKTIMER_*` environment variables. Nested keys use a
//! double underscore, e.g. `ROCKTIMER_SPEECH__ENABLED=true`.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Deserializer};

use rocktimer_core::{CheckpointId, RockTimerError, RockTimerResult};

const ENV_PREFIX: &str = "ROCKTIMER";

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging settings
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive; `RUST_LOG` takes precedence when set
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Spoken announcements
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub enabled: bool,
    /// Program and arguments; the phrase is appended as the last argument
    pub command: Vec<String>,
    pub announce_second_split: bool,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        SpeechConfig {
            enabled: false,
            command: ["espeak-ng", "-v", "en", "-s", "150"]
                .into_iter()
                .map(String::from)
                .collect(),
            announce_second_split: false,
        }
    }
}

/// Coordinator host configuration
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Sensor datagram endpoint
    pub udp_bind: SocketAddr,
    /// Control surface endpoint
    pub http_bind: SocketAddr,
    /// Checkpoint wired to this host; empty or "none" for a pure coordinator
    #[serde(deserialize_with = "deserialize_checkpoint")]
    pub local_checkpoint: Option<CheckpointId>,
    /// A remote sensor is offline once its last message is older than this
    #[serde(deserialize_with = "deserialize_duration")]
    pub liveness_timeout: Duration,
    /// How often liveness transitions are checked
    #[serde(deserialize_with = "deserialize_duration")]
    pub liveness_poll_interval: Duration,
    /// Datagrams queued between the socket and the coordinator
    pub ingress_buffer: usize,
    /// Announcements queued for speech and logging
    pub announcement_buffer: usize,
    pub speech: SpeechConfig,
    pub logging: LoggingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            udp_bind: SocketAddr::from(([0, 0, 0, 0], 5000)),
            http_bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            local_checkpoint: Some(CheckpointId::HogClose),
            liveness_timeout: Duration::from_secs(10),
            liveness_poll_interval: Duration::from_secs(1),
            ingress_buffer: 1024,
            announcement_buffer: 16,
            speech: SpeechConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> RockTimerResult<Self> {
        let config: ServerConfig = load_layered(path, &["speech.command"])?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RockTimerResult<()> {
        if self.liveness_timeout.is_zero() {
            return Err(RockTimerError::Config("liveness_timeout must be positive".into()));
        }
        if self.liveness_poll_interval.is_zero() {
            return Err(RockTimerError::Config(
                "liveness_poll_interval must be positive".into(),
            ));
        }
        if self.ingress_buffer == 0 || self.announcement_buffer == 0 {
            return Err(RockTimerError::Config("buffer sizes must be positive".into()));
        }
        Ok(())
    }
}

/// Remote sensor configuration
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Checkpoint this sensor reports as
    pub device_id: String,
    /// Coordinator `host:port`
    pub server: String,
    /// Local socket; port 0 picks any
    pub bind: SocketAddr,
    #[serde(deserialize_with = "deserialize_duration")]
    pub heartbeat_interval: Duration,
    pub logging: LoggingConfig,
}

impl Default for SensorConfig {
    fn default() -> Self {
        SensorConfig {
            device_id: CheckpointId::Tee.as_str().to_string(),
            server: "127.0.0.1:5000".to_string(),
            bind: SocketAddr::from(([0, 0, 0, 0], 0)),
            heartbeat_interval: Duration::from_secs(2),
            logging: LoggingConfig::default(),
        }
    }
}

impl SensorConfig {
    pub fn load(path: Option<&Path>) -> RockTimerResult<Self> {
        let config: SensorConfig = load_layered(path, &[])?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RockTimerResult<()> {
        if self.device_id.is_empty() {
            return Err(RockTimerError::Config("device_id must not be empty".into()));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(RockTimerError::Config(
                "heartbeat_interval must be positive".into(),
            ));
        }
        if CheckpointId::parse(&self.device_id).is_none() {
            tracing::warn!(device_id = %self.device_id, "device id is not a known checkpoint");
        }
        Ok(())
    }
}

fn load_layered<T>(path: Option<&Path>, list_keys: &[&str]) -> RockTimerResult<T>
where
    T: for<'de> Deserialize<'de>,
{
    let mut builder = Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(File::from(path));
    }

    let mut env = Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true);
    if !list_keys.is_empty() {
        env = env.list_separator(" ");
        for key in list_keys {
            env = env.with_list_parse_key(key);
        }
    }
    builder = builder.add_source(env);

    builder
        .build()
        .and_then(|config| config.try_deserialize())
        .map_err(|e| RockTimerError::Config(e.to_string()))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DurationRepr {
    Text(String),
    Seconds(u64),
}

/// Accepts humantime strings ("10s", "1500ms") or whole seconds
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    match DurationRepr::deserialize(deserializer)? {
        DurationRepr::Text(text) => {
            humantime::parse_duration(&text).map_err(serde::de::Error::custom)
        }
        DurationRepr::Seconds(secs) => Ok(Duration::from_secs(secs)),
    }
}

fn deserialize_checkpoint<'de, D>(deserializer: D) -> Result<Option<CheckpointId>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = Option::<String>::deserialize(deserializer)?;
    match text.as_deref().map(str::trim) {
        None | Some("") | Some("none") => Ok(None),
        Some(name) => CheckpointId::parse(name)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown checkpoint: {}", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "rocktimer-{}-{}",
            std::process::id(),
            name
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.udp_bind.port(), 5000);
        assert_eq!(config.http_bind.port(), 8080);
        assert_eq!(config.local_checkpoint, Some(CheckpointId::HogClose));
        assert_eq!(config.liveness_timeout, Duration::from_secs(10));
        assert!(!config.speech.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let path = temp_file(
            "server.toml",
            r#"
udp_bind = "127.0.0.1:6000"
local_checkpoint = "none"
liveness_timeout = "2500ms"

[speech]
enabled = true
announce_second_split = true
"#,
        );

        let config = ServerConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.udp_bind.port(), 6000);
        assert_eq!(config.local_checkpoint, None);
        assert_eq!(config.liveness_timeout, Duration::from_millis(2500));
        assert!(config.speech.enabled);
        assert!(config.speech.announce_second_split);
        // Untouched keys keep their defaults
        assert_eq!(config.http_bind.port(), 8080);
        assert_eq!(config.speech.command[0], "espeak-ng");
    }

    #[test]
    fn test_unknown_checkpoint_rejected() {
        let path = temp_file("bad.toml", "local_checkpoint = \"center_line\"\n");
        let result = ServerConfig::load(Some(&path));
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(RockTimerError::Config(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let path = temp_file("zero.toml", "liveness_timeout = 0\n");
        let result = ServerConfig::load(Some(&path));
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(RockTimerError::Config(_))));
    }

    #[test]
    fn test_sensor_config_file() {
        let path = temp_file(
            "sensor.toml",
            "device_id = \"hog_far\"\nserver = \"10.0.0.5:5000\"\nheartbeat_interval = 1\n",
        );
        let config = SensorConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.device_id, "hog_far");
        assert_eq!(config.server, "10.0.0.5:5000");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_sensor_requires_device_id() {
        let config = SensorConfig {
            device_id: String::new(),
            ..SensorConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
