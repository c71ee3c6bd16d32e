use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "amicale.toml",
    "config/amicale.toml",
    "crates/config/amicale.toml",
    "../amicale.toml",
    "../config/amicale.toml",
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub realtime: RealtimeConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7080,
        }
    }
}

/// Tunables for the presence and chat relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// How many recent chat messages are retained and replayed on connect.
    #[serde(default = "RealtimeConfig::default_history_capacity")]
    pub history_capacity: usize,
    /// Maximum chat body length in characters; longer sends are rejected.
    #[serde(default = "RealtimeConfig::default_max_message_len")]
    pub max_message_len: usize,
    /// A connection with no inbound frame for this long is closed.
    #[serde(default = "RealtimeConfig::default_heartbeat_timeout")]
    pub heartbeat_timeout_seconds: u64,
    /// Per-connection outbound queue depth; events past this are dropped.
    #[serde(default = "RealtimeConfig::default_send_queue_capacity")]
    pub send_queue_capacity: usize,
    #[serde(default)]
    pub chat_rate_limit: ChatRateLimitConfig,
}

impl RealtimeConfig {
    const fn default_history_capacity() -> usize {
        100
    }

    const fn default_max_message_len() -> usize {
        2000
    }

    const fn default_heartbeat_timeout() -> u64 {
        30
    }

    const fn default_send_queue_capacity() -> usize {
        64
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            history_capacity: Self::default_history_capacity(),
            max_message_len: Self::default_max_message_len(),
            heartbeat_timeout_seconds: Self::default_heartbeat_timeout(),
            send_queue_capacity: Self::default_send_queue_capacity(),
            chat_rate_limit: ChatRateLimitConfig::default(),
        }
    }
}

/// Fixed-window limit on chat sends per connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRateLimitConfig {
    pub max_messages: u32,
    pub per_seconds: u64,
}

impl Default for ChatRateLimitConfig {
    fn default() -> Self {
        Self {
            max_messages: 10,
            per_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "AuthConfig::default_session_ttl")]
    pub session_ttl_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_seconds: 86_400,
        }
    }
}

impl AuthConfig {
    const fn default_session_ttl() -> u64 {
        86_400
    }
}

/// Load the application configuration by combining defaults, an optional
/// configuration file, and `AMICALE__` environment overrides.
///
/// ```
/// use amicale_config::load;
///
/// std::env::remove_var("AMICALE_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// assert_eq!(config.realtime.history_capacity, 100);
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder();
    builder = builder
        .set_default("http.address", defaults.http.address.clone())
        .unwrap()
        .set_default("http.port", i64::from(defaults.http.port))
        .unwrap()
        .set_default(
            "realtime.history_capacity",
            defaults.realtime.history_capacity as i64,
        )
        .unwrap()
        .set_default(
            "realtime.max_message_len",
            defaults.realtime.max_message_len as i64,
        )
        .unwrap()
        .set_default(
            "realtime.heartbeat_timeout_seconds",
            defaults.realtime.heartbeat_timeout_seconds as i64,
        )
        .unwrap()
        .set_default(
            "realtime.send_queue_capacity",
            defaults.realtime.send_queue_capacity as i64,
        )
        .unwrap()
        .set_default(
            "realtime.chat_rate_limit.max_messages",
            i64::from(defaults.realtime.chat_rate_limit.max_messages),
        )
        .unwrap()
        .set_default(
            "realtime.chat_rate_limit.per_seconds",
            defaults.realtime.chat_rate_limit.per_seconds as i64,
        )
        .unwrap()
        .set_default(
            "auth.session_ttl_seconds",
            defaults.auth.session_ttl_seconds as i64,
        )
        .unwrap();

    let environment_overrides = config::Environment::with_prefix("AMICALE").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("AMICALE_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via AMICALE_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    debug!(?config, "loaded realtime backend configuration");
    Ok(config)
}
