use serde::Deserialize;

pub use config::ConfigError;

pub const DEFAULT_EXPO_ENDPOINT: &str = "https://exp.host/--/api/v2/push/send";

pub const DEFAULT_FCM_MAX_CONCURRENT_SENDS: usize = 50;

/// Expo documents 100 messages as the per-request limit.
pub const DEFAULT_EXPO_CHUNK_SIZE: usize = 100;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub redis: RedisSettings,
    pub fcm: FcmSettings,
    #[serde(default)]
    pub expo: ExpoSettings,
    #[serde(default)]
    pub service: ServiceSettings,
    #[serde(default = "default_server_settings")]
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisSettings {
    pub url: String, // Loaded via env var typically
    pub connection_pool_size: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FcmSettings {
    pub project_id: String,
    /// Upper bound on FCM requests in flight for one message.
    #[serde(default = "default_fcm_max_concurrent_sends")]
    pub max_concurrent_sends: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub send_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExpoSettings {
    #[serde(default = "default_expo_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_expo_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Only needed when "enhanced push security" is enabled on the Expo project.
    pub access_token: Option<String>,
}

impl Default for ExpoSettings {
    fn default() -> Self {
        Self {
            endpoint: default_expo_endpoint(),
            chunk_size: default_expo_chunk_size(),
            request_timeout_secs: default_request_timeout_secs(),
            access_token: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceSettings {
    #[serde(default = "default_processed_message_ttl_secs")]
    pub processed_message_ttl_secs: u64,
    #[serde(default = "default_event_queue_size")]
    pub event_queue_size: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            processed_message_ttl_secs: default_processed_message_ttl_secs(),
            event_queue_size: default_event_queue_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_server_settings() -> ServerSettings {
    ServerSettings {
        listen_addr: default_listen_addr(),
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_fcm_max_concurrent_sends() -> usize {
    DEFAULT_FCM_MAX_CONCURRENT_SENDS
}

fn default_expo_endpoint() -> String {
    DEFAULT_EXPO_ENDPOINT.to_string()
}

fn default_expo_chunk_size() -> usize {
    DEFAULT_EXPO_CHUNK_SIZE
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_processed_message_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_event_queue_size() -> usize {
    1000
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = std::env::current_dir()
            .map_err(|e| ConfigError::Message(format!("Failed to get current dir: {}", e)))?;
        let config_path = config_dir.join("config").join("settings.yaml");

        let s = config::Config::builder()
            .add_source(config::File::from(config_path).required(true))
            // Eg.. `MESSAGE_PUSH__REDIS__URL=redis://...` would override `redis.url`
            .add_source(config::Environment::with_prefix("MESSAGE_PUSH").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
