use serde::Deserialize;
use std::path::PathBuf;

use crate::services::analysis::CloudProvider;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// SQLite connection string (e.g., "sqlite://calosnap.db").
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Analysis backend selected at startup ("openai" or "gemini");
    /// switchable at runtime via the API.
    #[serde(default = "default_provider")]
    pub cloud_provider: CloudProvider,

    #[serde(default)]
    pub openai_api_key: String,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    #[serde(default)]
    pub gemini_api_key: String,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    /// Path to the food/non-food ONNX screen model. Unset disables the gate.
    #[serde(default)]
    pub classifier_model_path: Option<PathBuf>,

    /// Notification gateway base URL. Unset logs notifications instead.
    #[serde(default)]
    pub notify_webhook_url: Option<String>,

    /// How often the scheduler re-checks connectivity while a deferred job
    /// waits for its precondition, in milliseconds.
    #[serde(default = "default_connectivity_poll_ms")]
    pub connectivity_poll_ms: u64,

    /// First retry delay after a failed drain, in milliseconds. Doubles per
    /// retry up to `drain_backoff_max_ms`.
    #[serde(default = "default_drain_backoff_ms")]
    pub drain_backoff_ms: u64,

    #[serde(default = "default_drain_backoff_max_ms")]
    pub drain_backoff_max_ms: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_database_url() -> String {
    "sqlite://calosnap.db".to_string()
}

fn default_provider() -> CloudProvider {
    CloudProvider::OpenAi
}

fn default_openai_model() -> String {
    "gpt-4o".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash-exp".to_string()
}

fn default_connectivity_poll_ms() -> u64 {
    5_000
}

fn default_drain_backoff_ms() -> u64 {
    30_000
}

fn default_drain_backoff_max_ms() -> u64 {
    900_000
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
