use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub server: ServerSettings,
    pub backend: BackendSettings,
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub adjustment: AdjustmentSettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct BackendSettings {
    /// Base URL of the project costs REST API (e.g. http://backend:7115/api).
    pub base_url: String,
    /// Request timeout. Unset means requests wait for the backend indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl BackendSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct TelemetrySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// OTLP collector endpoint. Spans are only exported when set.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Deserialize, Clone, Debug)]
pub struct AdjustmentSettings {
    /// Whether bulk adjustments also scale a material's tax rate percentage.
    #[serde(default = "default_scale_tax_rate")]
    pub scale_tax_rate: bool,
}

impl Default for AdjustmentSettings {
    fn default() -> Self {
        Self {
            scale_tax_rate: default_scale_tax_rate(),
        }
    }
}

fn default_scale_tax_rate() -> bool {
    true
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().map_err(|e| {
        config::ConfigError::Message(format!("Failed to determine the current directory: {}", e))
    })?;

    // Allow running from the workspace root or from inside the crate
    let configuration_directory = if base_path.ends_with("costing-service") {
        base_path.join("config")
    } else {
        base_path.join("costing-service").join("config")
    };

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")).required(true))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
