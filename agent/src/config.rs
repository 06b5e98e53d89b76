use crate::jwt::Algorithm;
use crate::publish::DeliveryMode;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://cloudiotdevice.googleapis.com/v1";

/// Environmental telemetry edge agent.
#[derive(Debug, Parser)]
#[command(name = "agent", about = "Samples an environmental sensor and publishes readings to a cloud ingestion endpoint")]
pub struct Config {
    /// Cloud project name; also the JWT audience
    #[arg(long, env = "PROJECT_ID")]
    pub project_id: String,

    /// Device registry id at the ingestion endpoint
    #[arg(long, env = "REGISTRY_ID")]
    pub registry_id: String,

    /// Device id within the registry
    #[arg(long, env = "DEVICE_ID")]
    pub device_id: String,

    /// Path to the PEM private key used to sign tokens
    #[arg(long, env = "PRIVATE_KEY_FILE")]
    pub private_key_file: PathBuf,

    /// Signing algorithm for the JWT
    #[arg(long, value_enum)]
    pub algorithm: Algorithm,

    /// Cloud region of the registry
    #[arg(long, default_value = "us-central1")]
    pub cloud_region: String,

    /// Delivery semantics: event (telemetry stream) or state (latest value)
    #[arg(long, value_enum, default_value_t = DeliveryMode::Event)]
    pub message_type: DeliveryMode,

    /// Base URL of the ingestion endpoint
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Maximum token age before it is reissued, in minutes
    #[arg(long, default_value_t = 60)]
    pub token_max_age_minutes: i64,

    /// Numeric device identifier carried in each message (distinct from
    /// the registry device id)
    #[arg(long, default_value_t = 999)]
    pub id: u32,

    /// Longitude of this device in degrees, e.g. 35.658581
    #[arg(long, default_value_t = 0.0)]
    pub longitude: f64,

    /// Latitude of this device in degrees, e.g. 139.745433
    #[arg(long, default_value_t = 0.0)]
    pub latitude: f64,

    /// File the failure sink appends undelivered messages to
    #[arg(long, default_value = "send_ng_message.txt")]
    pub failure_log: PathBuf,

    /// Seconds between ticks in event mode
    #[arg(long, default_value_t = 300)]
    pub event_interval_secs: u64,

    /// Seconds between ticks in state mode
    #[arg(long, default_value_t = 5)]
    pub state_interval_secs: u64,

    /// Timeout for each publish request, in seconds
    #[arg(long, default_value_t = 10)]
    pub request_timeout_secs: u64,
}

impl Config {
    /// Sleep interval between ticks, chosen by delivery mode.
    pub fn publish_interval(&self) -> Duration {
        match self.message_type {
            DeliveryMode::Event => Duration::from_secs(self.event_interval_secs),
            DeliveryMode::State => Duration::from_secs(self.state_interval_secs),
        }
    }
}
