use crate::errors::Result;
use crate::sensor::SensorSource;
use chrono::Local;
use serde::{Deserialize, Serialize};

/// One telemetry record in the ingestion endpoint's schema. Field
/// declaration order is wire order; never mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryMessage {
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(rename = "LOCATION_LOGI")]
    pub longitude: f64,
    #[serde(rename = "LOCATION_LATI")]
    pub latitude: f64,
    #[serde(rename = "DEVICE_DATETIME")]
    pub device_datetime: String,
    #[serde(rename = "TEMPERATURE")]
    pub temperature: f64,
    #[serde(rename = "PRESSURE")]
    pub pressure: f64,
    #[serde(rename = "HUMIDITY")]
    pub humidity: f64,
}

impl TelemetryMessage {
    /// Renders the record as one failure-log line, newline-terminated.
    /// Floats keep a trailing `.0` so the log matches the JSON wire form.
    pub fn csv_line(&self) -> String {
        format!(
            "{},{},{},{},{},{},{}\n",
            self.id,
            fmt_float(self.longitude),
            fmt_float(self.latitude),
            self.device_datetime,
            fmt_float(self.temperature),
            fmt_float(self.pressure),
            fmt_float(self.humidity)
        )
    }
}

fn fmt_float(value: f64) -> String {
    if value.is_finite() && value == value.trunc() {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Samples the sensor once and assembles a telemetry record. The timestamp
/// is captured here, at build time, with second precision in local naive
/// time. A sensor failure aborts the build; no record is produced.
pub fn build_message(
    source: &mut dyn SensorSource,
    id: u32,
    longitude: f64,
    latitude: f64,
) -> Result<TelemetryMessage> {
    let reading = source.sample()?;
    let device_datetime = Local::now().format("%Y-%m-%dT%H:%M:%S").to_string();

    Ok(TelemetryMessage {
        id,
        longitude,
        latitude,
        device_datetime,
        temperature: reading.temperature,
        pressure: reading.pressure,
        humidity: reading.humidity,
    })
}
