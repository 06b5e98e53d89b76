mod config;
mod errors;
mod failure_log;
mod jwt;
mod message;
mod publish;
mod sensor;

use clap::Parser;
use config::Config;
use failure_log::FailureSink;
use jwt::AuthToken;
use message::TelemetryMessage;
use publish::{PublishOutcome, Publisher};
use sensor::{SensorSource, SimulatedSensor};
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = Config::parse();

    info!("Starting telemetry agent");
    info!(
        "Device {} in registry {} ({:?} mode)",
        config.device_id, config.registry_id, config.message_type
    );

    // Startup-class failures abort before the loop starts.
    let mut token = match jwt::issue(&config.project_id, &config.private_key_file, config.algorithm)
    {
        Ok(token) => token,
        Err(e) => {
            error!("Failed to create initial JWT: {}", e);
            std::process::exit(1);
        }
    };

    let publisher = match Publisher::new(&config) {
        Ok(publisher) => publisher,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let sink = FailureSink::new(config.failure_log.clone());
    let mut sensor = SimulatedSensor;
    let interval = config.publish_interval();

    info!("Publishing to {} every {:?}", publisher.url(), interval);

    loop {
        tick(&config, &mut token, &publisher, &sink, &mut sensor).await;
        tokio::time::sleep(interval).await;
    }
}

/// One scheduled pass: refresh token if stale, sample, publish, and preserve
/// the message on delivery failure. Every error is contained here so a bad
/// tick never stops the loop.
async fn tick(
    config: &Config,
    token: &mut AuthToken,
    publisher: &Publisher,
    sink: &FailureSink,
    sensor: &mut dyn SensorSource,
) {
    // (1) Refresh the token if it exceeded its max age.
    match jwt::refresh_if_stale(
        token,
        &config.project_id,
        &config.private_key_file,
        config.token_max_age_minutes,
    ) {
        Ok(Some(fresh)) => *token = fresh,
        Ok(None) => {}
        Err(e) => {
            // Without a valid token nothing can be sent this tick, so the
            // reading is preserved as a delivery failure. The stale token
            // stays in place and the next tick retries the refresh.
            warn!("Token refresh failed: {}", e);
            match message::build_message(sensor, config.id, config.longitude, config.latitude) {
                Ok(message) => record(sink, &message).await,
                Err(e) => warn!("Sensor read failed, skipping tick: {}", e),
            }
            return;
        }
    }

    // (2) Build the message; a sampling failure abandons the tick without
    // touching the failure log.
    let message = match message::build_message(sensor, config.id, config.longitude, config.latitude)
    {
        Ok(message) => message,
        Err(e) => {
            warn!("Sensor read failed, skipping tick: {}", e);
            return;
        }
    };

    // (3) Publish and (4) preserve on any failure outcome. Retry is
    // implicit via the next tick.
    match publisher.publish(&message, &token.token).await {
        Ok(PublishOutcome::Delivered) => {
            debug!("Delivered message built at {}", message.device_datetime);
        }
        Ok(PublishOutcome::Rejected(status)) => {
            warn!("Publish rejected with status {}", status);
            record(sink, &message).await;
        }
        Ok(PublishOutcome::Unreachable(reason)) => {
            warn!("Endpoint unreachable: {}", reason);
            record(sink, &message).await;
        }
        Err(e) => {
            error!("Publish attempt failed: {}", e);
            record(sink, &message).await;
        }
    }
}

async fn record(sink: &FailureSink, message: &TelemetryMessage) {
    if let Err(e) = sink.record_failure(message).await {
        error!("Failed to record undelivered message: {}", e);
    }
}
