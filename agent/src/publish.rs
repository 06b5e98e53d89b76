use crate::config::Config;
use crate::errors::Result;
use crate::message::TelemetryMessage;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use clap::ValueEnum;
use reqwest::header::{AUTHORIZATION, CACHE_CONTROL};
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;

/// Delivery semantics for a published message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeliveryMode {
    /// Append-only telemetry stream (time series)
    Event,
    /// Latest-value overwrite (current snapshot)
    State,
}

impl DeliveryMode {
    fn url_suffix(&self) -> &'static str {
        match self {
            DeliveryMode::Event => "publishEvent",
            DeliveryMode::State => "setState",
        }
    }
}

/// What became of one publish attempt. Rejected and Unreachable both count
/// as delivery failure; the split exists for diagnostics only.
#[derive(Debug)]
pub enum PublishOutcome {
    /// HTTP success status
    Delivered,
    /// Response received with a non-success status
    Rejected(StatusCode),
    /// No response: connection, timeout, or transport error
    Unreachable(String),
}

/// Resolves the full publish URL for one device under the common resource
/// path template.
pub fn publish_url(
    base_url: &str,
    project_id: &str,
    cloud_region: &str,
    registry_id: &str,
    device_id: &str,
    mode: DeliveryMode,
) -> String {
    format!(
        "{}/projects/{}/locations/{}/registries/{}/devices/{}:{}",
        base_url,
        project_id,
        cloud_region,
        registry_id,
        device_id,
        mode.url_suffix()
    )
}

/// Wraps a message in the transport envelope: JSON, then URL-safe base64.
/// State mode nests the same envelope under a `state` key.
pub fn encode_envelope(message: &TelemetryMessage, mode: DeliveryMode) -> Result<serde_json::Value> {
    let payload = serde_json::to_string(message)?;
    let binary_data = URL_SAFE.encode(payload.as_bytes());

    let body = match mode {
        DeliveryMode::Event => json!({ "binary_data": binary_data }),
        DeliveryMode::State => json!({ "state": { "binary_data": binary_data } }),
    };
    Ok(body)
}

/// Sends telemetry to the ingestion endpoint over authenticated HTTPS.
/// Owns the HTTP client; constructed once at startup and passed to the loop.
pub struct Publisher {
    client: reqwest::Client,
    url: String,
    mode: DeliveryMode,
}

impl Publisher {
    pub fn new(config: &Config) -> Result<Self> {
        let url = publish_url(
            &config.base_url,
            &config.project_id,
            &config.cloud_region,
            &config.registry_id,
            &config.device_id,
            config.message_type,
        );
        Self::with_url(
            url,
            config.message_type,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn with_url(url: String, mode: DeliveryMode, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Publisher { client, url, mode })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One delivery attempt. Transport errors (including the request
    /// timeout) classify as Unreachable rather than propagating; the caller
    /// pattern-matches the outcome. No retry here: the next tick is the
    /// retry.
    pub async fn publish(&self, message: &TelemetryMessage, token: &str) -> Result<PublishOutcome> {
        let body = encode_envelope(message, self.mode)?;

        let response = self
            .client
            .post(&self.url)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(CACHE_CONTROL, "no-cache")
            .json(&body)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => Ok(PublishOutcome::Delivered),
            Ok(resp) => Ok(PublishOutcome::Rejected(resp.status())),
            Err(e) => Ok(PublishOutcome::Unreachable(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, State};
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    fn sample_message() -> TelemetryMessage {
        TelemetryMessage {
            id: 999,
            longitude: 35.6586,
            latitude: 139.7454,
            device_datetime: "2026-08-27T12:00:00".to_string(),
            temperature: 21.5,
            pressure: 1013.2,
            humidity: 55.0,
        }
    }

    #[test]
    fn url_has_event_suffix() {
        let url = publish_url(
            "https://cloudiotdevice.googleapis.com/v1",
            "proj",
            "us-central1",
            "reg",
            "dev",
            DeliveryMode::Event,
        );
        assert_eq!(
            url,
            "https://cloudiotdevice.googleapis.com/v1/projects/proj/locations/us-central1/registries/reg/devices/dev:publishEvent"
        );
    }

    #[test]
    fn url_has_state_suffix() {
        let url = publish_url("http://h", "p", "r", "g", "d", DeliveryMode::State);
        assert_eq!(url, "http://h/projects/p/locations/r/registries/g/devices/d:setState");
    }

    #[test]
    fn event_envelope_round_trips_to_original_json() {
        let message = sample_message();
        let body = encode_envelope(&message, DeliveryMode::Event).unwrap();

        let encoded = body["binary_data"].as_str().unwrap();
        let decoded = URL_SAFE.decode(encoded).unwrap();

        assert_eq!(decoded, serde_json::to_string(&message).unwrap().as_bytes());
    }

    #[test]
    fn state_envelope_nests_under_state_key() {
        let message = sample_message();
        let body = encode_envelope(&message, DeliveryMode::State).unwrap();

        let encoded = body["state"]["binary_data"].as_str().unwrap();
        let decoded = URL_SAFE.decode(encoded).unwrap();
        let parsed: TelemetryMessage = serde_json::from_slice(&decoded).unwrap();

        assert_eq!(parsed, message);
    }

    type Requests = Arc<Mutex<Vec<(String, serde_json::Value)>>>;

    async fn capture_ok(
        State(requests): State<Requests>,
        Path(path): Path<String>,
        Json(body): Json<serde_json::Value>,
    ) -> AxumStatus {
        requests.lock().unwrap().push((path, body));
        AxumStatus::OK
    }

    async fn always_500() -> AxumStatus {
        AxumStatus::INTERNAL_SERVER_ERROR
    }

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn success_status_classifies_as_delivered() {
        let requests: Requests = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/*path", post(capture_ok))
            .with_state(requests.clone());
        let addr = serve(app).await;

        let url = publish_url(
            &format!("http://{}", addr),
            "proj",
            "us-central1",
            "reg",
            "dev",
            DeliveryMode::Event,
        );
        let publisher =
            Publisher::with_url(url, DeliveryMode::Event, Duration::from_secs(5)).unwrap();

        let message = sample_message();
        let outcome = publisher.publish(&message, "test-token").await.unwrap();
        assert!(matches!(outcome, PublishOutcome::Delivered));

        let captured = requests.lock().unwrap();
        let (path, body) = &captured[0];
        assert!(path.ends_with("devices/dev:publishEvent"));

        let decoded = URL_SAFE
            .decode(body["binary_data"].as_str().unwrap())
            .unwrap();
        assert_eq!(decoded, serde_json::to_string(&message).unwrap().as_bytes());
    }

    #[tokio::test]
    async fn error_status_classifies_as_rejected() {
        let app = Router::new().route("/*path", post(always_500));
        let addr = serve(app).await;

        let url = publish_url(&format!("http://{}", addr), "p", "r", "g", "d", DeliveryMode::Event);
        let publisher =
            Publisher::with_url(url, DeliveryMode::Event, Duration::from_secs(5)).unwrap();

        let outcome = publisher.publish(&sample_message(), "t").await.unwrap();
        assert!(matches!(
            outcome,
            PublishOutcome::Rejected(StatusCode::INTERNAL_SERVER_ERROR)
        ));
    }

    #[tokio::test]
    async fn transport_error_classifies_as_unreachable() {
        // Bind then drop to get a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = publish_url(&format!("http://{}", addr), "p", "r", "g", "d", DeliveryMode::Event);
        let publisher =
            Publisher::with_url(url, DeliveryMode::Event, Duration::from_secs(2)).unwrap();

        let outcome = publisher.publish(&sample_message(), "t").await.unwrap();
        assert!(matches!(outcome, PublishOutcome::Unreachable(_)));
    }
}
