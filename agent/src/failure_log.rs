use crate::errors::Result;
use crate::message::TelemetryMessage;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Append-only dead-letter log for undelivered messages. Never read,
/// deduplicated, or rotated here; recovery is an out-of-band manual process.
pub struct FailureSink {
    path: PathBuf,
}

impl FailureSink {
    pub fn new(path: PathBuf) -> Self {
        FailureSink { path }
    }

    /// Appends one CSV line with the seven message fields.
    pub async fn record_failure(&self, message: &TelemetryMessage) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(message.csv_line().as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_log() -> PathBuf {
        std::env::temp_dir().join(format!("failure-log-{}.txt", uuid::Uuid::new_v4()))
    }

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

    #[tokio::test]
    async fn appends_one_line_per_failure() {
        let path = temp_log();
        let sink = FailureSink::new(path.clone());
        let message = sample_message();

        sink.record_failure(&message).await.unwrap();
        sink.record_failure(&message).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "999,35.6586,139.7454,2026-08-27T12:00:00,21.5,1013.2,55.0"
        );

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn creates_log_on_first_failure() {
        let path = temp_log();
        assert!(!path.exists());

        let sink = FailureSink::new(path.clone());
        sink.record_failure(&sample_message()).await.unwrap();
        assert!(path.exists());

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
