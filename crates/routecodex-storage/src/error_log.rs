use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use routecodex_provider_core::EventSink;
use routecodex_quota::ErrorRecord;

/// Appends every `ErrorEvent` C3 observes to
/// `<userDir>/quota/provider-errors.ndjson`, one JSON object per line
/// (§6 Persistence). A single `tokio::sync::Mutex` around the append
/// serializes concurrent writers so lines never interleave mid-record.
pub struct NdjsonErrorLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl NdjsonErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append_line(&self, line: &str) -> std::io::Result<()> {
        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await
    }
}

impl EventSink<ErrorRecord> for NdjsonErrorLog {
    fn write<'a>(&'a self, event: &'a ErrorRecord) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let Ok(line) = serde_json::to_string(event) else {
                return;
            };
            if let Err(err) = self.append_line(&line).await {
                tracing::warn!(error = %err, path = %self.path.display(), "failed to append provider error record");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routecodex_common::ErrorSeries;

    fn tmp_path() -> PathBuf {
        std::env::temp_dir().join(format!("rc-ndjson-test-{}/provider-errors.ndjson", uuid_like()))
    }

    fn uuid_like() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos() as u64
    }

    #[tokio::test]
    async fn appends_one_json_line_per_event() {
        let path = tmp_path();
        let log = NdjsonErrorLog::new(path.clone());

        let record = ErrorRecord {
            provider_key: "openai".into(),
            series: ErrorSeries::E429,
            http_status: Some(429),
            code: None,
            message: None,
            consecutive_error_count: 1,
            at_ms: 0,
        };
        log.write(&record).await;
        log.write(&record).await;

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().count(), 2);
        for line in contents.lines() {
            assert!(serde_json::from_str::<ErrorRecord>(line).is_ok());
        }

        tokio::fs::remove_dir_all(path.parent().unwrap()).await.ok();
    }
}
