//! Stream-based data source.
//!
//! Receives status snapshots from an async byte stream, one JSON document
//! per line. Useful for a fetcher running in another process and piping
//! its output over TCP.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{DataSource, StatusSnapshot};

type SharedError = Arc<Mutex<Option<String>>>;

fn set_error(handle: &SharedError, value: Option<String>) {
    let mut guard = handle.lock().unwrap_or_else(|e| e.into_inner());
    *guard = value;
}

/// A data source that receives status snapshots from an async stream.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
/// use angie_console::StreamSource;
///
/// # tokio_test::block_on(async {
/// let data = b"{}\n";
/// let stream = Cursor::new(data.to_vec());
/// let source = StreamSource::spawn(stream, "example");
/// # });
/// ```
#[derive(Debug)]
pub struct StreamSource {
    receiver: mpsc::Receiver<StatusSnapshot>,
    description: String,
    last_error: SharedError,
}

impl StreamSource {
    /// Spawn a background task that reads newline-delimited JSON snapshots
    /// from the given async reader.
    pub fn spawn<R>(reader: R, description: &str) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(16);
        let last_error: SharedError = Arc::new(Mutex::new(None));
        let error_handle = last_error.clone();

        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        set_error(&error_handle, Some("Connection closed".to_string()));
                        break;
                    }
                    Ok(_) if line.trim().is_empty() => continue,
                    Ok(_) => match StatusSnapshot::parse(line.trim()) {
                        Ok(snapshot) => {
                            set_error(&error_handle, None);
                            if tx.send(snapshot).await.is_err() {
                                debug!("stream receiver dropped");
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("skipping malformed snapshot: {}", e);
                            set_error(&error_handle, Some(format!("Parse error: {}", e)));
                        }
                    },
                    Err(e) => {
                        set_error(&error_handle, Some(format!("Read error: {}", e)));
                        break;
                    }
                }
            }
        });

        Self {
            receiver: rx,
            description: format!("stream: {}", description),
            last_error,
        }
    }

    /// Create a StreamSource from a channel of raw JSON documents.
    pub fn from_bytes_channel(mut rx: mpsc::Receiver<Vec<u8>>, description: &str) -> Self {
        let (tx, snapshot_rx) = mpsc::channel(16);
        let last_error: SharedError = Arc::new(Mutex::new(None));
        let error_handle = last_error.clone();

        tokio::spawn(async move {
            while let Some(bytes) = rx.recv().await {
                match StatusSnapshot::from_slice(&bytes) {
                    Ok(snapshot) => {
                        set_error(&error_handle, None);
                        if tx.send(snapshot).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("skipping malformed snapshot: {}", e);
                        set_error(&error_handle, Some(format!("Parse error: {}", e)));
                    }
                }
            }
        });

        Self {
            receiver: snapshot_rx,
            description: format!("stream: {}", description),
            last_error,
        }
    }
}

impl DataSource for StreamSource {
    fn poll(&mut self) -> Option<StatusSnapshot> {
        // Drain to the newest document; older ones are already stale
        let mut latest = None;
        loop {
            match self.receiver.try_recv() {
                Ok(snapshot) => latest = Some(snapshot),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    if latest.is_none() {
                        set_error(&self.last_error, Some("Stream disconnected".to_string()));
                    }
                    break;
                }
            }
        }
        latest
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<String> {
        self.last_error.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_json(accepted: u64) -> String {
        format!(r#"{{"connections":{{"accepted":{},"active":1}}}}"#, accepted)
    }

    #[tokio::test]
    async fn test_stream_source_spawn() {
        let data = format!("{}\n", sample_json(1));
        let mut source = StreamSource::spawn(Cursor::new(data), "test");

        // Give the background task time to process
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        let snapshot = source.poll().unwrap();
        assert!(snapshot.get("connections").is_some());
    }

    #[tokio::test]
    async fn test_stream_source_poll_returns_newest() {
        let data = format!("{}\n\n{}\n", sample_json(1), sample_json(2));
        let mut source = StreamSource::spawn(Cursor::new(data), "test");

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        let snapshot = source.poll().unwrap();
        assert_eq!(snapshot.resource(&["connections", "accepted"]).unwrap(), 2);
        assert!(source.poll().is_none());
    }

    #[tokio::test]
    async fn test_stream_source_description() {
        let source = StreamSource::spawn(Cursor::new(""), "tcp://localhost:9090");
        assert_eq!(source.description(), "stream: tcp://localhost:9090");
    }

    #[tokio::test]
    async fn test_stream_source_from_bytes_channel() {
        let (tx, rx) = mpsc::channel::<Vec<u8>>(16);
        let mut source = StreamSource::from_bytes_channel(rx, "test-channel");

        tx.send(sample_json(7).into_bytes()).await.unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        let snapshot = source.poll().unwrap();
        assert_eq!(snapshot.resource(&["connections", "accepted"]).unwrap(), 7);
    }

    #[tokio::test]
    async fn test_stream_source_invalid_json_sets_error() {
        let (tx, rx) = mpsc::channel::<Vec<u8>>(16);
        let mut source = StreamSource::from_bytes_channel(rx, "test");

        tx.send(b"not valid json".to_vec()).await.unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert!(source.poll().is_none());
        assert!(source.error().unwrap().contains("Parse error"));
    }

    #[tokio::test]
    async fn test_stream_source_empty_stream() {
        let mut source = StreamSource::spawn(Cursor::new(""), "test");

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert!(source.poll().is_none());
        assert!(source.error().is_some());
    }
}
