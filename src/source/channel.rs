//! Channel-based data source.
//!
//! Receives status snapshots via a tokio watch channel. Useful when the
//! fetcher runs as a task in the same process and pushes each document.

use tokio::sync::watch;

use super::{DataSource, StatusSnapshot};

/// A data source that receives status snapshots via a channel.
///
/// # Example
///
/// ```
/// use angie_console::ChannelSource;
///
/// let (tx, source) = ChannelSource::create("http://127.0.0.1/status/");
/// ```
#[derive(Debug)]
pub struct ChannelSource {
    receiver: watch::Receiver<StatusSnapshot>,
    description: String,
    /// Track if we've returned the initial value yet
    initial_returned: bool,
}

impl ChannelSource {
    /// Create a new channel source.
    ///
    /// `source_description` names where snapshots come from, e.g. the
    /// status API URL the fetcher polls.
    pub fn new(receiver: watch::Receiver<StatusSnapshot>, source_description: &str) -> Self {
        let description = format!("channel: {}", source_description);
        Self {
            receiver,
            description,
            initial_returned: false,
        }
    }

    /// Create a channel pair. Returns (sender, source).
    pub fn create(source_description: &str) -> (watch::Sender<StatusSnapshot>, Self) {
        let (tx, rx) = watch::channel(StatusSnapshot::default());
        let source = Self::new(rx, source_description);
        (tx, source)
    }
}

impl DataSource for ChannelSource {
    fn poll(&mut self) -> Option<StatusSnapshot> {
        // Return the initial value on first poll
        if !self.initial_returned {
            self.initial_returned = true;
            self.receiver.mark_changed();
        }

        if self.receiver.has_changed().unwrap_or(false) {
            Some(self.receiver.borrow_and_update().clone())
        } else {
            None
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<String> {
        // A closed sender just means no more snapshots; the last one stays valid
        None
    }
}
