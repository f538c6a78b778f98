//! Data source abstraction for receiving status snapshots.
//!
//! The HTTP transport that actually queries a server's status API lives
//! outside this crate. Whatever fetches the document hands it to the engine
//! through one of these sources: a file rewritten by a fetcher, a
//! newline-delimited JSON stream, or an in-process channel.

mod channel;
mod file;
mod snapshot;
mod stream;

pub use channel::ChannelSource;
pub use file::FileSource;
pub use snapshot::StatusSnapshot;
pub use stream::StreamSource;

use std::fmt::Debug;

/// Trait for receiving status snapshots from various sources.
///
/// # Example
///
/// ```
/// use angie_console::{DataSource, FileSource};
///
/// let mut source = FileSource::new("status.json");
/// if let Some(snapshot) = source.poll() {
///     println!("Got {} resources", snapshot.len());
/// }
/// ```
pub trait DataSource: Send + Debug {
    /// Poll for the latest snapshot.
    ///
    /// Returns `Some(snapshot)` if new data is available, `None` otherwise.
    /// This method must not block: the poll cycle runs synchronously.
    fn poll(&mut self) -> Option<StatusSnapshot>;

    /// Returns a human-readable description of the source.
    fn description(&self) -> &str;

    /// The error from the most recent poll, if it failed.
    ///
    /// A failed poll is transient: the session keeps showing the previous
    /// views until a later poll succeeds.
    fn error(&self) -> Option<String>;
}
