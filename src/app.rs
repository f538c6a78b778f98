//! The dashboard session: source, registry, engine and bus.

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::bus::{Availability, Bus, Callback, Latest};
use crate::config::Settings;
use crate::data::{EndpointPath, EndpointRegistry, Engine, Family, PollTime};
use crate::source::{DataSource, StatusSnapshot};

/// One dashboard session.
///
/// Owns every piece of mutable engine state. It is created when the
/// dashboard connects and dropped (or [`reset`](App::reset)) when it
/// reconnects, so no state outlives the session that produced it.
pub struct App {
    source: Box<dyn DataSource>,
    registry: EndpointRegistry,
    engine: Engine,
    bus: Bus,
    skip_unwatched: bool,
    started: Instant,
    pub load_error: Option<String>,
}

impl App {
    /// Create a new session with the given data source and settings.
    pub fn new(source: Box<dyn DataSource>, settings: &Settings) -> Self {
        Self {
            source,
            registry: EndpointRegistry::new(),
            engine: Engine::new(settings.history_limit, &settings.family_history_limits()),
            bus: Bus::new(),
            skip_unwatched: settings.skip_unwatched,
            started: Instant::now(),
            load_error: None,
        }
    }

    /// Returns a description of the current data source.
    pub fn source_description(&self) -> &str {
        self.source.description()
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub fn latest(&self) -> &Latest {
        self.bus.latest()
    }

    /// Poll the data source for new data.
    ///
    /// Returns Ok(true) if a new cycle was published, Ok(false) if there was
    /// no new data. A failed poll is recorded in `load_error` and leaves all
    /// state, including the last published views, untouched.
    pub fn reload_data(&mut self) -> Result<bool> {
        match self.source.poll() {
            Some(snapshot) => {
                self.apply_snapshot(&snapshot, PollTime::since(self.started));
                self.load_error = None;
                Ok(true)
            }
            None => {
                if let Some(err) = self.source.error() {
                    if self.load_error.as_deref() != Some(err.as_str()) {
                        warn!(source = %self.source.description(), "poll failed: {}", err);
                    }
                    self.load_error = Some(err);
                }
                Ok(false)
            }
        }
    }

    /// Run one poll cycle over an already-decoded snapshot.
    ///
    /// The registry and every calculator finish before anything is
    /// published, so subscribers never see a half-updated cycle.
    ///
    /// Every endpoint present in the document, or present before and now
    /// retracted, counts as updated along with the computed families.
    pub fn apply_snapshot(&mut self, snapshot: &StatusSnapshot, now: PollTime) {
        let mut updated: BTreeSet<EndpointPath> = self.registry.paths().into_iter().collect();
        self.registry.sync(snapshot);
        updated.extend(self.registry.paths());

        let bus = &self.bus;
        let skip_unwatched = self.skip_unwatched;
        let cycle = self.engine.compute(snapshot, now, |family| {
            !skip_unwatched || bus.is_watched(&family.endpoint())
        });
        updated.extend(cycle.updated);

        debug!(updated = ?updated, "publishing cycle");
        self.bus.publish(cycle.views, snapshot.clone(), &updated);
    }

    /// Register a consumer. See [`Bus::subscribe`].
    pub fn subscribe<I>(&mut self, paths: I, callback: Callback)
    where
        I: IntoIterator<Item = EndpointPath>,
    {
        self.bus.subscribe(paths, callback);
    }

    /// Remove a consumer registered for exactly `paths`.
    pub fn unsubscribe<I>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = EndpointPath>,
    {
        self.bus.unsubscribe(paths)
    }

    /// Read the latest view for each path.
    pub fn get(&self, paths: &[EndpointPath]) -> Vec<Availability<'_>> {
        self.bus.get(paths)
    }

    /// Whether the family's endpoint currently exists on the server.
    pub fn is_available(&self, family: Family) -> bool {
        self.registry.includes(&family.endpoint())
    }

    /// Forget everything learned from the server, e.g. on reconnect.
    ///
    /// Subscriptions are kept.
    pub fn reset(&mut self) {
        info!(source = %self.source.description(), "resetting session state");
        self.registry.reset();
        self.engine.reset();
        self.bus.clear();
        self.load_error = None;
    }

    /// Poll every `refresh` until `shutdown` resolves.
    ///
    /// Cycles run one after another on the current task; a tick that comes
    /// due while a cycle is still running is skipped rather than queued.
    pub async fn run_until<F>(&mut self, refresh: Duration, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(refresh);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    self.reload_data()?;
                }
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("source", &self.source.description())
            .field("registry", &self.registry)
            .field("bus", &self.bus)
            .finish()
    }
}
