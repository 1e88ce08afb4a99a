//! Platform-agnostic playable resource trait
//!
//! Abstracts the media primitive behind each muse (an HTML audio element,
//! a native decoder/output pair, a remote renderer). The controller only
//! issues transport commands; resources report asynchronous happenings
//! (end of track, late errors, readiness) through a [`SignalSink`].

use crate::error::Result;
use crate::playlist::MuseKey;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::trace;

/// Playable media resource backing one muse
#[async_trait]
pub trait PlayableResource: Send {
    /// Load the source
    ///
    /// Resolves once the resource can start playing. Errors are reported to
    /// listeners as `error` events by the controller.
    async fn load(&mut self) -> Result<()>;

    /// Start or resume playback
    ///
    /// Resolves once the resource has acknowledged playback.
    async fn play(&mut self) -> Result<()>;

    /// Pause playback, keeping the position
    fn pause(&mut self);

    /// Total length (zero while unknown)
    fn duration(&self) -> Duration;

    /// Current playback position
    fn position(&self) -> Duration;

    /// Move the playback position
    fn set_position(&mut self, position: Duration);
}

/// Asynchronous notifications from a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceSignal {
    /// Playback reached the end of the track
    Ended,

    /// The resource failed outside of a `load`/`play` call
    Error(String),

    /// The resource became ready to play on its own
    Ready,
}

/// Signal tagged with the muse it belongs to
#[derive(Debug)]
pub(crate) struct SignalEnvelope {
    pub(crate) key: MuseKey,
    pub(crate) id: String,
    pub(crate) signal: ResourceSignal,
}

/// Handle a resource uses to report signals
///
/// Cheap to clone. Emitting after the player has been dropped is a no-op.
#[derive(Debug, Clone)]
pub struct SignalSink {
    key: MuseKey,
    id: String,
    tx: mpsc::UnboundedSender<SignalEnvelope>,
}

impl SignalSink {
    pub(crate) fn new(key: MuseKey, id: String, tx: mpsc::UnboundedSender<SignalEnvelope>) -> Self {
        Self { key, id, tx }
    }

    /// Id of the muse this sink reports for
    pub fn muse_id(&self) -> &str {
        &self.id
    }

    /// Report a signal to the player
    pub fn emit(&self, signal: ResourceSignal) {
        trace!(id = %self.id, ?signal, "resource signal");
        let envelope = SignalEnvelope {
            key: self.key,
            id: self.id.clone(),
            signal,
        };
        // Receiver is gone once the player is dropped
        let _ = self.tx.send(envelope);
    }
}

/// Creates the playable resource for a newly added muse
pub trait ResourceFactory: Send + Sync {
    /// Create an (unloaded) resource for `src`
    fn create(&self, src: &str, signals: SignalSink) -> Box<dyn PlayableResource>;
}

impl<F> ResourceFactory for F
where
    F: Fn(&str, SignalSink) -> Box<dyn PlayableResource> + Send + Sync,
{
    fn create(&self, src: &str, signals: SignalSink) -> Box<dyn PlayableResource> {
        self(src, signals)
    }
}

/// Silent resource for unit tests
///
/// Loads instantly, reports a fixed duration and never advances on its own.
#[cfg(test)]
pub(crate) struct DummyResource {
    duration: Duration,
    position: Duration,
    pub(crate) playing: bool,
}

#[cfg(test)]
impl DummyResource {
    pub(crate) fn new(duration: Duration) -> Self {
        Self {
            duration,
            position: Duration::ZERO,
            playing: false,
        }
    }
}

#[cfg(test)]
#[async_trait]
impl PlayableResource for DummyResource {
    async fn load(&mut self) -> Result<()> {
        Ok(())
    }

    async fn play(&mut self) -> Result<()> {
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn position(&self) -> Duration {
        self.position
    }

    fn set_position(&mut self, position: Duration) {
        self.position = position.min(self.duration);
    }
}
