//! Playback controller - the selection and transport state machine
//!
//! Owns the playlist and the current selection. Every operation works on
//! `&mut self`; the player serializes callers so at most one operation (and
//! at most one resource await) is in flight at a time.
//!
//! Per-muse states:
//! ```text
//! Unloaded ──load──▶ Loaded ──play──▶ Playing ◀──▶ Paused
//!                      ▲                 │            │
//!                      └── deselect ─────┴── stop ──▶ Stopped
//! ```
//! Only the selected muse is ever `Playing` or `Paused`; switching away
//! pauses it and returns it to `Loaded`.

use crate::config::Settings;
use crate::error::{PlaybackError, Result};
use crate::events::{EventBus, PlayerEvent};
use crate::playlist::{MuseKey, MuseSlot, Playlist};
use crate::resource::{ResourceFactory, SignalEnvelope, SignalSink};
use crate::sync::Progress;
use crate::types::{Muse, MuseMeta, MuseState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Which way a selection change happened (decides the emitted event)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Next,
    Previous,
    Skip,
}

impl Transition {
    fn event(self, from: String, to: String) -> PlayerEvent {
        match self {
            Transition::Next => PlayerEvent::Next { from, to },
            Transition::Previous => PlayerEvent::Previous { from, to },
            Transition::Skip => PlayerEvent::Skip { from, to },
        }
    }
}

pub(crate) struct Controller {
    playlist: Playlist,
    selected: Option<MuseKey>,
    factory: Box<dyn ResourceFactory>,
    signals: mpsc::UnboundedSender<SignalEnvelope>,
    events: Arc<EventBus>,
    settings: Arc<Settings>,
}

impl Controller {
    pub(crate) fn new(
        factory: Box<dyn ResourceFactory>,
        signals: mpsc::UnboundedSender<SignalEnvelope>,
        events: Arc<EventBus>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            playlist: Playlist::new(),
            selected: None,
            factory,
            signals,
            events,
            settings,
        }
    }

    // ===== Playlist =====

    /// Append a muse; the first muse of an empty playlist becomes selected
    pub(crate) fn add_muse(&mut self, src: &str, id: &str, meta: MuseMeta) -> Result<MuseKey> {
        let factory = &self.factory;
        let signals = &self.signals;
        let key = self.playlist.insert_with(id, |key| {
            let sink = SignalSink::new(key, id.to_string(), signals.clone());
            MuseSlot::new(id.to_string(), src.to_string(), meta, factory.create(src, sink))
        })?;

        if self.selected.is_none() {
            self.selected = Some(key);
        }
        debug!(id, src, len = self.playlist.len(), "muse added");
        Ok(key)
    }

    /// Remove a muse, moving the selection first if it was the selected one
    pub(crate) async fn remove_muse(&mut self, id: &str) -> Result<()> {
        let key = self
            .playlist
            .key_of(id)
            .ok_or_else(|| PlaybackError::NotFound(id.to_string()))?;

        if self.selected == Some(key) {
            let resume = self.state_of(key) == Some(MuseState::Playing) && self.settings.auto_play();
            let index = self.playlist.index_of(key).unwrap_or_default();

            let next = self.playlist.key_at(index + 1);
            let previous = index.checked_sub(1).and_then(|i| self.playlist.key_at(i));
            match (next, previous) {
                (Some(target), _) => {
                    self.switch_to(key, target, Transition::Next, resume).await;
                }
                (None, Some(target)) => {
                    self.switch_to(key, target, Transition::Previous, resume).await;
                }
                (None, None) => {
                    if let Some(muse) = self.playlist.get_mut(key) {
                        muse.resource.pause();
                        if matches!(muse.state, MuseState::Playing | MuseState::Paused) {
                            debug!(id = %muse.id, "stopping last muse before removal");
                            self.events.emit(&PlayerEvent::Stop { id: muse.id.clone() });
                        }
                    }
                    self.selected = None;
                }
            }
        }

        if let Some(mut muse) = self.playlist.remove(key) {
            muse.resource.pause();
        }
        info!(id, len = self.playlist.len(), "muse removed");
        Ok(())
    }

    /// Remove every muse, stopping playback if active
    pub(crate) fn empty(&mut self) {
        if let Some(key) = self.selected.take() {
            if let Some(muse) = self.playlist.get_mut(key) {
                if matches!(muse.state, MuseState::Playing | MuseState::Paused) {
                    muse.resource.pause();
                    muse.resource.set_position(Duration::ZERO);
                    muse.state = MuseState::Stopped;
                    self.events.emit(&PlayerEvent::Stop { id: muse.id.clone() });
                }
            }
        }

        let removed = self.playlist.clear();
        info!(removed = removed.len(), "playlist emptied");
    }

    pub(crate) fn contains(&self, key: MuseKey) -> bool {
        self.playlist.contains(key)
    }

    pub(crate) fn key_of(&self, id: &str) -> Option<MuseKey> {
        self.playlist.key_of(id)
    }

    pub(crate) fn muse(&self, id: &str) -> Option<Muse> {
        let key = self.playlist.key_of(id)?;
        self.playlist.get(key).map(MuseSlot::snapshot)
    }

    pub(crate) fn muses(&self) -> Vec<Muse> {
        self.playlist.iter().map(MuseSlot::snapshot).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.playlist.len()
    }

    // ===== Transport =====

    /// Load a muse (or the selected one) and select it
    ///
    /// A playing muse is paused before the load starts. On failure the
    /// selection is left as it was.
    pub(crate) async fn load(&mut self, id: Option<&str>) -> Result<()> {
        let target = match id {
            Some(id) => self
                .playlist
                .key_of(id)
                .ok_or_else(|| PlaybackError::NotFound(id.to_string()))?,
            None => self.selected.ok_or(PlaybackError::NoSelection)?,
        };

        if let Some(current) = self.selected {
            if current != target {
                self.pause_muse(current);
            }
        }

        self.ensure_loaded(target).await?;

        match self.selected {
            Some(current) if current != target => {
                self.deselect(current);
                self.select(target);
            }
            None => self.select(target),
            _ => {}
        }
        Ok(())
    }

    /// Load a muse in the background without touching the selection
    pub(crate) async fn preload(&mut self, key: MuseKey) -> Result<()> {
        self.ensure_loaded(key).await
    }

    /// Start (or resume) the selected muse
    pub(crate) async fn play(&mut self) -> Result<()> {
        let key = self.selected.ok_or(PlaybackError::NoSelection)?;
        if self.state_of(key) == Some(MuseState::Playing) {
            return Ok(());
        }

        self.ensure_loaded(key).await?;

        let Some(muse) = self.playlist.get_mut(key) else {
            return Err(PlaybackError::NoSelection);
        };
        self.events.emit(&PlayerEvent::Play { id: muse.id.clone() });

        match muse.resource.play().await {
            Ok(()) => {
                muse.state = MuseState::Playing;
                debug!(id = %muse.id, "playing");
                self.events.emit(&PlayerEvent::Playing { id: muse.id.clone() });
                Ok(())
            }
            Err(e) => {
                warn!(id = %muse.id, error = %e, "resource refused to play");
                self.events.emit(&PlayerEvent::Error {
                    id: Some(muse.id.clone()),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Pause the selected muse
    ///
    /// Returns `false` when nothing is selected or it is not playing.
    pub(crate) fn pause(&mut self) -> bool {
        match self.selected {
            Some(key) => self.pause_muse(key),
            None => false,
        }
    }

    /// Pause and rewind the selected muse
    ///
    /// Returns `false` when there is nothing to stop (already at rest at 0:00).
    pub(crate) fn stop(&mut self) -> Result<bool> {
        let key = self.selected.ok_or(PlaybackError::NoSelection)?;
        let Some(muse) = self.playlist.get_mut(key) else {
            return Err(PlaybackError::NoSelection);
        };

        let at_rest = match muse.state {
            MuseState::Unloaded | MuseState::Stopped => true,
            MuseState::Loaded => muse.resource.position().is_zero(),
            MuseState::Playing | MuseState::Paused => false,
        };
        if at_rest {
            return Ok(false);
        }

        muse.resource.pause();
        muse.resource.set_position(Duration::ZERO);
        muse.remembered = Duration::ZERO;
        muse.state = MuseState::Stopped;
        debug!(id = %muse.id, "stopped");
        self.events.emit(&PlayerEvent::Stop { id: muse.id.clone() });
        Ok(true)
    }

    pub(crate) async fn next(&mut self) -> Result<()> {
        self.step(1, Transition::Next).await
    }

    pub(crate) async fn previous(&mut self) -> Result<()> {
        self.step(-1, Transition::Previous).await
    }

    pub(crate) async fn skip_to_id(&mut self, id: &str) -> Result<()> {
        let target = self
            .playlist
            .key_of(id)
            .ok_or_else(|| PlaybackError::NotFound(id.to_string()))?;
        self.skip_to(target).await
    }

    pub(crate) async fn skip_to_index(&mut self, index: usize) -> Result<()> {
        let target = self.playlist.key_at(index).ok_or(PlaybackError::OutOfRange {
            index: isize::try_from(index).unwrap_or(isize::MAX),
            len: self.playlist.len(),
        })?;
        self.skip_to(target).await
    }

    /// Seek the selected muse
    ///
    /// Clamped to the duration when it is known. For an unloaded muse the
    /// position is kept and applied once it loads.
    pub(crate) fn seek(&mut self, position: Duration) -> Result<Duration> {
        let key = self.selected.ok_or(PlaybackError::NoSelection)?;
        let Some(muse) = self.playlist.get_mut(key) else {
            return Err(PlaybackError::NoSelection);
        };

        let target = if muse.state.is_loaded() {
            let duration = muse.resource.duration();
            let target = if duration.is_zero() {
                position
            } else {
                position.min(duration)
            };
            muse.resource.set_position(target);
            target
        } else {
            position
        };
        muse.remembered = target;

        self.events.emit(&PlayerEvent::Seek {
            id: muse.id.clone(),
            position: target,
        });
        Ok(target)
    }

    /// Seek the selected muse to a fraction of its duration
    pub(crate) fn seek_fraction(&mut self, fraction: f64) -> Result<Duration> {
        if !fraction.is_finite() {
            return Err(PlaybackError::InvalidSeekPosition(fraction));
        }
        if self.selected.is_none() {
            return Err(PlaybackError::NoSelection);
        }
        let duration = self.duration();
        if duration.is_zero() {
            return Err(PlaybackError::NotLoaded);
        }
        self.seek(duration.mul_f64(fraction.clamp(0.0, 1.0)))
    }

    // ===== Resource signals =====

    /// The selected muse's resource reached its end
    pub(crate) async fn on_ended(&mut self, key: MuseKey) {
        if self.selected != Some(key) || self.state_of(key) != Some(MuseState::Playing) {
            return;
        }

        if let Some(muse) = self.playlist.get_mut(key) {
            muse.resource.set_position(Duration::ZERO);
            muse.remembered = Duration::ZERO;
        }

        if self.settings.auto_play() {
            let next = self
                .playlist
                .index_of(key)
                .and_then(|index| self.playlist.key_at(index + 1));
            if let Some(target) = next {
                self.switch_to(key, target, Transition::Next, true).await;
                return;
            }
        }

        if let Some(muse) = self.playlist.get_mut(key) {
            muse.resource.pause();
            muse.state = MuseState::Stopped;
            debug!(id = %muse.id, "reached end, stopping");
            self.events.emit(&PlayerEvent::Stop { id: muse.id.clone() });
        }
    }

    /// A resource became ready on its own
    pub(crate) fn on_ready(&mut self, key: MuseKey) {
        if let Some(muse) = self.playlist.get_mut(key) {
            if muse.state == MuseState::Unloaded {
                muse.state = MuseState::Loaded;
                if !muse.remembered.is_zero() {
                    muse.resource.set_position(muse.remembered);
                }
                self.events.emit(&PlayerEvent::Load { id: muse.id.clone() });
            }
        }
    }

    // ===== Queries =====

    pub(crate) fn selected_state(&self) -> Option<MuseState> {
        self.selected.and_then(|key| self.state_of(key))
    }

    pub(crate) fn is_playing(&self) -> bool {
        self.selected_state() == Some(MuseState::Playing)
    }

    pub(crate) fn current_muse(&self) -> Option<Muse> {
        self.selected
            .and_then(|key| self.playlist.get(key))
            .map(MuseSlot::snapshot)
    }

    pub(crate) fn current_index(&self) -> Option<usize> {
        self.selected.and_then(|key| self.playlist.index_of(key))
    }

    /// Duration of the selected muse (zero while unloaded)
    pub(crate) fn duration(&self) -> Duration {
        self.selected
            .and_then(|key| self.playlist.get(key))
            .filter(|muse| muse.state.is_loaded())
            .map_or(Duration::ZERO, |muse| muse.resource.duration())
    }

    /// Position of the selected muse
    pub(crate) fn position(&self) -> Duration {
        self.selected
            .and_then(|key| self.playlist.get(key))
            .map_or(Duration::ZERO, |muse| {
                if muse.state.is_loaded() {
                    muse.resource.position()
                } else {
                    muse.remembered
                }
            })
    }

    /// Progress of the selected muse, `None` while nothing is loaded
    pub(crate) fn progress(&self) -> Option<Progress> {
        let muse = self.selected.and_then(|key| self.playlist.get(key))?;
        if !muse.state.is_loaded() {
            return None;
        }
        Some(Progress {
            position: muse.resource.position(),
            duration: muse.resource.duration(),
        })
    }

    /// Number of muses whose state is `Playing`
    #[cfg(test)]
    pub(crate) fn playing_count(&self) -> usize {
        self.playlist
            .iter()
            .filter(|muse| muse.state == MuseState::Playing)
            .count()
    }

    // ===== Internals =====

    fn state_of(&self, key: MuseKey) -> Option<MuseState> {
        self.playlist.get(key).map(|muse| muse.state)
    }

    async fn step(&mut self, delta: isize, transition: Transition) -> Result<()> {
        let current = self.selected.ok_or(PlaybackError::NoSelection)?;
        let index = self
            .playlist
            .index_of(current)
            .ok_or(PlaybackError::NoSelection)?;

        let len = self.playlist.len();
        let target = index
            .checked_add_signed(delta)
            .and_then(|i| self.playlist.key_at(i))
            .ok_or(PlaybackError::OutOfRange {
                index: isize::try_from(index).unwrap_or(isize::MAX).saturating_add(delta),
                len,
            })?;

        let resume = self.state_of(current) == Some(MuseState::Playing);
        self.switch_to(current, target, transition, resume).await;
        Ok(())
    }

    async fn skip_to(&mut self, target: MuseKey) -> Result<()> {
        let current = self.selected.ok_or(PlaybackError::NoSelection)?;
        if current == target {
            return Ok(());
        }
        let resume = self.state_of(current) == Some(MuseState::Playing);
        self.switch_to(current, target, Transition::Skip, resume).await;
        Ok(())
    }

    /// Move the selection from `from` to `to`
    ///
    /// The outgoing muse is paused before the incoming one is touched. With
    /// `resume` the incoming muse starts playing, otherwise it is only loaded.
    async fn switch_to(&mut self, from: MuseKey, to: MuseKey, transition: Transition, resume: bool) {
        let from_id = self.playlist.get(from).map(|m| m.id.clone()).unwrap_or_default();
        self.deselect(from);
        self.select(to);

        let to_id = self.playlist.get(to).map(|m| m.id.clone()).unwrap_or_default();
        info!(from = %from_id, to = %to_id, ?transition, resume, "selection changed");
        self.events.emit(&transition.event(from_id, to_id));

        // Failures are already reported as `error` events
        let outcome = if resume {
            self.play().await
        } else {
            self.ensure_loaded(to).await
        };
        if let Err(e) = outcome {
            debug!(error = %e, "incoming muse not ready");
        }
    }

    /// Pause a muse and apply the remember-time policy
    fn deselect(&mut self, key: MuseKey) {
        let remember = self.settings.remember_time();
        let Some(muse) = self.playlist.get_mut(key) else {
            return;
        };

        if muse.state == MuseState::Playing {
            muse.resource.pause();
        }

        if muse.state.is_loaded() {
            if remember {
                muse.remembered = muse.resource.position();
            } else {
                muse.remembered = Duration::ZERO;
                muse.resource.set_position(Duration::ZERO);
            }
            muse.state = MuseState::Loaded;
        } else if !remember {
            muse.remembered = Duration::ZERO;
        }
    }

    fn select(&mut self, key: MuseKey) {
        self.selected = Some(key);
        if let Some(muse) = self.playlist.get_mut(key) {
            if muse.state.is_loaded() {
                muse.resource.set_position(muse.remembered);
            }
        }
    }

    fn pause_muse(&mut self, key: MuseKey) -> bool {
        let Some(muse) = self.playlist.get_mut(key) else {
            return false;
        };
        if muse.state != MuseState::Playing {
            return false;
        }

        muse.resource.pause();
        muse.state = MuseState::Paused;
        debug!(id = %muse.id, "paused");
        self.events.emit(&PlayerEvent::Pause { id: muse.id.clone() });
        true
    }

    /// Load a muse's resource unless it is already loaded
    async fn ensure_loaded(&mut self, key: MuseKey) -> Result<()> {
        let Some(muse) = self.playlist.get_mut(key) else {
            return Err(PlaybackError::NoSelection);
        };
        if muse.state.is_loaded() {
            return Ok(());
        }

        match muse.resource.load().await {
            Ok(()) => {
                muse.state = MuseState::Loaded;
                if !muse.remembered.is_zero() {
                    muse.resource.set_position(muse.remembered);
                }
                debug!(id = %muse.id, "loaded");
                self.events.emit(&PlayerEvent::Load { id: muse.id.clone() });
                Ok(())
            }
            Err(e) => {
                warn!(id = %muse.id, error = %e, "load failed");
                self.events.emit(&PlayerEvent::Error {
                    id: Some(muse.id.clone()),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlayerConfig;
    use crate::resource::{DummyResource, PlayableResource};

    fn controller(config: PlayerConfig) -> (Controller, mpsc::UnboundedReceiver<SignalEnvelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let factory = |_: &str, _: SignalSink| -> Box<dyn PlayableResource> {
            Box::new(DummyResource::new(Duration::from_secs(180)))
        };
        let controller = Controller::new(
            Box::new(factory),
            tx,
            Arc::new(EventBus::new()),
            Arc::new(Settings::new(config)),
        );
        (controller, rx)
    }

    fn with_muses(ids: &[&str]) -> Controller {
        let (mut controller, _rx) = controller(PlayerConfig::default());
        for id in ids {
            controller
                .add_muse(&format!("{}.mp3", id), id, MuseMeta::default())
                .unwrap();
        }
        controller
    }

    #[tokio::test]
    async fn first_muse_is_selected_but_unloaded() {
        let controller = with_muses(&["a", "b"]);
        assert_eq!(controller.current_index(), Some(0));
        assert_eq!(controller.selected_state(), Some(MuseState::Unloaded));
        assert_eq!(controller.duration(), Duration::ZERO);
    }

    #[tokio::test]
    async fn transport_on_empty_playlist_reports_no_selection() {
        let mut controller = with_muses(&[]);
        assert!(matches!(controller.play().await, Err(PlaybackError::NoSelection)));
        assert!(matches!(controller.next().await, Err(PlaybackError::NoSelection)));
        assert!(matches!(controller.stop(), Err(PlaybackError::NoSelection)));
        assert!(!controller.pause());
    }

    #[tokio::test]
    async fn next_past_the_end_is_out_of_range() {
        let mut controller = with_muses(&["a", "b"]);
        controller.next().await.unwrap();

        let result = controller.next().await;
        assert!(matches!(result, Err(PlaybackError::OutOfRange { index: 2, len: 2 })));
        assert_eq!(controller.current_index(), Some(1));
    }

    #[tokio::test]
    async fn seek_before_load_is_applied_on_load() {
        let mut controller = with_muses(&["a"]);
        controller.seek(Duration::from_secs(42)).unwrap();
        assert_eq!(controller.position(), Duration::from_secs(42));

        controller.load(None).await.unwrap();
        assert_eq!(controller.progress().unwrap().position, Duration::from_secs(42));
    }

    #[tokio::test]
    async fn seek_clamps_to_duration() {
        let mut controller = with_muses(&["a"]);
        controller.load(None).await.unwrap();

        let target = controller.seek(Duration::from_secs(999)).unwrap();
        assert_eq!(target, Duration::from_secs(180));

        let target = controller.seek_fraction(0.5).unwrap();
        assert_eq!(target, Duration::from_secs(90));
    }

    #[tokio::test]
    async fn deselected_muse_returns_to_loaded() {
        let mut controller = with_muses(&["a", "b"]);
        controller.play().await.unwrap();
        controller.pause();
        assert_eq!(controller.selected_state(), Some(MuseState::Paused));

        controller.next().await.unwrap();
        assert_eq!(controller.muse("a").unwrap().state, MuseState::Loaded);
        assert_eq!(controller.muse("b").unwrap().state, MuseState::Loaded);
    }

    #[tokio::test]
    async fn ended_signal_for_unselected_muse_is_ignored() {
        let mut controller = with_muses(&["a", "b"]);
        controller.play().await.unwrap();
        let b = controller.key_of("b").unwrap();

        controller.on_ended(b).await;
        assert!(controller.is_playing());
        assert_eq!(controller.current_index(), Some(0));
    }

    #[tokio::test]
    async fn navigation_while_playing_keeps_a_single_muse_playing() {
        let mut controller = with_muses(&["a", "b", "c"]);
        controller.play().await.unwrap();

        controller.next().await.unwrap();
        controller.skip_to_index(0).await.unwrap();
        controller.skip_to_id("c").await.unwrap();

        assert_eq!(controller.playing_count(), 1);
        assert_eq!(controller.current_muse().unwrap().id, "c");
        assert_eq!(controller.muse("a").unwrap().state, MuseState::Loaded);
    }

    #[tokio::test]
    async fn stop_rewinds_and_is_idempotent() {
        let mut controller = with_muses(&["a"]);
        controller.play().await.unwrap();
        controller.seek(Duration::from_secs(30)).unwrap();

        assert!(controller.stop().unwrap());
        assert_eq!(controller.position(), Duration::ZERO);
        assert_eq!(controller.selected_state(), Some(MuseState::Stopped));
        assert!(!controller.stop().unwrap());
    }
}
