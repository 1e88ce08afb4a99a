//! Player - the public handle
//!
//! Wraps the controller behind a FIFO async gate, owns the event bus, the
//! sync engine, the resource-signal pump and background preloads, and keeps
//! the sync ticker running exactly while the selected muse is playing.

use crate::config::{PlayerConfig, Settings};
use crate::controller::Controller;
use crate::error::{PlaybackError, Result};
use crate::events::{EventBus, EventKind, ListenerId, PlayerEvent};
use crate::playlist::MuseKey;
use crate::resource::{ResourceFactory, ResourceSignal, SignalEnvelope};
use crate::sync::{SeekBarId, SeekFill, SeekTrack, SyncEngine, TextTarget, TimeLabelId};
use crate::types::{Muse, MuseMeta, MuseState, TimeDisplay};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct PendingLoad {
    key: MuseKey,
    handle: JoinHandle<()>,
}

struct Shared {
    controller: Mutex<Controller>,
    events: Arc<EventBus>,
    settings: Arc<Settings>,
    sync: SyncEngine,
    preloads: parking_lot::Mutex<HashMap<String, PendingLoad>>,
    pump: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    /// Render the current progress if no transport operation is in flight
    fn tick(&self) {
        if let Ok(controller) = self.controller.try_lock() {
            if let Some(progress) = controller.progress() {
                self.sync.render(progress);
            }
        }
    }

    /// Run the ticker while playing, stop it otherwise, and render once
    fn reconcile(self: &Arc<Self>, controller: &Controller) {
        if controller.is_playing() {
            let weak = Arc::downgrade(self);
            self.sync.start_ticker(self.settings.sync_interval(), move || {
                match weak.upgrade() {
                    Some(shared) => {
                        shared.tick();
                        true
                    }
                    None => false,
                }
            });
        } else {
            self.sync.stop_ticker();
        }

        if let Some(progress) = controller.progress() {
            self.sync.render(progress);
        }
    }

    fn cancel_preload(&self, id: &str) {
        if let Some(pending) = self.preloads.lock().remove(id) {
            debug!(id, "cancelling pending load");
            pending.handle.abort();
        }
    }

    fn cancel_all_preloads(&self) {
        for (_, pending) in self.preloads.lock().drain() {
            pending.handle.abort();
        }
    }

    async fn handle_signal(self: &Arc<Self>, envelope: SignalEnvelope) {
        let SignalEnvelope { key, id, signal } = envelope;
        match signal {
            ResourceSignal::Ended => {
                let mut controller = self.controller.lock().await;
                controller.on_ended(key).await;
                self.reconcile(&controller);
            }
            ResourceSignal::Ready => {
                let mut controller = self.controller.lock().await;
                controller.on_ready(key);
                self.reconcile(&controller);
            }
            ResourceSignal::Error(message) => {
                if !self.controller.lock().await.contains(key) {
                    return;
                }
                warn!(id = %id, error = %message, "resource error");
                self.events.emit(&PlayerEvent::Error {
                    id: Some(id),
                    message,
                });
            }
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.cancel_all_preloads();
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
    }
}

/// Pieces of a player before its tasks are started
struct Parts {
    controller: Controller,
    events: Arc<EventBus>,
    settings: Arc<Settings>,
    signals: mpsc::UnboundedReceiver<SignalEnvelope>,
}

impl Parts {
    fn new(factory: Box<dyn ResourceFactory>, config: PlayerConfig) -> Self {
        let (tx, signals) = mpsc::unbounded_channel();
        let events = Arc::new(EventBus::new());
        let settings = Arc::new(Settings::new(config));
        let controller = Controller::new(factory, tx, Arc::clone(&events), Arc::clone(&settings));
        Self {
            controller,
            events,
            settings,
            signals,
        }
    }
}

/// Deliver resource signals to the controller until the player is dropped
async fn pump_signals(shared: Weak<Shared>, mut rx: mpsc::UnboundedReceiver<SignalEnvelope>) {
    while let Some(envelope) = rx.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.handle_signal(envelope).await;
    }
}

/// Playlist player
///
/// Cheap to clone; clones control the same playlist. Must be created inside
/// a Tokio runtime. Transport methods never fail: they return `false` when
/// the operation was rejected, and resource failures are also delivered as
/// [`EventKind::Error`] events.
#[derive(Clone)]
pub struct Player {
    shared: Arc<Shared>,
}

impl Player {
    /// Create an empty player
    pub fn new(factory: impl ResourceFactory + 'static, config: PlayerConfig) -> Self {
        Self::start(Parts::new(Box::new(factory), config))
    }

    /// Create a player with one muse already in the playlist
    pub fn with_muse(
        factory: impl ResourceFactory + 'static,
        config: PlayerConfig,
        src: &str,
        id: &str,
        meta: MuseMeta,
        load: bool,
    ) -> Result<Self> {
        let mut parts = Parts::new(Box::new(factory), config);
        let key = parts.controller.add_muse(src, id, meta)?;
        let player = Self::start(parts);
        if load {
            player.spawn_preload(id, key);
        }
        Ok(player)
    }

    fn start(parts: Parts) -> Self {
        let Parts {
            controller,
            events,
            settings,
            signals,
        } = parts;

        let shared = Arc::new(Shared {
            controller: Mutex::new(controller),
            events,
            settings,
            sync: SyncEngine::new(),
            preloads: parking_lot::Mutex::new(HashMap::new()),
            pump: parking_lot::Mutex::new(None),
        });
        let pump = tokio::spawn(pump_signals(Arc::downgrade(&shared), signals));
        *shared.pump.lock() = Some(pump);

        Self { shared }
    }

    // ===== Playlist =====

    /// Append a muse to the end of the playlist
    ///
    /// With `load`, the resource starts loading in the background; a failure
    /// is reported as an `error` event.
    pub async fn add_muse(&self, src: &str, id: &str, meta: MuseMeta, load: bool) -> Result<()> {
        let key = self.shared.controller.lock().await.add_muse(src, id, meta)?;
        if load {
            self.spawn_preload(id, key);
        }
        Ok(())
    }

    /// Remove a muse
    ///
    /// If it is the selected muse, the selection moves to the next muse (or
    /// the previous one when it was last) first. A pending background load
    /// of the muse is cancelled.
    pub async fn remove_muse_by_id(&self, id: &str) -> Result<()> {
        self.shared.cancel_preload(id);
        let mut controller = self.shared.controller.lock().await;
        controller.remove_muse(id).await?;
        self.shared.reconcile(&controller);
        Ok(())
    }

    /// Look up a muse by id
    pub async fn get_muse_by_id(&self, id: &str) -> Option<Muse> {
        self.shared.controller.lock().await.muse(id)
    }

    /// All muses in playlist order
    pub async fn muses(&self) -> Vec<Muse> {
        self.shared.controller.lock().await.muses()
    }

    /// Number of muses in the playlist
    pub async fn len(&self) -> usize {
        self.shared.controller.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove every muse, stopping playback if active
    pub async fn empty(&self) {
        self.shared.cancel_all_preloads();
        let mut controller = self.shared.controller.lock().await;
        controller.empty();
        self.shared.reconcile(&controller);
    }

    /// Tear the player down to its initial state
    ///
    /// Cancels pending loads, empties the playlist, stops the sync ticker,
    /// drops every seek bar and time label, removes every event listener and
    /// restores the configuration the player was created with.
    pub async fn reset(&self) {
        self.shared.cancel_all_preloads();
        {
            let mut controller = self.shared.controller.lock().await;
            controller.empty();
        }
        self.shared.sync.clear();
        self.shared.events.clear();
        self.shared.settings.restore();
        info!("player reset");
    }

    // ===== Transport =====

    /// Load a muse (or the selected one when `id` is `None`) and select it
    pub async fn load(&self, id: Option<&str>) -> bool {
        let mut controller = self.shared.controller.lock().await;
        let result = controller.load(id).await;
        self.shared.reconcile(&controller);
        accepted("load", result)
    }

    pub async fn play(&self) -> bool {
        let mut controller = self.shared.controller.lock().await;
        let result = controller.play().await;
        self.shared.reconcile(&controller);
        accepted("play", result)
    }

    pub async fn pause(&self) -> bool {
        let mut controller = self.shared.controller.lock().await;
        let paused = controller.pause();
        self.shared.reconcile(&controller);
        paused
    }

    /// Pause and rewind the selected muse to 0:00
    pub async fn stop(&self) -> bool {
        let mut controller = self.shared.controller.lock().await;
        let result = controller.stop();
        self.shared.reconcile(&controller);
        result.unwrap_or_else(|e| {
            debug!(operation = "stop", error = %e, "rejected");
            false
        })
    }

    /// Select the next muse
    ///
    /// Returns `false` on the last muse (no wraparound). Playback continues
    /// on the new muse if the old one was playing.
    pub async fn next(&self) -> bool {
        let mut controller = self.shared.controller.lock().await;
        let result = controller.next().await;
        self.shared.reconcile(&controller);
        accepted("next", result)
    }

    /// Select the previous muse; same rules as [`Player::next`]
    pub async fn previous(&self) -> bool {
        let mut controller = self.shared.controller.lock().await;
        let result = controller.previous().await;
        self.shared.reconcile(&controller);
        accepted("previous", result)
    }

    pub async fn skip_to_id(&self, id: &str) -> bool {
        let mut controller = self.shared.controller.lock().await;
        let result = controller.skip_to_id(id).await;
        self.shared.reconcile(&controller);
        accepted("skip", result)
    }

    /// Skip to the muse at `index` (starting from 0)
    pub async fn skip_to_index(&self, index: usize) -> bool {
        let mut controller = self.shared.controller.lock().await;
        let result = controller.skip_to_index(index).await;
        self.shared.reconcile(&controller);
        accepted("skip", result)
    }

    // ===== Events =====

    /// Register a listener for `kind`
    pub fn on<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        self.shared.events.on(kind, handler)
    }

    /// Alias of [`Player::on`]
    pub fn add_event_listener<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        self.on(kind, handler)
    }

    /// Register a listener that fires at most once
    pub fn once<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        self.shared.events.once(kind, handler)
    }

    /// Remove a listener; returns `false` if it was not registered
    pub fn not_on(&self, kind: EventKind, id: ListenerId) -> bool {
        self.shared.events.not_on(kind, id)
    }

    /// Alias of [`Player::not_on`]
    pub fn remove_event_listener(&self, kind: EventKind, id: ListenerId) -> bool {
        self.not_on(kind, id)
    }

    // ===== UI bindings =====

    /// Bind a seek bar
    ///
    /// `fill` is resized (as a percentage of `track`) on every sync tick.
    /// `initial_percentage` (0-100) is shown while the duration is unknown.
    pub fn add_seek_bar(
        &self,
        track: Arc<dyn SeekTrack>,
        fill: Arc<dyn SeekFill>,
        initial_percentage: Option<f64>,
    ) -> SeekBarId {
        self.shared.sync.add_seek_bar(track, fill, initial_percentage)
    }

    /// Bind an element whose text shows a timestamp
    pub fn add_element(&self, display: TimeDisplay, target: Arc<dyn TextTarget>) -> TimeLabelId {
        self.shared.sync.add_label(display, target)
    }

    /// Seek from a drag on a bound seek bar
    ///
    /// `offset` is measured from the bar's start in the unit of
    /// [`SeekTrack::width`]. Works while paused.
    pub async fn drag_seek_bar(&self, bar: SeekBarId, offset: f64) -> bool {
        let Some(fraction) = self.shared.sync.drag_fraction(bar, offset) else {
            debug!(offset, "drag on unknown or empty seek bar ignored");
            return false;
        };
        let mut controller = self.shared.controller.lock().await;
        let result = controller.seek_fraction(fraction);
        self.shared.reconcile(&controller);
        accepted("drag seek", result)
    }

    /// Whether the sync ticker is currently running
    pub fn is_syncing(&self) -> bool {
        self.shared.sync.ticker_running()
    }

    // ===== Properties =====

    /// Whether the selected muse has loaded
    pub async fn loaded(&self) -> bool {
        self.shared
            .controller
            .lock()
            .await
            .selected_state()
            .is_some_and(|state| state.is_loaded())
    }

    pub async fn playing(&self) -> bool {
        self.shared.controller.lock().await.is_playing()
    }

    pub async fn paused(&self) -> bool {
        self.shared.controller.lock().await.selected_state() == Some(MuseState::Paused)
    }

    /// Duration of the selected muse (zero while unloaded)
    pub async fn duration(&self) -> Duration {
        self.shared.controller.lock().await.duration()
    }

    pub async fn current_muse(&self) -> Option<Muse> {
        self.shared.controller.lock().await.current_muse()
    }

    pub async fn current_index(&self) -> Option<usize> {
        self.shared.controller.lock().await.current_index()
    }

    /// Position of the selected muse in seconds
    pub async fn current_seconds(&self) -> f64 {
        self.shared.controller.lock().await.position().as_secs_f64()
    }

    /// Seek the selected muse to `seconds`
    ///
    /// Clamped to the duration; bound UI elements update immediately.
    pub async fn set_current_seconds(&self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(PlaybackError::InvalidSeekPosition(seconds));
        }
        let position = Duration::try_from_secs_f64(seconds)
            .map_err(|_| PlaybackError::InvalidSeekPosition(seconds))?;

        let mut controller = self.shared.controller.lock().await;
        controller.seek(position)?;
        self.shared.reconcile(&controller);
        Ok(())
    }

    /// Position of the selected muse as a fraction in `[0, 1]`
    pub async fn current_percentage(&self) -> f64 {
        let controller = self.shared.controller.lock().await;
        controller
            .progress()
            .and_then(|progress| progress.fraction())
            .unwrap_or(0.0)
    }

    /// Seek the selected muse to a fraction (clamped to `[0, 1]`) of its duration
    pub async fn set_current_percentage(&self, fraction: f64) -> Result<()> {
        let mut controller = self.shared.controller.lock().await;
        controller.seek_fraction(fraction)?;
        self.shared.reconcile(&controller);
        Ok(())
    }

    pub fn auto_play(&self) -> bool {
        self.shared.settings.auto_play()
    }

    /// Play the next muse automatically when one ends
    pub fn set_auto_play(&self, enabled: bool) {
        self.shared.settings.set_auto_play(enabled);
    }

    pub fn remember_time(&self) -> bool {
        self.shared.settings.remember_time()
    }

    /// Keep each muse's position when switching away from it
    pub fn set_remember_time(&self, enabled: bool) {
        self.shared.settings.set_remember_time(enabled);
    }

    /// Current configuration values
    pub fn config(&self) -> PlayerConfig {
        self.shared.settings.snapshot()
    }

    // ===== Internals =====

    fn spawn_preload(&self, id: &str, key: MuseKey) {
        let weak = Arc::downgrade(&self.shared);
        let task_id = id.to_string();

        // Held across the spawn so the task cannot finish before it is tracked
        let mut preloads = self.shared.preloads.lock();
        let handle = tokio::spawn(async move {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            {
                let mut controller = shared.controller.lock().await;
                // Removed while waiting for the gate
                if controller.contains(key) {
                    if let Err(e) = controller.preload(key).await {
                        debug!(id = %task_id, error = %e, "background load failed");
                    }
                }
            }

            let mut preloads = shared.preloads.lock();
            if preloads.get(&task_id).is_some_and(|pending| pending.key == key) {
                preloads.remove(&task_id);
            }
        });
        preloads.insert(id.to_string(), PendingLoad { key, handle });
    }
}

/// Collapse a transport result into the boolean the public API reports
fn accepted<T>(operation: &str, result: Result<T>) -> bool {
    match result {
        Ok(_) => true,
        Err(e) => {
            debug!(operation, error = %e, "rejected");
            false
        }
    }
}
