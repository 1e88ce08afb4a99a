//! Shared fakes for player integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use muse_playback::{
    EventKind, PlayableResource, PlaybackError, Player, PlayerEvent, ResourceFactory,
    ResourceSignal, Result, SeekFill, SeekTrack, SignalSink, TextTarget,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Observable state of one fake resource
#[derive(Debug)]
pub struct FakeState {
    pub loaded: bool,
    pub playing: bool,
    pub position: Duration,
    pub duration: Duration,
    pub fail_load: bool,
    pub load_delay: Duration,
    pub load_calls: usize,
}

impl FakeState {
    fn new(src: &str, load_delay: Duration) -> Self {
        Self {
            loaded: false,
            playing: false,
            position: Duration::ZERO,
            duration: Duration::from_secs(100),
            fail_load: src.contains("broken"),
            load_delay,
            load_calls: 0,
        }
    }
}

/// Resource whose clock only moves when a test moves it
pub struct FakeResource {
    state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl PlayableResource for FakeResource {
    async fn load(&mut self) -> Result<()> {
        let (delay, fail) = {
            let state = self.state.lock();
            (state.load_delay, state.fail_load)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        state.load_calls += 1;
        if fail {
            return Err(PlaybackError::LoadFailure("cannot decode".to_string()));
        }
        state.loaded = true;
        Ok(())
    }

    async fn play(&mut self) -> Result<()> {
        self.state.lock().playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.state.lock().playing = false;
    }

    fn duration(&self) -> Duration {
        let state = self.state.lock();
        if state.loaded {
            state.duration
        } else {
            Duration::ZERO
        }
    }

    fn position(&self) -> Duration {
        self.state.lock().position
    }

    fn set_position(&mut self, position: Duration) {
        let mut state = self.state.lock();
        state.position = position.min(state.duration);
    }
}

struct Entry {
    state: Arc<Mutex<FakeState>>,
    signals: SignalSink,
}

/// Factory that keeps a handle on every resource it creates
#[derive(Clone, Default)]
pub struct FakeFactory {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    load_delay: Duration,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every created resource takes `delay` to load
    pub fn with_load_delay(delay: Duration) -> Self {
        Self {
            load_delay: delay,
            ..Self::default()
        }
    }

    pub fn state(&self, src: &str) -> Arc<Mutex<FakeState>> {
        let entries = self.entries.lock();
        let entry = entries.get(src).expect("no resource created for src");
        Arc::clone(&entry.state)
    }

    /// Move the playback clock of a resource
    pub fn set_position(&self, src: &str, seconds: u64) {
        self.state(src).lock().position = Duration::from_secs(seconds);
    }

    /// Simulate the resource reaching its end
    pub fn finish(&self, src: &str) {
        let entries = self.entries.lock();
        let entry = entries.get(src).expect("no resource created for src");
        {
            let mut state = entry.state.lock();
            state.position = state.duration;
        }
        entry.signals.emit(ResourceSignal::Ended);
    }

    /// Simulate the resource becoming playable without a `load` call
    pub fn ready(&self, src: &str) {
        let entries = self.entries.lock();
        let entry = entries.get(src).expect("no resource created for src");
        entry.state.lock().loaded = true;
        entry.signals.emit(ResourceSignal::Ready);
    }

    /// Report an error outside of load/play
    pub fn fail(&self, src: &str, message: &str) {
        let entries = self.entries.lock();
        let entry = entries.get(src).expect("no resource created for src");
        entry.signals.emit(ResourceSignal::Error(message.to_string()));
    }

    /// Number of resources currently producing sound
    pub fn playing_count(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|entry| entry.state.lock().playing)
            .count()
    }
}

impl ResourceFactory for FakeFactory {
    fn create(&self, src: &str, signals: SignalSink) -> Box<dyn PlayableResource> {
        let state = Arc::new(Mutex::new(FakeState::new(src, self.load_delay)));
        self.entries.lock().insert(
            src.to_string(),
            Entry {
                state: Arc::clone(&state),
                signals,
            },
        );
        Box::new(FakeResource { state })
    }
}

/// Seek bar track with a fixed width
pub struct FakeTrack(pub f64);

impl SeekTrack for FakeTrack {
    fn width(&self) -> f64 {
        self.0
    }
}

/// Seek bar fill recording every width it is given
#[derive(Default)]
pub struct FakeFill(pub Mutex<Vec<f64>>);

impl FakeFill {
    pub fn last(&self) -> Option<f64> {
        self.0.lock().last().copied()
    }
}

impl SeekFill for FakeFill {
    fn set_width_percent(&self, percent: f64) {
        self.0.lock().push(percent);
    }
}

/// Text element recording every text it is given
#[derive(Default)]
pub struct FakeLabel(pub Mutex<Vec<String>>);

impl FakeLabel {
    pub fn last(&self) -> Option<String> {
        self.0.lock().last().cloned()
    }

    pub fn writes(&self) -> usize {
        self.0.lock().len()
    }
}

impl TextTarget for FakeLabel {
    fn set_text(&self, text: &str) {
        self.0.lock().push(text.to_string());
    }
}

/// Let the signal pump and background loads run
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// Collect every event of `kind` the player emits
pub fn record(player: &Player, kind: EventKind) -> Arc<Mutex<Vec<PlayerEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    player.on(kind, move |event: &PlayerEvent| sink.lock().push(event.clone()));
    events
}
