//! UI sync engine
//!
//! Keeps bound seek bars and time labels consistent with playback progress.
//! A single ticker task drives rendering while a muse is playing; seeks and
//! transitions render immediately without waiting for the next tick.

use crate::types::TimeDisplay;
use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

new_key_type! {
    /// Handle to a registered seek bar
    pub struct SeekBarId;

    /// Handle to a registered time label
    pub struct TimeLabelId;
}

/// Outer (fixed width) element of a seek bar
pub trait SeekTrack: Send + Sync {
    /// Full width of the bar, in the same unit as drag offsets
    fn width(&self) -> f64;
}

/// Inner (filled) element of a seek bar
pub trait SeekFill: Send + Sync {
    /// Set the filled width as a percentage of the track (0-100)
    fn set_width_percent(&self, percent: f64);
}

/// Element whose text shows a timestamp
pub trait TextTarget: Send + Sync {
    fn set_text(&self, text: &str);
}

/// Position and duration of the selected muse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub position: Duration,
    pub duration: Duration,
}

impl Progress {
    /// Played fraction in `[0, 1]`, `None` while the duration is unknown
    pub fn fraction(&self) -> Option<f64> {
        if self.duration.is_zero() {
            return None;
        }
        Some((self.position.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0))
    }
}

/// Format seconds as `m:ss`
///
/// Minutes are not padded or wrapped into hours (`75:03`). Non-finite and
/// negative inputs format as `0:00`.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

struct SeekBarBinding {
    track: Arc<dyn SeekTrack>,
    fill: Arc<dyn SeekFill>,
    initial_percentage: f64,
}

struct TimeLabelBinding {
    display: TimeDisplay,
    target: Arc<dyn TextTarget>,
    last_text: Option<String>,
}

#[derive(Default)]
struct Bindings {
    seek_bars: SlotMap<SeekBarId, SeekBarBinding>,
    labels: SlotMap<TimeLabelId, TimeLabelBinding>,
}

/// Binding registry plus the ticker lifecycle
#[derive(Default)]
pub(crate) struct SyncEngine {
    bindings: Mutex<Bindings>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl SyncEngine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_seek_bar(
        &self,
        track: Arc<dyn SeekTrack>,
        fill: Arc<dyn SeekFill>,
        initial_percentage: Option<f64>,
    ) -> SeekBarId {
        let initial_percentage = initial_percentage
            .filter(|p| p.is_finite())
            .unwrap_or(0.0)
            .clamp(0.0, 100.0);
        fill.set_width_percent(initial_percentage);
        self.bindings.lock().seek_bars.insert(SeekBarBinding {
            track,
            fill,
            initial_percentage,
        })
    }

    pub(crate) fn add_label(&self, display: TimeDisplay, target: Arc<dyn TextTarget>) -> TimeLabelId {
        self.bindings.lock().labels.insert(TimeLabelBinding {
            display,
            target,
            last_text: None,
        })
    }

    #[cfg(test)]
    pub(crate) fn seek_bar_count(&self) -> usize {
        self.bindings.lock().seek_bars.len()
    }

    /// Convert a drag offset on a seek bar into a fraction of its width
    ///
    /// `None` for unknown bars or bars without a usable width.
    pub(crate) fn drag_fraction(&self, bar: SeekBarId, offset: f64) -> Option<f64> {
        let width = self.bindings.lock().seek_bars.get(bar)?.track.width();
        if !(width.is_finite() && width > 0.0 && offset.is_finite()) {
            return None;
        }
        Some((offset / width).clamp(0.0, 1.0))
    }

    /// Push progress into every binding
    pub(crate) fn render(&self, progress: Progress) {
        let mut bindings = self.bindings.lock();

        let fraction = progress.fraction();
        for bar in bindings.seek_bars.values() {
            let percent = fraction.map_or(bar.initial_percentage, |f| f * 100.0);
            bar.fill.set_width_percent(percent);
        }

        let current = format_time(progress.position.as_secs_f64());
        let total = format_time(progress.duration.as_secs_f64());
        for label in bindings.labels.values_mut() {
            let text = match label.display {
                TimeDisplay::CurrentTime => current.clone(),
                TimeDisplay::DurationTime => total.clone(),
                TimeDisplay::CompleteTime => format!("{}/{}", current, total),
            };
            if label.last_text.as_deref() != Some(text.as_str()) {
                label.target.set_text(&text);
                label.last_text = Some(text);
            }
        }
    }

    /// Start the ticker unless it is already running
    ///
    /// `tick` is called every `interval`; the task ends when it returns `false`.
    pub(crate) fn start_ticker<F>(&self, interval: Duration, tick: F)
    where
        F: Fn() -> bool + Send + 'static,
    {
        let mut ticker = self.ticker.lock();
        if ticker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        debug!(interval_ms = interval.as_millis() as u64, "starting sync ticker");
        *ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if !tick() {
                    break;
                }
            }
        }));
    }

    /// Cancel the ticker if it is running
    pub(crate) fn stop_ticker(&self) {
        if let Some(handle) = self.ticker.lock().take() {
            debug!("stopping sync ticker");
            handle.abort();
        }
    }

    pub(crate) fn ticker_running(&self) -> bool {
        self.ticker
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the ticker and drop every binding
    pub(crate) fn clear(&self) {
        self.stop_ticker();
        let mut bindings = self.bindings.lock();
        bindings.seek_bars.clear();
        bindings.labels.clear();
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}
