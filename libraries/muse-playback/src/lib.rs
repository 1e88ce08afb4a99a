//! Muse Player - Playlist Playback
//!
//! Platform-agnostic playlist player for Muse Player.
//!
//! This crate provides:
//! - Ordered playlist of muses (playable items with metadata)
//! - Transport control (load, play, pause, stop, seek)
//! - Navigation (next, previous, skip to id or index)
//! - Auto-play and per-muse position memory
//! - Typed event listeners (`on`, `once`, `not_on`)
//! - Seek bar and time label sync while playing
//!
//! # Architecture
//!
//! `muse-playback` does not produce sound itself. Each muse is backed by a
//! [`PlayableResource`] created through a [`ResourceFactory`] supplied by the
//! platform (browser audio element, native decoder, remote renderer).
//!
//! Transport operations on a [`Player`] are serialized: each one waits for the
//! previous to finish, so `play()` followed by `pause()` always ends paused.
//! Resources report end-of-track and late errors through a [`SignalSink`];
//! signals for muses that have since been removed are ignored.
//!
//! # Example
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use muse_playback::{
//!     EventKind, MuseMeta, PlayableResource, Player, PlayerConfig, PlayerEvent, Result,
//!     SignalSink,
//! };
//! use std::time::Duration;
//!
//! struct Silence {
//!     position: Duration,
//! }
//!
//! #[async_trait]
//! impl PlayableResource for Silence {
//!     async fn load(&mut self) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     async fn play(&mut self) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     fn pause(&mut self) {}
//!
//!     fn duration(&self) -> Duration {
//!         Duration::from_secs(180)
//!     }
//!
//!     fn position(&self) -> Duration {
//!         self.position
//!     }
//!
//!     fn set_position(&mut self, position: Duration) {
//!         self.position = position;
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let factory = |_src: &str, _signals: SignalSink| -> Box<dyn PlayableResource> {
//!         Box::new(Silence { position: Duration::ZERO })
//!     };
//!     let player = Player::new(factory, PlayerConfig::default());
//!
//!     player.on(EventKind::Play, |event: &PlayerEvent| println!("{:?}", event));
//!
//!     player.add_muse("/music/a.mp3", "a", MuseMeta::titled("A"), false).await?;
//!     player.add_muse("/music/b.mp3", "b", MuseMeta::titled("B"), false).await?;
//!
//!     player.play().await;
//!     player.set_current_seconds(30.0).await?;
//!     player.next().await;
//!     Ok(())
//! }
//! ```

mod config;
mod controller;
mod error;
mod events;
mod player;
mod playlist;
mod resource;
mod sync;
pub mod types;

// Public exports
pub use config::PlayerConfig;
pub use error::{PlaybackError, Result};
pub use events::{EventBus, EventKind, ListenerId, PlayerEvent};
pub use player::Player;
pub use playlist::MuseKey;
pub use resource::{PlayableResource, ResourceFactory, ResourceSignal, SignalSink};
pub use sync::{format_time, Progress, SeekBarId, SeekFill, SeekTrack, TextTarget, TimeLabelId};
pub use types::{Muse, MuseMeta, MuseState, TimeDisplay};
