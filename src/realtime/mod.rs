//! # Live Detection Module
//!
//! Beat detection on a stream of fixed-size mono blocks.
//!
//! [`StreamingDetector`] is the state machine: idle until started, then one
//! step per block using an adaptive energy threshold over a rolling window.
//! [`live_session`] splits it across threads so the capture callback only
//! ever takes a short lock and never waits on the reporting side.
//!
//! ## Usage
//!
//! ```rust
//! use tempo_tracker::config::StreamingConfig;
//! use tempo_tracker::realtime::live_session;
//!
//! # fn main() -> tempo_tracker::Result<()> {
//! let (handle, mut feeder, mut beats) = live_session(StreamingConfig::default())?;
//! handle.start();
//!
//! // from the capture callback
//! feeder.push_samples(&[0.0; 4096])?;
//!
//! // from the reporting thread
//! while let Some(beat) = beats.try_recv() {
//!     println!("beat {} at {:.2}s", beat.index, beat.timestamp);
//! }
//! let summary = handle.stop();
//! # assert!(summary.is_some());
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "capture")]
pub mod capture;
pub mod detector;
pub mod ring;
pub mod session;

#[cfg(feature = "capture")]
pub use capture::LiveCapture;
pub use detector::{DetectorSnapshot, SessionSummary, StreamBeat, StreamingDetector};
pub use ring::RingBuffer;
pub use session::{live_session, BeatReceiver, BlockFeeder, DetectorHandle};
