//! # Tempo-Tracker
//!
//! Beat and tempo estimation for recorded tracks and live input.
//!
//! Two independent paths share the same peak-picking rules:
//!
//! - **Offline**: a whole mono buffer is band-passed, reduced to energy and
//!   spectral-flux onset curves, peak-picked, and turned into two tempo
//!   estimates that are reported side by side.
//! - **Streaming**: fixed-size blocks from a capture callback drive an
//!   adaptive-threshold detector that emits beat events and a rolling tempo.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tempo_tracker::{AudioLoader, OfflineAnalyzer};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let loaded = AudioLoader::load("song.wav").await?;
//! let result = OfflineAnalyzer::new().analyze(&loaded.buffer)?;
//!
//! println!(
//!     "energy {:.1} BPM, flux {:.1} BPM, combined {:.1} BPM",
//!     result.tempo_energy().bpm,
//!     result.tempo_flux().bpm,
//!     result.combined_bpm()
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`audio`] - File decoding into validated mono buffers
//! - [`analysis`] - Offline pipeline: filter, features, peaks, tempo
//! - [`realtime`] - Streaming detector and its thread-split session
//! - [`config`] - Configuration management

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod realtime;

// Re-export commonly used types for convenience
pub use crate::{
    analysis::{AnalysisResult, OfflineAnalyzer, TempoEstimate, TempoMethod},
    audio::{AudioLoader, SampleBuffer},
    config::Config,
    error::{Result, TrackerError},
    realtime::{live_session, StreamBeat, StreamingDetector},
};
