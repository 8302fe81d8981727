//! # Offline Analysis Module
//!
//! Beat and tempo estimation over a complete mono buffer.
//!
//! The pipeline runs in four stages:
//!
//! 1. [`Preprocessor`] band-limits the signal with a zero-phase Butterworth band-pass
//! 2. [`FeatureExtractor`] frames it and computes short-time energy and spectral flux
//! 3. [`PeakPicker`] turns each onset-strength series into beat events
//! 4. [`TempoEstimator`] converts each beat sequence into a tempo
//!
//! [`OfflineAnalyzer`] wires the stages together and reports both features
//! side by side instead of picking a winner.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tempo_tracker::analysis::OfflineAnalyzer;
//! use tempo_tracker::audio::AudioLoader;
//!
//! # fn main() -> tempo_tracker::Result<()> {
//! let loaded = AudioLoader::load_blocking("song.wav")?;
//! let result = OfflineAnalyzer::new().analyze(&loaded.buffer)?;
//!
//! println!("energy: {:.1} BPM", result.tempo_energy().bpm);
//! println!("flux:   {:.1} BPM", result.tempo_flux().bpm);
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod features;
pub mod filter;
pub mod peaks;
pub mod tempo;
pub mod types;

pub use analyzer::OfflineAnalyzer;
pub use features::{FeatureExtractor, Features};
pub use filter::Preprocessor;
pub use peaks::{PeakPicker, Refractory, Stats, Threshold};
pub use tempo::{LagWindow, TempoEstimator};
pub use types::{
    AnalysisResult, BeatEvent, FeatureKind, FeatureSeries, FeatureTrack, TempoEstimate,
    TempoMethod,
};
