//! # Audio Ingestion Module
//!
//! Turns audio files into the mono [`SampleBuffer`] the analysis core works on.
//! Decoding is the only fallible step at this boundary; everything downstream
//! receives a validated buffer.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tempo_tracker::audio::AudioLoader;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let loaded = AudioLoader::load("song.wav").await?;
//! println!(
//!     "{:.1}s at {} Hz",
//!     loaded.buffer.duration(),
//!     loaded.buffer.sample_rate()
//! );
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod types;

pub use loader::AudioLoader;
pub use types::{AudioFormat, LoadedAudio, SampleBuffer};
