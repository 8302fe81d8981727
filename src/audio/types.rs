use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AudioError, Result};

/// Mono audio at a known sample rate
///
/// Stages never mutate a buffer they receive: filtering produces a new
/// buffer so the original stays available for display and testing.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Validate and wrap decoded samples
    ///
    /// Samples are expected to be normalized to roughly [-1, 1]. Non-finite
    /// samples are rejected, an empty buffer is accepted here and refused by
    /// the analysis pipeline instead.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidParameters {
                details: "sample rate must be positive".to_string(),
            }
            .into());
        }

        if let Some(pos) = samples.iter().position(|s| !s.is_finite()) {
            return Err(AudioError::InvalidParameters {
                details: format!("non-finite sample at index {}", pos),
            }
            .into());
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Mix interleaved multi-channel samples down to mono
    pub fn from_interleaved(interleaved: &[f32], channels: u16, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(AudioError::InvalidParameters {
                details: "channel count must be positive".to_string(),
            }
            .into());
        }

        if channels == 1 {
            return Self::new(interleaved.to_vec(), sample_rate);
        }

        let mono = interleaved
            .chunks_exact(channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();

        Self::new(mono, sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Nyquist frequency in Hz
    pub fn nyquist(&self) -> f64 {
        self.sample_rate as f64 / 2.0
    }

    /// Build a buffer of the same rate around new samples
    pub(crate) fn with_samples(&self, samples: Vec<f32>) -> Self {
        Self {
            samples,
            sample_rate: self.sample_rate,
        }
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

/// Audio file format information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFormat {
    /// File extension (wav, mp3, flac, etc.)
    pub extension: String,

    /// Bit depth (16, 24, 32, etc.)
    pub bit_depth: Option<u16>,

    /// Codec description for compressed formats
    pub compression: Option<String>,
}

/// A decoded file: the mono buffer plus where it came from
#[derive(Debug, Clone)]
pub struct LoadedAudio {
    /// Mono samples at the decoded rate
    pub buffer: SampleBuffer,

    /// Channel count before the mono mixdown
    pub source_channels: u16,

    /// Original file path
    pub file_path: PathBuf,

    /// Audio format information
    pub format: AudioFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_mixdown() {
        let stereo = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]; // L, R, L, R, L, R
        let buffer = SampleBuffer::from_interleaved(&stereo, 2, 44100).unwrap();
        assert_eq!(buffer.samples(), &[1.5, 3.5, 5.5]);
        assert_eq!(buffer.sample_rate(), 44100);
    }

    #[test]
    fn test_zero_sample_rate_rejected() {
        assert!(SampleBuffer::new(vec![0.0; 16], 0).is_err());
    }

    #[test]
    fn test_non_finite_samples_rejected() {
        let result = SampleBuffer::new(vec![0.0, f32::NAN, 0.0], 22050);
        assert!(result.is_err());
    }

    #[test]
    fn test_duration_and_nyquist() {
        let buffer = SampleBuffer::new(vec![0.0; 22050], 22050).unwrap();
        assert_eq!(buffer.duration(), 1.0);
        assert_eq!(buffer.nyquist(), 11025.0);
        assert!(!buffer.is_empty());
    }
}
