use std::sync::Arc;

use realfft::{RealFftPlanner, RealToComplex};

use crate::analysis::types::{FeatureKind, FeatureSeries};
use crate::audio::SampleBuffer;
use crate::error::{AnalysisError, Result};

/// Energy and spectral flux over the same frame grid
#[derive(Debug, Clone)]
pub struct Features {
    pub energy: FeatureSeries,
    pub flux: FeatureSeries,
}

/// Computes onset-strength series from a sample buffer
///
/// Frames of `frame_size` samples start every `hop_size` samples. A frame is
/// only used when it ends strictly before the end of the buffer; trailing
/// partial frames are dropped rather than zero-padded.
pub struct FeatureExtractor {
    frame_size: usize,
    hop_size: usize,
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
}

impl FeatureExtractor {
    pub fn new(frame_size: usize, hop_size: usize) -> Result<Self> {
        if frame_size == 0 {
            return Err(AnalysisError::invalid("frame_size", "must be positive").into());
        }
        if hop_size == 0 {
            return Err(AnalysisError::invalid("hop_size", "must be positive").into());
        }
        if hop_size > frame_size {
            return Err(AnalysisError::invalid(
                "hop_size",
                format!("{} exceeds frame size {}", hop_size, frame_size),
            )
            .into());
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(frame_size);

        Ok(Self {
            frame_size,
            hop_size,
            fft,
            window: hann(frame_size),
        })
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Number of complete frames that fit in `len` samples
    pub fn frame_count(&self, len: usize) -> usize {
        if len <= self.frame_size {
            0
        } else {
            (len - self.frame_size - 1) / self.hop_size + 1
        }
    }

    fn frames<'a>(&self, samples: &'a [f32]) -> impl Iterator<Item = &'a [f32]> + 'a {
        let (frame, hop) = (self.frame_size, self.hop_size);
        (0..self.frame_count(samples.len())).map(move |i| &samples[i * hop..i * hop + frame])
    }

    /// Both features, aligned to the same hop grid
    pub fn extract(&self, buffer: &SampleBuffer) -> Result<Features> {
        Ok(Features {
            energy: self.energy(buffer),
            flux: self.spectral_flux(buffer)?,
        })
    }

    /// Sum of squared samples per frame
    pub fn energy(&self, buffer: &SampleBuffer) -> FeatureSeries {
        let values = self
            .frames(buffer.samples())
            .map(|frame| frame.iter().map(|&x| x * x).sum::<f32>())
            .collect();

        FeatureSeries::new(FeatureKind::Energy, values, self.hop_size, buffer.sample_rate())
    }

    /// Positive magnitude increase between consecutive Hann-windowed frames
    ///
    /// Only the lower half of the spectrum (bins `0..frame_size / 2`) is used.
    /// The first frame has no predecessor and gets 0.
    pub fn spectral_flux(&self, buffer: &SampleBuffer) -> Result<FeatureSeries> {
        let bins = self.frame_size / 2;
        let mut input = self.fft.make_input_vec();
        let mut spectrum = self.fft.make_output_vec();
        let mut previous: Option<Vec<f32>> = None;
        let mut current = vec![0.0f32; bins];
        let mut values = Vec::with_capacity(self.frame_count(buffer.len()));

        for frame in self.frames(buffer.samples()) {
            for ((slot, &sample), &w) in input.iter_mut().zip(frame).zip(&self.window) {
                *slot = sample * w;
            }

            self.fft
                .process(&mut input, &mut spectrum)
                .map_err(|e| AnalysisError::failed(format!("FFT processing failed: {}", e)))?;

            for (magnitude, bin) in current.iter_mut().zip(&spectrum) {
                *magnitude = bin.norm();
            }

            let flux = match previous.as_mut() {
                Some(prev) => {
                    let flux = current
                        .iter()
                        .zip(prev.iter())
                        .map(|(&curr, &prev)| (curr - prev).max(0.0))
                        .sum::<f32>();
                    prev.copy_from_slice(&current);
                    flux
                }
                None => {
                    previous = Some(current.clone());
                    0.0
                }
            };

            values.push(flux);
        }

        Ok(FeatureSeries::new(
            FeatureKind::Flux,
            values,
            self.hop_size,
            buffer.sample_rate(),
        ))
    }
}

/// Symmetric Hann window, matching the usual `0.5 - 0.5 cos(2πn / (N - 1))`
fn hann(size: usize) -> Vec<f32> {
    if size == 1 {
        return vec![1.0];
    }
    (0..size)
        .map(|i| {
            0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos()
        })
        .collect()
}
