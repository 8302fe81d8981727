//! Zero-phase Butterworth band-pass used ahead of feature extraction.
//!
//! The band-pass is a 4th-order high-pass cascaded with a 4th-order low-pass,
//! each realised as two biquad sections. Running the cascade forward and then
//! backward cancels the phase response, so transients keep their position in
//! time.

use std::f64::consts::PI;

use crate::audio::SampleBuffer;
use crate::error::{AnalysisError, Result};

/// Order of each Butterworth edge
pub const FILTER_ORDER: usize = 4;

/// Default lower edge of the percussive band
pub const DEFAULT_LOW_CUT_HZ: f64 = 80.0;

/// Default upper edge of the percussive band
pub const DEFAULT_HIGH_CUT_HZ: f64 = 16000.0;

/// One second-order section in transposed direct form II
#[derive(Debug, Clone, Copy, PartialEq)]
struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Biquad {
    fn lowpass(sample_rate: f64, cutoff: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * cutoff / sample_rate;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q);
        let a0 = 1.0 + alpha;

        Self {
            b0: (1.0 - cos) / 2.0 / a0,
            b1: (1.0 - cos) / a0,
            b2: (1.0 - cos) / 2.0 / a0,
            a1: -2.0 * cos / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    fn highpass(sample_rate: f64, cutoff: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * cutoff / sample_rate;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q);
        let a0 = 1.0 + alpha;

        Self {
            b0: (1.0 + cos) / 2.0 / a0,
            b1: -(1.0 + cos) / a0,
            b2: (1.0 + cos) / 2.0 / a0,
            a1: -2.0 * cos / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    /// Gain at 0 Hz
    fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }

    /// State that makes the section output steady for a constant input
    fn steady_state(&self, input: f64) -> [f64; 2] {
        let output = self.dc_gain() * input;
        let z2 = self.b2 * input - self.a2 * output;
        let z1 = self.b1 * input - self.a1 * output + z2;
        [z1, z2]
    }

    fn run(&self, signal: &mut [f64], state: [f64; 2]) {
        let [mut z1, mut z2] = state;
        for x in signal.iter_mut() {
            let input = *x;
            let output = self.b0 * input + z1;
            z1 = self.b1 * input - self.a1 * output + z2;
            z2 = self.b2 * input - self.a2 * output;
            *x = output;
        }
    }
}

/// Quality factors of the biquads making up a Butterworth filter of `order`
fn butterworth_q(order: usize) -> impl Iterator<Item = f64> {
    (0..order / 2).map(move |k| {
        let theta = PI * (2 * k + 1) as f64 / (2 * order) as f64;
        1.0 / (2.0 * theta.cos())
    })
}

/// Band-limits a buffer to the percussive range
#[derive(Debug, Clone)]
pub struct Preprocessor {
    sections: Vec<Biquad>,
    low_cut_hz: f64,
    high_cut_hz: f64,
    sample_rate: u32,
}

impl Preprocessor {
    /// Design the band-pass for a sample rate
    ///
    /// Both cutoffs must be positive, `low_cut_hz < high_cut_hz`, and both
    /// must lie below Nyquist.
    pub fn new(sample_rate: u32, low_cut_hz: f64, high_cut_hz: f64) -> Result<Self> {
        let nyquist = sample_rate as f64 / 2.0;

        if sample_rate == 0 {
            return Err(AnalysisError::invalid("sample_rate", "must be positive").into());
        }
        if !(low_cut_hz.is_finite() && low_cut_hz > 0.0) {
            return Err(AnalysisError::invalid(
                "low_cut_hz",
                format!("{} Hz is not a positive frequency", low_cut_hz),
            )
            .into());
        }
        if !high_cut_hz.is_finite() || low_cut_hz >= high_cut_hz {
            return Err(AnalysisError::invalid(
                "high_cut_hz",
                format!("{} Hz must be above the low cut of {} Hz", high_cut_hz, low_cut_hz),
            )
            .into());
        }
        if high_cut_hz >= nyquist {
            return Err(AnalysisError::invalid(
                "high_cut_hz",
                format!("{} Hz is not below Nyquist ({} Hz)", high_cut_hz, nyquist),
            )
            .into());
        }

        let rate = sample_rate as f64;
        let sections = butterworth_q(FILTER_ORDER)
            .map(|q| Biquad::highpass(rate, low_cut_hz, q))
            .chain(butterworth_q(FILTER_ORDER).map(|q| Biquad::lowpass(rate, high_cut_hz, q)))
            .collect();

        Ok(Self {
            sections,
            low_cut_hz,
            high_cut_hz,
            sample_rate,
        })
    }

    pub fn low_cut_hz(&self) -> f64 {
        self.low_cut_hz
    }

    pub fn high_cut_hz(&self) -> f64 {
        self.high_cut_hz
    }

    /// Filter a buffer with the default 80 Hz to 16 kHz band
    pub fn filter_default(buffer: &SampleBuffer) -> Result<SampleBuffer> {
        Self::filter(buffer, DEFAULT_LOW_CUT_HZ, DEFAULT_HIGH_CUT_HZ)
    }

    /// Design a band-pass for `buffer` and apply it
    pub fn filter(buffer: &SampleBuffer, low_cut_hz: f64, high_cut_hz: f64) -> Result<SampleBuffer> {
        let preprocessor = Self::new(buffer.sample_rate(), low_cut_hz, high_cut_hz)?;
        preprocessor.apply(buffer)
    }

    /// Apply the band-pass forward and backward
    ///
    /// Returns a new buffer of identical length and rate.
    pub fn apply(&self, buffer: &SampleBuffer) -> Result<SampleBuffer> {
        if buffer.sample_rate() != self.sample_rate {
            return Err(AnalysisError::invalid(
                "sample_rate",
                format!(
                    "filter designed for {} Hz, buffer is {} Hz",
                    self.sample_rate,
                    buffer.sample_rate()
                ),
            )
            .into());
        }

        let input: Vec<f64> = buffer.samples().iter().map(|&s| s as f64).collect();
        let filtered = self.filtfilt(&input);

        Ok(buffer.with_samples(filtered.into_iter().map(|s| s as f32).collect()))
    }

    fn filtfilt(&self, x: &[f64]) -> Vec<f64> {
        if x.len() < 2 {
            return x.to_vec();
        }

        // Odd extension at both ends tames the start-up transient
        let pad = (3 * (2 * self.sections.len() + 1)).min(x.len() - 1);
        let first = x[0];
        let last = x[x.len() - 1];

        let mut signal = Vec::with_capacity(x.len() + 2 * pad);
        signal.extend((1..=pad).rev().map(|i| 2.0 * first - x[i]));
        signal.extend_from_slice(x);
        signal.extend((1..=pad).map(|i| 2.0 * last - x[x.len() - 1 - i]));

        self.run_cascade(&mut signal);
        signal.reverse();
        self.run_cascade(&mut signal);
        signal.reverse();

        signal[pad..pad + x.len()].to_vec()
    }

    /// One pass through every section, each starting in steady state
    fn run_cascade(&self, signal: &mut [f64]) {
        let mut level = signal[0];
        for section in &self.sections {
            section.run(signal, section.steady_state(level));
            level *= section.dc_gain();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, sample_rate: u32, seconds: f64) -> SampleBuffer {
        let n = (sample_rate as f64 * seconds) as usize;
        let samples = (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / sample_rate as f64).sin() as f32 * 0.5)
            .collect();
        SampleBuffer::new(samples, sample_rate).unwrap()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    /// RMS of the middle half, away from the edges
    fn centre_rms(buffer: &SampleBuffer) -> f32 {
        let n = buffer.len();
        rms(&buffer.samples()[n / 4..3 * n / 4])
    }

    #[test]
    fn test_preserves_length_and_rate() {
        let input = sine(440.0, 44100, 0.5);
        let output = Preprocessor::filter_default(&input).unwrap();
        assert_eq!(output.len(), input.len());
        assert_eq!(output.sample_rate(), input.sample_rate());
        // original untouched
        assert_eq!(input, sine(440.0, 44100, 0.5));
    }

    #[test]
    fn test_passband_and_stopbands() {
        let pass = Preprocessor::filter_default(&sine(1000.0, 44100, 1.0)).unwrap();
        let rumble = Preprocessor::filter_default(&sine(15.0, 44100, 1.0)).unwrap();
        let hiss = Preprocessor::filter_default(&sine(20000.0, 44100, 1.0)).unwrap();

        let reference = centre_rms(&sine(1000.0, 44100, 1.0));
        assert!((centre_rms(&pass) / reference - 1.0).abs() < 0.05);
        assert!(centre_rms(&rumble) < reference * 0.05);
        assert!(centre_rms(&hiss) < reference * 0.5);
    }

    #[test]
    fn test_zero_phase_keeps_transient_position() {
        let mut samples = vec![0.0f32; 8192];
        for (i, s) in samples[4000..4040].iter_mut().enumerate() {
            *s = (2.0 * PI * 1500.0 * i as f64 / 22050.0).sin() as f32;
        }
        let input = SampleBuffer::new(samples, 22050).unwrap();
        let output = Preprocessor::filter(&input, 80.0, 8000.0).unwrap();

        let envelope_peak = |b: &SampleBuffer| {
            let s = b.samples();
            (0..s.len() - 64)
                .max_by(|&a, &c| {
                    let ea: f32 = s[a..a + 64].iter().map(|v| v * v).sum();
                    let ec: f32 = s[c..c + 64].iter().map(|v| v * v).sum();
                    ea.total_cmp(&ec)
                })
                .unwrap()
        };

        let shift = envelope_peak(&output) as i64 - envelope_peak(&input) as i64;
        assert!(shift.abs() <= 8, "transient moved by {} samples", shift);
    }

    #[test]
    fn test_rejects_inverted_cutoffs() {
        let input = sine(440.0, 44100, 0.1);
        assert!(Preprocessor::filter(&input, 2000.0, 1000.0).is_err());
        assert!(Preprocessor::filter(&input, 1000.0, 1000.0).is_err());
    }

    #[test]
    fn test_rejects_cutoff_above_nyquist() {
        // 16 kHz is above Nyquist at 22.05 kHz
        let input = sine(440.0, 22050, 0.1);
        let err = Preprocessor::filter_default(&input).unwrap_err();
        assert!(err.to_string().contains("high_cut_hz"));
        assert!(Preprocessor::filter(&input, 12000.0, 13000.0).is_err());
    }

    #[test]
    fn test_tiny_buffers() {
        let empty = SampleBuffer::new(vec![], 44100).unwrap();
        assert!(Preprocessor::filter_default(&empty).unwrap().is_empty());

        let single = SampleBuffer::new(vec![0.3], 44100).unwrap();
        assert_eq!(Preprocessor::filter_default(&single).unwrap().len(), 1);

        let short = SampleBuffer::new(vec![0.1, -0.2, 0.3, 0.0, 0.5], 44100).unwrap();
        let filtered = Preprocessor::filter_default(&short).unwrap();
        assert_eq!(filtered.len(), 5);
        assert!(filtered.samples().iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_butterworth_quality_factors() {
        let q: Vec<f64> = butterworth_q(4).collect();
        assert_eq!(q.len(), 2);
        assert!((q[0] - 0.5412).abs() < 1e-3);
        assert!((q[1] - 1.3066).abs() < 1e-3);
    }
}
