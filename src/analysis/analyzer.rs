use rayon::prelude::*;

use crate::analysis::features::FeatureExtractor;
use crate::analysis::filter::Preprocessor;
use crate::analysis::peaks::PeakPicker;
use crate::analysis::tempo::TempoEstimator;
use crate::analysis::types::{AnalysisResult, FeatureSeries, FeatureTrack, TempoMethod};
use crate::audio::SampleBuffer;
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result, TrackerError};

/// Fraction of Nyquist the upper band edge is lowered to when it does not fit
const HIGH_CUT_NYQUIST_FRACTION: f64 = 0.95;

/// Band-pass, onset features, peak picking and tempo estimation over a whole buffer
///
/// The analyzer holds only its configuration, so one instance can be shared
/// across threads and used for any number of buffers.
#[derive(Debug, Clone)]
pub struct OfflineAnalyzer {
    config: AnalysisConfig,
}

impl OfflineAnalyzer {
    /// Create a new analyzer with default configuration
    pub fn new() -> Self {
        Self {
            config: AnalysisConfig::default(),
        }
    }

    /// Create a new analyzer with custom configuration
    pub fn with_config(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run the full pipeline on one mono buffer
    pub fn analyze(&self, buffer: &SampleBuffer) -> Result<AnalysisResult> {
        if buffer.is_empty() {
            return Err(AnalysisError::failed("input buffer is empty").into());
        }
        if buffer.len() <= self.config.frame_size {
            return Err(AnalysisError::failed(format!(
                "input has {} samples, need more than one {}-sample frame",
                buffer.len(),
                self.config.frame_size
            ))
            .into());
        }

        tracing::info!(
            "Analyzing {:.2} seconds of audio at {} Hz",
            buffer.duration(),
            buffer.sample_rate()
        );

        let high_cut = self.high_cut_for(buffer.sample_rate());
        tracing::debug!(
            "Band-pass {:.0}-{:.0} Hz",
            self.config.low_cut_hz,
            high_cut
        );
        let preprocessor = Preprocessor::new(buffer.sample_rate(), self.config.low_cut_hz, high_cut)?;
        let filtered = preprocessor.apply(buffer)?;

        tracing::debug!("Extracting energy and spectral flux...");
        let extractor = FeatureExtractor::new(self.config.frame_size, self.config.hop_size)?;
        let features = extractor.extract(&filtered)?;

        let picker = PeakPicker::for_grid(buffer.sample_rate(), self.config.hop_size);
        let estimator = TempoEstimator::with_lag_window(buffer.sample_rate(), self.config.lag_window());
        let method = self.config.tempo_method;

        let energy = Self::track(
            features.energy,
            &picker,
            self.config.energy_threshold_factor,
            &estimator,
            method,
        );
        let flux = Self::track(
            features.flux,
            &picker,
            self.config.flux_threshold_factor,
            &estimator,
            method,
        );

        let result = AnalysisResult {
            duration: buffer.duration(),
            sample_rate: buffer.sample_rate(),
            energy,
            flux,
        };

        tracing::info!(
            "Analysis complete: energy {} beats @ {:.1} BPM, flux {} beats @ {:.1} BPM",
            result.energy.beats.len(),
            result.tempo_energy().bpm,
            result.flux.beats.len(),
            result.tempo_flux().bpm
        );
        if let Some(gap) = result.disagreement_bpm() {
            if gap > 5.0 {
                tracing::warn!("Energy and flux tempi disagree by {:.1} BPM", gap);
            }
        }

        Ok(result)
    }

    /// Analyze independent buffers in parallel on the global rayon pool
    ///
    /// Results come back in input order; one failing buffer does not affect
    /// the others.
    pub fn analyze_batch(&self, buffers: &[SampleBuffer]) -> Vec<Result<AnalysisResult>> {
        buffers.par_iter().map(|buffer| self.analyze(buffer)).collect()
    }

    /// Same as [`analyze_batch`](Self::analyze_batch) on a dedicated pool of `threads` workers
    pub fn analyze_batch_with_threads(
        &self,
        buffers: &[SampleBuffer],
        threads: usize,
    ) -> Result<Vec<Result<AnalysisResult>>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| TrackerError::generic(format!("Failed to build thread pool: {}", e)))?;

        Ok(pool.install(|| self.analyze_batch(buffers)))
    }

    /// Upper band edge usable at `sample_rate`
    fn high_cut_for(&self, sample_rate: u32) -> f64 {
        let ceiling = sample_rate as f64 / 2.0 * HIGH_CUT_NYQUIST_FRACTION;
        if self.config.clamp_high_cut && self.config.high_cut_hz >= ceiling {
            tracing::debug!(
                "High cut {:.0} Hz lowered to {:.0} Hz for {} Hz input",
                self.config.high_cut_hz,
                ceiling,
                sample_rate
            );
            ceiling
        } else {
            self.config.high_cut_hz
        }
    }

    fn track(
        series: FeatureSeries,
        picker: &PeakPicker,
        threshold_factor: f32,
        estimator: &TempoEstimator,
        method: TempoMethod,
    ) -> FeatureTrack {
        let beats = picker.pick(&series, threshold_factor);
        let times: Vec<f64> = beats.iter().map(|b| b.time).collect();
        let tempo = estimator.estimate(&times, method);
        let cross_check = estimator.estimate(&times, method.other());

        tracing::debug!(
            "{}: {} beats, {} {:.1} BPM, {} {:.1} BPM",
            series.kind,
            beats.len(),
            tempo.method,
            tempo.bpm,
            cross_check.method,
            cross_check.bpm
        );

        FeatureTrack {
            series,
            beats,
            tempo,
            cross_check,
        }
    }
}

impl Default for OfflineAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
