use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{
    analysis::{tempo::LagWindow, TempoMethod},
    error::{ConfigError, Result},
};

/// Main configuration for the Tempo-Tracker
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Offline analysis settings
    pub analysis: AnalysisConfig,

    /// Live detection settings
    pub streaming: StreamingConfig,

    /// Multi-file processing settings
    pub batch: BatchConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            key: "config".to_string(),
            value: e.to_string(),
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.analysis.validate()?;
        self.streaming.validate()?;
        self.batch.validate()?;
        Ok(())
    }
}

fn invalid<V: ToString>(key: &str, value: V) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Offline analysis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Samples per analysis frame
    pub frame_size: usize,

    /// Samples between frame starts
    pub hop_size: usize,

    /// Lower band-pass edge (Hz)
    pub low_cut_hz: f64,

    /// Upper band-pass edge (Hz)
    pub high_cut_hz: f64,

    /// Lower the upper edge to 95% of Nyquist when the input rate is too low for it
    pub clamp_high_cut: bool,

    /// Peak threshold on the energy series, as a multiple of its mean
    pub energy_threshold_factor: f32,

    /// Peak threshold on the flux series, as a multiple of its mean
    pub flux_threshold_factor: f32,

    /// Primary tempo strategy
    pub tempo_method: TempoMethod,

    /// Shortest beat period searched by autocorrelation (seconds)
    pub min_lag_secs: f64,

    /// Longest beat period searched by autocorrelation (seconds)
    pub max_lag_secs: f64,

    /// Minimum spacing between autocorrelation peaks (seconds)
    pub lag_separation_secs: f64,

    /// Fraction of the strongest lag a lag peak must exceed to count (0 disables the gate)
    pub lag_peak_fraction: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            frame_size: 1024,
            hop_size: 512,
            low_cut_hz: 80.0,
            high_cut_hz: 16000.0,
            clamp_high_cut: true,
            energy_threshold_factor: 1.5,
            flux_threshold_factor: 1.3,
            tempo_method: TempoMethod::Autocorrelation,
            min_lag_secs: 0.3,
            max_lag_secs: 2.0,
            lag_separation_secs: 0.5,
            lag_peak_fraction: 0.0,
        }
    }
}

impl AnalysisConfig {
    /// Autocorrelation search settings
    pub fn lag_window(&self) -> LagWindow {
        LagWindow {
            min_lag_secs: self.min_lag_secs,
            max_lag_secs: self.max_lag_secs,
            separation_secs: self.lag_separation_secs,
            peak_fraction: self.lag_peak_fraction,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_size == 0 {
            return Err(invalid("analysis.frame_size", self.frame_size).into());
        }

        if self.hop_size == 0 || self.hop_size > self.frame_size {
            return Err(invalid("analysis.hop_size", self.hop_size).into());
        }

        if !(self.low_cut_hz > 0.0 && self.low_cut_hz < self.high_cut_hz) {
            return Err(invalid(
                "analysis.band",
                format!("{}-{}", self.low_cut_hz, self.high_cut_hz),
            )
            .into());
        }

        if !(self.energy_threshold_factor > 0.0) {
            return Err(invalid("analysis.energy_threshold_factor", self.energy_threshold_factor).into());
        }

        if !(self.flux_threshold_factor > 0.0) {
            return Err(invalid("analysis.flux_threshold_factor", self.flux_threshold_factor).into());
        }

        if !(self.min_lag_secs > 0.0 && self.min_lag_secs < self.max_lag_secs) {
            return Err(invalid(
                "analysis.lag_range",
                format!("{}-{}", self.min_lag_secs, self.max_lag_secs),
            )
            .into());
        }

        if !(self.lag_separation_secs > 0.0) {
            return Err(invalid("analysis.lag_separation_secs", self.lag_separation_secs).into());
        }

        if !(0.0..1.0).contains(&self.lag_peak_fraction) {
            return Err(invalid("analysis.lag_peak_fraction", self.lag_peak_fraction).into());
        }

        Ok(())
    }
}

/// Live detection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Sample rate of the incoming blocks (Hz)
    pub sample_rate: u32,

    /// Samples per block
    pub block_size: usize,

    /// Block energies kept for the adaptive threshold
    pub energy_history: usize,

    /// Beat timestamps kept for tempo tracking
    pub beat_history: usize,

    /// Tempo estimates kept for the session average
    pub tempo_history: usize,

    /// Energies needed before the adaptive threshold replaces the bootstrap value
    pub threshold_min_history: usize,

    /// Beats are only accepted once more than this many energies are held
    pub detection_warmup: usize,

    /// Standard deviations above the mean energy
    pub threshold_deviations: f32,

    /// Threshold used while the history is short
    pub bootstrap_threshold: f32,

    /// Minimum time between beats (seconds)
    pub refractory_secs: f64,

    /// Beats needed before a tempo is estimated
    pub min_beats_for_tempo: usize,

    /// Most recent intervals averaged into the running tempo
    pub tempo_intervals: usize,

    /// Capacity of the queue handing beats to the reporting thread
    pub event_capacity: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            block_size: 1024,
            energy_history: 30,
            beat_history: 50,
            tempo_history: 20,
            threshold_min_history: 10,
            detection_warmup: 15,
            threshold_deviations: 1.5,
            bootstrap_threshold: 0.01,
            refractory_secs: 0.2,
            min_beats_for_tempo: 3,
            tempo_intervals: 4,
            event_capacity: 256,
        }
    }
}

impl StreamingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(invalid("streaming.sample_rate", self.sample_rate).into());
        }

        if self.block_size == 0 {
            return Err(invalid("streaming.block_size", self.block_size).into());
        }

        for (key, capacity) in [
            ("streaming.energy_history", self.energy_history),
            ("streaming.beat_history", self.beat_history),
            ("streaming.tempo_history", self.tempo_history),
            ("streaming.event_capacity", self.event_capacity),
        ] {
            if capacity == 0 {
                return Err(invalid(key, capacity).into());
            }
        }

        if self.detection_warmup >= self.energy_history {
            return Err(invalid("streaming.detection_warmup", self.detection_warmup).into());
        }

        if self.threshold_min_history > self.energy_history {
            return Err(invalid("streaming.threshold_min_history", self.threshold_min_history).into());
        }

        if self.min_beats_for_tempo < 2 || self.min_beats_for_tempo > self.beat_history {
            return Err(invalid("streaming.min_beats_for_tempo", self.min_beats_for_tempo).into());
        }

        if self.tempo_intervals == 0 {
            return Err(invalid("streaming.tempo_intervals", self.tempo_intervals).into());
        }

        if !(self.refractory_secs >= 0.0) {
            return Err(invalid("streaming.refractory_secs", self.refractory_secs).into());
        }

        Ok(())
    }

    /// Seconds of audio per block
    pub fn block_seconds(&self) -> f64 {
        self.block_size as f64 / self.sample_rate as f64
    }
}

/// Multi-file processing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Worker threads for parallel analysis
    pub threads: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(invalid("batch.threads", self.threads).into());
        }
        Ok(())
    }
}
