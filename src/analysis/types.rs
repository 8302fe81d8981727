use serde::{Deserialize, Serialize};
use std::fmt;

/// Which onset-strength feature a series or result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    /// Short-time energy (sum of squares per frame)
    Energy,

    /// Positive spectral flux between consecutive frames
    Flux,
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Energy => write!(f, "energy"),
            Self::Flux => write!(f, "flux"),
        }
    }
}

/// Onset-strength values on a uniform hop grid
///
/// Value `i` belongs to time `i * hop_size / sample_rate`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSeries {
    pub kind: FeatureKind,
    pub values: Vec<f32>,
    pub hop_size: usize,
    pub sample_rate: u32,
}

impl FeatureSeries {
    pub fn new(kind: FeatureKind, values: Vec<f32>, hop_size: usize, sample_rate: u32) -> Self {
        Self {
            kind,
            values,
            hop_size,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Seconds between consecutive values
    pub fn hop_seconds(&self) -> f64 {
        self.hop_size as f64 / self.sample_rate as f64
    }

    /// Time in seconds of the value at `index`
    pub fn time_at(&self, index: usize) -> f64 {
        (index * self.hop_size) as f64 / self.sample_rate as f64
    }

    /// `(time, value)` pairs in order
    pub fn points(&self) -> impl Iterator<Item = (f64, f32)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(move |(i, &v)| (self.time_at(i), v))
    }
}

/// A detected beat
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatEvent {
    /// Time of the beat in seconds
    pub time: f64,

    /// Feature value at the beat
    pub value: f32,

    /// Index into the feature series the beat was picked from
    pub frame: usize,
}

/// Strategy used to turn beat times into a tempo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TempoMethod {
    /// 60 / median inter-beat interval
    Interval,

    /// First qualifying autocorrelation peak of the beat impulse train
    Autocorrelation,
}

impl TempoMethod {
    /// The other strategy, used as a cross-check
    pub fn other(self) -> Self {
        match self {
            Self::Interval => Self::Autocorrelation,
            Self::Autocorrelation => Self::Interval,
        }
    }
}

impl fmt::Display for TempoMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interval => write!(f, "interval"),
            Self::Autocorrelation => write!(f, "autocorrelation"),
        }
    }
}

impl std::str::FromStr for TempoMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "interval" => Ok(Self::Interval),
            "autocorrelation" | "acf" => Ok(Self::Autocorrelation),
            other => Err(format!("unknown tempo method: {}", other)),
        }
    }
}

/// A tempo value and the strategy that produced it
///
/// `bpm == 0.0` means there was not enough evidence for a tempo. The value is
/// never negative or NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoEstimate {
    pub bpm: f64,
    pub method: TempoMethod,
}

impl TempoEstimate {
    pub fn new(bpm: f64, method: TempoMethod) -> Self {
        let bpm = if bpm.is_finite() && bpm > 0.0 { bpm } else { 0.0 };
        Self { bpm, method }
    }

    pub fn unknown(method: TempoMethod) -> Self {
        Self { bpm: 0.0, method }
    }

    pub fn is_known(&self) -> bool {
        self.bpm > 0.0
    }
}

/// Everything derived from one feature
#[derive(Debug, Clone)]
pub struct FeatureTrack {
    pub series: FeatureSeries,

    /// Beats picked from the series, time-ascending
    pub beats: Vec<BeatEvent>,

    /// Tempo from the configured strategy
    pub tempo: TempoEstimate,

    /// Tempo from the other strategy
    pub cross_check: TempoEstimate,
}

impl FeatureTrack {
    pub fn kind(&self) -> FeatureKind {
        self.series.kind
    }

    pub fn beat_times(&self) -> Vec<f64> {
        self.beats.iter().map(|b| b.time).collect()
    }
}

/// Result of analysing one complete recording
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// Total duration in seconds
    pub duration: f64,

    pub sample_rate: u32,

    pub energy: FeatureTrack,

    pub flux: FeatureTrack,
}

impl AnalysisResult {
    pub fn tempo_energy(&self) -> TempoEstimate {
        self.energy.tempo
    }

    pub fn tempo_flux(&self) -> TempoEstimate {
        self.flux.tempo
    }

    /// Mean of the known primary estimates, 0 when neither is known
    ///
    /// Both estimates stay available; this is one reconciliation a caller may
    /// choose, see [`disagreement_bpm`](Self::disagreement_bpm).
    pub fn combined_bpm(&self) -> f64 {
        let known: Vec<f64> = [self.energy.tempo, self.flux.tempo]
            .iter()
            .filter(|t| t.is_known())
            .map(|t| t.bpm)
            .collect();

        if known.is_empty() {
            0.0
        } else {
            known.iter().sum::<f64>() / known.len() as f64
        }
    }

    /// Absolute gap between the two primary estimates when both are known
    pub fn disagreement_bpm(&self) -> Option<f64> {
        if self.energy.tempo.is_known() && self.flux.tempo.is_known() {
            Some((self.energy.tempo.bpm - self.flux.tempo.bpm).abs())
        } else {
            None
        }
    }
}
