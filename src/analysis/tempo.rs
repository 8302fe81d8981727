use crate::analysis::peaks::{PeakPicker, Threshold};
use crate::analysis::types::{TempoEstimate, TempoMethod};

/// Lag search window and peak rules for the autocorrelation strategy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LagWindow {
    /// Shortest period considered, in seconds (0.3 s ≈ 200 BPM)
    pub min_lag_secs: f64,

    /// Longest period considered, in seconds (2.0 s = 30 BPM)
    pub max_lag_secs: f64,

    /// Minimum spacing between lag peaks, in seconds
    pub separation_secs: f64,

    /// A lag peak qualifies only when it exceeds this fraction of the
    /// strongest lag. 0 keeps every peak, so the earliest one wins.
    pub peak_fraction: f32,
}

impl Default for LagWindow {
    fn default() -> Self {
        Self {
            min_lag_secs: 0.3,
            max_lag_secs: 2.0,
            separation_secs: 0.5,
            peak_fraction: 0.0,
        }
    }
}

/// Converts beat times into a tempo
///
/// Both strategies are pure functions of their input. Degenerate input
/// (fewer than two beats, no periodicity in range) yields BPM 0 rather than
/// an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoEstimator {
    sample_rate: u32,
    lags: LagWindow,
}

impl TempoEstimator {
    pub fn new(sample_rate: u32) -> Self {
        Self::with_lag_window(sample_rate, LagWindow::default())
    }

    pub fn with_lag_window(sample_rate: u32, lags: LagWindow) -> Self {
        Self { sample_rate, lags }
    }

    pub fn estimate(&self, beat_times: &[f64], method: TempoMethod) -> TempoEstimate {
        if beat_times.len() < 2 {
            return TempoEstimate::unknown(method);
        }

        let bpm = match method {
            TempoMethod::Interval => Self::interval_bpm(beat_times),
            TempoMethod::Autocorrelation => self.autocorrelation_bpm(beat_times),
        };

        TempoEstimate::new(bpm, method)
    }

    /// 60 / median of the successive gaps
    fn interval_bpm(beat_times: &[f64]) -> f64 {
        let mut gaps: Vec<f64> = beat_times.windows(2).map(|w| w[1] - w[0]).collect();
        match median(&mut gaps) {
            Some(gap) if gap > 0.0 => 60.0 / gap,
            _ => 0.0,
        }
    }

    /// Earliest peak of the beat train's autocorrelation
    ///
    /// The beats are rendered as unit impulses at `sample_rate`. Only the lags
    /// inside the search window are evaluated; for an impulse train the value
    /// at a lag is the number of beat pairs that far apart.
    fn autocorrelation_bpm(&self, beat_times: &[f64]) -> f64 {
        let rate = self.sample_rate as f64;
        let mut impulses: Vec<usize> = beat_times
            .iter()
            .filter(|t| t.is_finite() && **t >= 0.0)
            .map(|t| (t * rate) as usize)
            .collect();
        impulses.sort_unstable();
        impulses.dedup();

        let Some(&last) = impulses.last() else {
            return 0.0;
        };

        // the impulse signal has `last + 1` samples, so no lag reaches past `last`
        let min_lag = (self.lags.min_lag_secs * rate) as usize;
        let max_lag = ((self.lags.max_lag_secs * rate) as usize).min(last + 1);
        if min_lag >= max_lag {
            return 0.0;
        }

        let mut correlation = vec![0.0f32; max_lag - min_lag];
        for (i, &earlier) in impulses.iter().enumerate() {
            for &later in &impulses[i + 1..] {
                let lag = later - earlier;
                if lag >= max_lag {
                    break;
                }
                if lag >= min_lag {
                    correlation[lag - min_lag] += 1.0;
                }
            }
        }

        let picker = PeakPicker::new((self.lags.separation_secs * rate) as usize);
        let threshold = Threshold::FractionOfMax {
            fraction: self.lags.peak_fraction,
        };

        match picker.peak_indices(&correlation, &threshold).first() {
            Some(&peak) => {
                let period = (peak + min_lag) as f64 / rate;
                60.0 / period
            }
            None => 0.0,
        }
    }
}

/// Median, averaging the middle pair for even lengths
fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
