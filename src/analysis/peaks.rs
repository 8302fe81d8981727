//! Peak picking shared by the offline and streaming detectors.
//!
//! A candidate is accepted when it clears a [`Threshold`] and a [`Refractory`]
//! gate. The offline picker derives its threshold from the whole series, the
//! streaming detector from a rolling window; the acceptance rule is the same.

use crate::analysis::types::{BeatEvent, FeatureSeries};

/// Running summary of a set of values (Welford's algorithm)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stats {
    count: usize,
    mean: f64,
    m2: f64,
    max: f32,
}

impl Stats {
    pub fn from_values<I: IntoIterator<Item = f32>>(values: I) -> Self {
        let mut stats = Self::default();
        for value in values {
            stats.add(value);
        }
        stats
    }

    fn add(&mut self, value: f32) {
        let x = value as f64;
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
        if self.count == 1 || value > self.max {
            self.max = value;
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population standard deviation
    pub fn std_dev(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.m2 / self.count as f64).sqrt()
        }
    }

    pub fn max(&self) -> f32 {
        self.max
    }
}

/// Where the height threshold comes from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Threshold {
    /// `mean × factor` over every value considered
    ScaledMean { factor: f32 },

    /// `mean + deviations × σ` over a rolling history, or `bootstrap` while
    /// fewer than `min_history` values are available
    Adaptive {
        deviations: f32,
        min_history: usize,
        bootstrap: f32,
    },

    /// A fixed fraction of the largest value
    FractionOfMax { fraction: f32 },
}

impl Threshold {
    pub fn level(&self, stats: &Stats) -> f32 {
        match *self {
            Self::ScaledMean { factor } => (stats.mean() * factor as f64) as f32,
            Self::Adaptive {
                deviations,
                min_history,
                bootstrap,
            } => {
                if stats.count() < min_history {
                    bootstrap
                } else {
                    (stats.mean() + deviations as f64 * stats.std_dev()) as f32
                }
            }
            Self::FractionOfMax { fraction } => stats.max() * fraction,
        }
    }
}

/// Minimum spacing between accepted events
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Refractory {
    min_gap: f64,
    inclusive: bool,
    last: Option<f64>,
}

impl Refractory {
    /// Accept when `at - last >= min_gap`
    pub fn at_least(min_gap: f64) -> Self {
        Self {
            min_gap,
            inclusive: true,
            last: None,
        }
    }

    /// Accept when `at - last > min_gap`
    pub fn longer_than(min_gap: f64) -> Self {
        Self {
            min_gap,
            inclusive: false,
            last: None,
        }
    }

    pub fn last(&self) -> Option<f64> {
        self.last
    }

    pub fn is_clear(&self, at: f64) -> bool {
        match self.last {
            None => true,
            Some(last) if self.inclusive => at - last >= self.min_gap,
            Some(last) => at - last > self.min_gap,
        }
    }

    /// Record an event at `at` if the gate is clear
    pub fn admit(&mut self, at: f64) -> bool {
        if self.is_clear(at) {
            self.last = Some(at);
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Indices of local maxima
///
/// A maximum must rise strictly from its left neighbour and fall strictly
/// after it (possibly after a flat run). Flat runs report their first index.
/// The first and last samples are never maxima.
pub fn local_maxima(values: &[f32]) -> Vec<usize> {
    let mut maxima = Vec::new();
    if values.len() < 3 {
        return maxima;
    }

    let last = values.len() - 1;
    let mut i = 1;
    while i < last {
        if values[i - 1] < values[i] {
            let mut ahead = i + 1;
            while ahead < last && values[ahead] == values[i] {
                ahead += 1;
            }
            if values[ahead] < values[i] {
                maxima.push(i);
            }
            i = ahead;
        } else {
            i += 1;
        }
    }

    maxima
}

/// Turns an onset-strength series into beat events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeakPicker {
    min_distance: usize,
}

impl PeakPicker {
    /// Picker enforcing `min_distance` frames between accepted peaks
    pub fn new(min_distance: usize) -> Self {
        Self {
            min_distance: min_distance.max(1),
        }
    }

    /// Quarter-second spacing on a hop grid: `sample_rate / (hop_size × 4)`
    pub fn for_grid(sample_rate: u32, hop_size: usize) -> Self {
        Self::new(sample_rate as usize / (hop_size.max(1) * 4))
    }

    pub fn min_distance(&self) -> usize {
        self.min_distance
    }

    /// Peaks above `mean × threshold_factor` of the whole series
    pub fn pick(&self, series: &FeatureSeries, threshold_factor: f32) -> Vec<BeatEvent> {
        self.pick_with(series, &Threshold::ScaledMean { factor: threshold_factor })
    }

    pub fn pick_with(&self, series: &FeatureSeries, threshold: &Threshold) -> Vec<BeatEvent> {
        self.peak_indices(&series.values, threshold)
            .into_iter()
            .map(|frame| BeatEvent {
                time: series.time_at(frame),
                value: series.values[frame],
                frame,
            })
            .collect()
    }

    /// Accepted peak indices in ascending order
    ///
    /// Candidates are scanned left to right; a candidate is kept when it is
    /// above the threshold and at least `min_distance` after the last kept one.
    pub fn peak_indices(&self, values: &[f32], threshold: &Threshold) -> Vec<usize> {
        let level = threshold.level(&Stats::from_values(values.iter().copied()));
        let mut gate = Refractory::at_least(self.min_distance as f64);

        local_maxima(values)
            .into_iter()
            .filter(|&i| values[i] > level && gate.admit(i as f64))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::FeatureKind;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn series(values: Vec<f32>) -> FeatureSeries {
        FeatureSeries::new(FeatureKind::Energy, values, 512, 22050)
    }

    #[test]
    fn test_stats_match_population_formulas() {
        let stats = Stats::from_values([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(stats.count(), 8);
        assert!((stats.mean() - 5.0).abs() < 1e-12);
        assert!((stats.std_dev() - 2.0).abs() < 1e-12);
        assert_eq!(stats.max(), 9.0);
        assert_eq!(Stats::from_values(std::iter::empty()).std_dev(), 0.0);
    }

    #[test]
    fn test_threshold_levels() {
        let stats = Stats::from_values([1.0, 3.0]);
        assert_eq!(Threshold::ScaledMean { factor: 1.5 }.level(&stats), 3.0);
        assert_eq!(Threshold::FractionOfMax { fraction: 0.5 }.level(&stats), 1.5);

        let adaptive = Threshold::Adaptive {
            deviations: 1.5,
            min_history: 3,
            bootstrap: 0.01,
        };
        assert_eq!(adaptive.level(&stats), 0.01);
        let warm = Stats::from_values([1.0, 3.0, 1.0, 3.0]);
        assert!((adaptive.level(&warm) - 3.5).abs() < 1e-6);
    }

    #[test]
    fn test_refractory_bounds() {
        let mut inclusive = Refractory::at_least(10.0);
        assert!(inclusive.admit(0.0));
        assert!(!inclusive.admit(9.0));
        assert!(inclusive.admit(10.0));

        let mut exclusive = Refractory::longer_than(0.2);
        assert!(exclusive.admit(1.0));
        assert!(!exclusive.is_clear(1.2));
        assert!(exclusive.is_clear(1.21));
        exclusive.reset();
        assert!(exclusive.is_clear(1.0));
    }

    #[test]
    fn test_local_maxima_plateaus_and_edges() {
        assert_eq!(local_maxima(&[3.0, 1.0, 2.0, 1.0, 5.0]), vec![2]);
        // plateau resolves to its first index
        assert_eq!(local_maxima(&[0.0, 2.0, 2.0, 2.0, 1.0]), vec![1]);
        // plateau running into the edge is not a peak
        assert_eq!(local_maxima(&[0.0, 2.0, 2.0, 2.0]), Vec::<usize>::new());
        // a shelf that keeps rising is not a peak
        assert_eq!(local_maxima(&[0.0, 2.0, 2.0, 3.0, 0.0]), vec![3]);
        assert!(local_maxima(&[1.0, 2.0]).is_empty());
    }

    #[test]
    fn test_grid_distance() {
        assert_eq!(PeakPicker::for_grid(22050, 512).min_distance(), 10);
        assert_eq!(PeakPicker::for_grid(44100, 512).min_distance(), 21);
        assert_eq!(PeakPicker::for_grid(8000, 4096).min_distance(), 1);
    }

    #[test]
    fn test_pick_respects_threshold_and_distance() {
        let mut values = vec![0.0f32; 60];
        values[5] = 10.0;
        values[8] = 12.0; // within 10 frames of 5, dropped
        values[20] = 9.0;
        values[40] = 0.5; // below threshold
        let picker = PeakPicker::new(10);
        let beats = picker.pick(&series(values), 1.5);

        let frames: Vec<usize> = beats.iter().map(|b| b.frame).collect();
        assert_eq!(frames, vec![5, 20]);
        assert_eq!(beats[0].value, 10.0);
        assert!((beats[1].time - 20.0 * 512.0 / 22050.0).abs() < 1e-12);
    }

    #[test]
    fn test_all_zero_series_has_no_peaks() {
        let picker = PeakPicker::for_grid(22050, 512);
        for factor in [0.1, 1.0, 1.5, 10.0] {
            assert!(picker.pick(&series(vec![0.0; 500]), factor).is_empty());
        }
        assert!(picker.pick(&series(vec![]), 1.5).is_empty());
    }

    #[test]
    fn test_adversarial_plateaus_keep_min_distance() {
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        for min_distance in [1usize, 2, 5, 10, 23] {
            let picker = PeakPicker::new(min_distance);
            for _ in 0..50 {
                // few distinct levels so equal-height runs are everywhere
                let values: Vec<f32> = (0..400).map(|_| rng.gen_range(0..4) as f32).collect();
                let beats = picker.pick(&series(values.clone()), 1.0);

                for pair in beats.windows(2) {
                    assert!(pair[1].frame - pair[0].frame >= min_distance);
                    assert!(pair[1].time > pair[0].time);
                }
                let level = Stats::from_values(values.iter().copied()).mean() as f32;
                assert!(beats.iter().all(|b| b.value > level));
            }
        }
    }
}
