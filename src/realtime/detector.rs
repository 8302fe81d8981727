use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::peaks::{Refractory, Stats, Threshold};
use crate::config::StreamingConfig;
use crate::error::{Result, StreamError};
use crate::realtime::ring::RingBuffer;

/// One beat accepted by a live session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamBeat {
    /// 1-based beat number within the session
    pub index: u64,

    /// Seconds of audio received when the beat was accepted
    pub timestamp: f64,

    /// Latest rolling tempo estimate (0 until enough beats are seen)
    pub tempo_bpm: f64,

    /// Energy of the block that triggered the beat
    pub energy: f32,
}

/// Final report of a session, produced by [`StreamingDetector::stop`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub started_at: DateTime<Utc>,

    /// Seconds of audio processed
    pub duration_secs: f64,

    pub beat_count: u64,

    /// Mean of the rolling tempo history (0 when no tempo was estimated)
    pub average_tempo_bpm: f64,
}

/// Copy of the detector state for readers on other threads
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSnapshot {
    pub running: bool,
    pub blocks_processed: u64,
    pub beat_count: u64,
    pub threshold: f32,
    pub energies: Vec<f32>,
    pub beat_times: Vec<f64>,
    pub tempi: Vec<f64>,
}

impl DetectorSnapshot {
    /// Most recent rolling tempo, 0 when none yet
    pub fn current_tempo_bpm(&self) -> f64 {
        self.tempi.last().copied().unwrap_or(0.0)
    }
}

/// Mutable per-session state, reset on every `start()`
#[derive(Debug, Clone)]
struct StreamingState {
    energies: RingBuffer<f32>,
    beat_times: RingBuffer<f64>,
    tempi: RingBuffer<f64>,
    refractory: Refractory,
    beat_count: u64,
    blocks: u64,
    threshold: f32,
    started_at: DateTime<Utc>,
}

impl StreamingState {
    fn new(config: &StreamingConfig) -> Self {
        Self {
            energies: RingBuffer::new(config.energy_history),
            beat_times: RingBuffer::new(config.beat_history),
            tempi: RingBuffer::new(config.tempo_history),
            refractory: Refractory::longer_than(config.refractory_secs),
            beat_count: 0,
            blocks: 0,
            threshold: config.bootstrap_threshold,
            started_at: Utc::now(),
        }
    }

    fn reset(&mut self, config: &StreamingConfig) {
        self.energies.clear();
        self.beat_times.clear();
        self.tempi.clear();
        self.refractory.reset();
        self.beat_count = 0;
        self.blocks = 0;
        self.threshold = config.bootstrap_threshold;
        self.started_at = Utc::now();
    }
}

/// Block-by-block beat detector with an adaptive energy threshold
///
/// The detector is idle until [`start`](Self::start) is called. While running,
/// every [`process_block`](Self::process_block) call consumes exactly one
/// fixed-size block. Time is measured in audio received, not wall-clock time.
///
/// `process_block` performs no allocation and no logging; all histories are
/// fixed-capacity rings sized from the configuration.
#[derive(Debug, Clone)]
pub struct StreamingDetector {
    config: StreamingConfig,
    threshold: Threshold,
    state: StreamingState,
    running: bool,
    last_summary: Option<SessionSummary>,
}

impl StreamingDetector {
    pub fn new(config: StreamingConfig) -> Result<Self> {
        config.validate()?;

        let threshold = Threshold::Adaptive {
            deviations: config.threshold_deviations,
            min_history: config.threshold_min_history,
            bootstrap: config.bootstrap_threshold,
        };
        let state = StreamingState::new(&config);

        Ok(Self {
            config,
            threshold,
            state,
            running: false,
            last_summary: None,
        })
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Begin a session with empty histories
    ///
    /// Returns `false` without touching the running session if one is active.
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.state.reset(&self.config);
        self.running = true;
        true
    }

    /// End the session and summarize it
    ///
    /// Calling this while idle does nothing and returns `None`.
    pub fn stop(&mut self) -> Option<SessionSummary> {
        if !self.running {
            return None;
        }
        self.running = false;

        let tempi = self.state.tempi.len();
        let average_tempo_bpm = if tempi == 0 {
            0.0
        } else {
            self.state.tempi.iter().sum::<f64>() / tempi as f64
        };

        let summary = SessionSummary {
            started_at: self.state.started_at,
            duration_secs: self.elapsed(),
            beat_count: self.state.beat_count,
            average_tempo_bpm,
        };
        self.last_summary = Some(summary.clone());
        Some(summary)
    }

    /// Summary of the most recently ended session
    pub fn last_summary(&self) -> Option<&SessionSummary> {
        self.last_summary.as_ref()
    }

    pub fn beat_count(&self) -> u64 {
        self.state.beat_count
    }

    /// Consume one block of mono samples
    ///
    /// Blocks delivered while idle are ignored. A block of the wrong length
    /// ends the session and is reported as [`StreamError::BlockSize`].
    pub fn process_block(&mut self, block: &[f32]) -> Result<Option<StreamBeat>> {
        if !self.running {
            return Ok(None);
        }

        if block.len() != self.config.block_size {
            self.stop();
            return Err(StreamError::BlockSize {
                expected: self.config.block_size,
                actual: block.len(),
            }
            .into());
        }

        let energy: f32 = block.iter().map(|&x| x * x).sum();
        self.state.blocks += 1;
        let now = self.elapsed();

        self.state.energies.push(energy);
        let stats = Stats::from_values(self.state.energies.iter());
        let threshold = self.threshold.level(&stats);
        self.state.threshold = threshold;

        let warmed_up = self.state.energies.len() > self.config.detection_warmup;
        if !(energy > threshold && warmed_up && self.state.refractory.admit(now)) {
            return Ok(None);
        }

        self.state.beat_count += 1;
        self.state.beat_times.push(now);
        self.update_tempo();

        Ok(Some(StreamBeat {
            index: self.state.beat_count,
            timestamp: now,
            tempo_bpm: self.state.tempi.last().unwrap_or(0.0),
            energy,
        }))
    }

    pub fn snapshot(&self) -> DetectorSnapshot {
        DetectorSnapshot {
            running: self.running,
            blocks_processed: self.state.blocks,
            beat_count: self.state.beat_count,
            threshold: self.state.threshold,
            energies: self.state.energies.to_vec(),
            beat_times: self.state.beat_times.to_vec(),
            tempi: self.state.tempi.to_vec(),
        }
    }

    /// Seconds of audio processed in this session
    fn elapsed(&self) -> f64 {
        (self.state.blocks * self.config.block_size as u64) as f64 / self.config.sample_rate as f64
    }

    /// Mean of the last `tempo_intervals` gaps, once enough beats are held
    fn update_tempo(&mut self) {
        let held = self.state.beat_times.len();
        if held < self.config.min_beats_for_tempo {
            return;
        }

        let span = held.min(self.config.tempo_intervals + 1);
        let mut recent = self.state.beat_times.iter().skip(held - span);
        let (Some(first), Some(last)) = (recent.next(), recent.next_back()) else {
            return;
        };

        let mean_gap = (last - first) / (span - 1) as f64;
        if mean_gap > 0.0 {
            self.state.tempi.push(60.0 / mean_gap);
        }
    }
}
