use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rtrb::{Consumer, Producer, RingBuffer};

use crate::config::StreamingConfig;
use crate::error::Result;
use crate::realtime::detector::{DetectorSnapshot, SessionSummary, StreamBeat, StreamingDetector};

type SharedDetector = Arc<Mutex<StreamingDetector>>;

fn lock(detector: &SharedDetector) -> MutexGuard<'_, StreamingDetector> {
    // a panic mid-block leaves the state consistent enough to read and stop
    detector.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Split a detector into its control, capture and reporting ends
///
/// - [`DetectorHandle`] starts, stops and inspects the session from any thread
/// - [`BlockFeeder`] belongs to the capture thread and feeds samples in
/// - [`BeatReceiver`] receives accepted beats without blocking the feeder
pub fn live_session(config: StreamingConfig) -> Result<(DetectorHandle, BlockFeeder, BeatReceiver)> {
    let block_size = config.block_size;
    let (producer, consumer) = RingBuffer::new(config.event_capacity);
    let detector = Arc::new(Mutex::new(StreamingDetector::new(config)?));
    let dropped = Arc::new(AtomicU64::new(0));
    let generation = Arc::new(AtomicU64::new(0));

    let handle = DetectorHandle {
        detector: Arc::clone(&detector),
        dropped: Arc::clone(&dropped),
        generation: Arc::clone(&generation),
    };
    let feeder = BlockFeeder {
        detector,
        producer,
        pending: Vec::with_capacity(block_size),
        scratch: Vec::with_capacity(block_size),
        block_size,
        dropped,
        generation,
        seen_generation: 0,
    };
    let receiver = BeatReceiver { consumer };

    Ok((handle, feeder, receiver))
}

/// Control end of a live session
///
/// Every call takes the detector lock only long enough to copy what it needs.
#[derive(Debug, Clone)]
pub struct DetectorHandle {
    detector: SharedDetector,
    dropped: Arc<AtomicU64>,
    generation: Arc<AtomicU64>,
}

impl DetectorHandle {
    /// Begin a new session
    ///
    /// Samples the feeder held back from an earlier session are discarded
    /// before its next push.
    pub fn start(&self) -> bool {
        let started = lock(&self.detector).start();
        if started {
            self.dropped.store(0, Ordering::Relaxed);
            self.generation.fetch_add(1, Ordering::Release);
        }
        started
    }

    pub fn stop(&self) -> Option<SessionSummary> {
        lock(&self.detector).stop()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.detector).is_running()
    }

    pub fn snapshot(&self) -> DetectorSnapshot {
        lock(&self.detector).snapshot()
    }

    pub fn last_summary(&self) -> Option<SessionSummary> {
        lock(&self.detector).last_summary().cloned()
    }

    /// Beats discarded because the receiver fell behind
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Capture end of a live session
///
/// Re-chunks samples of any callback size into the detector's fixed block
/// size. The pending block and the downmix scratch are allocated once up
/// front.
pub struct BlockFeeder {
    detector: SharedDetector,
    producer: Producer<StreamBeat>,
    pending: Vec<f32>,
    scratch: Vec<f32>,
    block_size: usize,
    dropped: Arc<AtomicU64>,
    generation: Arc<AtomicU64>,
    seen_generation: u64,
}

impl BlockFeeder {
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Samples held back until the next block is complete
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Feed an arbitrary run of samples, returning how many beats were accepted
    pub fn push_samples(&mut self, mut samples: &[f32]) -> Result<usize> {
        self.follow_session();
        let mut accepted = 0;

        while !samples.is_empty() {
            let take = (self.block_size - self.pending.len()).min(samples.len());
            self.pending.extend_from_slice(&samples[..take]);
            samples = &samples[take..];

            if self.pending.len() == self.block_size {
                let outcome = lock(&self.detector).process_block(&self.pending);
                self.pending.clear();
                if let Some(beat) = outcome? {
                    self.publish(beat);
                    accepted += 1;
                }
            }
        }

        Ok(accepted)
    }

    /// Feed interleaved frames of `channels` samples, averaged down to mono
    ///
    /// The input is downmixed one block at a time into fixed scratch space,
    /// so callbacks of any length never allocate.
    pub fn push_interleaved(&mut self, data: &[f32], channels: usize) -> Result<usize> {
        let channels = channels.max(1);
        let mut mono = std::mem::take(&mut self.scratch);
        let mut accepted = 0;
        let mut outcome = Ok(());

        for chunk in data.chunks(self.block_size * channels) {
            mono.clear();
            mono.extend(
                chunk
                    .chunks(channels)
                    .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
            );
            match self.push_samples(&mono) {
                Ok(count) => accepted += count,
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }

        self.scratch = mono;
        outcome.map(|()| accepted)
    }

    /// Feed exactly one block, bypassing re-chunking
    pub fn push_block(&mut self, block: &[f32]) -> Result<Option<StreamBeat>> {
        self.follow_session();
        let outcome = lock(&self.detector).process_block(block)?;
        if let Some(beat) = outcome {
            self.publish(beat);
        }
        Ok(outcome)
    }

    /// Drop a partial block left over from a previous session
    fn follow_session(&mut self) {
        let generation = self.generation.load(Ordering::Acquire);
        if generation != self.seen_generation {
            self.seen_generation = generation;
            self.pending.clear();
        }
    }

    fn publish(&mut self, beat: StreamBeat) {
        if self.producer.push(beat).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Reporting end of a live session
pub struct BeatReceiver {
    consumer: Consumer<StreamBeat>,
}

impl BeatReceiver {
    pub fn try_recv(&mut self) -> Option<StreamBeat> {
        self.consumer.pop().ok()
    }

    /// Beats waiting to be read
    pub fn len(&self) -> usize {
        self.consumer.slots()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }

    /// Everything received so far, oldest first
    pub fn drain(&mut self) -> Vec<StreamBeat> {
        let mut beats = Vec::with_capacity(self.consumer.slots());
        while let Ok(beat) = self.consumer.pop() {
            beats.push(beat);
        }
        beats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const BLOCK: usize = 1024;

    /// Silence with a loud block every `every` blocks
    fn pulse_train(blocks: usize, every: usize) -> Vec<f32> {
        let mut samples = vec![0.001f32; blocks * BLOCK];
        for block in (0..blocks).filter(|b| b % every == every / 2) {
            for s in &mut samples[block * BLOCK..(block + 1) * BLOCK] {
                *s = 0.5;
            }
        }
        samples
    }

    #[test]
    fn test_rechunked_feed_matches_direct_blocks() {
        let samples = pulse_train(120, 10);

        let mut direct = StreamingDetector::new(StreamingConfig::default()).unwrap();
        direct.start();
        let mut expected = Vec::new();
        for block in samples.chunks(BLOCK) {
            if let Some(beat) = direct.process_block(block).unwrap() {
                expected.push(beat);
            }
        }
        assert!(!expected.is_empty());

        let (handle, mut feeder, mut receiver) = live_session(StreamingConfig::default()).unwrap();
        handle.start();
        let mut accepted = 0;
        // odd callback sizes that never line up with the block size
        for chunk in samples.chunks(300) {
            accepted += feeder.push_samples(chunk).unwrap();
        }

        assert_eq!(accepted, expected.len());
        assert_eq!(feeder.pending(), samples.len() % BLOCK);
        let received = receiver.drain();
        assert_eq!(received.len(), expected.len());
        for (got, want) in received.iter().zip(&expected) {
            assert_eq!(got.index, want.index);
            assert_eq!(got.timestamp, want.timestamp);
            assert_eq!(got.tempo_bpm, want.tempo_bpm);
        }
        assert_eq!(handle.dropped_events(), 0);
    }

    #[test]
    fn test_full_queue_drops_and_counts() {
        let config = StreamingConfig {
            event_capacity: 1,
            ..StreamingConfig::default()
        };
        let (handle, mut feeder, mut receiver) = live_session(config).unwrap();
        handle.start();

        let accepted = feeder.push_samples(&pulse_train(80, 10)).unwrap();
        assert!(accepted >= 3);
        assert_eq!(receiver.len(), 1);
        assert_eq!(handle.dropped_events(), accepted as u64 - 1);

        let first = receiver.try_recv().unwrap();
        assert_eq!(first.index, 1);
        assert!(receiver.is_empty());
        assert_eq!(receiver.try_recv(), None);
    }

    #[test]
    fn test_handle_controls_session_across_threads() {
        let (handle, mut feeder, mut receiver) = live_session(StreamingConfig::default()).unwrap();
        assert!(handle.start());

        let samples = pulse_train(100, 10);
        let capture = thread::spawn(move || {
            for chunk in samples.chunks(512) {
                feeder.push_samples(chunk).unwrap();
            }
        });
        capture.join().unwrap();

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.blocks_processed, 100);
        assert!(snapshot.beat_count > 0);

        let summary = handle.stop().unwrap();
        assert_eq!(summary.beat_count, snapshot.beat_count);
        assert_eq!(handle.stop(), None);
        assert_eq!(handle.last_summary(), Some(summary));
        assert!(!handle.is_running());
        assert_eq!(receiver.drain().len() as u64, snapshot.beat_count);
    }

    #[test]
    fn test_restart_discards_partial_block() {
        let (handle, mut feeder, _receiver) = live_session(StreamingConfig::default()).unwrap();
        handle.start();
        feeder.push_samples(&[0.5; 700]).unwrap();
        assert_eq!(feeder.pending(), 700);
        handle.stop();

        assert!(handle.start());
        feeder.push_samples(&[0.001; 500]).unwrap();
        assert_eq!(feeder.pending(), 500);
        assert_eq!(handle.snapshot().blocks_processed, 0);

        // a feeder that keeps pushing within one session keeps its remainder
        feeder.push_samples(&[0.001; 600]).unwrap();
        assert_eq!(feeder.pending(), 76);
        assert_eq!(handle.snapshot().blocks_processed, 1);
    }

    #[test]
    fn test_interleaved_feed_matches_mono() {
        let mono = pulse_train(60, 10);
        let stereo: Vec<f32> = mono.iter().flat_map(|&s| [s, s]).collect();

        let (mono_handle, mut mono_feeder, mut mono_receiver) =
            live_session(StreamingConfig::default()).unwrap();
        mono_handle.start();
        let mono_accepted = mono_feeder.push_samples(&mono).unwrap();

        let (handle, mut feeder, mut receiver) = live_session(StreamingConfig::default()).unwrap();
        handle.start();
        let capacity = feeder.scratch.capacity();
        // one oversized callback, far longer than a block
        let accepted = feeder.push_interleaved(&stereo, 2).unwrap();

        assert!(accepted > 0);
        assert_eq!(accepted, mono_accepted);
        assert_eq!(feeder.scratch.capacity(), capacity);
        let got: Vec<u64> = receiver.drain().iter().map(|b| b.index).collect();
        let want: Vec<u64> = mono_receiver.drain().iter().map(|b| b.index).collect();
        assert_eq!(got, want);
        assert_eq!(
            handle.snapshot().blocks_processed,
            mono_handle.snapshot().blocks_processed
        );
    }

    #[test]
    fn test_push_block_reports_wrong_size() {
        let (handle, mut feeder, _receiver) = live_session(StreamingConfig::default()).unwrap();
        handle.start();

        assert!(feeder.push_block(&[0.0; BLOCK]).unwrap().is_none());
        assert!(feeder.push_block(&[0.0; 10]).is_err());
        assert!(!handle.is_running());
        assert!(handle.last_summary().is_some());
    }
}
