use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use tempo_tracker::{
    analysis::{FeatureExtractor, Preprocessor, TempoEstimator},
    config::StreamingConfig,
    OfflineAnalyzer, SampleBuffer, StreamingDetector, TempoMethod,
};

const RATE: u32 = 22050;

/// Thirty seconds of low noise with a click every half second
fn test_buffer() -> SampleBuffer {
    let mut rng = SmallRng::seed_from_u64(1);
    let mut samples: Vec<f32> = (0..RATE as usize * 30)
        .map(|_| rng.gen_range(-0.01..0.01))
        .collect();
    for start in (RATE as usize / 4..samples.len() - 256).step_by(RATE as usize / 2) {
        for n in 0..220 {
            samples[start + n] += 0.8 * (-(n as f32) / 40.0).exp();
        }
    }
    SampleBuffer::new(samples, RATE).unwrap()
}

fn bench_offline(c: &mut Criterion) {
    let buffer = test_buffer();
    let analyzer = OfflineAnalyzer::new();
    let preprocessor = Preprocessor::new(RATE, 80.0, 10000.0).unwrap();
    let extractor = FeatureExtractor::new(1024, 512).unwrap();

    c.bench_function("preprocess_30s", |b| {
        b.iter(|| preprocessor.apply(black_box(&buffer)).unwrap())
    });

    c.bench_function("features_30s", |b| {
        b.iter(|| extractor.extract(black_box(&buffer)).unwrap())
    });

    c.bench_function("analyze_30s", |b| {
        b.iter(|| analyzer.analyze(black_box(&buffer)).unwrap())
    });

    let beats: Vec<f64> = (0..60).map(|i| 0.25 + i as f64 * 0.5).collect();
    let estimator = TempoEstimator::new(RATE);
    c.bench_function("autocorrelation_60_beats", |b| {
        b.iter(|| estimator.estimate(black_box(&beats), TempoMethod::Autocorrelation))
    });
}

fn bench_streaming(c: &mut Criterion) {
    let buffer = test_buffer();
    let mut detector = StreamingDetector::new(StreamingConfig::default()).unwrap();
    detector.start();
    let mut blocks = buffer.samples().chunks_exact(1024).cycle();

    c.bench_function("process_block_1024", |b| {
        b.iter(|| {
            let block = blocks.next().unwrap_or(&[]);
            detector.process_block(black_box(block)).ok()
        })
    });
}

criterion_group!(benches, bench_offline, bench_streaming);
criterion_main!(benches);
