//! Performance benchmarks for the activity recognition pipeline

use activity_recognition::{
    classifier::{ActivityClassifier, Classification, ClassifierPipeline, ModelArtifacts},
    config::{Config, MotionConfig},
    decision_engine::DecisionEngine,
    features::EnhancedFeatureVector,
    joints::{Joint, JointFrame},
    kinematics::KinematicFeatureExtractor,
    motion_analyzer::MotionAnalyzer,
    Result,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array3;
use rand::Rng;
use std::time::Duration;

struct ConstantClassifier;

impl ActivityClassifier for ConstantClassifier {
    fn classify(&self, _features: &[f64]) -> Result<Classification> {
        Ok(Classification {
            index: 0,
            probabilities: vec![0.6, 0.25, 0.1, 0.05],
        })
    }

    fn name(&self) -> &str {
        "constant"
    }
}

/// Random walk of joint positions around a standing pose
fn noisy_sequence(len: usize) -> Vec<JointFrame> {
    let mut rng = rand::thread_rng();
    let base: Vec<(Joint, (f64, f64))> = Joint::ALL
        .iter()
        .enumerate()
        .map(|(i, &joint)| {
            let x = if i % 2 == 0 { 0.45 } else { 0.55 };
            (joint, (x, 0.2 + 0.06 * i as f64))
        })
        .collect();

    (0..len)
        .map(|_| {
            base.iter()
                .map(|&(joint, (x, y))| {
                    (joint, (x + rng.gen_range(-0.02..0.02), y + rng.gen_range(-0.02..0.02)))
                })
                .collect()
        })
        .collect()
}

/// Benchmark kinematic feature extraction
fn bench_feature_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("feature_extraction");
    let frames = noisy_sequence(300);

    group.bench_function("kinematic", |b| {
        let mut extractor = KinematicFeatureExtractor::new();
        b.iter(|| {
            for frame in &frames {
                black_box(extractor.extract_features(black_box(frame)));
            }
        });
    });

    let mut extractor = KinematicFeatureExtractor::new();
    let raw: Vec<_> = frames.iter().map(|f| extractor.extract_features(f)).collect();
    group.bench_function("engineered", |b| {
        b.iter(|| {
            for features in &raw {
                black_box(EnhancedFeatureVector::from_features(black_box(features)));
            }
        });
    });

    group.finish();
}

/// Benchmark the full decision cascade without video
fn bench_decision_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("decision_engine");
    group.measurement_time(Duration::from_secs(10));
    let frames = noisy_sequence(300);

    let mut config = Config::default();
    config.engine.enable_motion_validation = false;

    group.bench_function("predict", |b| {
        let artifacts = ModelArtifacts {
            labels: ["stand", "walk", "squat", "sit"].iter().map(|s| (*s).to_string()).collect(),
            ..ModelArtifacts::default()
        };
        let pipeline = ClassifierPipeline::new(Box::new(ConstantClassifier), artifacts).unwrap();
        let mut engine = DecisionEngine::new(&config, Some(pipeline));
        b.iter(|| {
            for frame in &frames {
                black_box(engine.predict(Some(black_box(frame)), None));
            }
        });
    });

    group.finish();
}

/// Benchmark motion analysis at common resolutions
fn bench_motion_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("motion_analysis");
    let mut rng = rand::thread_rng();

    for &(height, width) in &[(240, 320), (480, 640)] {
        let frames: Vec<Array3<u8>> = (0..2)
            .map(|_| Array3::from_shape_fn((height, width, 3), |_| rng.gen::<u8>()))
            .collect();

        group.bench_with_input(
            BenchmarkId::new("analyze", format!("{width}x{height}")),
            &frames,
            |b, frames| {
                let mut analyzer = MotionAnalyzer::new(MotionConfig::default());
                let mut i = 0;
                b.iter(|| {
                    let frame = &frames[i % frames.len()];
                    i += 1;
                    black_box(analyzer.analyze_raw(frame, None).unwrap());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_feature_extraction,
    bench_decision_engine,
    bench_motion_analysis
);
criterion_main!(benches);
