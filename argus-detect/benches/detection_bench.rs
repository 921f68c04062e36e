use argus_detect::detectors::{
    Detector, ForecastIntervalDetector, IsolationOutlierDetector, SeasonalResidualDetector,
};
use argus_detect::prelude::*;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn series(len: usize) -> ObservedSeries {
    let values = (0..len)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * (i % 13) as f64 / 13.0;
            let spike = if i % 97 == 41 { 60.0 } else { 0.0 };
            100.0 + 0.1 * i as f64 + 8.0 * phase.sin() + ((i * 7919) % 23) as f64 * 0.2 + spike
        })
        .collect();
    ObservedSeries::evenly_spaced(1_700_000_000, 60, values)
}

fn benchmark_ensemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("ensemble_detect_series");
    let engine = AnomalyEngine::new(DetectionConfig::ensemble().with_parallel(false))
        .expect("ensemble preset is valid");

    for len in [30, 200, 1_000].iter() {
        let input = series(*len);
        group.throughput(Throughput::Elements(*len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &input, |b, input| {
            b.iter(|| engine.detect_series(std::hint::black_box(input)).unwrap());
        });
    }

    group.finish();
}

fn benchmark_detectors(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_detector");
    let input = series(500);

    let detectors: Vec<Box<dyn Detector>> = vec![
        Box::new(ForecastIntervalDetector::new(Default::default())),
        Box::new(SeasonalResidualDetector::new(Default::default())),
        Box::new(IsolationOutlierDetector::new(Default::default())),
    ];

    for detector in &detectors {
        group.bench_function(detector.name(), |b| {
            b.iter(|| detector.detect(std::hint::black_box(&input)));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_ensemble, benchmark_detectors);
criterion_main!(benches);
