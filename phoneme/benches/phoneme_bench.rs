use criterion::{black_box, criterion_group, criterion_main, Criterion};
use phonic_audio::{Analyser, AnalyserConfig};
use phonic_phoneme::{
    ExemplarStore, FEATURE_BINS, FeatureExtractor, FeatureVector, Letter, Matcher, PatternBuffer,
    ProfileId,
};

fn make_tone(freq_hz: f32, n_samples: usize, sample_rate: f32) -> Vec<f32> {
    (0..n_samples)
        .map(|i| 0.2 * (2.0 * std::f32::consts::PI * freq_hz * i as f32 / sample_rate).sin())
        .collect()
}

fn make_store(letters: &str, per_letter: usize) -> ExemplarStore {
    let mut store = ExemplarStore::default();
    let owner = ProfileId::new("bench").unwrap();
    for (li, c) in letters.chars().enumerate() {
        let letter = Letter::new(c).unwrap();
        store.calibrate_letter(letter);
        for k in 0..per_letter {
            let v: Vec<f32> = (0..FEATURE_BINS)
                .map(|i| ((i + li * 7 + k * 3) % 17) as f32 / 16.0)
                .collect();
            store
                .add_positive(letter, &FeatureVector::new(v), owner.clone(), None)
                .unwrap();
        }
    }
    store
}

fn bench_extract(c: &mut Criterion) {
    let mut analyser = Analyser::new(AnalyserConfig::default());
    let extractor = FeatureExtractor::default();
    let audio = make_tone(440.0, 2048, 48000.0);

    c.bench_function("phoneme_analyse_extract_2048", |b| {
        b.iter(|| {
            let spectrum = analyser.analyse(black_box(&audio));
            let _ = black_box(extractor.extract(&spectrum));
        });
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let store = make_store("mnsaeiou", 5);
    let matcher = Matcher::default();
    let mut buffer = PatternBuffer::default();
    for k in 0..30 {
        let v: Vec<f32> = (0..FEATURE_BINS).map(|i| ((i + k) % 11) as f32 / 40.0).collect();
        buffer.push(FeatureVector::new(v));
    }
    let target = Letter::new('m').unwrap();

    c.bench_function("phoneme_evaluate_40_snapshots", |b| {
        b.iter(|| {
            let rep = buffer.representative().unwrap();
            let _ = black_box(matcher.evaluate(black_box(&rep), target, &store));
        });
    });
}

criterion_group!(benches, bench_extract, bench_evaluate);
criterion_main!(benches);
