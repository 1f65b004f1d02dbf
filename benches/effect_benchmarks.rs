//! Effect Benchmarks
//!
//! Performance benchmarks for effect rendering.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use fxvariants::dsp::{apply_chain, compose_random_chain, Catalog, EffectChain, EffectKind};
use fxvariants::engine::AudioBuffer;

fn benchmark_single_effects(c: &mut Criterion) {
    let buffer = AudioBuffer::sine_wave(440.0, 10.0, 44100).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    for kind in EffectKind::ALL {
        let spec = kind.draw(&mut rng);
        c.bench_function(&format!("{}_10s_mono", kind.name()), |b| {
            b.iter(|| spec.apply(black_box(&buffer)).unwrap())
        });
    }
}

fn benchmark_full_chain(c: &mut Criterion) {
    let buffer = AudioBuffer::sine_wave(440.0, 10.0, 44100).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let chain = EffectChain::new(EffectKind::ALL.iter().map(|k| k.draw(&mut rng)).collect());

    c.bench_function("chain_5_effects_10s", |b| {
        b.iter(|| apply_chain(black_box(&buffer), &chain).unwrap())
    });
}

fn benchmark_compose(c: &mut Criterion) {
    let catalog = Catalog::standard();
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    c.bench_function("compose_random_chain", |b| {
        b.iter(|| compose_random_chain(black_box(&catalog), &mut rng))
    });
}

criterion_group!(
    benches,
    benchmark_single_effects,
    benchmark_full_chain,
    benchmark_compose
);
criterion_main!(benches);
