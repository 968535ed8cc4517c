//! Crossfade Join Performance Benchmark
//!
//! Measures the in-memory join of two clips, excluding file I/O.
//!
//! **Goal:** Joining should be negligible next to synthesis latency
//! **Target:** >100x realtime
//!
//! Covers both fade curves and a range of crossfade lengths.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Instant;
use stemkit_common::{FadeCurve, TransitionTiming};
use stemkit_engine::audio::{AudioFormat, Clip, CrossfadeAssembler};

const SAMPLE_RATE: u32 = 48_000;

fn sine_clip(seconds: f64) -> Clip {
    let frames = (seconds * SAMPLE_RATE as f64) as usize;
    let samples = (0..frames)
        .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / SAMPLE_RATE as f32).sin())
        .collect();
    Clip::new(samples, AudioFormat::pcm16_mono(SAMPLE_RATE))
}

fn bench_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("join");

    let a = sine_clip(2.0);
    let b = sine_clip(2.0);

    let curves = vec![("linear", FadeCurve::Linear), ("raised_cosine", FadeCurve::RaisedCosine)];

    for (name, curve) in curves {
        let assembler = CrossfadeAssembler::new().with_curve(curve);
        for crossfade_ms in [10.0, 50.0, 200.0] {
            let id = format!("{}_{}ms", name, crossfade_ms);
            group.bench_function(BenchmarkId::new("two_stems", id), |bench| {
                bench.iter(|| {
                    let start = Instant::now();

                    let mut buffer = a.clone();
                    let applied = assembler.join(
                        &mut buffer,
                        &b,
                        TransitionTiming {
                            gap_ms: 0.0,
                            crossfade_ms,
                        },
                    );
                    black_box(applied);

                    let realtime_factor = buffer.duration_ms() / 1000.0 / start.elapsed().as_secs_f64();
                    if realtime_factor < 100.0 {
                        eprintln!(
                            "WARNING: {} join speed {:.2}x is below 100x realtime target",
                            name, realtime_factor
                        );
                    }
                });
            });
        }
    }

    group.finish();
}

fn bench_tail_fade(c: &mut Criterion) {
    let assembler = CrossfadeAssembler::new();
    let clip = sine_clip(4.0);

    c.bench_function("tail_fade_5ms", |bench| {
        bench.iter(|| {
            let mut buffer = clip.clone();
            assembler.apply_tail_fade(&mut buffer);
            black_box(buffer.peak());
        });
    });
}

criterion_group!(benches, bench_join, bench_tail_fade);
criterion_main!(benches);
