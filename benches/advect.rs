//! Benchmarks for the CPU kernels and shader program validation.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use windflow::cpu::{advect_state, draw_particles, fade_into, AdvectParams, FieldSampler};
use windflow::gpu::program::ProgramReflection;
use windflow::gpu::shaders;
use windflow::state::{random_state, ParticleLayout};
use windflow::{ColorRamp, FieldAlignment, SimParams, WindData, WindMeta};

fn swirl_field(size: u32) -> WindData {
    let mut rgba = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let u = (255 * x / size.max(1)) as u8;
            let v = (255 * y / size.max(1)) as u8;
            rgba.extend_from_slice(&[u, 255 - v, 0, 255]);
        }
    }
    WindData::new(rgba, WindMeta::new(size, size, (-20.0, 20.0), (-20.0, 20.0))).unwrap()
}

fn bench_advect_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("advect_state");
    let wind = swirl_field(360);
    let sampler = FieldSampler::new(&wind, FieldAlignment::identity());
    let params = AdvectParams::from_sim(&SimParams::default(), 0.37);

    for count in [4096u32, 65536] {
        let layout = ParticleLayout::for_count(count).unwrap();
        let current = random_state(&layout, &mut StdRng::seed_from_u64(1));
        let mut next = vec![0u8; layout.byte_len()];
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                advect_state(&layout, black_box(&current), &mut next, &sampler, &params);
            })
        });
    }
    group.finish();
}

fn bench_screen(c: &mut Criterion) {
    let canvas = (512u32, 256u32);
    let wind = swirl_field(64);
    let sampler = FieldSampler::new(&wind, FieldAlignment::identity());
    let layout = ParticleLayout::for_count(16384).unwrap();
    let state = random_state(&layout, &mut StdRng::seed_from_u64(2));
    let ramp = ColorRamp::default().to_texels();
    let previous = vec![200u8; (canvas.0 * canvas.1 * 4) as usize];
    let mut screen = vec![0u8; previous.len()];

    c.bench_function("fade_into", |b| {
        b.iter(|| fade_into(black_box(&previous), &mut screen, 0.76))
    });
    c.bench_function("draw_particles", |b| {
        b.iter(|| black_box(draw_particles(&state, &sampler, &ramp, canvas, &mut screen)))
    });
}

fn bench_program_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("program_validation");
    for (label, source) in shaders::all_sources() {
        group.bench_function(label, |b| {
            b.iter(|| black_box(ProgramReflection::from_wgsl(label, &source).is_ok()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_advect_state, bench_screen, bench_program_validation);
criterion_main!(benches);
