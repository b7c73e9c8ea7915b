//! End-to-end engine tests on a real device.
//!
//! Each test returns early when no adapter is available, so the suite stays
//! green on machines without a GPU.

use glam::Vec2;
use windflow::{
    ConfigError, EngineConfig, EngineError, FieldError, GpuContext, SeedSource, SimParams, TickStatus,
    WindData, WindEngine, WindMeta,
};

const CANVAS: (u32, u32) = (64, 32);
const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

fn gpu() -> Option<GpuContext> {
    match GpuContext::headless() {
        Ok(gpu) => Some(gpu),
        Err(e) => {
            eprintln!("skipping GPU test: {e}");
            None
        }
    }
}

fn engine(gpu: GpuContext, count: u32) -> WindEngine {
    let params = SimParams::default()
        .with_num_particles(count)
        .with_speed_factor(1.0)
        .unwrap()
        .with_drop_rate(0.0)
        .unwrap()
        .with_drop_rate_bump(0.0)
        .unwrap();
    let config = EngineConfig {
        params,
        ..Default::default()
    };
    WindEngine::with_seeds(gpu, TARGET_FORMAT, CANVAS, config, SeedSource::seeded(7)).unwrap()
}

fn target(engine: &WindEngine) -> wgpu::TextureView {
    engine
        .device()
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("Test Target"),
            size: wgpu::Extent3d {
                width: CANVAS.0,
                height: CANVAS.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

fn uniform_field(texel: [u8; 4], u: (f32, f32), v: (f32, f32)) -> WindData {
    WindData::new(texel.repeat(4), WindMeta::new(2, 2, u, v)).unwrap()
}

#[test]
fn test_draw_without_field_is_skipped() {
    let Some(gpu) = gpu() else { return };
    let mut engine = engine(gpu, 64);
    let view = target(&engine);

    assert_eq!(engine.draw(&view), TickStatus::SkippedNoField);
    assert_eq!(engine.ticks_since_init(), 0);
    assert!(!engine.has_rendered_once());
}

#[test]
fn test_eastward_field_advects_on_gpu() {
    let Some(gpu) = gpu() else { return };
    let mut engine = engine(gpu, 4);
    let view = target(&engine);
    engine
        .set_wind(&uniform_field([255, 0, 0, 255], (0.0, 10.0), (0.0, 0.0)))
        .unwrap();

    let start = [
        Vec2::new(0.1, 0.2),
        Vec2::new(0.3, 0.4),
        Vec2::new(0.5, 0.6),
        Vec2::new(0.7, 0.8),
    ];
    engine.write_positions(&start).unwrap();
    let before = engine.read_positions().unwrap();

    for _ in 0..5 {
        assert_eq!(engine.draw(&view), TickStatus::Rendered);
    }
    let after = engine.read_positions().unwrap();

    for (a, b) in before.iter().zip(&after) {
        assert!((b.x - a.x - 0.005).abs() < 1e-4, "{a:?} -> {b:?}");
        assert!((b.y - a.y).abs() < 1e-4, "{a:?} -> {b:?}");
    }
    assert_eq!(engine.ticks_since_init(), 5);
}

#[test]
fn test_no_data_field_leaves_trails_empty() {
    let Some(gpu) = gpu() else { return };
    let mut engine = engine(gpu, 256);
    let view = target(&engine);
    engine
        .set_wind(&uniform_field([128, 128, 0, 0], (-5.0, 5.0), (-5.0, 5.0)))
        .unwrap();

    for _ in 0..3 {
        engine.draw(&view);
    }
    let screen = engine.read_screen().unwrap();
    assert_eq!(screen.len(), (CANVAS.0 * CANVAS.1 * 4) as usize);
    assert!(screen.iter().all(|&b| b == 0));
}

#[test]
fn test_particles_leave_trails() {
    let Some(gpu) = gpu() else { return };
    let mut engine = engine(gpu, 1024);
    let view = target(&engine);
    engine
        .set_wind(&uniform_field([0, 0, 0, 255], (0.0, 10.0), (0.0, 10.0)))
        .unwrap();

    engine.draw(&view);
    engine.draw(&view);
    let screen = engine.read_screen().unwrap();
    assert!(screen.chunks_exact(4).any(|px| px[3] == 255));
}

#[test]
fn test_reconfigure_particle_count() {
    let Some(gpu) = gpu() else { return };
    let mut engine = engine(gpu, 16);
    let view = target(&engine);
    engine
        .set_wind(&uniform_field([255, 0, 0, 255], (0.0, 10.0), (0.0, 0.0)))
        .unwrap();
    engine.draw(&view);

    assert_eq!(engine.reconfigure_particle_count(10).unwrap(), 16);
    assert_eq!(engine.reconfigure_particle_count(17).unwrap(), 25);
    assert_eq!(engine.num_particles(), 25);
    assert_eq!(engine.read_positions().unwrap().len(), 25);
    assert_eq!(engine.draw(&view), TickStatus::Rendered);

    assert!(matches!(
        engine.reconfigure_particle_count(0),
        Err(ConfigError::ZeroParticles)
    ));
    let limit = engine.device().limits().max_texture_dimension_2d;
    if let Some(too_many) = (limit + 1).checked_mul(limit + 1) {
        assert!(matches!(
            engine.reconfigure_particle_count(too_many),
            Err(ConfigError::TooManyParticles { .. })
        ));
        // The failed request left the previous allocation in place.
        assert_eq!(engine.num_particles(), 25);
    }
}

#[test]
fn test_reallocation_reseeds_positions() {
    let Some(gpu) = gpu() else { return };
    let mut engine = engine(gpu, 256);
    let view = target(&engine);
    engine
        .set_wind(&uniform_field([0, 0, 0, 255], (0.0, 10.0), (0.0, 10.0)))
        .unwrap();
    engine.draw(&view);
    let before = engine.read_positions().unwrap();

    assert_eq!(engine.reconfigure_particle_count(256).unwrap(), 256);
    let after = engine.read_positions().unwrap();
    assert_eq!(after.len(), before.len());
    let moved = before.iter().zip(&after).filter(|(a, b)| a != b).count();
    assert!(moved > before.len() / 2, "only {moved} particles moved");

    assert_eq!(engine.ticks_since_init(), 1);
    assert_eq!(engine.draw(&view), TickStatus::Rendered);
    assert_eq!(engine.ticks_since_init(), 2);
}

#[test]
fn test_oversized_field_is_rejected() {
    let Some(gpu) = gpu() else { return };
    let mut engine = engine(gpu, 16);
    let limit = engine.device().limits().max_texture_dimension_2d;
    let wide = WindData::new(
        vec![0u8; (limit as usize + 1) * 4],
        WindMeta::new(limit + 1, 1, (0.0, 10.0), (0.0, 10.0)),
    )
    .unwrap();

    assert!(matches!(
        engine.set_wind(&wide),
        Err(EngineError::Field(FieldError::TooLarge { .. }))
    ));
    assert!(!engine.has_wind());

    // The engine keeps working with a field that fits.
    engine
        .set_wind(&uniform_field([0, 0, 0, 255], (0.0, 10.0), (0.0, 10.0)))
        .unwrap();
    assert!(engine.has_wind());
}

#[test]
fn test_stale_field_load_is_dropped() {
    let Some(gpu) = gpu() else { return };
    let mut engine = engine(gpu, 16);
    let slow = engine.begin_wind_load();
    let fast = engine.begin_wind_load();

    let east = uniform_field([255, 0, 0, 255], (0.0, 10.0), (0.0, 0.0));
    let north = uniform_field([0, 255, 0, 255], (0.0, 0.0), (0.0, 10.0));
    assert!(engine.set_wind_ticketed(fast, &north).unwrap());
    assert!(!engine.set_wind_ticketed(slow, &east).unwrap());
    assert_eq!(engine.wind_meta().unwrap().v_max, 10.0);
}

#[test]
fn test_invalid_config_is_rejected() {
    let Some(gpu) = gpu() else { return };
    let mut config = EngineConfig::default();
    config.params.fade_opacity = 1.5;
    let result = WindEngine::new(gpu, TARGET_FORMAT, CANVAS, config);
    assert!(matches!(
        result,
        Err(EngineError::Config(ConfigError::OutOfRange { .. }))
    ));
}
