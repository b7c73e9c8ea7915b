//! CPU mirror of the GPU kernels.
//!
//! Every function here performs the same arithmetic as its WGSL counterpart
//! in `src/shaders/`, operating on byte buffers laid out exactly like the GPU
//! textures. [`CpuSimulation`] drives them through the same ping-pong store
//! and tick order as [`WindEngine`](crate::WindEngine), which makes the
//! engine's behavior testable without a GPU and usable headless.

use glam::{Vec2, Vec4};

use crate::error::ConfigError;
use crate::field::WindData;
use crate::params::SimParams;
use crate::pingpong::PingPong;
use crate::ramp::{lookup_texels, ColorRamp};
use crate::state::{
    decode_position, encode_position, random_state, ParticleLayout, BYTES_PER_PARTICLE,
};
use crate::tick::{SeedSource, TickStatus};
use crate::viewport::{FieldAlignment, ViewState, ViewTracker};

/// Velocity-to-displacement scale applied before `speed_factor`.
pub const SPEED_SCALE: f32 = 0.0001;

/// Smallest `cos(latitude)` divisor used by latitude correction.
pub const MIN_DISTORTION: f32 = 0.05;

/// Added before flooring faded colors so exact multiples are not pushed down
/// by float error.
pub const FADE_EPSILON: f32 = 1e-4;

/// Below this `|velocity max|` the field is treated as motionless.
pub const MIN_SPEED_RANGE: f32 = 1e-6;

/// 32-bit integer mixer shared with the shaders.
#[inline]
pub fn hash(n: u32) -> u32 {
    let mut x = n;
    x ^= x >> 17;
    x = x.wrapping_mul(0xed5a_d4bb);
    x ^= x >> 11;
    x = x.wrapping_mul(0xac4c_1b51);
    x ^= x >> 15;
    x = x.wrapping_mul(0x3184_8bab);
    x ^= x >> 14;
    x
}

/// Pseudo-random value in `[0, 1)` from a 2D float seed.
#[inline]
pub fn rand(co: Vec2) -> f32 {
    let h = hash(co.x.to_bits() ^ hash(co.y.to_bits()));
    (h >> 8) as f32 / 16_777_216.0
}

/// WGSL `fract`: `x - floor(x)`.
#[inline]
fn fract(x: f32) -> f32 {
    x - x.floor()
}

/// Wrap a coordinate into `[0, 1)`; anything that does not land there
/// (NaN, or a `fract` that rounded up to 1) becomes 0.
#[inline]
pub fn wrap_unit(x: f32) -> f32 {
    let w = fract(1.0 + x);
    if w >= 0.0 && w < 1.0 {
        w
    } else {
        0.0
    }
}

/// Velocity sampled at one particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindSample {
    /// Physical velocity in field units.
    pub velocity: Vec2,
    /// `|velocity| / |velocity max|`.
    pub speed_t: f32,
    /// Interpolated field alpha; 0 means no data.
    pub alpha: f32,
}

impl WindSample {
    const NONE: Self = Self {
        velocity: Vec2::ZERO,
        speed_t: 0.0,
        alpha: 0.0,
    };
}

/// Reads a loaded field at canvas positions through an alignment.
#[derive(Debug, Clone, Copy)]
pub struct FieldSampler<'a> {
    wind: &'a WindData,
    alignment: FieldAlignment,
}

impl<'a> FieldSampler<'a> {
    pub fn new(wind: &'a WindData, alignment: FieldAlignment) -> Self {
        Self { wind, alignment }
    }

    pub fn alignment(&self) -> &FieldAlignment {
        &self.alignment
    }

    /// Four-tap bilinear read of all channels at field texture coordinates.
    pub fn lookup(&self, uv: Vec2) -> Vec4 {
        let res = Vec2::new(self.wind.width() as f32, self.wind.height() as f32);
        let p = uv * res;
        let base = p.floor();
        let f = p - base;
        let (x, y) = (base.x as i64, base.y as i64);
        let load = |dx: i64, dy: i64| {
            let [r, g, b, a] = self.wind.texel_clamped(x + dx, y + dy);
            Vec4::new(r as f32, g as f32, b as f32, a as f32) / 255.0
        };
        let top = load(0, 0).lerp(load(1, 0), f.x);
        let bottom = load(0, 1).lerp(load(1, 1), f.x);
        top.lerp(bottom, f.y)
    }

    /// Velocity at a canvas position. Outside the field there is no motion
    /// and no data.
    pub fn sample(&self, pos: Vec2) -> WindSample {
        let uv = self.alignment.field_uv(pos);
        if !(uv.x >= 0.0 && uv.x <= 1.0 && uv.y >= 0.0 && uv.y <= 1.0) {
            return WindSample::NONE;
        }
        let raw = self.lookup(uv);
        let meta = self.wind.meta();
        let (min, max) = (meta.velocity_min(), meta.velocity_max());
        let max_len = max.length();
        if max_len <= MIN_SPEED_RANGE {
            return WindSample {
                alpha: raw.w,
                ..WindSample::NONE
            };
        }
        let velocity = min + (max - min) * Vec2::new(raw.x, raw.y);
        WindSample {
            velocity,
            speed_t: velocity.length() / max_len,
            alpha: raw.w,
        }
    }

    /// Longitude stretch at a canvas position for latitude correction.
    pub fn distortion(&self, pos: Vec2) -> f32 {
        let v = self.alignment.field_uv(pos).y;
        let lat = self.alignment.latitude(v);
        lat.to_radians().cos().max(MIN_DISTORTION)
    }
}

/// Parameters the advection step reads each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdvectParams {
    pub speed_factor: f32,
    pub drop_rate: f32,
    pub drop_rate_bump: f32,
    pub latitude_correction: bool,
    pub seed: f32,
}

impl AdvectParams {
    pub fn from_sim(params: &SimParams, seed: f32) -> Self {
        Self {
            speed_factor: params.speed_factor,
            drop_rate: params.drop_rate,
            drop_rate_bump: params.drop_rate_bump,
            latitude_correction: params.latitude_correction,
            seed,
        }
    }
}

/// Advance one particle. `tex_coord` is its texel center in the state texture.
pub fn advect_particle(
    pos: Vec2,
    tex_coord: Vec2,
    sampler: &FieldSampler<'_>,
    params: &AdvectParams,
) -> Vec2 {
    let sample = sampler.sample(pos);
    let distortion = if params.latitude_correction {
        sampler.distortion(pos)
    } else {
        1.0
    };
    let offset = Vec2::new(sample.velocity.x / distortion, -sample.velocity.y)
        * SPEED_SCALE
        * params.speed_factor;
    let moved = Vec2::new(wrap_unit(pos.x + offset.x), wrap_unit(pos.y + offset.y));

    let seed = (moved + tex_coord) * params.seed;
    let drop_rate = params.drop_rate + sample.speed_t * params.drop_rate_bump;
    if rand(seed) < drop_rate {
        Vec2::new(rand(seed + 1.3), rand(seed + 2.1))
    } else {
        moved
    }
}

/// Run the advection kernel over a whole state texture.
pub fn advect_state(
    layout: &ParticleLayout,
    current: &[u8],
    next: &mut [u8],
    sampler: &FieldSampler<'_>,
    params: &AdvectParams,
) {
    for (index, (src, dst)) in current
        .chunks_exact(BYTES_PER_PARTICLE)
        .zip(next.chunks_exact_mut(BYTES_PER_PARTICLE))
        .enumerate()
    {
        let (x, y) = layout.texel(index as u32);
        let pos = decode_position([src[0], src[1], src[2], src[3]]);
        let new_pos = advect_particle(pos, layout.tex_coord(x, y), sampler, params);
        dst.copy_from_slice(&encode_position(new_pos));
    }
}

/// Fade one stored channel byte by `opacity`, quantized downward.
#[inline]
pub fn fade_byte(byte: u8, opacity: f32) -> u8 {
    (byte as f32 * opacity + FADE_EPSILON).floor().clamp(0.0, 255.0) as u8
}

/// Write the faded previous frame into the target buffer.
pub fn fade_into(previous: &[u8], target: &mut [u8], opacity: f32) {
    for (dst, &src) in target.iter_mut().zip(previous) {
        *dst = fade_byte(src, opacity);
    }
}

/// Canvas pixel covered by a particle, if it is on screen.
pub fn particle_pixel(pos: Vec2, canvas: (u32, u32)) -> Option<(u32, u32)> {
    let px = (pos * Vec2::new(canvas.0 as f32, canvas.1 as f32)).floor();
    if px.x < 0.0 || px.y < 0.0 || px.x >= canvas.0 as f32 || px.y >= canvas.1 as f32 {
        return None;
    }
    Some((px.x as u32, px.y as u32))
}

/// Draw every particle of a state texture as an opaque pixel colored by speed.
///
/// Returns how many particles were drawn; those over no-data texels are
/// skipped.
pub fn draw_particles(
    state: &[u8],
    sampler: &FieldSampler<'_>,
    ramp_texels: &[u8],
    canvas: (u32, u32),
    target: &mut [u8],
) -> usize {
    let mut drawn = 0;
    for texel in state.chunks_exact(BYTES_PER_PARTICLE) {
        let pos = decode_position([texel[0], texel[1], texel[2], texel[3]]);
        let Some((x, y)) = particle_pixel(pos, canvas) else {
            continue;
        };
        let sample = sampler.sample(pos);
        if sample.alpha == 0.0 {
            continue;
        }
        let color = lookup_texels(ramp_texels, sample.speed_t) * 255.0;
        let offset = (y as usize * canvas.0 as usize + x as usize) * 4;
        target[offset..offset + 4].copy_from_slice(
            &[color.x, color.y, color.z, color.w].map(|c| c.round().clamp(0.0, 255.0) as u8),
        );
        drawn += 1;
    }
    drawn
}

/// Alpha-blend a screen buffer over a destination of the same size.
pub fn composite_over(screen: &[u8], dst: &mut [u8]) {
    for (d, s) in dst.chunks_exact_mut(4).zip(screen.chunks_exact(4)) {
        let a = s[3] as f32 / 255.0;
        for c in 0..3 {
            let v = s[c] as f32 * a + d[c] as f32 * (1.0 - a);
            d[c] = v.round().clamp(0.0, 255.0) as u8;
        }
        let da = d[3] as f32 / 255.0;
        d[3] = ((a + da * (1.0 - a)) * 255.0).round().clamp(0.0, 255.0) as u8;
    }
}

/// Headless wind simulation on byte buffers.
///
/// Runs the same tick as the GPU engine: fade the previous frame into the
/// screen buffer, draw particles from the current state, composite the
/// screen onto the surface, advect into the next state, then swap both
/// pairs.
#[derive(Debug)]
pub struct CpuSimulation {
    params: SimParams,
    layout: ParticleLayout,
    state: PingPong<Vec<u8>>,
    screen: PingPong<Vec<u8>>,
    surface: Vec<u8>,
    clear_color: Option<[u8; 4]>,
    canvas: (u32, u32),
    ramp_texels: Vec<u8>,
    wind: Option<WindData>,
    view: ViewTracker,
    seeds: SeedSource,
    ticks_since_init: u64,
    last_drawn: usize,
}

impl CpuSimulation {
    /// Create a simulation with a deterministic random stream.
    pub fn new(params: SimParams, canvas: (u32, u32), seed: u64) -> Result<Self, ConfigError> {
        params.validate()?;
        let layout = ParticleLayout::for_count(params.num_particles)?;
        let mut seeds = SeedSource::seeded(seed);
        let state = PingPong::from_fn(|_| random_state(&layout, seeds.rng()));
        Ok(Self {
            params,
            layout,
            state,
            screen: Self::blank_screens(canvas),
            surface: vec![0u8; canvas.0 as usize * canvas.1 as usize * 4],
            clear_color: None,
            canvas,
            ramp_texels: ColorRamp::default().to_texels(),
            wind: None,
            view: ViewTracker::new(),
            seeds,
            ticks_since_init: 0,
            last_drawn: 0,
        })
    }

    fn blank_screens(canvas: (u32, u32)) -> PingPong<Vec<u8>> {
        let len = canvas.0 as usize * canvas.1 as usize * 4;
        PingPong::from_fn(|_| vec![0u8; len])
    }

    /// Run one tick.
    pub fn tick(&mut self) -> TickStatus {
        let Some(wind) = self.wind.as_ref() else {
            return TickStatus::SkippedNoField;
        };
        let seed = self.seeds.next_seed();
        let sampler = FieldSampler::new(wind, self.view.alignment());

        let (background, screen) = self.screen.split_mut();
        fade_into(background, screen, self.params.fade_opacity);
        self.last_drawn = draw_particles(
            self.state.current(),
            &sampler,
            &self.ramp_texels,
            self.canvas,
            screen,
        );
        if let Some(color) = self.clear_color {
            for px in self.surface.chunks_exact_mut(4) {
                px.copy_from_slice(&color);
            }
        }
        composite_over(screen, &mut self.surface);

        let advect = AdvectParams::from_sim(&self.params, seed);
        let (current, next) = self.state.split_mut();
        advect_state(&self.layout, current, next, &sampler, &advect);

        self.screen.swap();
        self.state.swap();
        self.ticks_since_init += 1;
        TickStatus::Rendered
    }

    /// Replace the field and realign it to the current view.
    pub fn set_wind(&mut self, wind: WindData) {
        self.view.realign(wind.meta().extent.as_ref(), self.canvas);
        self.wind = Some(wind);
    }

    /// Follow a new view; realigns the loaded field.
    pub fn set_view(&mut self, view: ViewState) {
        self.view.set_view(view);
        let extent = self.wind.as_ref().and_then(|w| w.meta().extent);
        self.view.realign(extent.as_ref(), self.canvas);
    }

    /// Reallocate particle state; all previous positions are lost.
    pub fn reconfigure_particle_count(&mut self, requested: u32) -> Result<u32, ConfigError> {
        let layout = ParticleLayout::for_count(requested)?;
        let seeds = &mut self.seeds;
        self.state = PingPong::from_fn(|_| random_state(&layout, seeds.rng()));
        self.layout = layout;
        self.params.num_particles = requested;
        Ok(layout.count())
    }

    /// Reallocate both screen buffers, discarding trails.
    pub fn resize(&mut self, canvas: (u32, u32)) {
        self.canvas = canvas;
        self.screen = Self::blank_screens(canvas);
        self.surface = vec![0u8; canvas.0 as usize * canvas.1 as usize * 4];
        let extent = self.wind.as_ref().and_then(|w| w.meta().extent);
        self.view.realign(extent.as_ref(), canvas);
    }

    pub fn set_color_ramp(&mut self, ramp: &ColorRamp) {
        self.ramp_texels = ramp.to_texels();
    }

    /// Replace all parameters except the particle count.
    pub fn set_params(&mut self, params: SimParams) -> Result<(), ConfigError> {
        params.validate()?;
        let count = self.params.num_particles;
        self.params = SimParams {
            num_particles: count,
            ..params
        };
        Ok(())
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn layout(&self) -> &ParticleLayout {
        &self.layout
    }

    pub fn num_particles(&self) -> u32 {
        self.layout.count()
    }

    pub fn alignment(&self) -> FieldAlignment {
        self.view.alignment()
    }

    /// Particle state pair; `current()` is what the next tick reads.
    pub fn state(&self) -> &PingPong<Vec<u8>> {
        &self.state
    }

    /// Screen pair; `current()` holds the most recently composited frame.
    pub fn screen(&self) -> &PingPong<Vec<u8>> {
        &self.screen
    }

    /// The visible surface each tick composites onto.
    pub fn surface(&self) -> &[u8] {
        &self.surface
    }

    /// Color the surface is cleared to before each composite. `None` keeps
    /// what was already there, like a host-drawn basemap.
    pub fn set_clear_color(&mut self, color: Option<[u8; 4]>) {
        self.clear_color = color;
    }

    /// Decoded positions of the current state.
    pub fn positions(&self) -> Vec<Vec2> {
        crate::state::decode_state(self.state.current())
    }

    /// Overwrite the current state with explicit positions, one per particle
    /// in texel order. Particles past the end of `positions` keep theirs.
    pub fn set_positions(&mut self, positions: &[Vec2]) {
        let current = self.state.current_mut();
        for (texel, &pos) in current.chunks_exact_mut(BYTES_PER_PARTICLE).zip(positions) {
            texel.copy_from_slice(&encode_position(pos));
        }
    }

    /// Particles drawn during the last rendered tick.
    pub fn last_drawn(&self) -> usize {
        self.last_drawn
    }

    pub fn ticks_since_init(&self) -> u64 {
        self.ticks_since_init
    }

    pub fn has_rendered_once(&self) -> bool {
        self.ticks_since_init > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::WindMeta;

    fn uniform_wind(texel: [u8; 4], u: (f32, f32), v: (f32, f32)) -> WindData {
        let meta = WindMeta::new(2, 2, u, v);
        WindData::new(texel.repeat(4), meta).unwrap()
    }

    #[test]
    fn test_hash_matches_reference_values() {
        assert_eq!(hash(0), 0);
        assert_eq!(hash(1), 0x0427_41d6);
        assert_eq!(hash(2), 0xf1df_e8e9);
        assert_eq!(hash(0xdead_beef), 0x0921_725e);
        // Bit pattern of 1.0f32, as fed in by `rand`.
        assert_eq!(hash(0x3f80_0000), 0x2cac_265d);
    }

    #[test]
    fn test_rand_in_unit_interval() {
        for i in 0..10_000 {
            let r = rand(Vec2::new(i as f32 * 0.37, i as f32 * 0.11 + 0.5));
            assert!((0.0..1.0).contains(&r));
        }
    }

    #[test]
    fn test_wrap_unit() {
        assert_eq!(wrap_unit(0.25), 0.25);
        assert!((wrap_unit(1.25) - 0.25).abs() < 1e-6);
        assert!((wrap_unit(-0.25) - 0.75).abs() < 1e-6);
        assert_eq!(wrap_unit(f32::NAN), 0.0);
        assert!((0.0..1.0).contains(&wrap_unit(-1e-9)));
    }

    #[test]
    fn test_sample_maps_channels_to_velocity() {
        let wind = uniform_wind([255, 128, 0, 255], (-10.0, 10.0), (-10.0, 10.0));
        let sampler = FieldSampler::new(&wind, FieldAlignment::identity());
        let s = sampler.sample(Vec2::splat(0.5));
        assert!((s.velocity.x - 10.0).abs() < 1e-4);
        assert!(s.velocity.y.abs() < 0.05);
        assert!((s.speed_t - s.velocity.length() / 200f32.sqrt()).abs() < 1e-6);
        assert_eq!(s.alpha, 1.0);
    }

    #[test]
    fn test_sample_outside_field_is_still() {
        let wind = uniform_wind([255, 255, 0, 255], (0.0, 10.0), (0.0, 10.0));
        let alignment = FieldAlignment {
            offset: Vec2::new(0.5, 0.5),
            scale: Vec2::splat(0.25),
            ..FieldAlignment::identity()
        };
        let sampler = FieldSampler::new(&wind, alignment);
        assert_eq!(sampler.sample(Vec2::new(0.1, 0.1)), WindSample::NONE);
        assert!(sampler.sample(Vec2::new(0.6, 0.6)).speed_t > 0.9);
    }

    #[test]
    fn test_zero_velocity_range_is_motionless() {
        let wind = uniform_wind([255, 255, 0, 255], (-5.0, 0.0), (0.0, 0.0));
        let sampler = FieldSampler::new(&wind, FieldAlignment::identity());
        let s = sampler.sample(Vec2::splat(0.3));
        assert_eq!(s.velocity, Vec2::ZERO);
        assert_eq!(s.speed_t, 0.0);
        assert!(s.speed_t.is_finite());
    }

    #[test]
    fn test_bilinear_blends_neighbours() {
        let meta = WindMeta::new(2, 1, (0.0, 1.0), (0.0, 1.0));
        let wind = WindData::new(vec![0, 0, 0, 255, 255, 0, 0, 255], meta).unwrap();
        let sampler = FieldSampler::new(&wind, FieldAlignment::identity());
        // uv.x = 0.25 sits halfway between texel 0 and texel 1.
        let raw = sampler.lookup(Vec2::new(0.25, 0.0));
        assert!((raw.x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_latitude_correction_stretches_east() {
        let wind = uniform_wind([255, 0, 0, 255], (0.0, 10.0), (0.0, 0.0));
        let sampler = FieldSampler::new(&wind, FieldAlignment::identity());
        let base = AdvectParams {
            speed_factor: 1.0,
            drop_rate: 0.0,
            drop_rate_bump: 0.0,
            latitude_correction: false,
            seed: 0.5,
        };
        let pos = Vec2::new(0.5, 1.0 / 6.0); // 60°N
        let plain = advect_particle(pos, Vec2::ZERO, &sampler, &base) - pos;
        let corrected = advect_particle(
            pos,
            Vec2::ZERO,
            &sampler,
            &AdvectParams {
                latitude_correction: true,
                ..base
            },
        ) - pos;
        assert!((corrected.x / plain.x - 2.0).abs() < 1e-2);
    }

    #[test]
    fn test_fade_always_decays() {
        for opacity in [0.5, 0.76, 0.96, 0.996, 0.999] {
            for b in 1..=255u8 {
                assert!(fade_byte(b, opacity) < b, "{b} at {opacity}");
            }
            assert_eq!(fade_byte(0, opacity), 0);
        }
        assert_eq!(fade_byte(100, 0.5), 50);
    }

    #[test]
    fn test_particle_pixel_bounds() {
        assert_eq!(particle_pixel(Vec2::ZERO, (4, 4)), Some((0, 0)));
        assert_eq!(particle_pixel(Vec2::new(0.99, 0.5), (4, 4)), Some((3, 2)));
        assert_eq!(particle_pixel(Vec2::new(1.0, 0.5), (4, 4)), None);
    }

    #[test]
    fn test_composite_over_respects_alpha() {
        let mut dst = vec![0, 0, 255, 255];
        composite_over(&[255, 0, 0, 0], &mut dst);
        assert_eq!(dst, vec![0, 0, 255, 255]);
        composite_over(&[255, 0, 0, 255], &mut dst);
        assert_eq!(dst, vec![255, 0, 0, 255]);
    }

    #[test]
    fn test_tick_skips_without_field() {
        let mut sim = CpuSimulation::new(SimParams::default().with_num_particles(16), (8, 8), 1).unwrap();
        let before = sim.state().current().clone();
        assert_eq!(sim.tick(), TickStatus::SkippedNoField);
        assert_eq!(sim.state().current(), &before);
        assert!(!sim.has_rendered_once());
    }

    #[test]
    fn test_tick_draws_and_counts() {
        let mut sim = CpuSimulation::new(SimParams::default().with_num_particles(64), (16, 16), 9).unwrap();
        sim.set_wind(uniform_wind([200, 100, 0, 255], (-10.0, 10.0), (-10.0, 10.0)));
        assert_eq!(sim.tick(), TickStatus::Rendered);
        assert_eq!(sim.ticks_since_init(), 1);
        assert!(sim.last_drawn() > 0);
        assert!(sim.screen().current().iter().any(|&b| b != 0));
    }

    #[test]
    fn test_resize_clears_trails() {
        let mut sim = CpuSimulation::new(SimParams::default().with_num_particles(64), (16, 16), 9).unwrap();
        sim.set_wind(uniform_wind([200, 100, 0, 255], (-10.0, 10.0), (-10.0, 10.0)));
        sim.tick();
        sim.resize((8, 4));
        assert_eq!(sim.screen().current().len(), 8 * 4 * 4);
        assert!(sim.screen().current().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_set_params_keeps_particle_count() {
        let mut sim = CpuSimulation::new(SimParams::default().with_num_particles(100), (4, 4), 2).unwrap();
        sim.set_params(SimParams::default().with_num_particles(5)).unwrap();
        assert_eq!(sim.num_particles(), 100);
        assert_eq!(sim.params().num_particles, 100);
    }
}
