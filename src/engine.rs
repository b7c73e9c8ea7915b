//! The wind engine: owns all GPU state and runs one tick per `draw` call.
//!
//! # Tick order
//!
//! 1. Skip entirely if no field is loaded.
//! 2. Upload per-tick uniforms with a fresh random seed.
//! 3. Fade the background screen into the screen texture, draw particles
//!    from the current state on top.
//! 4. Alpha-blend the screen texture onto the host target.
//! 5. Advect current state into next state.
//! 6. Submit, then swap both ping-pong pairs.
//!
//! Reconfiguration (`set_wind`, `resize`, `reconfigure_particle_count`,
//! parameter setters) takes `&mut self`, so it can only happen between ticks.

use glam::Vec2;

use crate::error::{ConfigError, EngineError, GpuError};
use crate::field::{LoadSequencer, LoadTicket, WindData, WindMeta};
use crate::gpu::{
    shaders, wind_group_layout, AdvectPass, ColorRampGpu, GpuContext, ParticleStateGpu, ShaderProgram,
    TrailCompositor, WindFieldGpu, WindUniforms,
};
use crate::params::{self, EngineConfig, SimParams};
use crate::ramp::ColorRamp;
use crate::state::{decode_state, encode_position, ParticleLayout, BYTES_PER_PARTICLE};
use crate::tick::{SeedSource, TickStatus};
use crate::viewport::{FieldAlignment, ViewState, ViewTracker};

use wgpu::util::DeviceExt;

pub struct WindEngine {
    gpu: GpuContext,
    update_program: ShaderProgram,
    wind_layout: wgpu::BindGroupLayout,
    uniforms: wgpu::Buffer,
    field: Option<WindFieldGpu>,
    particles: ParticleStateGpu,
    ramp: ColorRampGpu,
    advect: AdvectPass,
    compositor: TrailCompositor,
    params: SimParams,
    background: Option<wgpu::Color>,
    canvas: (u32, u32),
    view: ViewTracker,
    seeds: SeedSource,
    loads: LoadSequencer,
    ticks_since_init: u64,
}

impl WindEngine {
    /// Build every program, pipeline and texture.
    ///
    /// `target_format` is the format of the views later passed to [`draw`](Self::draw);
    /// `canvas` is their size in pixels.
    pub fn new(
        gpu: GpuContext,
        target_format: wgpu::TextureFormat,
        canvas: (u32, u32),
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        Self::with_seeds(gpu, target_format, canvas, config, SeedSource::from_entropy())
    }

    /// Like [`new`](Self::new) with a reproducible random stream.
    pub fn with_seeds(
        gpu: GpuContext,
        target_format: wgpu::TextureFormat,
        canvas: (u32, u32),
        config: EngineConfig,
        mut seeds: SeedSource,
    ) -> Result<Self, EngineError> {
        config.params.validate()?;
        let device = &gpu.device;
        let layout = checked_layout(device, config.params.num_particles)?;

        let update_program = ShaderProgram::new(device, "update", &shaders::update_source())?;
        let draw_program = ShaderProgram::new(device, "draw", &shaders::draw_source())?;
        let screen_program = ShaderProgram::new(device, "screen", &shaders::screen_source())?;

        let wind_layout = wind_group_layout(device, &update_program)?;
        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Wind Uniforms"),
            contents: bytemuck::bytes_of(&WindUniforms::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let particles = ParticleStateGpu::new(device, &gpu.queue, layout, seeds.rng());
        let ramp = ColorRampGpu::new(device, &gpu.queue, &config.palette.ramp());
        let advect = AdvectPass::new(device, &update_program, &wind_layout, &particles)?;
        let compositor = TrailCompositor::new(
            device,
            &screen_program,
            &draw_program,
            &wind_layout,
            &particles,
            &ramp,
            canvas,
            target_format,
            config.params.fade_opacity,
        )?;

        log::info!(
            "Wind engine ready: {} particles ({}x{} state), canvas {}x{}",
            layout.count(),
            layout.resolution(),
            layout.resolution(),
            canvas.0,
            canvas.1
        );

        Ok(Self {
            gpu,
            update_program,
            wind_layout,
            uniforms,
            field: None,
            particles,
            ramp,
            advect,
            compositor,
            params: config.params,
            background: config.background.map(|[r, g, b, a]| wgpu::Color { r, g, b, a }),
            canvas,
            view: ViewTracker::new(),
            seeds,
            loads: LoadSequencer::new(),
            ticks_since_init: 0,
        })
    }

    /// Run one tick, compositing onto `target`.
    pub fn draw(&mut self, target: &wgpu::TextureView) -> TickStatus {
        let Some(field) = self.field.as_ref() else {
            return TickStatus::SkippedNoField;
        };

        let seed = self.seeds.next_seed();
        let uniforms = WindUniforms::new(
            field.meta(),
            &self.view.alignment(),
            &self.params,
            self.particles.layout(),
            seed,
        );
        self.gpu
            .queue
            .write_buffer(&self.uniforms, 0, bytemuck::bytes_of(&uniforms));

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Wind Tick Encoder"),
            });
        self.compositor
            .record_screen(&mut encoder, field.bind_group(), &self.particles);
        self.compositor
            .record_composite(&mut encoder, target, self.background);
        self.advect
            .record(&mut encoder, field.bind_group(), &self.particles);
        self.gpu.queue.submit(std::iter::once(encoder.finish()));

        self.compositor.swap();
        self.particles.swap();
        self.ticks_since_init += 1;
        TickStatus::Rendered
    }

    /// Load or replace the field and realign it to the current view.
    pub fn set_wind(&mut self, wind: &WindData) -> Result<(), EngineError> {
        wind.meta()
            .check_texture_limit(self.gpu.device.limits().max_texture_dimension_2d)?;
        let field = WindFieldGpu::new(
            &self.gpu.device,
            &self.gpu.queue,
            wind,
            &self.wind_layout,
            &self.update_program,
            &self.uniforms,
        )?;
        self.view.realign(wind.meta().extent.as_ref(), self.canvas);
        log::info!(
            "Loaded {}x{} field (u {}..{}, v {}..{})",
            wind.width(),
            wind.height(),
            wind.meta().u_min,
            wind.meta().u_max,
            wind.meta().v_min,
            wind.meta().v_max
        );
        self.field = Some(field);
        Ok(())
    }

    /// Ticket for a field load about to start.
    pub fn begin_wind_load(&mut self) -> LoadTicket {
        self.loads.issue()
    }

    /// Apply a completed load unless a newer one was already applied.
    ///
    /// Returns `Ok(false)` when the result was superseded and dropped.
    pub fn set_wind_ticketed(
        &mut self,
        ticket: LoadTicket,
        wind: &WindData,
    ) -> Result<bool, EngineError> {
        if !self.loads.accept(ticket) {
            log::warn!(
                "Discarding stale field load #{} (#{} already applied)",
                ticket.id(),
                self.loads.applied().map_or(0, |t| t.id())
            );
            return Ok(false);
        }
        self.set_wind(wind)?;
        Ok(true)
    }

    /// Rebuild the color ramp texture.
    pub fn set_color_ramp(&mut self, ramp: &ColorRamp) {
        self.ramp.update(&self.gpu.queue, ramp);
        log::debug!("Color ramp updated ({} stops)", ramp.stops().len());
    }

    /// Reallocate particle state for at least `requested` particles.
    ///
    /// Returns the actual count, `ceil(sqrt(requested))²`. All previous
    /// particle positions are discarded.
    pub fn reconfigure_particle_count(&mut self, requested: u32) -> Result<u32, ConfigError> {
        let layout = checked_layout(&self.gpu.device, requested)?;
        self.particles =
            ParticleStateGpu::new(&self.gpu.device, &self.gpu.queue, layout, self.seeds.rng());
        self.advect.rebind(&self.gpu.device, &self.particles);
        self.compositor
            .rebind_particles(&self.gpu.device, &self.particles, &self.ramp);
        self.params.num_particles = requested;
        log::info!(
            "Reallocated particle state: {} particles ({} requested)",
            layout.count(),
            requested
        );
        Ok(layout.count())
    }

    /// Reallocate the trail buffers for a new canvas size. Trails are cleared.
    pub fn resize(&mut self, canvas: (u32, u32)) {
        if canvas.0 == 0 || canvas.1 == 0 {
            return;
        }
        self.canvas = canvas;
        self.compositor.resize(&self.gpu.device, canvas);
        let extent = self.field.as_ref().and_then(|f| f.meta().extent);
        self.view.realign(extent.as_ref(), canvas);
        log::info!("Resized trail buffers to {}x{}", canvas.0, canvas.1);
    }

    /// Follow a new view from the basemap; realigns the field.
    pub fn set_view(&mut self, view: ViewState) {
        self.view.set_view(view);
        let extent = self.field.as_ref().and_then(|f| f.meta().extent);
        self.view.realign(extent.as_ref(), self.canvas);
    }

    pub fn set_fade_opacity(&mut self, value: f32) -> Result<(), ConfigError> {
        self.params.fade_opacity = params::check_fade_opacity(value)?;
        self.compositor.set_fade_opacity(&self.gpu.queue, value);
        Ok(())
    }

    pub fn set_speed_factor(&mut self, value: f32) -> Result<(), ConfigError> {
        self.params.speed_factor = params::check_speed_factor(value)?;
        Ok(())
    }

    pub fn set_drop_rate(&mut self, value: f32) -> Result<(), ConfigError> {
        self.params.drop_rate = params::check_drop_rate(value)?;
        Ok(())
    }

    pub fn set_drop_rate_bump(&mut self, value: f32) -> Result<(), ConfigError> {
        self.params.drop_rate_bump = params::check_drop_rate_bump(value)?;
        Ok(())
    }

    pub fn set_latitude_correction(&mut self, enabled: bool) {
        self.params.latitude_correction = enabled;
    }

    /// Replace all parameters; reallocates particles if the count changed.
    pub fn set_params(&mut self, params: SimParams) -> Result<(), ConfigError> {
        params.validate()?;
        if params.num_particles != self.params.num_particles {
            self.reconfigure_particle_count(params.num_particles)?;
        }
        self.compositor
            .set_fade_opacity(&self.gpu.queue, params.fade_opacity);
        self.params = params;
        Ok(())
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Actual number of simulated particles.
    pub fn num_particles(&self) -> u32 {
        self.particles.layout().count()
    }

    pub fn particle_layout(&self) -> &ParticleLayout {
        self.particles.layout()
    }

    pub fn wind_meta(&self) -> Option<&WindMeta> {
        self.field.as_ref().map(|f| f.meta())
    }

    pub fn has_wind(&self) -> bool {
        self.field.is_some()
    }

    pub fn alignment(&self) -> FieldAlignment {
        self.view.alignment()
    }

    pub fn view(&self) -> Option<&ViewState> {
        self.view.view()
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        self.canvas
    }

    pub fn ticks_since_init(&self) -> u64 {
        self.ticks_since_init
    }

    pub fn has_rendered_once(&self) -> bool {
        self.ticks_since_init > 0
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.gpu.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.gpu.queue
    }

    /// Decoded positions of the current particle state. Blocks on the GPU.
    pub fn read_positions(&self) -> Result<Vec<Vec2>, GpuError> {
        let bytes = self.particles.read_current(&self.gpu.device, &self.gpu.queue)?;
        Ok(decode_state(&bytes))
    }

    /// Overwrite the current state with explicit positions, one per particle
    /// in texel order. Particles past the end of `positions` keep theirs.
    pub fn write_positions(&self, positions: &[Vec2]) -> Result<(), GpuError> {
        let mut bytes = self.particles.read_current(&self.gpu.device, &self.gpu.queue)?;
        for (texel, &pos) in bytes.chunks_exact_mut(BYTES_PER_PARTICLE).zip(positions) {
            texel.copy_from_slice(&encode_position(pos));
        }
        self.particles.write_current(&self.gpu.queue, &bytes);
        Ok(())
    }

    /// The most recently drawn trail frame as RGBA8 rows. Blocks on the GPU.
    pub fn read_screen(&self) -> Result<Vec<u8>, GpuError> {
        self.compositor
            .screens()
            .current()
            .read_rgba8(&self.gpu.device, &self.gpu.queue)
    }
}

/// State layout for `requested` particles that fits the device's texture limit.
fn checked_layout(device: &wgpu::Device, requested: u32) -> Result<ParticleLayout, ConfigError> {
    let layout = ParticleLayout::for_count(requested)?;
    let limit = device.limits().max_texture_dimension_2d;
    if layout.resolution() > limit {
        return Err(ConfigError::TooManyParticles {
            requested,
            resolution: layout.resolution(),
            limit,
        });
    }
    Ok(layout)
}
