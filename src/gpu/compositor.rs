//! Trail compositor: fade, particle draw and composite passes.
//!
//! Two screen textures alternate as "background" (last frame) and "screen"
//! (this frame). Each tick fades the background into the screen, draws the
//! particles on top, then alpha-blends the screen onto the host's target.

use wgpu::util::DeviceExt;

use super::field_texture::ColorRampGpu;
use super::particles::ParticleStateGpu;
use super::program::{capture_validation, ShaderProgram};
use super::{sampler_entry, texture_entry, uniform_entry, GpuTexture, ScreenUniforms, STATE_FORMAT};
use crate::error::ShaderError;
use crate::pingpong::PingPong;

/// Binding indices of the screen program.
#[derive(Clone, Copy)]
struct ScreenBindings {
    screen: u32,
    params: u32,
}

/// Binding indices of the draw program's group 1.
#[derive(Clone, Copy)]
struct DrawBindings {
    state: u32,
    color_ramp: u32,
    ramp_sampler: u32,
}

pub struct TrailCompositor {
    screens: PingPong<GpuTexture>,
    screen_layout: wgpu::BindGroupLayout,
    screen_bindings: ScreenBindings,
    fade_uniforms: wgpu::Buffer,
    composite_uniforms: wgpu::Buffer,
    /// Group `i` fades screen slot `i`.
    fade_groups: [wgpu::BindGroup; 2],
    /// Group `i` composites screen slot `i`.
    composite_groups: [wgpu::BindGroup; 2],
    fade_pipeline: wgpu::RenderPipeline,
    composite_pipeline: wgpu::RenderPipeline,

    draw_layout: wgpu::BindGroupLayout,
    draw_bindings: DrawBindings,
    /// Group `i` draws particles from state slot `i`.
    draw_groups: [wgpu::BindGroup; 2],
    draw_pipeline: wgpu::RenderPipeline,
}

impl TrailCompositor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: &wgpu::Device,
        screen_program: &ShaderProgram,
        draw_program: &ShaderProgram,
        wind_layout: &wgpu::BindGroupLayout,
        particles: &ParticleStateGpu,
        ramp: &ColorRampGpu,
        size: (u32, u32),
        target_format: wgpu::TextureFormat,
        fade_opacity: f32,
    ) -> Result<Self, ShaderError> {
        // Fullscreen passes.
        let screen_bindings = ScreenBindings {
            screen: screen_program.binding("screen")?,
            params: screen_program.binding("screen_params")?,
        };
        let screen_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Screen Bind Group Layout"),
            entries: &[
                texture_entry(screen_bindings.screen, wgpu::ShaderStages::FRAGMENT),
                uniform_entry(screen_bindings.params, wgpu::ShaderStages::FRAGMENT),
            ],
        });
        let screen_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Screen Pipeline Layout"),
            bind_group_layouts: &[&screen_layout],
            push_constant_ranges: &[],
        });

        let fade_uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Fade Uniforms"),
            contents: bytemuck::bytes_of(&ScreenUniforms::new(fade_opacity)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let composite_uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Composite Uniforms"),
            contents: bytemuck::bytes_of(&ScreenUniforms::new(1.0)),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let fade_pipeline = fullscreen_pipeline(
            device,
            screen_program,
            &screen_pipeline_layout,
            "fs_fade",
            STATE_FORMAT,
            None,
        )?;
        let composite_pipeline = fullscreen_pipeline(
            device,
            screen_program,
            &screen_pipeline_layout,
            "fs_composite",
            target_format,
            Some(wgpu::BlendState::ALPHA_BLENDING),
        )?;

        // Particle points.
        let draw_bindings = DrawBindings {
            state: draw_program.binding("state")?,
            color_ramp: draw_program.binding("color_ramp")?,
            ramp_sampler: draw_program.binding("ramp_sampler")?,
        };
        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Draw Bind Group Layout"),
            entries: &[
                texture_entry(draw_bindings.state, wgpu::ShaderStages::VERTEX),
                texture_entry(draw_bindings.color_ramp, wgpu::ShaderStages::FRAGMENT),
                sampler_entry(draw_bindings.ramp_sampler, wgpu::ShaderStages::FRAGMENT),
            ],
        });
        let draw_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Draw Pipeline Layout"),
            bind_group_layouts: &[wind_layout, &draw_layout],
            push_constant_ranges: &[],
        });
        let vs = draw_program.entry_point("vs_main")?;
        let fs = draw_program.entry_point("fs_main")?;
        let draw_pipeline = capture_validation(device, "draw", || {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Particle Draw Pipeline"),
                layout: Some(&draw_pipeline_layout),
                vertex: wgpu::VertexState {
                    module: draw_program.module(),
                    entry_point: Some(vs),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: draw_program.module(),
                    entry_point: Some(fs),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: STATE_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::PointList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })?;

        let screens = create_screens(device, size);
        let [fade_groups, composite_groups] = [&fade_uniforms, &composite_uniforms].map(|uniforms| {
            create_screen_groups(device, &screen_layout, screen_bindings, &screens, uniforms)
        });
        let draw_groups = create_draw_groups(device, &draw_layout, draw_bindings, particles, ramp);

        Ok(Self {
            screens,
            screen_layout,
            screen_bindings,
            fade_uniforms,
            composite_uniforms,
            fade_groups,
            composite_groups,
            fade_pipeline,
            composite_pipeline,
            draw_layout,
            draw_bindings,
            draw_groups,
            draw_pipeline,
        })
    }

    pub fn screens(&self) -> &PingPong<GpuTexture> {
        &self.screens
    }

    /// Reallocate both screen textures, cleared. Trail history is lost.
    pub fn resize(&mut self, device: &wgpu::Device, size: (u32, u32)) {
        self.screens = create_screens(device, size);
        self.fade_groups = create_screen_groups(
            device,
            &self.screen_layout,
            self.screen_bindings,
            &self.screens,
            &self.fade_uniforms,
        );
        self.composite_groups = create_screen_groups(
            device,
            &self.screen_layout,
            self.screen_bindings,
            &self.screens,
            &self.composite_uniforms,
        );
    }

    /// Point the draw pass at new particle state textures or a new ramp.
    pub fn rebind_particles(
        &mut self,
        device: &wgpu::Device,
        particles: &ParticleStateGpu,
        ramp: &ColorRampGpu,
    ) {
        self.draw_groups =
            create_draw_groups(device, &self.draw_layout, self.draw_bindings, particles, ramp);
    }

    pub fn set_fade_opacity(&self, queue: &wgpu::Queue, opacity: f32) {
        queue.write_buffer(&self.fade_uniforms, 0, bytemuck::bytes_of(&ScreenUniforms::new(opacity)));
    }

    /// Fade the background into the screen texture and draw particles on top.
    pub fn record_screen(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        wind_group: &wgpu::BindGroup,
        particles: &ParticleStateGpu,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Trail Screen Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.screens.next().view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.fade_pipeline);
        pass.set_bind_group(0, &self.fade_groups[self.screens.current_index()], &[]);
        pass.draw(0..3, 0..1);

        pass.set_pipeline(&self.draw_pipeline);
        pass.set_bind_group(0, wind_group, &[]);
        pass.set_bind_group(1, &self.draw_groups[particles.textures().current_index()], &[]);
        pass.draw(particles.layout().vertices(), 0..1);
    }

    /// Alpha-blend the freshly drawn screen onto `target`.
    ///
    /// With `clear` set the target is cleared to that color first; otherwise
    /// whatever the host drew there stays underneath.
    pub fn record_composite(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        clear: Option<wgpu::Color>,
    ) {
        let load = match clear {
            Some(color) => wgpu::LoadOp::Clear(color),
            None => wgpu::LoadOp::Load,
        };
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Trail Composite Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.composite_pipeline);
        pass.set_bind_group(0, &self.composite_groups[self.screens.next_index()], &[]);
        pass.draw(0..3, 0..1);
    }

    /// The screen just drawn becomes next tick's background.
    pub fn swap(&mut self) {
        self.screens.swap();
    }
}

fn create_screens(device: &wgpu::Device, (width, height): (u32, u32)) -> PingPong<GpuTexture> {
    let size = (width.max(1), height.max(1));
    PingPong::from_fn(|i| {
        GpuTexture::new(
            device,
            &format!("Trail Screen {}", i),
            size,
            STATE_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
        )
    })
}

fn create_screen_groups(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    bindings: ScreenBindings,
    screens: &PingPong<GpuTexture>,
    uniforms: &wgpu::Buffer,
) -> [wgpu::BindGroup; 2] {
    [0, 1].map(|i| {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("Screen Group {}", i)),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: bindings.screen,
                    resource: wgpu::BindingResource::TextureView(&screens.slot(i).view),
                },
                wgpu::BindGroupEntry {
                    binding: bindings.params,
                    resource: uniforms.as_entire_binding(),
                },
            ],
        })
    })
}

fn create_draw_groups(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    bindings: DrawBindings,
    particles: &ParticleStateGpu,
    ramp: &ColorRampGpu,
) -> [wgpu::BindGroup; 2] {
    [0, 1].map(|i| {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("Draw Group {}", i)),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: bindings.state,
                    resource: wgpu::BindingResource::TextureView(&particles.textures().slot(i).view),
                },
                wgpu::BindGroupEntry {
                    binding: bindings.color_ramp,
                    resource: wgpu::BindingResource::TextureView(ramp.view()),
                },
                wgpu::BindGroupEntry {
                    binding: bindings.ramp_sampler,
                    resource: wgpu::BindingResource::Sampler(ramp.sampler()),
                },
            ],
        })
    })
}

fn fullscreen_pipeline(
    device: &wgpu::Device,
    program: &ShaderProgram,
    layout: &wgpu::PipelineLayout,
    fragment_entry: &str,
    format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
) -> Result<wgpu::RenderPipeline, ShaderError> {
    let vs = program.entry_point("vs_fullscreen")?;
    let fs = program.entry_point(fragment_entry)?;
    capture_validation(device, fragment_entry, || {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(fragment_entry),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: program.module(),
                entry_point: Some(vs),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: program.module(),
                entry_point: Some(fs),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    })
}
