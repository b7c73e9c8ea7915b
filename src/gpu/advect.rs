//! Advection compute pass: current particle state -> next particle state.

use super::particles::ParticleStateGpu;
use super::program::{capture_validation, ShaderProgram};
use super::{storage_texture_entry, texture_entry, WORKGROUP_SIZE};
use crate::error::ShaderError;

pub struct AdvectPass {
    pipeline: wgpu::ComputePipeline,
    state_layout: wgpu::BindGroupLayout,
    /// Group `i` reads state slot `i` and writes slot `1 - i`.
    state_groups: [wgpu::BindGroup; 2],
    state_in: u32,
    state_out: u32,
}

impl AdvectPass {
    pub fn new(
        device: &wgpu::Device,
        program: &ShaderProgram,
        wind_layout: &wgpu::BindGroupLayout,
        particles: &ParticleStateGpu,
    ) -> Result<Self, ShaderError> {
        let state_in = program.binding("state_in")?;
        let state_out = program.binding("state_out")?;
        let entry_point = program.entry_point("cs_update")?;

        let state_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Advect State Layout"),
            entries: &[
                texture_entry(state_in, wgpu::ShaderStages::COMPUTE),
                storage_texture_entry(state_out, wgpu::ShaderStages::COMPUTE),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Advect Pipeline Layout"),
            bind_group_layouts: &[wind_layout, &state_layout],
            push_constant_ranges: &[],
        });

        let pipeline = capture_validation(device, "advect", || {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Advect Pipeline"),
                layout: Some(&pipeline_layout),
                module: program.module(),
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            })
        })?;

        let state_groups = Self::create_state_groups(device, &state_layout, particles, state_in, state_out);

        Ok(Self {
            pipeline,
            state_layout,
            state_groups,
            state_in,
            state_out,
        })
    }

    fn create_state_groups(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        particles: &ParticleStateGpu,
        state_in: u32,
        state_out: u32,
    ) -> [wgpu::BindGroup; 2] {
        let textures = particles.textures();
        [0, 1].map(|i| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("Advect State Group {}", i)),
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: state_in,
                        resource: wgpu::BindingResource::TextureView(&textures.slot(i).view),
                    },
                    wgpu::BindGroupEntry {
                        binding: state_out,
                        resource: wgpu::BindingResource::TextureView(&textures.slot(1 - i).view),
                    },
                ],
            })
        })
    }

    /// Point the pass at freshly allocated state textures.
    pub fn rebind(&mut self, device: &wgpu::Device, particles: &ParticleStateGpu) {
        self.state_groups = Self::create_state_groups(
            device,
            &self.state_layout,
            particles,
            self.state_in,
            self.state_out,
        );
    }

    /// Record one advection step reading the current state.
    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        wind_group: &wgpu::BindGroup,
        particles: &ParticleStateGpu,
    ) {
        let groups = particles.layout().resolution().div_ceil(WORKGROUP_SIZE);
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Advect Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, wind_group, &[]);
        pass.set_bind_group(1, &self.state_groups[particles.textures().current_index()], &[]);
        pass.dispatch_workgroups(groups, groups, 1);
    }
}
