//! Field raster and color ramp textures.

use super::program::ShaderProgram;
use super::{texture_entry, uniform_entry, GpuTexture, STATE_FORMAT};
use crate::error::ShaderError;
use crate::field::{WindData, WindMeta};
use crate::ramp::{ColorRamp, RAMP_WIDTH};

/// Layout of bind group 0 shared by the update and draw programs:
/// per-tick uniforms plus the field raster.
pub fn wind_group_layout(
    device: &wgpu::Device,
    program: &ShaderProgram,
) -> Result<wgpu::BindGroupLayout, ShaderError> {
    let visibility =
        wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT | wgpu::ShaderStages::COMPUTE;
    Ok(device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Wind Bind Group Layout"),
        entries: &[
            uniform_entry(program.binding("params")?, visibility),
            texture_entry(program.binding("wind_field")?, visibility),
        ],
    }))
}

/// A loaded field on the GPU: its raster texture, metadata, and the group 0
/// bind group pointing at it.
///
/// A new field builds a new `WindFieldGpu`; the engine swaps it in whole so
/// no tick ever sees a half-updated field.
pub struct WindFieldGpu {
    // Owned so the raster lives as long as the bind group.
    _texture: GpuTexture,
    meta: WindMeta,
    bind_group: wgpu::BindGroup,
}

impl WindFieldGpu {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        wind: &WindData,
        layout: &wgpu::BindGroupLayout,
        program: &ShaderProgram,
        uniforms: &wgpu::Buffer,
    ) -> Result<Self, ShaderError> {
        let texture = GpuTexture::new(
            device,
            "Wind Field",
            (wind.width(), wind.height()),
            STATE_FORMAT,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        texture.write_rgba8(queue, wind.rgba());

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Wind Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: program.binding("params")?,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: program.binding("wind_field")?,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
            ],
        });

        Ok(Self {
            _texture: texture,
            meta: wind.meta().clone(),
            bind_group,
        })
    }

    pub fn meta(&self) -> &WindMeta {
        &self.meta
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

/// The 256×1 color ramp texture and its linear sampler.
pub struct ColorRampGpu {
    texture: GpuTexture,
    sampler: wgpu::Sampler,
}

impl ColorRampGpu {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, ramp: &ColorRamp) -> Self {
        let texture = GpuTexture::new(
            device,
            "Color Ramp",
            (RAMP_WIDTH, 1),
            STATE_FORMAT,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Color Ramp Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let gpu = Self { texture, sampler };
        gpu.update(queue, ramp);
        gpu
    }

    /// Re-rasterize the ramp into the existing texture.
    pub fn update(&self, queue: &wgpu::Queue, ramp: &ColorRamp) {
        self.texture.write_rgba8(queue, &ramp.to_texels());
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.texture.view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }
}
