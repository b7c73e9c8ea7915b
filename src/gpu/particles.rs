//! Particle state textures on the GPU.

use rand::Rng;

use super::{GpuTexture, STATE_FORMAT};
use crate::error::GpuError;
use crate::pingpong::PingPong;
use crate::state::{random_state, ParticleLayout};

/// The ping-ponged pair of particle state textures.
pub struct ParticleStateGpu {
    layout: ParticleLayout,
    textures: PingPong<GpuTexture>,
}

impl ParticleStateGpu {
    /// Allocate both state textures and fill each with independent random bytes.
    pub fn new<R: Rng>(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: ParticleLayout,
        rng: &mut R,
    ) -> Self {
        let side = layout.resolution();
        let textures = PingPong::from_fn(|i| {
            let texture = GpuTexture::new(
                device,
                &format!("Particle State {}", i),
                (side, side),
                STATE_FORMAT,
                wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::STORAGE_BINDING
                    | wgpu::TextureUsages::COPY_DST
                    | wgpu::TextureUsages::COPY_SRC,
            );
            texture.write_rgba8(queue, &random_state(&layout, rng));
            texture
        });
        Self { layout, textures }
    }

    pub fn layout(&self) -> &ParticleLayout {
        &self.layout
    }

    pub fn textures(&self) -> &PingPong<GpuTexture> {
        &self.textures
    }

    /// Make the state just written the one read next tick.
    pub fn swap(&mut self) {
        self.textures.swap();
    }

    /// Overwrite the current state, e.g. to place particles explicitly.
    pub fn write_current(&self, queue: &wgpu::Queue, bytes: &[u8]) {
        self.textures.current().write_rgba8(queue, bytes);
    }

    /// Read the current state back to the CPU. Blocks.
    pub fn read_current(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Result<Vec<u8>, GpuError> {
        self.textures.current().read_rgba8(device, queue)
    }
}
