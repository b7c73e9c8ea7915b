//! # windflow - GPU wind particle animation
//!
//! Animates a large population of particles advected through a 2D vector
//! field and renders their motion as fading trails, ready to be composited
//! over a map or any other canvas.
//!
//! windflow handles all the GPU plumbing (state textures, ping-pong buffers,
//! pipelines, field alignment) so the host only loads a field and calls
//! [`WindEngine::draw`] once per frame.
//!
//! ## Quick Start
//!
//! ```ignore
//! use windflow::prelude::*;
//!
//! let gpu = GpuContext::headless()?;
//! let mut engine = WindEngine::new(
//!     gpu,
//!     wgpu::TextureFormat::Rgba8Unorm,
//!     (1024, 512),
//!     EngineConfig::default(),
//! )?;
//! engine.set_wind(&WindData::from_files("wind.png", "wind.json")?)?;
//!
//! // every frame:
//! engine.draw(&target_view);
//! ```
//!
//! ## Core Concepts
//!
//! ### Particle state
//!
//! Each particle is one RGBA8 texel of a square state texture. Its position
//! in `[0, 1)²` is stored as 16-bit fixed point per axis: the low byte in
//! R/G and the high byte in B/A. Two such textures are ping-ponged so each
//! tick reads one and writes the other.
//!
//! ### Fields
//!
//! A field is an RGBA raster whose R and G channels map linearly onto
//! `[uMin, uMax]` and `[vMin, vMax]`, plus metadata ([`WindMeta`]). A zero
//! alpha marks "no data": particles there stay put and are not drawn.
//!
//! ### Trails
//!
//! Trails live in two offscreen screen textures. Every tick the previous
//! frame is faded by `fadeOpacity`, particles are drawn on top, and the
//! result is blended onto the host target.
//!
//! ### Alignment
//!
//! When the field covers a geographic extent and the host reports a view
//! ([`ViewState`]), the field is remapped so particles sample the region of
//! the field actually visible on the canvas.
//!
//! ## CPU reference
//!
//! [`cpu::CpuSimulation`] runs the same kernels on the CPU. It is used by the
//! test suite and is handy for debugging fields without a GPU.

pub mod cpu;
mod engine;
pub mod error;
pub mod field;
pub mod gpu;
pub mod params;
pub mod pingpong;
pub mod ramp;
pub mod state;
pub mod tick;
pub mod viewport;

pub use bytemuck;
pub use engine::WindEngine;
pub use error::{ConfigError, EngineError, FieldError, GpuError, ShaderError};
pub use field::{LoadSequencer, LoadTicket, WindData, WindMeta};
pub use glam::{Vec2, Vec4};
pub use gpu::GpuContext;
pub use params::{EngineConfig, SimParams};
pub use pingpong::PingPong;
pub use ramp::{ColorRamp, ColorStop, Palette};
pub use state::ParticleLayout;
pub use tick::{SeedSource, TickStatus};
pub use viewport::{FieldAlignment, GeoExtent, ViewState};

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use windflow::prelude::*;
/// ```
pub mod prelude {
    pub use crate::cpu::CpuSimulation;
    pub use crate::error::{ConfigError, EngineError, FieldError};
    pub use crate::field::{WindData, WindMeta};
    pub use crate::gpu::GpuContext;
    pub use crate::params::{EngineConfig, SimParams};
    pub use crate::ramp::{ColorRamp, ColorStop, Palette};
    pub use crate::tick::TickStatus;
    pub use crate::viewport::{GeoExtent, ViewState};
    pub use crate::WindEngine;
    pub use crate::{Vec2, Vec4};
}
