//! Error types for windflow.
//!
//! This module provides error types for GPU initialization, shader program
//! construction, field loading and engine configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during GPU initialization.
#[derive(Debug, Error)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    #[error("Failed to create GPU surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    #[error("No compatible GPU adapter found. Ensure your system has a GPU with WebGPU/Vulkan/Metal/DX12 support.")]
    NoAdapter,
    /// Failed to create GPU device.
    #[error("Failed to create GPU device: {0}")]
    DeviceCreation(#[from] wgpu::RequestDeviceError),
    /// Reading a texture back to the CPU failed.
    #[error("GPU readback failed: {0}")]
    Readback(String),
}

/// Errors raised while building a shader program.
///
/// All of these are fatal for engine construction: no partial engine can
/// run without its three programs.
#[derive(Debug, Error)]
pub enum ShaderError {
    /// The WGSL source did not parse.
    #[error("Shader '{label}' failed to parse:\n{message}")]
    Parse { label: String, message: String },
    /// The WGSL source parsed but failed validation.
    #[error("Shader '{label}' failed validation:\n{message}")]
    Validation { label: String, message: String },
    /// A required entry point is absent from the module.
    #[error("Shader '{label}' has no entry point named '{name}'")]
    MissingEntryPoint { label: String, name: String },
    /// A resource binding the host expects is absent from the module.
    #[error("Shader '{label}' has no resource binding named '{name}'")]
    MissingBinding { label: String, name: String },
    /// wgpu rejected the pipeline built from the program.
    #[error("Pipeline '{label}' could not be created: {message}")]
    Pipeline { label: String, message: String },
}

/// Errors that can occur while loading or validating field data.
#[derive(Debug, Error)]
pub enum FieldError {
    /// Raster byte length does not match `width * height * 4`.
    #[error("Field raster is {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    /// Raster has a zero dimension.
    #[error("Field raster must be at least 1x1, got {width}x{height}")]
    Empty { width: u32, height: u32 },
    /// Decoded image dimensions disagree with the metadata.
    #[error("Field image is {image_width}x{image_height} but metadata says {width}x{height}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },
    /// Velocity bounds contain NaN or infinity.
    #[error("Velocity bounds must be finite (uMin={u_min}, uMax={u_max}, vMin={v_min}, vMax={v_max})")]
    NonFiniteBounds {
        u_min: f32,
        u_max: f32,
        v_min: f32,
        v_max: f32,
    },
    /// Both velocity axes have zero width, so no channel value maps to motion.
    #[error("Velocity bounds are degenerate: both axes have zero width")]
    DegenerateBounds,
    /// Raster does not fit in a texture on this device.
    #[error("Field raster {width}x{height} exceeds the device texture limit of {limit}")]
    TooLarge { width: u32, height: u32, limit: u32 },
    /// Failed to decode the raster image.
    #[error("Failed to decode field image: {0}")]
    Image(#[from] image::ImageError),
    /// Failed to parse the metadata JSON.
    #[error("Failed to parse field metadata: {0}")]
    Metadata(#[from] serde_json::Error),
    /// Failed to read a field file from disk.
    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors for invalid engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Particle count must be positive.
    #[error("Particle count must be greater than zero")]
    ZeroParticles,
    /// Particle state texture would exceed the device texture limit.
    #[error("{requested} particles need a {resolution}x{resolution} state texture, device limit is {limit}")]
    TooManyParticles {
        requested: u32,
        resolution: u32,
        limit: u32,
    },
    /// A simulation parameter is outside its documented range.
    #[error("Parameter '{name}' = {value} is outside {range}")]
    OutOfRange {
        name: &'static str,
        value: f32,
        range: &'static str,
    },
    /// A color ramp needs at least one stop.
    #[error("Color ramp needs at least one stop")]
    EmptyRamp,
    /// A color string could not be parsed.
    #[error("Invalid color '{0}'")]
    InvalidColor(String),
    /// Failed to parse a configuration file.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    /// Failed to read a configuration file.
    #[error("Failed to read configuration '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level error for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// GPU initialization failed.
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
    /// A shader program failed to build.
    #[error("Shader error: {0}")]
    Shader(#[from] ShaderError),
    /// Field data was rejected.
    #[error("Field error: {0}")]
    Field(#[from] FieldError),
    /// Configuration was rejected.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
