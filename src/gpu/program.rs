//! Shader program builder.
//!
//! WGSL is parsed and validated with naga before wgpu sees it, so a broken
//! program fails engine construction with a readable diagnostic instead of a
//! device-lost panic. The parsed module is also reflected: pipelines look up
//! their resource bindings and entry points by name.

use naga::front::wgsl;
use naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::error::ShaderError;

/// A resource binding declared by a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingInfo {
    pub name: String,
    pub group: u32,
    pub binding: u32,
}

/// An entry point declared by a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPointInfo {
    pub name: String,
    pub stage: naga::ShaderStage,
}

/// Bindings and entry points of a validated WGSL program.
#[derive(Debug, Clone)]
pub struct ProgramReflection {
    label: String,
    bindings: Vec<BindingInfo>,
    entry_points: Vec<EntryPointInfo>,
}

impl ProgramReflection {
    /// Parse, validate and reflect WGSL source.
    pub fn from_wgsl(label: &str, source: &str) -> Result<Self, ShaderError> {
        let module = wgsl::parse_str(source).map_err(|err| ShaderError::Parse {
            label: label.to_string(),
            message: err.emit_to_string(source),
        })?;

        let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
        validator
            .validate(&module)
            .map_err(|err| ShaderError::Validation {
                label: label.to_string(),
                message: format!("{err:?}"),
            })?;

        let bindings = module
            .global_variables
            .iter()
            .filter_map(|(_, var)| {
                let binding = var.binding.as_ref()?;
                Some(BindingInfo {
                    name: var.name.clone()?,
                    group: binding.group,
                    binding: binding.binding,
                })
            })
            .collect();

        let entry_points = module
            .entry_points
            .iter()
            .map(|ep| EntryPointInfo {
                name: ep.name.clone(),
                stage: ep.stage,
            })
            .collect();

        Ok(Self {
            label: label.to_string(),
            bindings,
            entry_points,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn bindings(&self) -> &[BindingInfo] {
        &self.bindings
    }

    pub fn entry_points(&self) -> &[EntryPointInfo] {
        &self.entry_points
    }

    /// Look up a resource binding by its WGSL variable name.
    pub fn binding(&self, name: &str) -> Result<&BindingInfo, ShaderError> {
        self.bindings
            .iter()
            .find(|b| b.name == name)
            .ok_or_else(|| ShaderError::MissingBinding {
                label: self.label.clone(),
                name: name.to_string(),
            })
    }

    /// Look up an entry point by name.
    pub fn entry_point(&self, name: &str) -> Result<&EntryPointInfo, ShaderError> {
        self.entry_points
            .iter()
            .find(|ep| ep.name == name)
            .ok_or_else(|| ShaderError::MissingEntryPoint {
                label: self.label.clone(),
                name: name.to_string(),
            })
    }
}

/// A compiled shader module together with its reflection.
pub struct ShaderProgram {
    module: wgpu::ShaderModule,
    reflection: ProgramReflection,
}

impl ShaderProgram {
    /// Validate `source` and create the wgpu module.
    pub fn new(device: &wgpu::Device, label: &str, source: &str) -> Result<Self, ShaderError> {
        let reflection = ProgramReflection::from_wgsl(label, source)?;
        let module = capture_validation(device, label, || {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        })?;
        log::debug!(
            "Built program '{}' ({} bindings, {} entry points)",
            label,
            reflection.bindings.len(),
            reflection.entry_points.len()
        );
        Ok(Self { module, reflection })
    }

    pub fn module(&self) -> &wgpu::ShaderModule {
        &self.module
    }

    /// Binding index of a named resource.
    pub fn binding(&self, name: &str) -> Result<u32, ShaderError> {
        self.reflection.binding(name).map(|b| b.binding)
    }

    /// Name of an entry point, checked to exist.
    pub fn entry_point(&self, name: &str) -> Result<&str, ShaderError> {
        self.reflection.entry_point(name).map(|ep| ep.name.as_str())
    }
}

/// Run `create` inside a validation error scope, turning a captured wgpu
/// validation error into a [`ShaderError::Pipeline`].
pub fn capture_validation<T>(
    device: &wgpu::Device,
    label: &str,
    create: impl FnOnce() -> T,
) -> Result<T, ShaderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    match pollster::block_on(device.pop_error_scope()) {
        None => Ok(value),
        Some(err) => Err(ShaderError::Pipeline {
            label: label.to_string(),
            message: err.to_string(),
        }),
    }
}
