//! Uniform blocks mirrored from the WGSL structs.

use bytemuck::{Pod, Zeroable};

use crate::field::WindMeta;
use crate::params::SimParams;
use crate::state::ParticleLayout;
use crate::viewport::FieldAlignment;

/// Per-tick uniforms for the update and draw programs (`WindUniforms` in WGSL).
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct WindUniforms {
    pub wind_min: [f32; 2],
    pub wind_max: [f32; 2],
    pub wind_res: [f32; 2],
    pub align_offset: [f32; 2],
    pub align_scale: [f32; 2],
    /// Latitudes of the field's (top, bottom) edges.
    pub lat_range: [f32; 2],
    pub rand_seed: f32,
    pub speed_factor: f32,
    pub drop_rate: f32,
    pub drop_rate_bump: f32,
    pub particles_res: f32,
    pub latitude_correction: u32,
    pub _pad: [f32; 2],
}

impl WindUniforms {
    pub fn new(
        meta: &WindMeta,
        alignment: &FieldAlignment,
        params: &SimParams,
        layout: &ParticleLayout,
        rand_seed: f32,
    ) -> Self {
        Self {
            wind_min: meta.velocity_min().to_array(),
            wind_max: meta.velocity_max().to_array(),
            wind_res: meta.resolution().to_array(),
            align_offset: alignment.offset.to_array(),
            align_scale: alignment.scale.to_array(),
            lat_range: [alignment.north, alignment.south],
            rand_seed,
            speed_factor: params.speed_factor,
            drop_rate: params.drop_rate,
            drop_rate_bump: params.drop_rate_bump,
            particles_res: layout.resolution() as f32,
            latitude_correction: params.latitude_correction as u32,
            _pad: [0.0; 2],
        }
    }
}

/// Uniforms for the fullscreen passes (`ScreenUniforms` in WGSL).
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ScreenUniforms {
    pub opacity: f32,
    pub _pad: [f32; 3],
}

impl ScreenUniforms {
    pub fn new(opacity: f32) -> Self {
        Self {
            opacity,
            _pad: [0.0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_match_wgsl_layout() {
        assert_eq!(std::mem::size_of::<WindUniforms>(), 80);
        assert_eq!(std::mem::size_of::<ScreenUniforms>(), 16);
    }

    #[test]
    fn test_wind_uniforms_from_state() {
        let meta = WindMeta::new(360, 180, (-20.0, 25.0), (-15.0, 18.0));
        let layout = ParticleLayout::for_count(1000).unwrap();
        let params = SimParams::default().with_latitude_correction(true);
        let u = WindUniforms::new(&meta, &FieldAlignment::identity(), &params, &layout, 0.5);
        assert_eq!(u.wind_min, [-20.0, -15.0]);
        assert_eq!(u.wind_max, [25.0, 18.0]);
        assert_eq!(u.wind_res, [360.0, 180.0]);
        assert_eq!(u.lat_range, [90.0, -90.0]);
        assert_eq!(u.particles_res, 32.0);
        assert_eq!(u.latitude_correction, 1);
        assert_eq!(bytemuck::bytes_of(&u).len(), 80);
    }
}
