//! Particle state layout and fixed-point position encoding.
//!
//! Particle positions live in a square RGBA8 texture, one particle per texel.
//! Each axis is split across two 8-bit channels: R/G hold the fine sub-byte
//! part of x/y and B/A the coarse byte, giving roughly 16 bits per axis.
//!
//! ```text
//! decode: pos = fine / 255 + coarse          (channels normalized to [0, 1])
//! encode: fine = fract(pos * 255), coarse = floor(pos * 255) / 255
//! ```

use glam::Vec2;
use rand::Rng;

use crate::error::ConfigError;

/// Bytes per particle texel.
pub const BYTES_PER_PARTICLE: usize = 4;

/// Largest state texture side whose particle count still fits in a `u32`.
pub const MAX_RESOLUTION: u32 = 65535;

/// Largest encodable position below 1: fine and coarse bytes both 254.
///
/// Positions above it would round up to exactly 1.0 on decode.
pub const MAX_ENCODED: f32 = 65024.0 / 65025.0;

/// Shape of the square particle state texture for a requested particle count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticleLayout {
    resolution: u32,
}

impl ParticleLayout {
    /// Layout for at least `requested` particles: side `ceil(sqrt(requested))`.
    ///
    /// The actual count is `resolution²` and may exceed the request.
    pub fn for_count(requested: u32) -> Result<Self, ConfigError> {
        if requested == 0 {
            return Err(ConfigError::ZeroParticles);
        }
        let resolution = ceil_sqrt(requested);
        if resolution > MAX_RESOLUTION {
            return Err(ConfigError::TooManyParticles {
                requested,
                resolution,
                limit: MAX_RESOLUTION,
            });
        }
        Ok(Self { resolution })
    }

    /// Side length of the state texture.
    #[inline]
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Actual number of simulated particles.
    #[inline]
    pub fn count(&self) -> u32 {
        self.resolution * self.resolution
    }

    /// Size of one state texture in bytes.
    pub fn byte_len(&self) -> usize {
        self.count() as usize * BYTES_PER_PARTICLE
    }

    /// Texel addressed by a particle (vertex) index.
    pub fn texel(&self, index: u32) -> (u32, u32) {
        (index % self.resolution, index / self.resolution)
    }

    /// Normalized texture coordinate of a texel center.
    pub fn tex_coord(&self, x: u32, y: u32) -> Vec2 {
        (Vec2::new(x as f32, y as f32) + 0.5) / self.resolution as f32
    }

    /// Vertex range for drawing one point per particle.
    pub fn vertices(&self) -> std::ops::Range<u32> {
        0..self.count()
    }
}

/// Integer `ceil(sqrt(n))` without float rounding surprises.
fn ceil_sqrt(n: u32) -> u32 {
    let n = n as u64;
    let mut r = (n as f64).sqrt().ceil() as u64;
    while r > 0 && (r - 1) * (r - 1) >= n {
        r -= 1;
    }
    while r * r < n {
        r += 1;
    }
    r as u32
}

/// Fill a state texture with uniformly random bytes.
///
/// Every byte pattern decodes to a position in `[0, 1 + 1/255]`; the first
/// advection step wraps the few out-of-range ones back into the domain.
pub fn random_state<R: Rng>(layout: &ParticleLayout, rng: &mut R) -> Vec<u8> {
    let mut bytes = vec![0u8; layout.byte_len()];
    rng.fill(&mut bytes[..]);
    bytes
}

/// Convert a normalized channel value to its stored byte (unorm rounding).
#[inline]
pub fn to_unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Convert a stored byte to its normalized channel value.
#[inline]
pub fn from_unorm8(b: u8) -> f32 {
    b as f32 / 255.0
}

/// Encode a position in `[0, 1)²` into the four normalized channel values.
pub fn encode_channels(pos: Vec2) -> [f32; 4] {
    let scaled = pos.clamp(Vec2::ZERO, Vec2::splat(MAX_ENCODED)) * 255.0;
    let fine = scaled - scaled.floor();
    let coarse = scaled.floor() / 255.0;
    [fine.x, fine.y, coarse.x, coarse.y]
}

/// Encode a position into the texel bytes a unorm render target would store.
pub fn encode_position(pos: Vec2) -> [u8; 4] {
    encode_channels(pos).map(to_unorm8)
}

/// Decode a texel back into a position.
pub fn decode_position(texel: [u8; 4]) -> Vec2 {
    let [r, g, b, a] = texel.map(from_unorm8);
    Vec2::new(r / 255.0 + b, g / 255.0 + a)
}

/// Decode every particle of a state texture.
pub fn decode_state(bytes: &[u8]) -> Vec<Vec2> {
    bytes
        .chunks_exact(BYTES_PER_PARTICLE)
        .map(|c| decode_position([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_layout_rounds_up_to_square() {
        let layout = ParticleLayout::for_count(65536).unwrap();
        assert_eq!(layout.resolution(), 256);
        assert_eq!(layout.count(), 65536);

        let layout = ParticleLayout::for_count(65537).unwrap();
        assert_eq!(layout.resolution(), 257);
        assert_eq!(layout.count(), 257 * 257);

        let layout = ParticleLayout::for_count(1).unwrap();
        assert_eq!(layout.count(), 1);
    }

    #[test]
    fn test_layout_rejects_zero() {
        assert!(matches!(
            ParticleLayout::for_count(0),
            Err(ConfigError::ZeroParticles)
        ));
    }

    #[test]
    fn test_layout_rejects_unaddressable_counts() {
        assert!(matches!(
            ParticleLayout::for_count(u32::MAX),
            Err(ConfigError::TooManyParticles { resolution: 65536, .. })
        ));
    }

    #[test]
    fn test_ceil_sqrt_exact_squares() {
        for r in [1u32, 2, 3, 255, 256, 4096, 65535] {
            assert_eq!(ceil_sqrt(r * r), r);
            assert_eq!(ceil_sqrt(r * r + 1), r + 1);
        }
        assert_eq!(ceil_sqrt(u32::MAX), 65536);
    }

    #[test]
    fn test_texel_addressing() {
        let layout = ParticleLayout::for_count(9).unwrap();
        assert_eq!(layout.texel(0), (0, 0));
        assert_eq!(layout.texel(4), (1, 1));
        assert_eq!(layout.texel(8), (2, 2));
        assert_eq!(layout.vertices(), 0..9);
        let tc = layout.tex_coord(1, 1);
        assert!((tc - Vec2::splat(0.5)).length() < 1e-6);
    }

    #[test]
    fn test_encode_channels_in_unit_range() {
        for i in 0..1000 {
            let p = Vec2::new(i as f32 / 1000.0, 1.0 - (i as f32 + 1.0) / 1000.0);
            for c in encode_channels(p) {
                assert!((0.0..=1.0).contains(&c), "channel {c} out of range for {p}");
            }
        }
    }

    #[test]
    fn test_encode_never_decodes_to_one() {
        for x in [0.99998, 0.999_999, 1.0 - f32::EPSILON] {
            let p = decode_position(encode_position(Vec2::new(x, x)));
            assert!(p.x < 1.0 && p.y < 1.0, "{x} decoded to {p}");
        }
    }

    #[test]
    fn test_decode_known_texels() {
        assert_eq!(decode_position([0, 0, 0, 0]), Vec2::ZERO);
        let p = decode_position([0, 0, 128, 64]);
        assert!((p.x - 128.0 / 255.0).abs() < 1e-6);
        assert!((p.y - 64.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_random_state_size_and_spread() {
        let layout = ParticleLayout::for_count(1000).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let bytes = random_state(&layout, &mut rng);
        assert_eq!(bytes.len(), layout.byte_len());

        let positions = decode_state(&bytes);
        let mean = positions.iter().copied().sum::<Vec2>() / positions.len() as f32;
        assert!((mean.x - 0.5).abs() < 0.05);
        assert!((mean.y - 0.5).abs() < 0.05);
    }
}
