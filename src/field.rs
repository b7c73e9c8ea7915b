//! Wind field data: the velocity raster and its metadata.
//!
//! A field is an RGBA8 raster where R and G encode the u (eastward) and v
//! (northward) velocity components in `[0, 1]`, and A = 0 marks texels with
//! no data. The metadata bounds map channel values to physical velocity:
//!
//! ```text
//! u = mix(uMin, uMax, R)      v = mix(vMin, vMax, G)
//! ```
//!
//! Metadata is read from the same camelCase JSON that accompanies the PNG
//! raster:
//!
//! ```json
//! { "width": 360, "height": 180, "uMin": -21.3, "uMax": 26.8,
//!   "vMin": -21.5, "vMax": 21.1, "extent": [-180, -90, 180, 90] }
//! ```

use std::fs;
use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::FieldError;
use crate::viewport::GeoExtent;

/// Field metadata delivered alongside the raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindMeta {
    pub width: u32,
    pub height: u32,
    pub u_min: f32,
    pub u_max: f32,
    pub v_min: f32,
    pub v_max: f32,
    /// Geographic bounding box of the raster, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extent: Option<GeoExtent>,
    /// Free-form provenance (e.g. the forecast source).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Forecast timestamp as given by the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl WindMeta {
    pub fn new(width: u32, height: u32, u: (f32, f32), v: (f32, f32)) -> Self {
        Self {
            width,
            height,
            u_min: u.0,
            u_max: u.1,
            v_min: v.0,
            v_max: v.1,
            extent: None,
            source: None,
            date: None,
        }
    }

    pub fn with_extent(mut self, extent: GeoExtent) -> Self {
        self.extent = Some(extent);
        self
    }

    /// Parse metadata from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, FieldError> {
        Ok(serde_json::from_str(json)?)
    }

    /// `(uMin, vMin)`.
    pub fn velocity_min(&self) -> Vec2 {
        Vec2::new(self.u_min, self.v_min)
    }

    /// `(uMax, vMax)`.
    pub fn velocity_max(&self) -> Vec2 {
        Vec2::new(self.u_max, self.v_max)
    }

    /// Raster resolution as floats, the form the kernels use.
    pub fn resolution(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    /// Reject rasters with a side longer than `limit` texels.
    pub fn check_texture_limit(&self, limit: u32) -> Result<(), FieldError> {
        if self.width > limit || self.height > limit {
            return Err(FieldError::TooLarge {
                width: self.width,
                height: self.height,
                limit,
            });
        }
        Ok(())
    }

    fn validate_bounds(&self) -> Result<(), FieldError> {
        let bounds = [self.u_min, self.u_max, self.v_min, self.v_max];
        if bounds.iter().any(|b| !b.is_finite()) {
            return Err(FieldError::NonFiniteBounds {
                u_min: self.u_min,
                u_max: self.u_max,
                v_min: self.v_min,
                v_max: self.v_max,
            });
        }
        if self.u_min == self.u_max && self.v_min == self.v_max {
            return Err(FieldError::DegenerateBounds);
        }
        Ok(())
    }
}

/// An immutable, validated field bundle: raster plus metadata.
///
/// Loading a new field replaces the previous bundle wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct WindData {
    meta: WindMeta,
    rgba: Vec<u8>,
}

impl WindData {
    /// Validate and wrap a decoded RGBA8 raster.
    pub fn new(rgba: Vec<u8>, meta: WindMeta) -> Result<Self, FieldError> {
        if meta.width == 0 || meta.height == 0 {
            return Err(FieldError::Empty {
                width: meta.width,
                height: meta.height,
            });
        }
        let expected = meta.width as usize * meta.height as usize * 4;
        if rgba.len() != expected {
            return Err(FieldError::SizeMismatch {
                width: meta.width,
                height: meta.height,
                expected,
                actual: rgba.len(),
            });
        }
        meta.validate_bounds()?;
        Ok(Self { meta, rgba })
    }

    /// Wrap a decoded image, checking it agrees with the metadata.
    pub fn from_image(image: image::RgbaImage, meta: WindMeta) -> Result<Self, FieldError> {
        let (image_width, image_height) = image.dimensions();
        if (image_width, image_height) != (meta.width, meta.height) {
            return Err(FieldError::DimensionMismatch {
                width: meta.width,
                height: meta.height,
                image_width,
                image_height,
            });
        }
        Self::new(image.into_raw(), meta)
    }

    /// Decode an encoded image (PNG/JPEG bytes) with its metadata JSON.
    pub fn from_bytes(image_bytes: &[u8], meta_json: &str) -> Result<Self, FieldError> {
        let meta = WindMeta::from_json_str(meta_json)?;
        let image = image::load_from_memory(image_bytes)?.into_rgba8();
        Self::from_image(image, meta)
    }

    /// Load a raster file and its metadata JSON file.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let wind = WindData::from_files("wind/2016112000.png", "wind/2016112000.json")?;
    /// ```
    pub fn from_files<P: AsRef<Path>, Q: AsRef<Path>>(image_path: P, meta_path: Q) -> Result<Self, FieldError> {
        let meta_path = meta_path.as_ref();
        let json = fs::read_to_string(meta_path).map_err(|source| FieldError::Io {
            path: meta_path.to_path_buf(),
            source,
        })?;
        let meta = WindMeta::from_json_str(&json)?;

        let image_path = image_path.as_ref();
        let bytes = fs::read(image_path).map_err(|source| FieldError::Io {
            path: image_path.to_path_buf(),
            source,
        })?;
        let image = image::load_from_memory(&bytes)?.into_rgba8();
        Self::from_image(image, meta)
    }

    pub fn meta(&self) -> &WindMeta {
        &self.meta
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    pub fn width(&self) -> u32 {
        self.meta.width
    }

    pub fn height(&self) -> u32 {
        self.meta.height
    }

    /// Texel at `(x, y)` with coordinates clamped to the raster edge.
    pub fn texel_clamped(&self, x: i64, y: i64) -> [u8; 4] {
        let x = x.clamp(0, self.meta.width as i64 - 1) as usize;
        let y = y.clamp(0, self.meta.height as i64 - 1) as usize;
        let i = (y * self.meta.width as usize + x) * 4;
        [self.rgba[i], self.rgba[i + 1], self.rgba[i + 2], self.rgba[i + 3]]
    }
}

/// Issuance order of an asynchronous field load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadTicket(u64);

impl LoadTicket {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Orders field loads so a slow, superseded load never overwrites a newer one.
///
/// Tickets are issued when a load is requested; a result is accepted only if
/// its ticket is newer than the last accepted one.
#[derive(Debug, Default)]
pub struct LoadSequencer {
    issued: u64,
    applied: Option<LoadTicket>,
}

impl LoadSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the ticket for a newly requested load.
    pub fn issue(&mut self) -> LoadTicket {
        self.issued += 1;
        LoadTicket(self.issued)
    }

    /// Record a completed load; `false` means it was superseded and must be dropped.
    pub fn accept(&mut self, ticket: LoadTicket) -> bool {
        if self.applied.is_some_and(|applied| ticket <= applied) {
            return false;
        }
        self.applied = Some(ticket);
        true
    }

    /// Most recently accepted ticket.
    pub fn applied(&self) -> Option<LoadTicket> {
        self.applied
    }
}
