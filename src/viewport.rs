//! Viewport alignment between the field raster and the canvas.
//!
//! Particles live in canvas texture space (`[0, 1]²`, y down). The field
//! raster covers some geographic extent which, under the current view, lands
//! on a sub-rectangle of the canvas. [`FieldAlignment`] is that rectangle in
//! canvas fractions; kernels map a particle position to field texture space
//! with `(pos - offset) / scale`.

use glam::{DVec2, Vec2};
use serde::{Deserialize, Serialize};

/// Geographic bounding box in map units (degrees for EPSG:4326).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct GeoExtent {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl GeoExtent {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    pub fn center(&self) -> DVec2 {
        DVec2::new(
            (self.west + self.east) * 0.5,
            (self.south + self.north) * 0.5,
        )
    }

    /// Finite with positive width and height.
    pub fn is_valid(&self) -> bool {
        [self.west, self.south, self.east, self.north]
            .iter()
            .all(|v| v.is_finite())
            && self.width() > 0.0
            && self.height() > 0.0
    }
}

impl From<[f64; 4]> for GeoExtent {
    fn from([west, south, east, north]: [f64; 4]) -> Self {
        Self::new(west, south, east, north)
    }
}

impl From<GeoExtent> for [f64; 4] {
    fn from(e: GeoExtent) -> Self {
        [e.west, e.south, e.east, e.north]
    }
}

/// What the external view/basemap provider reports: a center and a
/// resolution (map units per canvas pixel).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub center: DVec2,
    pub resolution: f64,
}

impl ViewState {
    pub fn new(center: DVec2, resolution: f64) -> Self {
        Self { center, resolution }
    }

    /// View that fits `extent` entirely inside a canvas of the given size.
    pub fn fit(extent: &GeoExtent, canvas: (u32, u32)) -> Self {
        let (w, h) = (canvas.0.max(1) as f64, canvas.1.max(1) as f64);
        let resolution = (extent.width() / w).max(extent.height() / h);
        Self::new(extent.center(), resolution)
    }

    /// Visible geographic extent for a canvas of the given size.
    pub fn extent(&self, canvas: (u32, u32)) -> GeoExtent {
        let half = DVec2::new(canvas.0 as f64, canvas.1 as f64) * self.resolution * 0.5;
        GeoExtent::new(
            self.center.x - half.x,
            self.center.y - half.y,
            self.center.x + half.x,
            self.center.y + half.y,
        )
    }

    /// Move the view by a drag of `(dx, dy)` canvas pixels.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.center.x -= dx * self.resolution;
        self.center.y += dy * self.resolution;
    }

    /// Zoom by `factor` (> 1 zooms in) keeping the point under `anchor_px` fixed.
    pub fn zoom(&mut self, factor: f64, anchor_px: DVec2, canvas: (u32, u32)) {
        if !(factor.is_finite() && factor > 0.0) {
            return;
        }
        let half = DVec2::new(canvas.0 as f64, canvas.1 as f64) * 0.5;
        let from_center = DVec2::new(anchor_px.x - half.x, half.y - anchor_px.y);
        let anchor_geo = self.center + from_center * self.resolution;
        self.resolution /= factor;
        self.center = anchor_geo - from_center * self.resolution;
    }
}

/// Placement of the field raster on the canvas, in canvas fractions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldAlignment {
    /// Top-left corner of the field on the canvas.
    pub offset: Vec2,
    /// Field size as a fraction of the canvas size.
    pub scale: Vec2,
    /// Latitude of the field's top edge.
    pub north: f32,
    /// Latitude of the field's bottom edge.
    pub south: f32,
}

impl Default for FieldAlignment {
    fn default() -> Self {
        Self::identity()
    }
}

impl FieldAlignment {
    /// Field stretched over the whole canvas, spanning the globe's latitudes.
    pub fn identity() -> Self {
        Self {
            offset: Vec2::ZERO,
            scale: Vec2::ONE,
            north: 90.0,
            south: -90.0,
        }
    }

    /// Align a field covering `field` to a view showing `view` at
    /// `resolution` map units per pixel on a `canvas`-sized surface.
    ///
    /// Returns `None` for degenerate input (empty extents, zero or
    /// non-finite resolution, empty canvas); callers keep their last good
    /// alignment in that case.
    pub fn compute(
        field: &GeoExtent,
        view: &GeoExtent,
        resolution: f64,
        canvas: (u32, u32),
    ) -> Option<Self> {
        if !field.is_valid() || !view.is_valid() {
            return None;
        }
        if !(resolution.is_finite() && resolution > 0.0) || canvas.0 == 0 || canvas.1 == 0 {
            return None;
        }
        let size = DVec2::new(canvas.0 as f64, canvas.1 as f64);

        let londiff = field.west - view.west;
        let latdiff = view.north - field.north;
        let offset = DVec2::new(londiff / view.width(), latdiff / view.height());
        let scale = DVec2::new(field.width(), field.height()) / resolution / size;

        let offset = offset.as_vec2();
        let scale = scale.as_vec2();
        if !offset.is_finite() || !scale.is_finite() || scale.min_element() <= 0.0 {
            return None;
        }
        Some(Self {
            offset,
            scale,
            north: field.north as f32,
            south: field.south as f32,
        })
    }

    /// Align using a view provider's state.
    pub fn for_view(field: &GeoExtent, view: &ViewState, canvas: (u32, u32)) -> Option<Self> {
        Self::compute(field, &view.extent(canvas), view.resolution, canvas)
    }

    /// Map a canvas position to field texture coordinates.
    pub fn field_uv(&self, canvas_pos: Vec2) -> Vec2 {
        (canvas_pos - self.offset) / self.scale
    }

    /// Map field texture coordinates back to a canvas position.
    pub fn canvas_pos(&self, field_uv: Vec2) -> Vec2 {
        field_uv * self.scale + self.offset
    }

    /// Latitude at a field texture row coordinate.
    pub fn latitude(&self, field_v: f32) -> f32 {
        self.north + (self.south - self.north) * field_v.clamp(0.0, 1.0)
    }
}

/// The latest view reported by the host together with the alignment derived
/// from it.
///
/// Realignment runs on every view change and every field load. A field
/// without a geographic extent covers the whole canvas.
#[derive(Debug, Clone, Default)]
pub struct ViewTracker {
    view: Option<ViewState>,
    alignment: FieldAlignment,
}

impl ViewTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> Option<&ViewState> {
        self.view.as_ref()
    }

    pub fn alignment(&self) -> FieldAlignment {
        self.alignment
    }

    pub fn set_view(&mut self, view: ViewState) {
        self.view = Some(view);
    }

    /// Recompute the alignment for a field covering `extent`.
    ///
    /// Returns `false` when the view is degenerate; the previous alignment is
    /// kept in that case.
    pub fn realign(&mut self, extent: Option<&GeoExtent>, canvas: (u32, u32)) -> bool {
        let (Some(extent), Some(view)) = (extent, self.view.as_ref()) else {
            self.alignment = FieldAlignment::identity();
            return true;
        };
        match FieldAlignment::for_view(extent, view, canvas) {
            Some(alignment) => {
                log::debug!(
                    "Field aligned at offset {:?}, scale {:?}",
                    alignment.offset,
                    alignment.scale
                );
                self.alignment = alignment;
                true
            }
            None => {
                log::warn!(
                    "Degenerate view (resolution {}, canvas {}x{}), keeping last alignment",
                    view.resolution,
                    canvas.0,
                    canvas.1
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_geo_extent_serde_as_array() {
        let e: GeoExtent = serde_json::from_str("[47.1227, -16.35261, 164.6227, 60.39739]").unwrap();
        assert_eq!(e.west, 47.1227);
        assert_eq!(e.north, 60.39739);
        let back = serde_json::to_string(&e).unwrap();
        assert!(back.starts_with('['));
    }

    #[test]
    fn test_view_matching_field_is_identity() {
        let field = GeoExtent::new(0.0, 0.0, 100.0, 50.0);
        let view = ViewState::new(DVec2::new(50.0, 25.0), 0.5);
        let a = FieldAlignment::for_view(&field, &view, (200, 100)).unwrap();
        assert!(close(a.offset.x, 0.0) && close(a.offset.y, 0.0));
        assert!(close(a.scale.x, 1.0) && close(a.scale.y, 1.0));
        assert!(close(a.north, 50.0) && close(a.south, 0.0));
    }

    #[test]
    fn test_offset_is_fraction_of_view() {
        // Field starts a quarter of the way across and a tenth down the view.
        let field = GeoExtent::new(25.0, 0.0, 75.0, 90.0);
        let view = GeoExtent::new(0.0, 0.0, 100.0, 100.0);
        let a = FieldAlignment::compute(&field, &view, 0.25, (400, 400)).unwrap();
        assert!(close(a.offset.x, 0.25));
        assert!(close(a.offset.y, 0.10));
        assert!(close(a.scale.x, 0.5));
        assert!(close(a.scale.y, 0.9));
    }

    #[test]
    fn test_field_uv_round_trip() {
        let a = FieldAlignment {
            offset: Vec2::new(0.2, 0.1),
            scale: Vec2::new(0.5, 0.8),
            north: 60.0,
            south: -16.0,
        };
        let p = Vec2::new(0.45, 0.5);
        let uv = a.field_uv(p);
        assert!((a.canvas_pos(uv) - p).length() < 1e-6);
        assert!(close(a.field_uv(a.offset).x, 0.0));
    }

    #[test]
    fn test_degenerate_views_are_rejected() {
        let field = GeoExtent::new(0.0, 0.0, 10.0, 10.0);
        let view = GeoExtent::new(0.0, 0.0, 10.0, 10.0);
        assert!(FieldAlignment::compute(&field, &view, 0.0, (100, 100)).is_none());
        assert!(FieldAlignment::compute(&field, &view, f64::NAN, (100, 100)).is_none());
        assert!(FieldAlignment::compute(&field, &view, 0.1, (0, 100)).is_none());
        let flat = GeoExtent::new(5.0, 0.0, 5.0, 10.0);
        assert!(FieldAlignment::compute(&field, &flat, 0.1, (100, 100)).is_none());
        assert!(FieldAlignment::compute(&flat, &view, 0.1, (100, 100)).is_none());
    }

    #[test]
    fn test_zoom_keeps_anchor_fixed() {
        let canvas = (200, 100);
        let mut view = ViewState::new(DVec2::new(10.0, 20.0), 0.1);
        let anchor = DVec2::new(150.0, 25.0);
        let before = view.extent(canvas);
        let geo_x = before.west + anchor.x * view.resolution;
        view.zoom(2.0, anchor, canvas);
        let after = view.extent(canvas);
        assert!((view.resolution - 0.05).abs() < 1e-12);
        assert!((after.west + anchor.x * view.resolution - geo_x).abs() < 1e-9);
    }

    #[test]
    fn test_pan_moves_center_against_drag() {
        let mut view = ViewState::new(DVec2::ZERO, 2.0);
        view.pan(10.0, 5.0);
        assert_eq!(view.center, DVec2::new(-20.0, 10.0));
    }

    #[test]
    fn test_tracker_keeps_last_good_alignment() {
        let field = GeoExtent::new(0.0, 0.0, 100.0, 50.0);
        let mut tracker = ViewTracker::new();
        assert!(tracker.realign(Some(&field), (200, 100)));
        assert_eq!(tracker.alignment(), FieldAlignment::identity());

        tracker.set_view(ViewState::new(DVec2::new(50.0, 25.0), 1.0));
        assert!(tracker.realign(Some(&field), (200, 100)));
        let good = tracker.alignment();
        assert!(close(good.scale.x, 0.5));

        tracker.set_view(ViewState::new(DVec2::new(50.0, 25.0), 0.0));
        assert!(!tracker.realign(Some(&field), (200, 100)));
        assert_eq!(tracker.alignment(), good);

        assert!(tracker.realign(None, (200, 100)));
        assert_eq!(tracker.alignment(), FieldAlignment::identity());
    }

    #[test]
    fn test_latitude_interpolates_rows() {
        let a = FieldAlignment::identity();
        assert!(close(a.latitude(0.0), 90.0));
        assert!(close(a.latitude(0.5), 0.0));
        assert!(close(a.latitude(1.0), -90.0));
        assert!(close(a.latitude(2.0), -90.0));
    }
}
