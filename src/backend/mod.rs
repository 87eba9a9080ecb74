//! Rendering backends.
//!
//! The pipeline only needs three things from a renderer: accept a composed
//! surface, measure the natural bounds of an input region, and capture the
//! whole surface as one raster. [`RenderBackend`] captures exactly that, so
//! the layout and slicing logic never depends on a particular rasterizer.

pub mod resvg;

pub use self::resvg::ResvgBackend;

use image::RgbaImage;

use crate::error::RasterError;
use crate::geometry::RectF;
use crate::surface::{RegionId, Surface};

/// Natural extents of an input region, in the source's canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Tight bounds of the rendered content, strokes included.
    pub bounds: RectF,
    /// The viewport the source declares (its width/height box).
    pub viewport: RectF,
    /// Whether the source's root element carries an explicit `viewBox`.
    pub declares_view_box: bool,
}

/// A renderer used as a layout and raster oracle.
///
/// A backend is exclusively owned by one run. The pipeline calls
/// [`compose`](Self::compose) before measuring and again after fitting, then
/// [`snapshot`](Self::snapshot) once per batch, and finally
/// [`release`](Self::release) exactly once.
pub trait RenderBackend {
    /// Loads a surface, replacing any previously composed one.
    fn compose(&mut self, surface: &Surface) -> Result<(), RasterError>;

    /// Measures an input region of the composed surface.
    ///
    /// Errors are scoped to the region's task unless they are
    /// [`RasterError::RenderFailure`].
    fn measure_bounding_box(&mut self, region: &RegionId) -> Result<Measurement, RasterError>;

    /// Captures the composed surface as one transparent RGBA image.
    fn snapshot(&mut self) -> Result<RgbaImage, RasterError>;

    /// Frees renderer resources.
    fn release(&mut self) {}
}
