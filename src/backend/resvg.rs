//! CPU backend built on resvg/usvg.

use std::collections::HashMap;
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use log::debug;
use resvg::tiny_skia::{FillRule, Mask, PathBuilder, Pixmap, PixmapPaint, Rect, Transform};
use resvg::usvg::{Options, Tree, fontdb};

use super::{Measurement, RenderBackend};
use crate::error::RasterError;
use crate::geometry::RectF;
use crate::source::declares_view_box;
use crate::surface::{Region, RegionId, RegionKind, Surface};

/// Renders surfaces with resvg.
///
/// Each region is parsed into its own usvg tree, so per-output style sheets
/// never leak into neighbouring regions.
pub struct ResvgBackend {
    fontdb: Arc<fontdb::Database>,
    surface: Option<Surface>,
    measurements: HashMap<RegionId, Result<Measurement, String>>,
}

impl ResvgBackend {
    /// Creates a backend with an empty font database.
    pub fn new() -> Self {
        Self {
            fontdb: Arc::new(fontdb::Database::new()),
            surface: None,
            measurements: HashMap::new(),
        }
    }

    /// Creates a backend that can render `<text>` with the system's fonts.
    pub fn with_system_fonts() -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        debug!("loaded {} font faces", db.len());
        Self {
            fontdb: Arc::new(db),
            ..Self::new()
        }
    }

    fn parse(&self, region: &Region) -> Result<Tree, String> {
        let options = Options {
            style_sheet: region.style_sheet.clone(),
            fontdb: self.fontdb.clone(),
            ..Options::default()
        };
        Tree::from_str(&region.markup, &options).map_err(|e| e.to_string())
    }

    fn measure(&self, region: &Region) -> Result<Measurement, String> {
        let tree = self.parse(region)?;
        let size = tree.size();
        let bbox = tree.root().abs_stroke_bounding_box();
        Ok(Measurement {
            bounds: RectF::new(bbox.x(), bbox.y(), bbox.width(), bbox.height()),
            viewport: RectF::new(0.0, 0.0, size.width(), size.height()),
            declares_view_box: declares_view_box(&region.markup)?,
        })
    }

    /// Renders one output region into its own pixmap, clipped to the
    /// region's content box.
    fn render_region(&self, region: &Region, frame: &RectF) -> Result<Pixmap, RasterError> {
        let mut pixmap = Pixmap::new(region.rect.width, region.rect.height).ok_or_else(|| {
            RasterError::render(0, format!("cannot allocate region {}", region.id))
        })?;
        if region.content.is_empty() {
            return Ok(pixmap);
        }
        let tree = self
            .parse(region)
            .map_err(|e| RasterError::render(0, format!("{}: {e}", region.id)))?;

        let (scale, tx, ty) = frame.fit_into(&region.content);
        let transform = Transform::from_row(scale, 0.0, 0.0, scale, tx, ty);
        resvg::render(&tree, transform, &mut pixmap.as_mut());
        if region.clip {
            if let Some(mask) = content_mask(region) {
                pixmap.apply_mask(&mask);
            }
        }
        Ok(pixmap)
    }
}

impl Default for ResvgBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for ResvgBackend {
    fn compose(&mut self, surface: &Surface) -> Result<(), RasterError> {
        self.measurements
            .retain(|id, _| surface.region(id).is_some_and(|r| r.kind == RegionKind::Input));

        for region in surface.regions() {
            if region.kind == RegionKind::Input && !self.measurements.contains_key(&region.id) {
                let measured = self.measure(region);
                self.measurements.insert(region.id.clone(), measured);
            }
        }

        self.surface = Some(surface.clone());
        Ok(())
    }

    fn measure_bounding_box(&mut self, region: &RegionId) -> Result<Measurement, RasterError> {
        let surface = self
            .surface
            .as_ref()
            .ok_or_else(|| RasterError::render(0, "no surface composed"))?;
        let task = surface
            .region(region)
            .and_then(|r| surface.tasks().get(r.task))
            .map(|t| t.name.clone())
            .ok_or_else(|| RasterError::render(0, format!("unknown region {region}")))?;

        match self.measurements.get(region) {
            Some(Ok(measurement)) => Ok(*measurement),
            Some(Err(reason)) => Err(RasterError::InvalidSource {
                task,
                reason: reason.clone(),
            }),
            None => Err(RasterError::render(0, format!("region {region} was not measured"))),
        }
    }

    fn snapshot(&mut self) -> Result<RgbaImage, RasterError> {
        let surface = self
            .surface
            .as_ref()
            .ok_or_else(|| RasterError::render(0, "no surface composed"))?;
        if surface.width() == 0 || surface.height() == 0 {
            return Ok(RgbaImage::new(surface.width(), surface.height()));
        }

        let mut canvas = Pixmap::new(surface.width(), surface.height()).ok_or_else(|| {
            RasterError::render(
                0,
                format!(
                    "cannot allocate a {}x{} surface",
                    surface.width(),
                    surface.height()
                ),
            )
        })?;

        for region in surface.visible_outputs() {
            let Some(frame) = region.frame.filter(|f| !f.is_empty()) else {
                continue;
            };
            if region.rect.width == 0 || region.rect.height == 0 {
                continue;
            }
            let pixmap = self.render_region(region, &frame)?;
            canvas.draw_pixmap(
                region.rect.x as i32,
                region.rect.y as i32,
                pixmap.as_ref(),
                &PixmapPaint::default(),
                Transform::identity(),
                None,
            );
        }

        Ok(pixmap_to_rgba_image(&canvas))
    }

    fn release(&mut self) {
        self.surface = None;
        self.measurements.clear();
    }
}

/// Coverage mask of a region's content box; `None` if the box is empty.
fn content_mask(region: &Region) -> Option<Mask> {
    let content = region.content;
    if content.is_empty() {
        return None;
    }
    let rect = Rect::from_xywh(content.x, content.y, content.width, content.height)?;
    let mut mask = Mask::new(region.rect.width, region.rect.height)?;
    mask.fill_path(
        &PathBuilder::from_rect(rect),
        FillRule::Winding,
        true,
        Transform::identity(),
    );
    Some(mask)
}

/// Converts a tiny_skia Pixmap to an image::RgbaImage.
fn pixmap_to_rgba_image(pixmap: &Pixmap) -> RgbaImage {
    let mut img = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in img.pixels_mut().zip(pixmap.pixels()) {
        // tiny_skia stores premultiplied alpha
        let (r, g, b, a) = unpremultiply(src.red(), src.green(), src.blue(), src.alpha());
        *dst = Rgba([r, g, b, a]);
    }
    img
}

fn unpremultiply(r: u8, g: u8, b: u8, a: u8) -> (u8, u8, u8, u8) {
    if a == 0 {
        (0, 0, 0, 0)
    } else {
        let a_f = a as f32 / 255.0;
        (
            (r as f32 / a_f).round().min(255.0) as u8,
            (g as f32 / a_f).round().min(255.0) as u8,
            (b as f32 / a_f).round().min(255.0) as u8,
            a,
        )
    }
}
