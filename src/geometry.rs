//! Pixel geometry for output boxes.
//!
//! Every output spec is placed as an outer box with CSS-style padding around
//! an inner content box. [`Geometry::resolve`] turns the declared values into
//! scaled pixel measurements used both for placement on the batch surface and
//! for sizing the written image.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::RasterError;

/// A rectangle in integer pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RectPx {
    /// X offset from the left edge of the raster
    pub x: u32,
    /// Y offset from the top edge of the raster
    pub y: u32,
    /// Width of the rectangle
    pub width: u32,
    /// Height of the rectangle
    pub height: u32,
}

impl RectPx {
    /// Creates a new rectangle with the given position and dimensions.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Creates a rectangle at `origin` with the given size.
    pub fn at(origin: (u32, u32), size: SizePx) -> Self {
        Self::new(origin.0, origin.1, size.width, size.height)
    }

    /// Returns the right edge coordinate (x + width).
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Returns the bottom edge coordinate (y + height).
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Returns true if the two rectangles share any pixel.
    pub fn overlaps(&self, other: &RectPx) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// A 2D size in pixel units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SizePx {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl SizePx {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A rectangle in fractional user-space coordinates.
///
/// Used for content frames (measured bounding boxes, declared viewports) and
/// for the content box inside an output.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RectF {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width of the rectangle
    pub width: f32,
    /// Height of the rectangle
    pub height: f32,
}

impl RectF {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// True if the rectangle encloses no area.
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// Uniform scale and translation mapping `self` into `target`, centred,
    /// without distortion.
    ///
    /// Returns `(scale, tx, ty)` such that a point `p` in this frame lands at
    /// `p * scale + (tx, ty)`.
    pub fn fit_into(&self, target: &RectF) -> (f32, f32, f32) {
        let scale = (target.width / self.width).min(target.height / self.height);
        let tx = target.x + (target.width - self.width * scale) / 2.0 - self.x * scale;
        let ty = target.y + (target.height - self.height * scale) / 2.0 - self.y * scale;
        (scale, tx, ty)
    }
}

/// A width/height pair in (possibly fractional) pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoxSize {
    pub width: f32,
    pub height: f32,
}

impl BoxSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    fn scaled(&self, scale: f32) -> Self {
        Self::new(self.width * scale, self.height * scale)
    }
}

// ============================================================================
// Padding
// ============================================================================

/// Padding on the four sides of an output box.
///
/// Parsed from the CSS shorthand: `a` (all sides), `v h` (top/bottom then
/// left/right), `t h b`, or `t r b l`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "PaddingRepr", into = "PaddingRepr")]
pub struct Padding {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Padding {
    pub fn uniform(value: f32) -> Self {
        Self::new(value, value, value, value)
    }

    pub fn new(top: f32, right: f32, bottom: f32, left: f32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    /// Parses a CSS padding shorthand such as `"2 4"`.
    pub fn parse(value: &str) -> Result<Self, RasterError> {
        let invalid = |reason: &str| RasterError::InvalidPadding {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = Vec::with_capacity(4);
        for part in value.split_whitespace() {
            let number = part
                .trim_end_matches("px")
                .parse::<f32>()
                .map_err(|_| invalid("not a number"))?;
            if !number.is_finite() || number < 0.0 {
                return Err(invalid("values must be finite and non-negative"));
            }
            parts.push(number);
        }

        match parts[..] {
            [all] => Ok(Self::uniform(all)),
            [vertical, horizontal] => Ok(Self::new(vertical, horizontal, vertical, horizontal)),
            [top, horizontal, bottom] => Ok(Self::new(top, horizontal, bottom, horizontal)),
            [top, right, bottom, left] => Ok(Self::new(top, right, bottom, left)),
            [] => Err(invalid("empty shorthand")),
            _ => Err(invalid("expected 1 to 4 values")),
        }
    }

    fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    fn vertical(&self) -> f32 {
        self.top + self.bottom
    }

    fn scaled(&self, scale: f32) -> Self {
        Self::new(
            self.top * scale,
            self.right * scale,
            self.bottom * scale,
            self.left * scale,
        )
    }
}

impl FromStr for Padding {
    type Err = RasterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Padding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.top, self.right, self.bottom, self.left)
    }
}

/// Wire form of [`Padding`]: either a bare number or a shorthand string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum PaddingRepr {
    Number(f32),
    Shorthand(String),
}

impl TryFrom<PaddingRepr> for Padding {
    type Error = RasterError;

    fn try_from(repr: PaddingRepr) -> Result<Self, Self::Error> {
        match repr {
            PaddingRepr::Number(n) => Self::parse(&n.to_string()),
            PaddingRepr::Shorthand(s) => Self::parse(&s),
        }
    }
}

impl From<Padding> for PaddingRepr {
    fn from(padding: Padding) -> Self {
        PaddingRepr::Shorthand(padding.to_string())
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Why a geometry could not be resolved.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DimensionError {
    #[error("width and height are both missing or zero")]
    MissingSize,
    #[error("scale must be a positive number, got {0}")]
    InvalidScale(f32),
    #[error("padding {padding} exceeds the {width}x{height} box")]
    PaddingTooLarge {
        padding: Padding,
        width: f32,
        height: f32,
    },
}

/// Resolved measurements of one output box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub outer: BoxSize,
    pub padding: Padding,
    pub inner: BoxSize,
    pub scale: f32,
    pub scaled_outer: BoxSize,
    pub scaled_padding: Padding,
    pub scaled_inner: BoxSize,
}

impl Geometry {
    /// Resolves the geometry of an output box.
    ///
    /// A missing or zero side defaults to the other one; if both are missing
    /// the box cannot be sized.
    pub fn resolve(
        width: Option<f32>,
        height: Option<f32>,
        padding: Padding,
        scale: f32,
    ) -> Result<Self, DimensionError> {
        let present = |v: Option<f32>| v.filter(|v| v.is_finite() && *v > 0.0);
        let (width, height) = match (present(width), present(height)) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, w),
            (None, Some(h)) => (h, h),
            (None, None) => return Err(DimensionError::MissingSize),
        };
        if !(scale.is_finite() && scale > 0.0) {
            return Err(DimensionError::InvalidScale(scale));
        }

        let outer = BoxSize::new(width, height);
        let inner = BoxSize::new(width - padding.horizontal(), height - padding.vertical());
        if inner.width < 0.0 || inner.height < 0.0 {
            return Err(DimensionError::PaddingTooLarge {
                padding,
                width,
                height,
            });
        }

        Ok(Self {
            outer,
            padding,
            inner,
            scale,
            scaled_outer: outer.scaled(scale),
            scaled_padding: padding.scaled(scale),
            scaled_inner: inner.scaled(scale),
        })
    }

    /// Pixel size of the written image.
    pub fn pixel_size(&self) -> SizePx {
        SizePx::new(
            self.scaled_outer.width.round() as u32,
            self.scaled_outer.height.round() as u32,
        )
    }

    /// The visible content box relative to the output box origin.
    pub fn content_rect(&self) -> RectF {
        RectF::new(
            self.scaled_padding.left,
            self.scaled_padding.top,
            self.scaled_inner.width,
            self.scaled_inner.height,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_px_edges_and_overlap() {
        let a = RectPx::new(0, 8, 16, 16);
        assert_eq!(a.right(), 16);
        assert_eq!(a.bottom(), 24);

        let below = RectPx::new(0, 24, 16, 16);
        assert!(!a.overlaps(&below));
        let shifted = RectPx::new(4, 20, 16, 16);
        assert!(a.overlaps(&shifted));
    }

    #[test]
    fn padding_shorthand_forms() {
        assert_eq!(Padding::parse("3").unwrap(), Padding::uniform(3.0));
        assert_eq!(
            Padding::parse("2 4").unwrap(),
            Padding::new(2.0, 4.0, 2.0, 4.0)
        );
        assert_eq!(
            Padding::parse("1 2 3").unwrap(),
            Padding::new(1.0, 2.0, 3.0, 2.0)
        );
        assert_eq!(
            Padding::parse("1 2 3 4").unwrap(),
            Padding::new(1.0, 2.0, 3.0, 4.0)
        );
        assert_eq!(Padding::parse("2px").unwrap(), Padding::uniform(2.0));
    }

    #[test]
    fn padding_rejects_garbage() {
        assert!(Padding::parse("").is_err());
        assert!(Padding::parse("a b").is_err());
        assert!(Padding::parse("1 2 3 4 5").is_err());
        assert!(Padding::parse("-1").is_err());
    }

    #[test]
    fn padding_deserializes_from_number_or_string() {
        let p: Padding = serde_json::from_str("2").unwrap();
        assert_eq!(p, Padding::uniform(2.0));
        let p: Padding = serde_json::from_str("\"2 4\"").unwrap();
        assert_eq!(p, Padding::new(2.0, 4.0, 2.0, 4.0));
        assert!(serde_json::from_str::<Padding>("\"x\"").is_err());
    }

    #[test]
    fn two_value_padding_uses_css_axes() {
        let padding = Padding::parse("2 4").unwrap();
        let g = Geometry::resolve(Some(20.0), Some(20.0), padding, 1.0).unwrap();
        assert_eq!(g.inner, BoxSize::new(12.0, 16.0));
        assert_eq!(g.content_rect(), RectF::new(4.0, 2.0, 12.0, 16.0));
    }

    #[test]
    fn scaling_applies_to_every_measure() {
        let padding = Padding::new(1.0, 2.0, 3.0, 4.0);
        let g = Geometry::resolve(Some(16.0), Some(12.0), padding, 3.0).unwrap();

        assert_eq!(g.scaled_outer, BoxSize::new(48.0, 36.0));
        assert_eq!(g.scaled_padding, Padding::new(3.0, 6.0, 9.0, 12.0));
        assert_eq!(g.scaled_inner, BoxSize::new(30.0, 24.0));
        assert_eq!(g.pixel_size(), SizePx::new(48, 36));
    }

    #[test]
    fn scaled_inner_is_scale_times_outer_minus_padding() {
        for scale in [0.5_f32, 1.0, 2.0, 6.0] {
            for pad in ["0", "1", "2 3", "0 1 2", "1 0 3 2"] {
                let padding = Padding::parse(pad).unwrap();
                let g = Geometry::resolve(Some(16.0), Some(20.0), padding, scale).unwrap();
                let expected_w = scale * (16.0 - padding.left - padding.right);
                let expected_h = scale * (20.0 - padding.top - padding.bottom);
                assert!(g.scaled_inner.width >= 0.0 && g.scaled_inner.height >= 0.0);
                assert!((g.scaled_inner.width - expected_w).abs() < 1e-4);
                assert!((g.scaled_inner.height - expected_h).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn missing_side_defaults_to_sibling() {
        let g = Geometry::resolve(Some(16.0), None, Padding::default(), 1.0).unwrap();
        assert_eq!(g.outer, BoxSize::new(16.0, 16.0));
        let g = Geometry::resolve(Some(0.0), Some(24.0), Padding::default(), 1.0).unwrap();
        assert_eq!(g.outer, BoxSize::new(24.0, 24.0));
    }

    #[test]
    fn unusable_dimensions_are_rejected() {
        assert_eq!(
            Geometry::resolve(None, Some(0.0), Padding::default(), 1.0),
            Err(DimensionError::MissingSize)
        );
        assert!(matches!(
            Geometry::resolve(Some(16.0), Some(16.0), Padding::default(), 0.0),
            Err(DimensionError::InvalidScale(_))
        ));
        assert!(matches!(
            Geometry::resolve(Some(16.0), Some(16.0), Padding::uniform(9.0), 1.0),
            Err(DimensionError::PaddingTooLarge { .. })
        ));
    }

    #[test]
    fn fit_into_preserves_aspect_and_centres() {
        let frame = RectF::new(0.0, 0.0, 24.0, 12.0);
        let target = RectF::new(2.0, 2.0, 12.0, 12.0);
        let (scale, tx, ty) = frame.fit_into(&target);
        assert_eq!(scale, 0.5);
        assert_eq!(tx, 2.0);
        assert_eq!(ty, 5.0);
    }
}
