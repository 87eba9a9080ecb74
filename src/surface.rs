//! Batch surface composition.
//!
//! A [`Surface`] is the in-memory document one batch is rendered from. Every
//! task contributes one hidden input region (used only to measure the
//! source's natural bounds) and one output region per output spec. Output
//! regions are stacked in a single column by an [`OffsetCursor`]; the slicer
//! replays the same cursor to find them again in the captured raster.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::RasterError;
use crate::geometry::{Geometry, RectF, RectPx, SizePx};
use crate::task::RenderTask;

// ============================================================================
// OffsetCursor
// ============================================================================

/// Running position used to place output regions on a batch surface and to
/// crop them back out of its raster.
///
/// A fresh cursor is created for every batch. Composition and slicing must
/// advance their cursors over the same sizes in the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetCursor {
    top: u32,
    left: u32,
    gap: u32,
}

impl OffsetCursor {
    pub fn new(gap: u32) -> Self {
        Self { top: 0, left: 0, gap }
    }

    pub fn top(&self) -> u32 {
        self.top
    }

    pub fn left(&self) -> u32 {
        self.left
    }

    /// Skips the gap, returns the box for `size` at the cursor, and moves the
    /// cursor past it.
    pub fn advance(&mut self, size: SizePx) -> RectPx {
        self.top += self.gap;
        let rect = RectPx::at((self.left, self.top), size);
        self.top += size.height;
        rect
    }
}

// ============================================================================
// Regions
// ============================================================================

/// Identifier of a region, unique within a surface.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionId(String);

impl RegionId {
    pub(crate) fn input(scope: &str) -> Self {
        Self(format!("input-{scope}"))
    }

    pub(crate) fn output(scope: &str) -> Self {
        Self(format!("output-{scope}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives the scope shared by an output region and its styles.
fn scope_id(task: &str, output: usize, primary: Option<&PathBuf>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(task.as_bytes());
    hasher.update(b"-");
    hasher.update(output.to_le_bytes());
    if let Some(path) = primary {
        hasher.update(path.to_string_lossy().as_bytes());
    }
    hex::encode(&hasher.finalize()[..8])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// Measurement-only copy of the source; never part of the raster.
    Input,
    /// Styled, positioned copy that ends up in an output file.
    Output,
}

/// One copy of a task's vector content on the surface.
#[derive(Debug, Clone)]
pub struct Region {
    /// Unique identifier within the surface
    pub id: RegionId,
    /// Whether this is a measurement input or a rendered output
    pub kind: RegionKind,
    /// Index of the owning task in [`Surface::tasks`].
    pub task: usize,
    /// Normalized SVG markup, shared by all regions of a task.
    pub markup: Arc<str>,
    /// User style sheet applied when rendering this region.
    pub style_sheet: Option<String>,
    /// Placement on the surface, in raster pixels.
    pub rect: RectPx,
    /// Content box relative to `rect`'s origin.
    pub content: RectF,
    /// Source-space rectangle mapped onto `content`; set by the fitter.
    pub frame: Option<RectF>,
    /// Hidden regions are never drawn.
    pub hidden: bool,
    /// Content outside the content box is discarded.
    pub clip: bool,
}

/// Per-output bookkeeping the slicer needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedOutput {
    /// Output region on the surface
    pub region: RegionId,
    /// Scaled outer box, i.e. the size of the written file
    pub size: SizePx,
    /// Destinations; the first is cropped, the rest are copies
    pub paths: Vec<PathBuf>,
}

/// A task as laid out on the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedTask {
    /// Task name
    pub name: String,
    /// Fit to measured bounds even when a viewBox is declared
    pub trim: bool,
    /// The task's measurement region
    pub input: RegionId,
    /// One entry per output spec, in order
    pub outputs: Vec<ComposedOutput>,
    /// Set when the task failed after composition; its regions stay in the
    /// layout but nothing is written for it.
    pub failed: bool,
}

// ============================================================================
// PreparedTask
// ============================================================================

/// A task whose source has been loaded and whose geometry has been resolved.
#[derive(Debug, Clone)]
pub struct PreparedTask {
    pub task: RenderTask,
    pub markup: String,
    pub geometries: Vec<Geometry>,
}

impl PreparedTask {
    /// Resolves geometry and loads the source.
    pub fn prepare(task: RenderTask) -> Result<Self, RasterError> {
        let geometries = task.geometries()?;
        let markup = task.input.content.load(&task.name)?;
        Ok(Self {
            task,
            markup,
            geometries,
        })
    }
}

/// Turns an output's CSS override into a style sheet.
///
/// Bare declarations apply to every element below the root `<svg>`.
pub fn style_sheet(css: &str) -> String {
    if css.contains('{') {
        css.to_string()
    } else {
        format!("svg * {{ {css} }}")
    }
}

// ============================================================================
// Surface
// ============================================================================

/// The composed document for one batch.
#[derive(Debug, Clone, Default)]
pub struct Surface {
    tasks: Vec<ComposedTask>,
    regions: Vec<Region>,
    width: u32,
    height: u32,
}

impl Surface {
    /// Lays out a batch.
    ///
    /// Output regions are stacked top to bottom in task order, then output
    /// order, `gap` pixels apart.
    pub fn compose(batch: &[PreparedTask], gap: u32) -> Self {
        let mut surface = Surface::default();
        let mut cursor = OffsetCursor::new(gap);

        for (index, prepared) in batch.iter().enumerate() {
            let task = &prepared.task;
            let markup: Arc<str> = Arc::from(prepared.markup.as_str());
            let input = RegionId::input(&scope_id(&task.name, usize::MAX, None));

            surface.regions.push(Region {
                id: input.clone(),
                kind: RegionKind::Input,
                task: index,
                markup: markup.clone(),
                style_sheet: None,
                rect: RectPx::default(),
                content: RectF::default(),
                frame: None,
                hidden: true,
                clip: true,
            });

            let mut outputs = Vec::with_capacity(task.outputs.len());
            for (i, (output, geometry)) in task.outputs.iter().zip(&prepared.geometries).enumerate()
            {
                let id = RegionId::output(&scope_id(&task.name, i, output.paths.first()));
                let size = geometry.pixel_size();
                let rect = cursor.advance(size);
                surface.width = surface.width.max(rect.right());

                surface.regions.push(Region {
                    id: id.clone(),
                    kind: RegionKind::Output,
                    task: index,
                    markup: markup.clone(),
                    style_sheet: output.css.as_deref().map(style_sheet),
                    rect,
                    content: geometry.content_rect(),
                    frame: None,
                    hidden: false,
                    clip: true,
                });
                outputs.push(ComposedOutput {
                    region: id,
                    size,
                    paths: output.paths.clone(),
                });
            }

            surface.tasks.push(ComposedTask {
                name: task.name.clone(),
                trim: task.input.trim,
                input,
                outputs,
                failed: false,
            });
        }

        surface.height = cursor.top();
        surface
    }

    pub fn tasks(&self) -> &[ComposedTask] {
        &self.tasks
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn region(&self, id: &RegionId) -> Option<&Region> {
        self.regions.iter().find(|r| &r.id == id)
    }

    pub fn region_mut(&mut self, id: &RegionId) -> Option<&mut Region> {
        self.regions.iter_mut().find(|r| &r.id == id)
    }

    /// Output regions that will appear in the snapshot, in layout order.
    pub fn visible_outputs(&self) -> impl Iterator<Item = &Region> {
        self.regions
            .iter()
            .filter(|r| r.kind == RegionKind::Output && !r.hidden)
    }

    /// Hides every region of a task and marks it failed.
    pub fn fail_task(&mut self, task: usize) {
        for region in self.regions.iter_mut().filter(|r| r.task == task) {
            region.hidden = true;
        }
        if let Some(composed) = self.tasks.get_mut(task) {
            composed.failed = true;
        }
    }
}
