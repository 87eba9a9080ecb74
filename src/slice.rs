//! Cropping a batch raster back into output files.

use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbaImage, imageops};
use log::{debug, warn};

use crate::error::RasterError;
use crate::geometry::RectPx;
use crate::surface::{ComposedOutput, ComposedTask, OffsetCursor};

/// What one slicing pass produced.
#[derive(Debug, Default)]
pub struct SliceReport {
    /// Every file written, copies included, in write order.
    pub written: Vec<PathBuf>,
    /// Crop rectangles in raster space, one per output spec, in order.
    pub regions: Vec<RectPx>,
    pub failures: Vec<RasterError>,
}

impl SliceReport {
    pub fn written_count(&self) -> usize {
        self.written.len()
    }
}

/// Crops every output of `tasks` out of `raster`.
///
/// `tasks` must be in composition order and `cursor` must start where the
/// composition cursor started, otherwise crops land on the wrong icons.
/// Outputs of failed tasks still advance the cursor but are not written.
pub fn slice(raster: &RgbaImage, tasks: &[ComposedTask], cursor: &mut OffsetCursor) -> SliceReport {
    let mut report = SliceReport::default();

    for task in tasks {
        for output in &task.outputs {
            let rect = cursor.advance(output.size);
            report.regions.push(rect);
            if task.failed {
                continue;
            }

            debug!(
                "{}: crop {}x{} at ({}, {})",
                task.name, rect.width, rect.height, rect.x, rect.y
            );
            if let Err(err) = write_output(raster, rect, &task.name, output, &mut report.written) {
                warn!("{err}");
                report.failures.push(err);
            }
        }
    }

    report
}

/// Writes the crop to the first path and copies it to the others.
fn write_output(
    raster: &RgbaImage,
    rect: RectPx,
    task: &str,
    output: &ComposedOutput,
    written: &mut Vec<PathBuf>,
) -> Result<(), RasterError> {
    let Some((primary, copies)) = output.paths.split_first() else {
        return Ok(());
    };
    let failure = |path: &Path, reason: String| RasterError::SliceFailure {
        task: task.to_string(),
        path: path.to_path_buf(),
        reason,
    };

    if rect.right() > raster.width() || rect.bottom() > raster.height() {
        return Err(failure(
            primary.as_path(),
            format!(
                "crop {}x{}+{}+{} exceeds the {}x{} raster",
                rect.width,
                rect.height,
                rect.x,
                rect.y,
                raster.width(),
                raster.height()
            ),
        ));
    }

    let cropped = imageops::crop_imm(raster, rect.x, rect.y, rect.width, rect.height).to_image();
    cropped
        .save_with_format(primary, ImageFormat::Png)
        .map_err(|e| failure(primary.as_path(), e.to_string()))?;
    written.push(primary.clone());

    for copy in copies {
        fs::copy(primary, copy).map_err(|e| failure(copy.as_path(), e.to_string()))?;
        written.push(copy.clone());
    }
    Ok(())
}
