//! Batch rasterization pipeline.
//!
//! ```text
//! tasks ─► select ─► batches of N ─┬─► prepare (load source, resolve geometry)
//!                                  ├─► compose surface ─► backend.compose
//!                                  ├─► fit bounds ─► backend.compose
//!                                  ├─► backend.snapshot
//!                                  └─► slice + fan-out ─► PNG files
//! ```
//!
//! Batches run strictly one after another on a single backend. Each batch
//! starts with a fresh offset cursor.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use log::{debug, error, info, warn};
use thiserror::Error;

use crate::backend::{RenderBackend, ResvgBackend};
use crate::config::RenderConfig;
use crate::error::RasterError;
use crate::fit::fit;
use crate::slice::slice;
use crate::surface::{OffsetCursor, PreparedTask, Surface};
use crate::task::{RenderTask, tasks_to_json_pretty};

// ============================================================================
// RunReport
// ============================================================================

/// Outcome of a run: what was written and what failed.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Number of batches rendered and sliced.
    pub batches: usize,
    /// Every file written, copies included.
    pub written: Vec<PathBuf>,
    /// Tasks skipped because they had nothing left to write.
    pub skipped: Vec<String>,
    /// Task- and output-scoped failures.
    pub failures: Vec<RasterError>,
}

impl RunReport {
    /// True if no task or output failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A run stopped by a configuration or render failure.
///
/// `report` holds everything finished before the failure; files it lists
/// are on disk.
#[derive(Debug, Error)]
#[error("run aborted: {error}")]
pub struct RunAborted {
    pub error: RasterError,
    pub report: RunReport,
}

impl From<RasterError> for RunAborted {
    fn from(error: RasterError) -> Self {
        Self {
            error,
            report: RunReport::default(),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Exclusive use of a backend for one run; releases it when dropped.
struct Session<'a, B: RenderBackend + ?Sized> {
    backend: &'a mut B,
}

impl<'a, B: RenderBackend + ?Sized> Session<'a, B> {
    fn acquire(backend: &'a mut B) -> Self {
        debug!("render session acquired");
        Self { backend }
    }
}

impl<B: RenderBackend + ?Sized> Drop for Session<'_, B> {
    fn drop(&mut self) {
        self.backend.release();
        debug!("render session released");
    }
}

// ============================================================================
// Rasterizer
// ============================================================================

/// Drives render tasks through a backend.
///
/// # Example
///
/// ```no_run
/// use icon_rasterizer::{OutputSpec, Rasterizer, RenderConfig, RenderTask, ResvgBackend, VectorSource};
///
/// let task = RenderTask::new("json", VectorSource::from_svg("<svg viewBox='0 0 24 24'>...</svg>"), 16.0, 16.0)
///     .with_output(OutputSpec::new(1.0, ["out/json.png"]).with_css("fill:#000"));
///
/// let mut rasterizer = Rasterizer::new(ResvgBackend::new(), RenderConfig::default());
/// let report = rasterizer.run(vec![task]).unwrap();
/// println!("wrote {} files", report.written.len());
/// ```
pub struct Rasterizer<B: RenderBackend> {
    backend: B,
    config: RenderConfig,
}

impl<B: RenderBackend> Rasterizer<B> {
    pub fn new(backend: B, config: RenderConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Renders every task and writes its outputs.
    ///
    /// Task- and output-scoped failures are collected in the report. A
    /// render failure aborts the run; files from earlier batches are kept
    /// and listed in the returned [`RunAborted::report`].
    pub fn run(
        &mut self,
        tasks: impl IntoIterator<Item = RenderTask>,
    ) -> Result<RunReport, RunAborted> {
        self.config.validate()?;
        let config = &self.config;
        let session = Session::acquire(&mut self.backend);

        let mut report = RunReport::default();
        let tasks = select_tasks(tasks, config, &mut report);
        if let Some(dir) = &config.debug_dir {
            dump_tasks(dir, &tasks);
        }

        let mut remaining = tasks.into_iter();
        for index in 0.. {
            let batch: Vec<_> = remaining.by_ref().take(config.batch_size).collect();
            if batch.is_empty() {
                break;
            }
            if let Err(err) = render_batch(&mut *session.backend, config, index, batch, &mut report)
            {
                error!("{err}");
                return Err(RunAborted { error: err, report });
            }
        }

        info!(
            "rendered {} batches, wrote {} files, {} failures",
            report.batches,
            report.written.len(),
            report.failures.len()
        );
        Ok(report)
    }
}

/// Renders `tasks` with a fresh [`ResvgBackend`].
///
/// This is the crate's main entry point.
pub fn render_tasks(
    tasks: impl IntoIterator<Item = RenderTask>,
    config: RenderConfig,
) -> Result<RunReport, RunAborted> {
    config.validate()?;
    let backend = if config.load_system_fonts {
        ResvgBackend::with_system_fonts()
    } else {
        ResvgBackend::new()
    };
    Rasterizer::new(backend, config).run(tasks)
}

/// Drops duplicate names and tasks with nothing to write.
fn select_tasks(
    tasks: impl IntoIterator<Item = RenderTask>,
    config: &RenderConfig,
    report: &mut RunReport,
) -> Vec<RenderTask> {
    let mut seen = HashSet::new();
    let mut selected = Vec::new();

    for mut task in tasks {
        if !seen.insert(task.name.clone()) {
            let err = RasterError::DuplicateTask { task: task.name };
            warn!("{err}");
            report.failures.push(err);
            continue;
        }

        task.outputs.retain(|output| !output.paths.is_empty());
        let has_outputs = if config.skip_existing {
            task.retain_missing_outputs()
        } else {
            !task.outputs.is_empty()
        };
        if !has_outputs {
            info!("{} [no outputs]", task.name);
            report.skipped.push(task.name);
            continue;
        }

        selected.push(task);
    }

    selected
}

/// Runs one batch from composition to fan-out.
fn render_batch<B: RenderBackend + ?Sized>(
    backend: &mut B,
    config: &RenderConfig,
    index: usize,
    batch: Vec<RenderTask>,
    report: &mut RunReport,
) -> Result<(), RasterError> {
    let mut prepared = Vec::with_capacity(batch.len());
    for task in batch {
        let name = task.name.clone();
        match PreparedTask::prepare(task) {
            Ok(p) => {
                info!("{name} [ok]");
                prepared.push(p);
            }
            Err(err) => {
                warn!("{err}");
                report.failures.push(err);
            }
        }
    }
    if prepared.is_empty() {
        debug!("batch {index}: nothing to render");
        return Ok(());
    }

    let mut surface = Surface::compose(&prepared, config.gap);
    debug!(
        "batch {index}: {} tasks on a {}x{} surface",
        surface.tasks().len(),
        surface.width(),
        surface.height()
    );

    backend.compose(&surface).map_err(|e| e.in_batch(index))?;
    let unmeasured = fit(&mut surface, backend).map_err(|e| e.in_batch(index))?;
    report.failures.extend(unmeasured);
    backend.compose(&surface).map_err(|e| e.in_batch(index))?;
    let raster = backend.snapshot().map_err(|e| e.in_batch(index))?;

    if let Some(dir) = &config.debug_dir {
        dump_snapshot(dir, index, &raster);
    }

    let mut cursor = OffsetCursor::new(config.gap);
    let sliced = slice(&raster, surface.tasks(), &mut cursor);
    info!("batch {index}: wrote {} files", sliced.written_count());

    report.batches += 1;
    report.written.extend(sliced.written);
    report.failures.extend(sliced.failures);
    Ok(())
}

fn dump_tasks(dir: &Path, tasks: &[RenderTask]) {
    let result = fs::create_dir_all(dir)
        .map_err(|e| e.to_string())
        .and_then(|()| tasks_to_json_pretty(tasks).map_err(|e| e.to_string()))
        .and_then(|json| fs::write(dir.join("tasks.json"), json).map_err(|e| e.to_string()));
    if let Err(err) = result {
        warn!("failed to dump tasks to {}: {err}", dir.display());
    }
}

fn dump_snapshot(dir: &Path, index: usize, raster: &RgbaImage) {
    let path = dir.join(format!("batch-{index}.png"));
    let result = fs::create_dir_all(dir)
        .map_err(|e| e.to_string())
        .and_then(|()| raster.save(&path).map_err(|e| e.to_string()));
    if let Err(err) = result {
        warn!("failed to dump {}: {err}", path.display());
    }
}
