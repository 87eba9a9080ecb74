//! Render tasks handed to the pipeline by upstream metadata resolution.
//!
//! A task names one icon, its vector source, and every output it must
//! produce. Tasks serialize to camelCase JSON:
//!
//! ```json
//! {
//!   "name": "json",
//!   "input": { "content": { "raw": "<svg viewBox='0 0 24 24'>...</svg>" }, "width": 16, "height": 16 },
//!   "outputs": [ { "scale": 1, "css": "fill:#000", "paths": ["out/json.png"] } ]
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::RasterError;
use crate::geometry::{DimensionError, Geometry, Padding};
use crate::source::VectorSource;

/// One icon to rasterize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderTask {
    /// Unique name within a run; used for scoping and diagnostics.
    pub name: String,
    pub input: TaskInput,
    pub outputs: Vec<OutputSpec>,
}

/// The vector source of a task and its declared box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    pub content: VectorSource,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,

    /// Fit outputs to the measured content bounds even when the source
    /// declares a viewBox.
    #[serde(default)]
    pub trim: bool,
}

/// One (scale, style, destinations) combination for a task.
///
/// All paths receive byte-identical content: the first is rendered, the rest
/// are copies of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSpec {
    #[serde(default = "default_scale")]
    pub scale: f32,

    #[serde(default)]
    pub padding: Padding,

    /// Style override, either declarations (`fill:#000`) or full CSS rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,

    pub paths: Vec<PathBuf>,
}

fn default_scale() -> f32 {
    1.0
}

impl RenderTask {
    /// Creates a task with no outputs.
    pub fn new(name: impl Into<String>, content: VectorSource, width: f32, height: f32) -> Self {
        Self {
            name: name.into(),
            input: TaskInput {
                content,
                width: Some(width),
                height: Some(height),
                trim: false,
            },
            outputs: Vec::new(),
        }
    }

    /// Sets the trim flag.
    pub fn with_trim(mut self, trim: bool) -> Self {
        self.input.trim = trim;
        self
    }

    /// Appends an output spec.
    pub fn with_output(mut self, output: OutputSpec) -> Self {
        self.outputs.push(output);
        self
    }

    /// Resolves the geometry of every output, in order.
    pub fn geometries(&self) -> Result<Vec<Geometry>, RasterError> {
        self.outputs
            .iter()
            .map(|output| {
                output
                    .geometry(&self.input)
                    .map_err(|err| RasterError::InvalidDimension {
                        task: self.name.clone(),
                        reason: err.to_string(),
                    })
            })
            .collect()
    }

    /// Drops destination paths that already exist, then any output spec
    /// left without destinations.
    ///
    /// Returns true if the task still has something to write.
    pub fn retain_missing_outputs(&mut self) -> bool {
        for output in &mut self.outputs {
            output.paths.retain(|path| !path.exists());
        }
        self.outputs.retain(|output| !output.paths.is_empty());
        !self.outputs.is_empty()
    }
}

impl OutputSpec {
    pub fn new<P: Into<PathBuf>>(scale: f32, paths: impl IntoIterator<Item = P>) -> Self {
        Self {
            scale,
            padding: Padding::default(),
            css: None,
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_css(mut self, css: impl Into<String>) -> Self {
        self.css = Some(css.into());
        self
    }

    pub fn with_padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    /// The path that is actually rendered; the others are copies of it.
    pub fn primary_path(&self) -> Option<&Path> {
        self.paths.first().map(PathBuf::as_path)
    }

    /// Resolves this output's geometry against the task's declared box.
    pub fn geometry(&self, input: &TaskInput) -> Result<Geometry, DimensionError> {
        Geometry::resolve(input.width, input.height, self.padding, self.scale)
    }
}

/// Parses a JSON array of tasks.
pub fn tasks_from_json(json: &str) -> Result<Vec<RenderTask>, RasterError> {
    Ok(serde_json::from_str(json)?)
}

/// Serializes tasks to pretty-printed JSON.
pub fn tasks_to_json_pretty(tasks: &[RenderTask]) -> Result<String, RasterError> {
    Ok(serde_json::to_string_pretty(tasks)?)
}
