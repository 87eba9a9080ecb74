//! icon-rasterizer: batch rasterization of vector icons into PNG files
//!
//! Each task names a vector source, a logical size, and one or more output
//! specs (scale, padding, CSS override, destination paths). Tasks are
//! rendered in batches: every batch is composed on a single surface,
//! fitted to its sources' bounds, captured once, and sliced back into
//! per-output PNGs. Additional paths of an output receive byte-identical
//! copies of the first.
//!
//! # Example
//!
//! ```no_run
//! use icon_rasterizer::{OutputSpec, RenderConfig, RenderTask, VectorSource, render_tasks};
//!
//! let task = RenderTask::new("json", VectorSource::from_file("icons/json.svg"), 16.0, 16.0)
//!     .with_output(OutputSpec::new(1.0, ["out/dark/json.png", "out/light/json.png"]).with_css("fill:#fff"))
//!     .with_output(OutputSpec::new(2.0, ["out/dark/json@2x.png"]).with_css("fill:#fff"));
//!
//! let report = render_tasks(vec![task], RenderConfig::default()).unwrap();
//! for failure in &report.failures {
//!     eprintln!("{failure}");
//! }
//! ```
//!
//! # Task Lists
//!
//! Tasks and run settings are serde types, so task lists can be kept as
//! JSON next to the icons they describe:
//!
//! ```
//! use icon_rasterizer::{RenderConfig, tasks_from_json};
//!
//! let tasks = tasks_from_json(r#"[{
//!     "name": "json",
//!     "input": { "content": { "raw": "<svg viewBox='0 0 24 24'/>" }, "width": 16 },
//!     "outputs": [{ "scale": 2, "padding": "1 2", "paths": ["json@2x.png"] }]
//! }]"#).unwrap();
//! assert_eq!(tasks[0].input.height, None);
//!
//! let config = RenderConfig::from_json(r#"{ "batchSize": 25 }"#).unwrap();
//! assert_eq!(config.batch_size, 25);
//! ```
//!
//! # Backends
//!
//! Composition, measurement and capture go through [`RenderBackend`].
//! [`ResvgBackend`] renders with resvg; [`Rasterizer`] accepts any
//! implementation.

pub mod backend;
mod config;
mod error;
pub mod fit;
mod geometry;
mod pipeline;
pub mod slice;
mod source;
pub mod surface;
mod task;

pub use backend::{Measurement, RenderBackend, ResvgBackend};
pub use config::{DEFAULT_BATCH_SIZE, DEFAULT_GAP, RenderConfig};
pub use error::RasterError;
pub use geometry::{BoxSize, DimensionError, Geometry, Padding, RectF, RectPx, SizePx};
pub use pipeline::{Rasterizer, RunAborted, RunReport, render_tasks};
pub use source::VectorSource;
pub use task::{OutputSpec, RenderTask, TaskInput, tasks_from_json, tasks_to_json_pretty};
