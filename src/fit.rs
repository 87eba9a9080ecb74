//! Bounds fitting.
//!
//! Sources come in arbitrary coordinate systems: icon-font glyphs with huge
//! em boxes, files with a viewBox, fragments with neither. The fitter
//! measures every task's input region once and gives all of that task's
//! output regions the same frame, so the content fills the inner box without
//! distortion.

use log::{debug, warn};

use crate::backend::{Measurement, RenderBackend};
use crate::error::RasterError;
use crate::geometry::RectF;
use crate::surface::Surface;

/// Picks the source rectangle that outputs are fitted to.
///
/// The declared viewport wins when the source has an explicit viewBox and
/// trimming is off; otherwise the measured content bounds are used. Falls
/// back to whichever is non-empty.
pub fn choose_frame(measurement: &Measurement, trim: bool) -> Option<RectF> {
    let (preferred, fallback) = if trim || !measurement.declares_view_box {
        (measurement.bounds, measurement.viewport)
    } else {
        (measurement.viewport, measurement.bounds)
    };
    [preferred, fallback].into_iter().find(|r| !r.is_empty())
}

/// Measures every task on the surface and assigns frames to its outputs.
///
/// The surface must already be composed on `backend`. Tasks whose input
/// cannot be measured are failed and returned; render failures abort.
pub fn fit<B: RenderBackend + ?Sized>(
    surface: &mut Surface,
    backend: &mut B,
) -> Result<Vec<RasterError>, RasterError> {
    let mut failures = Vec::new();

    for index in 0..surface.tasks().len() {
        let task = &surface.tasks()[index];
        let (name, trim, input) = (task.name.clone(), task.trim, task.input.clone());
        let outputs: Vec<_> = task.outputs.iter().map(|o| o.region.clone()).collect();

        let measurement = match backend.measure_bounding_box(&input) {
            Ok(m) => m,
            Err(err) if err.is_batch_fatal() => return Err(err),
            Err(err) => {
                warn!("{name} [unmeasurable]: {err}");
                surface.fail_task(index);
                failures.push(err);
                continue;
            }
        };

        let frame = choose_frame(&measurement, trim);
        match frame {
            Some(f) => debug!(
                "{name}: frame {} {} {} {}",
                f.x, f.y, f.width, f.height
            ),
            None => warn!("{name}: source has no visible content"),
        }

        for id in &outputs {
            if let Some(region) = surface.region_mut(id) {
                region.frame = frame;
            }
        }
        if let Some(region) = surface.region_mut(&input) {
            region.hidden = true;
        }
    }

    Ok(failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ResvgBackend;
    use crate::source::VectorSource;
    use crate::surface::{PreparedTask, RegionId};
    use crate::task::{OutputSpec, RenderTask};
    use image::RgbaImage;
    use std::collections::HashMap;

    fn measurement(declares_view_box: bool) -> Measurement {
        Measurement {
            bounds: RectF::new(4.0, 4.0, 16.0, 8.0),
            viewport: RectF::new(0.0, 0.0, 24.0, 24.0),
            declares_view_box,
        }
    }

    #[test]
    fn viewport_wins_only_without_trim() {
        let m = measurement(true);
        assert_eq!(choose_frame(&m, false), Some(m.viewport));
        assert_eq!(choose_frame(&m, true), Some(m.bounds));
        assert_eq!(choose_frame(&measurement(false), false), Some(m.bounds));
    }

    #[test]
    fn empty_frames_fall_back() {
        let mut m = measurement(false);
        m.bounds = RectF::default();
        assert_eq!(choose_frame(&m, true), Some(m.viewport));
        m.viewport = RectF::default();
        assert_eq!(choose_frame(&m, true), None);
    }

    /// Serves canned measurements keyed by task name.
    struct CannedBackend {
        surface: Option<Surface>,
        by_task: HashMap<String, Result<Measurement, ()>>,
    }

    impl RenderBackend for CannedBackend {
        fn compose(&mut self, surface: &Surface) -> Result<(), RasterError> {
            self.surface = Some(surface.clone());
            Ok(())
        }

        fn measure_bounding_box(&mut self, region: &RegionId) -> Result<Measurement, RasterError> {
            let surface = self.surface.as_ref().unwrap();
            let task = &surface.tasks()[surface.region(region).unwrap().task].name;
            match &self.by_task[task] {
                Ok(m) => Ok(*m),
                Err(()) => Err(RasterError::InvalidSource {
                    task: task.clone(),
                    reason: "canned".into(),
                }),
            }
        }

        fn snapshot(&mut self) -> Result<RgbaImage, RasterError> {
            Ok(RgbaImage::new(1, 1))
        }
    }

    fn prepared(name: &str, trim: bool) -> PreparedTask {
        let task = RenderTask::new(name, VectorSource::from_svg("<svg/>"), 16.0, 16.0)
            .with_trim(trim)
            .with_output(OutputSpec::new(1.0, [format!("{name}.png")]))
            .with_output(OutputSpec::new(2.0, [format!("{name}@2x.png")]));
        PreparedTask::prepare(task).unwrap()
    }

    #[test]
    fn frames_propagate_to_every_output_and_failures_are_isolated() {
        let mut surface = Surface::compose(&[prepared("ok", true), prepared("bad", false)], 4);
        let mut backend = CannedBackend {
            surface: None,
            by_task: HashMap::from([
                ("ok".to_string(), Ok(measurement(true))),
                ("bad".to_string(), Err(())),
            ]),
        };
        backend.compose(&surface).unwrap();

        let failures = fit(&mut surface, &mut backend).unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].task(), Some("bad"));

        let ok = &surface.tasks()[0];
        for output in &ok.outputs {
            let region = surface.region(&output.region).unwrap();
            assert_eq!(region.frame, Some(RectF::new(4.0, 4.0, 16.0, 8.0)));
        }
        assert!(surface.region(&ok.input).unwrap().hidden);
        assert!(surface.tasks()[1].failed);
        assert_eq!(surface.visible_outputs().count(), 2);
    }

    #[test]
    fn declared_view_box_is_kept_without_trim() {
        let svg = "<svg viewBox='0 0 24 12'><rect x='10' y='2' width='4' height='4'/></svg>";
        let task = RenderTask::new("vb", VectorSource::from_svg(svg), 16.0, 16.0)
            .with_output(OutputSpec::new(1.0, ["vb.png"]));
        let mut surface = Surface::compose(&[PreparedTask::prepare(task).unwrap()], 0);
        let mut backend = ResvgBackend::new();
        backend.compose(&surface).unwrap();

        fit(&mut surface, &mut backend).unwrap();

        let id = &surface.tasks()[0].outputs[0].region;
        let frame = surface.region(id).unwrap().frame.unwrap();
        assert_eq!(frame.width / frame.height, 2.0);
    }

    #[test]
    fn declared_size_does_not_distort_the_view_box_frame() {
        let svg = "<svg width='48' height='24' viewBox='0 0 24 24'><rect width='24' height='24'/></svg>";
        let task = RenderTask::new("wide", VectorSource::from_svg(svg), 16.0, 16.0)
            .with_output(OutputSpec::new(1.0, ["wide.png"]));
        let mut surface = Surface::compose(&[PreparedTask::prepare(task).unwrap()], 0);
        let mut backend = ResvgBackend::new();
        backend.compose(&surface).unwrap();

        fit(&mut surface, &mut backend).unwrap();

        let id = &surface.tasks()[0].outputs[0].region;
        let frame = surface.region(id).unwrap().frame.unwrap();
        assert_eq!(frame, RectF::new(0.0, 0.0, 24.0, 24.0));
    }
}
