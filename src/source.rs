//! Vector sources and markup normalization.

use std::fs;
use std::ops::Range;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::RasterError;

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// Where a task's vector markup comes from.
///
/// Serializes as `{ "raw": "<svg>...</svg>" }` or `{ "file": "icons/a.svg" }`.
///
/// # Example
///
/// ```
/// use icon_rasterizer::VectorSource;
///
/// let raw = VectorSource::from_svg("<svg>...</svg>");
/// let file = VectorSource::from_file("icons/json.svg");
/// assert!(raw.is_raw() && file.is_file());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorSource {
    /// Inline SVG markup.
    Raw(String),

    /// Path to an SVG file, read when the task's batch is composed.
    File(PathBuf),
}

impl VectorSource {
    pub fn from_svg(svg: impl Into<String>) -> Self {
        Self::Raw(svg.into())
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }

    /// Returns normalized markup for this source, reading it from disk if needed.
    pub fn load(&self, task: &str) -> Result<String, RasterError> {
        let markup = match self {
            Self::Raw(svg) => svg.clone(),
            Self::File(path) => {
                fs::read_to_string(path).map_err(|source| RasterError::SourceReadFailure {
                    task: task.to_string(),
                    path: path.clone(),
                    source,
                })?
            }
        };
        Ok(normalize_markup(&markup))
    }
}

/// Prepares raw markup for parsing and fitting.
///
/// Adds the SVG (and, when referenced, xlink) namespace declarations to the
/// root `<svg>` element if they are missing; icon-font extractors emit bare
/// fragments like `<svg><path d="..."/></svg>` that an XML parser would not
/// recognize as SVG. When the root declares a `viewBox`, its `width` and
/// `height` are dropped so the viewBox alone defines the canvas.
pub fn normalize_markup(svg: &str) -> String {
    inject_namespaces(&strip_root_size(svg))
}

fn inject_namespaces(svg: &str) -> String {
    let Some((start, end)) = root_tag_span(svg) else {
        return svg.to_string();
    };
    let root_tag = &svg[start..end];

    let mut injected = String::new();
    if !root_tag.contains("xmlns=") {
        injected.push_str(&format!(" xmlns=\"{SVG_NS}\""));
    }
    if svg.contains("xlink:") && !root_tag.contains("xmlns:xlink") {
        injected.push_str(&format!(" xmlns:xlink=\"{XLINK_NS}\""));
    }
    if injected.is_empty() {
        return svg.to_string();
    }

    let insert_at = start + "<svg".len();
    let mut result = String::with_capacity(svg.len() + injected.len());
    result.push_str(&svg[..insert_at]);
    result.push_str(&injected);
    result.push_str(&svg[insert_at..]);
    result
}

/// Removes `width` and `height` from a root element that has a `viewBox`.
fn strip_root_size(svg: &str) -> String {
    let Some((start, end)) = root_tag_span(svg) else {
        return svg.to_string();
    };
    let attrs_at = start + "<svg".len();
    let attrs = root_attributes(&svg[attrs_at..end]);
    if !attrs.iter().any(|(name, _)| *name == "viewBox") {
        return svg.to_string();
    }

    let mut result = String::with_capacity(svg.len());
    let mut copied = 0;
    for (name, range) in &attrs {
        if matches!(*name, "width" | "height") {
            result.push_str(&svg[copied..attrs_at + range.start]);
            copied = attrs_at + range.end;
        }
    }
    result.push_str(&svg[copied..]);
    result
}

/// Splits the inside of a start tag into attributes.
///
/// Each range covers the attribute and the whitespace before it.
fn root_attributes(tag: &str) -> Vec<(&str, Range<usize>)> {
    let bytes = tag.as_bytes();
    let mut attrs = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let lead = i;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let name_start = i;
        while i < bytes.len() && !matches!(bytes[i], b'=' | b'/') && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i == name_start {
            break;
        }
        let name = &tag[name_start..i];

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if bytes.get(i) == Some(&b'=') {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if let Some(&quote @ (b'"' | b'\'')) = bytes.get(i) {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                i = (i + 1).min(bytes.len());
            }
        }
        attrs.push((name, lead..i));
    }

    attrs
}

/// Byte range of the root `<svg ...` start tag, excluding the closing `>`.
fn root_tag_span(svg: &str) -> Option<(usize, usize)> {
    let start = find_root_tag(svg)?;
    let end = svg[start..].find('>').map_or(svg.len(), |i| start + i);
    Some((start, end))
}

/// Byte offset of the root `<svg` start tag.
fn find_root_tag(svg: &str) -> Option<usize> {
    let mut offset = 0;
    while let Some(i) = svg[offset..].find("<svg") {
        let at = offset + i;
        let next = svg[at + 4..].chars().next();
        if matches!(next, Some(c) if c.is_whitespace() || c == '>' || c == '/') {
            return Some(at);
        }
        offset = at + 4;
    }
    None
}

/// Returns whether the root element declares a `viewBox`.
pub fn declares_view_box(svg: &str) -> Result<bool, String> {
    let doc = roxmltree::Document::parse(svg).map_err(|e| e.to_string())?;
    Ok(doc.root_element().attribute("viewBox").is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_injects_namespace() {
        let svg = normalize_markup("<svg viewBox='0 0 24 24'><path d='M0 0h24v24z'/></svg>");
        assert!(svg.starts_with(&format!("<svg xmlns=\"{SVG_NS}\" viewBox")));
        assert!(!svg.contains("xmlns:xlink"));
    }

    #[test]
    fn normalize_leaves_namespaced_markup_alone() {
        let svg = format!(r#"<?xml version="1.0"?><svg xmlns="{SVG_NS}" width="16"/>"#);
        assert_eq!(normalize_markup(&svg), svg);
    }

    #[test]
    fn normalize_adds_xlink_when_used() {
        let svg = normalize_markup(r##"<svg><use xlink:href="#a"/></svg>"##);
        assert!(svg.contains(&format!("xmlns:xlink=\"{XLINK_NS}\"")));
        assert!(declares_view_box(&svg).is_ok());
    }

    #[test]
    fn normalize_skips_prologue() {
        let svg = normalize_markup("<!-- <svgfoo> --><svg><rect/></svg>");
        assert!(svg.contains(&format!("<svg xmlns=\"{SVG_NS}\"><rect/>")));
    }

    #[test]
    fn view_box_replaces_declared_size() {
        let svg = normalize_markup(
            "<svg width='48' height=\"24\" viewBox='0 0 24 24' stroke-width='2'><rect width='24'/></svg>",
        );
        assert_eq!(
            svg,
            format!("<svg xmlns=\"{SVG_NS}\" viewBox='0 0 24 24' stroke-width='2'><rect width='24'/></svg>")
        );

        let sized = normalize_markup("<svg width='48' height='24'/>");
        assert!(sized.contains("width='48' height='24'"));
    }

    #[test]
    fn attribute_ranges_include_leading_whitespace() {
        let attrs = root_attributes(" a='1'  b = \"2\" /");
        let names: Vec<_> = attrs.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(attrs[1].1, 6..15);
    }

    #[test]
    fn view_box_detection() {
        let with = normalize_markup("<svg viewBox='0 0 24 24'/>");
        let without = normalize_markup("<svg width='24' height='24'/>");
        assert_eq!(declares_view_box(&with), Ok(true));
        assert_eq!(declares_view_box(&without), Ok(false));
        assert!(declares_view_box("<svg").is_err());
    }

    #[test]
    fn load_raw_and_file_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("icon.svg");
        std::fs::write(&path, "<svg><rect width='4' height='4'/></svg>").unwrap();

        let loaded = VectorSource::from_file(&path).load("icon").unwrap();
        assert!(loaded.contains("xmlns="));

        let raw = VectorSource::from_svg("<svg/>").load("raw").unwrap();
        assert!(raw.starts_with("<svg xmlns="));
    }

    #[test]
    fn missing_file_is_a_read_failure() {
        let err = VectorSource::from_file("/nonexistent/icon.svg")
            .load("ghost")
            .unwrap_err();
        assert!(matches!(err, RasterError::SourceReadFailure { ref task, .. } if task == "ghost"));
    }

    #[test]
    fn source_serialization() {
        let json = serde_json::to_string(&VectorSource::from_svg("<svg/>")).unwrap();
        assert_eq!(json, r#"{"raw":"<svg/>"}"#);
        let file: VectorSource = serde_json::from_str(r#"{"file":"a.svg"}"#).unwrap();
        assert_eq!(file, VectorSource::from_file("a.svg"));
    }
}
