// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text runs — `<text>` elements lifted out of a document before the oracle
// flattens it, and spliced back into the serialized result.
//
// The oracle resolves the document into paths, but turning glyphs into
// outlines needs the exact fonts the editor rendered with. Text is therefore
// carried through as markup. Everything a run inherits from its ancestors
// (their transforms, the root viewBox mapping, inheritable presentation
// attributes) is folded onto the `<text>` element itself so the run renders
// the same at the top level of the output.
//
// `style` declarations on ancestors are not folded.

use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};

use bildwerk_core::error::{BildwerkError, Result};

use super::XLINK_NS;

/// Presentation attributes a `<text>` element inherits from its ancestors.
const INHERITED: &[&str] = &[
    "fill",
    "fill-opacity",
    "fill-rule",
    "stroke",
    "stroke-opacity",
    "stroke-width",
    "font-family",
    "font-size",
    "font-style",
    "font-weight",
    "letter-spacing",
    "text-anchor",
    "visibility",
];

/// Containers whose children are never rendered in place.
const NON_RENDERING: &[&[u8]] = &[
    b"defs",
    b"clipPath",
    b"mask",
    b"pattern",
    b"symbol",
    b"marker",
];

/// What an element passes down to its descendants.
#[derive(Debug, Clone, Default)]
struct Scope {
    /// Accumulated transform list, outermost first.
    transform: Vec<String>,
    /// Effective value for each entry of `INHERITED`, raw (still escaped).
    inherited: Vec<Option<String>>,
    non_rendering: bool,
}

impl Scope {
    fn root() -> Self {
        Self {
            inherited: vec![None; INHERITED.len()],
            ..Self::default()
        }
    }

    fn enter(&self, element: &BytesStart<'_>, is_root: bool) -> Result<Self> {
        let attributes = collect_attributes(element)?;
        let mut scope = self.clone();

        let own_transform = if is_root {
            viewbox_transform(&attributes)
        } else {
            raw_value(&attributes, b"transform")
        };
        scope.transform.extend(own_transform);

        for (slot, name) in scope.inherited.iter_mut().zip(INHERITED) {
            if let Some(value) = raw_value(&attributes, name.as_bytes()) {
                *slot = Some(value);
            }
        }
        scope.non_rendering |= NON_RENDERING.contains(&element.local_name().as_ref());
        Ok(scope)
    }

    /// Rewrite a `<text>` start tag so it no longer depends on this scope.
    fn detach(&self, element: BytesStart<'_>) -> Result<BytesStart<'static>> {
        let attributes = collect_attributes(&element)?;
        let own_transform = raw_value(&attributes, b"transform");
        let missing: Vec<(&str, &str)> = INHERITED
            .iter()
            .zip(&self.inherited)
            .filter_map(|(name, value)| Some((*name, value.as_deref()?)))
            .filter(|(name, _)| raw_value(&attributes, name.as_bytes()).is_none())
            .collect();

        if self.transform.is_empty() && missing.is_empty() {
            drop(attributes);
            return Ok(element.into_owned());
        }

        let mut transform = self.transform.clone();
        transform.extend(own_transform);
        let transform = transform.join(" ");

        let mut detached = element.clone().into_owned();
        detached.clear_attributes();
        for attr in attributes {
            if attr.key.as_ref() != b"transform" {
                detached.push_attribute(attr);
            }
        }
        for (name, value) in missing {
            detached.push_attribute(raw_attribute(name, value));
        }
        if !transform.is_empty() {
            detached.push_attribute(raw_attribute("transform", &transform));
        }
        Ok(detached)
    }
}

/// A `<text>` element being copied out of the document.
struct Capture {
    writer: Writer<Vec<u8>>,
    depth: usize,
}

/// Remove every rendered `<text>` element from `markup`.
///
/// Returns the remaining markup and the detached runs in document order.
pub(super) fn split(markup: &str) -> Result<(String, Vec<String>)> {
    let mut reader = Reader::from_str(markup);
    let mut rest = Writer::new(Vec::with_capacity(markup.len()));
    let mut runs = Vec::new();
    let root = Scope::root();
    let mut scopes: Vec<Scope> = Vec::new();
    let mut capture: Option<Capture> = None;

    loop {
        let event = reader.read_event().map_err(malformed)?;
        if matches!(event, Event::Eof) {
            break;
        }

        if let Some(active) = capture.as_mut() {
            match &event {
                Event::Start(_) => active.depth += 1,
                Event::End(_) => active.depth -= 1,
                _ => {}
            }
            active.writer.write_event(event).map_err(malformed)?;
            if let Some(done) = capture.take_if(|active| active.depth == 0) {
                runs.push(into_string(done.writer)?);
            }
            continue;
        }

        let is_root = scopes.is_empty();
        let scope = scopes.last().unwrap_or(&root);
        match event {
            Event::Start(element) if is_text(&element) && !scope.non_rendering => {
                let mut writer = Writer::new(Vec::new());
                writer
                    .write_event(Event::Start(scope.detach(element)?))
                    .map_err(malformed)?;
                capture = Some(Capture { writer, depth: 1 });
            }
            Event::Empty(element) if is_text(&element) && !scope.non_rendering => {
                let mut writer = Writer::new(Vec::new());
                writer
                    .write_event(Event::Empty(scope.detach(element)?))
                    .map_err(malformed)?;
                runs.push(into_string(writer)?);
            }
            Event::Start(element) => {
                let entered = scope.enter(&element, is_root)?;
                scopes.push(entered);
                rest.write_event(Event::Start(element)).map_err(malformed)?;
            }
            Event::End(element) => {
                scopes.pop();
                rest.write_event(Event::End(element)).map_err(malformed)?;
            }
            other => rest.write_event(other).map_err(malformed)?,
        }
    }

    Ok((into_string(rest)?, runs))
}

/// Insert `runs` as the last children of the serialized root element.
pub(super) fn splice(serialized: String, runs: &[String]) -> String {
    if runs.is_empty() {
        return serialized;
    }

    let trimmed = serialized.trim_end();
    let tail = &serialized[trimmed.len()..];
    let mut body = if let Some(head) = trimmed.strip_suffix("</svg>") {
        head.to_string()
    } else if let Some(head) = trimmed.strip_suffix("/>") {
        format!("{head}>\n")
    } else {
        trimmed.to_string()
    };

    if runs.iter().any(|run| run.contains("xlink:")) && !body.contains("xmlns:xlink") {
        body = body.replacen("<svg", &format!("<svg xmlns:xlink=\"{XLINK_NS}\""), 1);
    }
    for run in runs {
        body.push_str(run);
        body.push('\n');
    }
    format!("{body}</svg>{tail}")
}

/// Root viewBox mapping onto the viewport, as a `matrix(...)` transform.
///
/// Honors `preserveAspectRatio="none"`; every other value is treated as the
/// default `xMidYMid meet`.
fn viewbox_transform(attributes: &[Attribute<'_>]) -> Option<String> {
    let view_box = raw_value(attributes, b"viewBox")?;
    let numbers = view_box
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(str::parse::<f64>)
        .collect::<std::result::Result<Vec<f64>, _>>()
        .ok()?;
    let &[vx, vy, vw, vh] = numbers.as_slice() else {
        return None;
    };
    if vw <= 0.0 || vh <= 0.0 {
        return None;
    }

    let width = raw_value(attributes, b"width")
        .and_then(|value| parse_length(&value))
        .unwrap_or(vw);
    let height = raw_value(attributes, b"height")
        .and_then(|value| parse_length(&value))
        .unwrap_or(vh);
    let stretch = raw_value(attributes, b"preserveAspectRatio")
        .is_some_and(|value| value.trim_start().starts_with("none"));

    let (sx, sy, tx, ty) = if stretch {
        let (sx, sy) = (width / vw, height / vh);
        (sx, sy, 0.0 - vx * sx, 0.0 - vy * sy)
    } else {
        let s = (width / vw).min(height / vh);
        (s, s, (width - vw * s) / 2.0 - vx * s, (height - vh * s) / 2.0 - vy * s)
    };
    if (sx, sy, tx, ty) == (1.0, 1.0, 0.0, 0.0) {
        return None;
    }
    Some(format!("matrix({sx} 0 0 {sy} {tx} {ty})"))
}

/// Absolute length in user units; percentages and font-relative units are
/// not resolved.
fn parse_length(value: &str) -> Option<f64> {
    let value = value.trim();
    value.strip_suffix("px").unwrap_or(value).trim().parse().ok()
}

fn is_text(element: &BytesStart<'_>) -> bool {
    element.local_name().as_ref() == b"text"
}

fn collect_attributes<'a>(element: &'a BytesStart<'_>) -> Result<Vec<Attribute<'a>>> {
    element
        .attributes()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(malformed)
}

fn raw_value(attributes: &[Attribute<'_>], key: &[u8]) -> Option<String> {
    attributes
        .iter()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

/// Attribute whose value is written exactly as given.
fn raw_attribute<'a>(name: &'a str, value: &'a str) -> Attribute<'a> {
    Attribute {
        key: QName(name.as_bytes()),
        value: value.as_bytes().into(),
    }
}

fn into_string(writer: Writer<Vec<u8>>) -> Result<String> {
    String::from_utf8(writer.into_inner()).map_err(malformed)
}

fn malformed(err: impl std::fmt::Display) -> BildwerkError {
    BildwerkError::MalformedVector(err.to_string())
}
