// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Vector normalization — rewrite SVG markup into one standard form regardless
// of which editor generation wrote it.
//
// The heavy lifting is done by an oracle that parses markup into a resolved
// tree and serializes that tree back out. The default oracle is usvg, which
// resolves styles, `use` references and shape primitives into plain paths.
// Legacy (version-2 editor) markup gets a small fixup pass first because usvg
// refuses documents outside the SVG namespace and the old editor's font names
// are not available in the current one. Text runs bypass the path resolution
// and are carried through as markup (see `text`).

mod text;

use std::borrow::Cow;

use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::types::Dialect;
use quick_xml::events::{BytesStart, Event};
use quick_xml::events::attributes::Attribute;
use quick_xml::{Reader, Writer};
use tracing::{debug, instrument};

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// Font families shipped with the version-2 editor, mapped to the names the
/// current editor gives the same typefaces.
const LEGACY_FONTS: &[(&str, &str)] = &[
    ("Helvetica", "Sans Serif"),
    ("Donegal", "Serif"),
    ("Gloria", "Handwriting"),
    ("Marker", "Marker"),
    ("Mystery", "Curly"),
    ("Scratch", "Scratch"),
];

/// Parser/serializer pair that defines what "normalized" markup is.
pub trait VectorOracle: Send + Sync {
    /// Resolved document tree.
    type Tree;

    /// Parse markup written in `dialect`.
    fn parse(&self, markup: &str, dialect: Dialect) -> Result<Self::Tree>;

    /// Serialize a resolved tree back to markup.
    fn serialize(&self, tree: &Self::Tree) -> String;
}

/// A parsed document: the usvg tree of everything but text, plus the text
/// runs lifted out of it.
#[derive(Debug)]
pub struct UsvgDocument {
    tree: usvg::Tree,
    text_runs: Vec<String>,
}

impl UsvgDocument {
    pub fn tree(&self) -> &usvg::Tree {
        &self.tree
    }

    /// Self-contained `<text>` elements, in document order.
    pub fn text_runs(&self) -> &[String] {
        &self.text_runs
    }
}

/// usvg-backed oracle.
#[derive(Debug, Clone, Copy)]
pub struct UsvgOracle {
    dpi: f32,
}

impl UsvgOracle {
    pub fn new(dpi: f32) -> Self {
        Self { dpi }
    }
}

impl Default for UsvgOracle {
    fn default() -> Self {
        Self::new(96.0)
    }
}

impl VectorOracle for UsvgOracle {
    type Tree = UsvgDocument;

    fn parse(&self, markup: &str, dialect: Dialect) -> Result<UsvgDocument> {
        let markup = match dialect {
            Dialect::Legacy => Cow::Owned(fix_legacy_markup(markup)?),
            Dialect::Current => Cow::Borrowed(markup),
        };
        let (shapes, text_runs) = text::split(&markup)?;
        let options = usvg::Options {
            dpi: self.dpi,
            ..Default::default()
        };
        let tree = usvg::Tree::from_str(&shapes, &options)
            .map_err(|err| BildwerkError::MalformedVector(err.to_string()))?;
        Ok(UsvgDocument { tree, text_runs })
    }

    fn serialize(&self, document: &UsvgDocument) -> String {
        let shapes = document.tree.to_string(&usvg::WriteOptions::default());
        text::splice(shapes, &document.text_runs)
    }
}

/// Dialect-compatibility rewrite of vector markup.
///
/// Visual semantics are preserved; only the representation changes.
#[derive(Debug, Clone, Default)]
pub struct VectorNormalizer<O = UsvgOracle> {
    oracle: O,
}

impl<O: VectorOracle> VectorNormalizer<O> {
    pub fn new(oracle: O) -> Self {
        Self { oracle }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Parse `markup` with the oracle configured for `dialect` and return the
    /// serialized normalized tree.
    #[instrument(skip(self, markup), fields(len = markup.len()))]
    pub fn normalize(&self, markup: &str, dialect: Dialect) -> Result<String> {
        let tree = self.oracle.parse(markup, dialect)?;
        let normalized = self.oracle.serialize(&tree);
        debug!(normalized_len = normalized.len(), "Vector markup normalized");
        Ok(normalized)
    }
}

/// Bring version-2 markup up to what the parser accepts: bind the root
/// element to the SVG namespace and replace the old editor's font names.
pub fn fix_legacy_markup(markup: &str) -> Result<String> {
    let needs_xlink = markup.contains("xlink:");
    let mut reader = Reader::from_str(markup);
    let mut writer = Writer::new(Vec::with_capacity(markup.len() + 64));
    let mut seen_root = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| BildwerkError::MalformedVector(err.to_string()))?;
        let event = match event {
            Event::Eof => break,
            Event::Start(element) => {
                let is_root = !seen_root;
                seen_root = true;
                Event::Start(fix_element(element, is_root, needs_xlink)?)
            }
            Event::Empty(element) => {
                let is_root = !seen_root;
                seen_root = true;
                Event::Empty(fix_element(element, is_root, needs_xlink)?)
            }
            other => other,
        };
        writer
            .write_event(event)
            .map_err(|err| BildwerkError::MalformedVector(err.to_string()))?;
    }

    String::from_utf8(writer.into_inner())
        .map_err(|err| BildwerkError::MalformedVector(err.to_string()))
}

fn fix_element(
    element: BytesStart<'_>,
    is_root: bool,
    needs_xlink: bool,
) -> Result<BytesStart<'_>> {
    let attributes = element
        .attributes()
        .collect::<std::result::Result<Vec<Attribute<'_>>, _>>()
        .map_err(|err| BildwerkError::MalformedVector(err.to_string()))?;

    let has = |key: &[u8]| attributes.iter().any(|attr| attr.key.as_ref() == key);
    let add_svg_ns = is_root && !has(b"xmlns");
    let add_xlink_ns = is_root && needs_xlink && !has(b"xmlns:xlink");
    let font = attributes
        .iter()
        .find(|attr| attr.key.as_ref() == b"font-family")
        .and_then(|attr| current_font(&String::from_utf8_lossy(&attr.value)));

    if !add_svg_ns && !add_xlink_ns && font.is_none() {
        drop(attributes);
        return Ok(element);
    }

    let mut fixed = element.clone().into_owned();
    fixed.clear_attributes();
    if add_svg_ns {
        fixed.push_attribute(("xmlns", SVG_NS));
    }
    if add_xlink_ns {
        fixed.push_attribute(("xmlns:xlink", XLINK_NS));
    }
    for attr in attributes {
        match font {
            Some(current) if attr.key.as_ref() == b"font-family" => {
                fixed.push_attribute(("font-family", current));
            }
            _ => fixed.push_attribute(attr),
        }
    }
    Ok(fixed)
}

/// Current editor's name for a legacy font, if the value names one.
fn current_font(family: &str) -> Option<&'static str> {
    let family = family.trim().trim_matches(|c| c == '\'' || c == '"');
    LEGACY_FONTS
        .iter()
        .find(|(legacy, _)| legacy.eq_ignore_ascii_case(family))
        .map(|(_, current)| *current)
}
