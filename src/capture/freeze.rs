//! Style freeze plans.
//!
//! The mount script reports the computed style of every descendant of the
//! source element. This module turns that report into the inline patches that
//! pin the clone's appearance, independent of stylesheets, viewport and scroll
//! position.

use crate::color::normalize_color;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Visual properties copied from the original element onto its clone.
pub const STYLE_ALLOW_LIST: &[&str] = &[
    "color",
    "background-color",
    "background-image",
    "background-size",
    "border-color",
    "border-width",
    "border-style",
    "border-radius",
    "font-family",
    "font-size",
    "font-weight",
    "line-height",
    "text-align",
    "width",
    "padding",
    "margin",
    "display",
    "position",
    "flex",
    "flex-direction",
    "gap",
    "justify-content",
    "align-items",
    "opacity",
    "box-shadow",
];

/// Computed style of one descendant, in document order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeStyle {
    pub tag: String,
    #[serde(default)]
    pub props: BTreeMap<String, String>,
    #[serde(default)]
    pub svg: Option<SvgInfo>,
}

/// Geometry of an inline `<svg>` as seen on the original element.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SvgInfo {
    /// `getBBox()` width and height, when the browser could compute it
    #[serde(default)]
    pub bbox: Option<[f64; 2]>,
    #[serde(default)]
    pub has_width: bool,
    #[serde(default)]
    pub has_height: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyleDecl {
    pub name: String,
    pub value: String,
    pub important: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttrDecl {
    pub name: String,
    pub value: String,
}

/// Inline changes for the clone descendant at `index`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StylePatch {
    pub index: usize,
    pub styles: Vec<StyleDecl>,
    pub attrs: Vec<AttrDecl>,
}

impl StylePatch {
    pub fn style(&self, name: &str) -> Option<&StyleDecl> {
        self.styles.iter().find(|d| d.name == name)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }
}

/// Build one patch per reported node.
pub fn freeze_plan(nodes: &[NodeStyle]) -> Vec<StylePatch> {
    nodes
        .iter()
        .enumerate()
        .map(|(index, node)| freeze_node(index, node))
        .collect()
}

fn freeze_node(index: usize, node: &NodeStyle) -> StylePatch {
    let mut styles = Vec::with_capacity(STYLE_ALLOW_LIST.len() + 5);

    for prop in STYLE_ALLOW_LIST {
        let Some(raw) = node.props.get(*prop) else {
            continue;
        };
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let value = if *prop == "position" && matches!(raw, "fixed" | "sticky") {
            "relative".to_string()
        } else {
            normalize_color(raw)
        };
        styles.push(StyleDecl {
            name: (*prop).to_string(),
            value,
            important: true,
        });
    }

    // Let the clone grow to fit its content instead of a viewport-bound height
    for (name, value) in [
        ("height", "auto"),
        ("min-height", "0"),
        ("max-height", "none"),
        ("visibility", "visible"),
    ] {
        styles.push(StyleDecl {
            name: name.to_string(),
            value: value.to_string(),
            important: false,
        });
    }
    if !styles.iter().any(|d| d.name == "display") {
        styles.push(StyleDecl {
            name: "display".to_string(),
            value: "block".to_string(),
            important: false,
        });
    }

    let mut attrs = Vec::new();
    if node.tag.eq_ignore_ascii_case("svg") {
        if let Some((info, [w, h])) = node.svg.as_ref().and_then(|i| i.bbox.map(|b| (i, b))) {
            if !info.has_width && w > 0.0 {
                attrs.push(AttrDecl {
                    name: "width".to_string(),
                    value: format!("{}", w.ceil() as i64),
                });
            }
            if !info.has_height && h > 0.0 {
                attrs.push(AttrDecl {
                    name: "height".to_string(),
                    value: format!("{}", h.ceil() as i64),
                });
            }
        }
    }

    StylePatch {
        index,
        styles,
        attrs,
    }
}
