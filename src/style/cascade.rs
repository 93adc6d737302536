//! Cascade over an author stylesheet producing resolved values

use super::properties::{expand, is_length_like, LONGHANDS};
use super::{ComputedStyle, ComputedStyleSource, StyleMap, Stylesheet};
use crate::dom::{Declaration, Document, NodeId, Specificity};
use std::collections::HashMap;

/// Font size of the root element, used for `rem`
pub const ROOT_FONT_PX: f32 = 16.0;

/// `ComputedStyleSource` backed by a parsed stylesheet
pub struct Cascade<'a> {
    sheet: &'a Stylesheet,
}

impl<'a> Cascade<'a> {
    pub fn new(sheet: &'a Stylesheet) -> Self {
        Self { sheet }
    }

    /// Compute a single element given its parent's computed style
    pub fn compute_element(&self, doc: &Document, id: NodeId, parent: Option<&ComputedStyle>) -> ComputedStyle {
        let Some(el) = doc.element(id) else {
            return ComputedStyle::default();
        };

        let mut specified: HashMap<String, String> = HashMap::new();
        for (name, value) in tag_defaults(&el.tag) {
            for (k, v) in expand(name, value) {
                specified.insert(k, v);
            }
        }

        // (important, inline, specificity, order) orders the cascade
        let mut matched: Vec<((bool, bool, Specificity, usize), &Declaration)> = Vec::new();
        for rule in self.sheet.rules() {
            if let Some(spec) = rule.selectors.matches(doc, id) {
                for d in &rule.declarations {
                    matched.push(((d.important, false, spec, rule.order), d));
                }
            }
        }
        for d in el.style.declarations() {
            matched.push(((d.important, true, Specificity::default(), 0), d));
        }
        matched.sort_by(|a, b| a.0.cmp(&b.0));
        for (_, d) in matched {
            for (k, v) in expand(&d.name, &d.value) {
                specified.insert(k, v);
            }
        }

        let parent_font = parent
            .and_then(|p| p.get("font-size"))
            .and_then(parse_px)
            .unwrap_or(ROOT_FONT_PX);

        let mut out = ComputedStyle::default();
        for def in LONGHANDS {
            let inherited_value = || {
                parent
                    .and_then(|p| p.get(def.name))
                    .map(str::to_string)
                    .unwrap_or_else(|| def.initial.to_string())
            };
            let value = match specified.get(def.name).map(|v| v.trim()) {
                Some(v) if v.eq_ignore_ascii_case("inherit") => inherited_value(),
                Some(v) if v.eq_ignore_ascii_case("initial") => def.initial.to_string(),
                Some(v) if !v.eq_ignore_ascii_case("unset") => v.to_string(),
                _ if def.inherited => inherited_value(),
                _ => def.initial.to_string(),
            };
            let font_px = out.get("font-size").and_then(parse_px).unwrap_or(parent_font);
            let resolved = resolve_value(def.name, &value, font_px, parent_font, parent, &out);
            out.set(def.name, resolved);
        }

        // a border edge without a visible style has no width
        for side in ["top", "right", "bottom", "left"] {
            let style = out.get(&format!("border-{side}-style")).unwrap_or("none").to_string();
            if style == "none" || style == "hidden" {
                let name = match side {
                    "top" => "border-top-width",
                    "right" => "border-right-width",
                    "bottom" => "border-bottom-width",
                    _ => "border-left-width",
                };
                out.set(name, "0px");
            }
        }
        out
    }
}

impl ComputedStyleSource for Cascade<'_> {
    fn compute(&self, doc: &Document, root: NodeId) -> StyleMap {
        let mut chain = Vec::new();
        let mut cur = doc.parent_element(root);
        while let Some(p) = cur {
            chain.push(p);
            cur = doc.parent_element(p);
        }
        let mut parent: Option<ComputedStyle> = None;
        for id in chain.into_iter().rev() {
            parent = Some(self.compute_element(doc, id, parent.as_ref()));
        }

        let mut map = StyleMap::new();
        map.insert(root, self.compute_element(doc, root, parent.as_ref()));
        for id in doc.descendant_elements(root) {
            let style = {
                let parent = doc.parent_element(id).and_then(|p| map.get(&p));
                self.compute_element(doc, id, parent)
            };
            map.insert(id, style);
        }
        map
    }
}

fn resolve_value(
    name: &str,
    value: &str,
    font_px: f32,
    parent_font: f32,
    parent: Option<&ComputedStyle>,
    current: &ComputedStyle,
) -> String {
    match name {
        "font-size" => resolve_font_size(value, parent_font),
        "color" => {
            if value.eq_ignore_ascii_case("currentcolor") {
                parent.and_then(|p| p.get("color")).unwrap_or("rgb(0, 0, 0)").to_string()
            } else {
                value.to_string()
            }
        }
        "font-weight" => resolve_font_weight(value, parent),
        "line-height" => {
            if let Ok(n) = value.parse::<f32>() {
                format_px(n * font_px)
            } else {
                resolve_length(value, font_px)
            }
        }
        n if n.ends_with("-color") => {
            if value.eq_ignore_ascii_case("currentcolor") {
                current.get("color").unwrap_or("rgb(0, 0, 0)").to_string()
            } else {
                value.to_string()
            }
        }
        n if n.starts_with("border-") && n.ends_with("-width") => match value {
            "thin" => "1px".to_string(),
            "medium" => "3px".to_string(),
            "thick" => "5px".to_string(),
            v => resolve_length(v, font_px),
        },
        "letter-spacing" | "width" | "height" | "min-width" | "min-height" | "max-width" | "max-height"
        | "flex-basis" | "row-gap" | "column-gap" => resolve_length(value, font_px),
        n if n.starts_with("padding-") || n.starts_with("margin-") => resolve_length(value, font_px),
        _ => value.to_string(),
    }
}

/// Resolve a single length to px; non-lengths are returned unchanged
pub fn resolve_length(value: &str, font_px: f32) -> String {
    let v = value.trim();
    if v == "0" {
        return "0px".to_string();
    }
    if !is_length_like(v) {
        return v.to_string();
    }
    match length_to_px(v, font_px, ROOT_FONT_PX) {
        Some(px) => format_px(px),
        None => v.to_string(),
    }
}

fn length_to_px(v: &str, font_px: f32, root_px: f32) -> Option<f32> {
    let split = v
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(v.len());
    let n: f32 = v[..split].parse().ok()?;
    let unit = v[split..].to_ascii_lowercase();
    let px = match unit.as_str() {
        "px" => n,
        "pt" => n * 96.0 / 72.0,
        "pc" => n * 16.0,
        "in" => n * 96.0,
        "cm" => n * 96.0 / 2.54,
        "mm" => n * 96.0 / 25.4,
        "q" => n * 96.0 / 101.6,
        "em" => n * font_px,
        "rem" => n * root_px,
        "ex" | "ch" => n * font_px * 0.5,
        _ => return None,
    };
    Some(px)
}

fn resolve_font_size(value: &str, parent_px: f32) -> String {
    let v = value.trim().to_ascii_lowercase();
    let px = match v.as_str() {
        "xx-small" => 9.0,
        "x-small" => 10.0,
        "small" => 13.0,
        "medium" => 16.0,
        "large" => 18.0,
        "x-large" => 24.0,
        "xx-large" => 32.0,
        "xxx-large" => 48.0,
        "smaller" => parent_px / 1.2,
        "larger" => parent_px * 1.2,
        _ => {
            if let Some(pct) = v.strip_suffix('%').and_then(|p| p.parse::<f32>().ok()) {
                parent_px * pct / 100.0
            } else if let Some(px) = length_to_px(&v, parent_px, ROOT_FONT_PX) {
                px
            } else {
                parent_px
            }
        }
    };
    format_px(px)
}

fn resolve_font_weight(value: &str, parent: Option<&ComputedStyle>) -> String {
    let parent_weight = parent
        .and_then(|p| p.get("font-weight"))
        .and_then(|w| w.parse::<u32>().ok())
        .unwrap_or(400);
    match value.trim().to_ascii_lowercase().as_str() {
        "normal" => "400".to_string(),
        "bold" => "700".to_string(),
        "bolder" => match parent_weight {
            0..=349 => "400",
            350..=549 => "700",
            _ => "900",
        }
        .to_string(),
        "lighter" => match parent_weight {
            0..=549 => "100",
            550..=749 => "400",
            _ => "700",
        }
        .to_string(),
        other => other.to_string(),
    }
}

/// Parse a `NNpx` value
pub fn parse_px(v: &str) -> Option<f32> {
    v.trim().strip_suffix("px")?.trim().parse().ok()
}

/// Format px with at most four decimals (`16px`, `21.3333px`)
pub fn format_px(v: f32) -> String {
    let rounded = (v * 10000.0).round() / 10000.0;
    format!("{}px", rounded)
}

// Tag defaults comparable to a browser user-agent sheet
fn tag_defaults(tag: &str) -> Vec<(&'static str, &'static str)> {
    let mut d: Vec<(&'static str, &'static str)> = Vec::new();
    match tag {
        "html" | "body" | "div" | "section" | "header" | "footer" | "article" | "main" | "nav"
        | "aside" | "address" | "figure" | "form" | "dl" | "dd" | "dt" | "details" | "summary" => {
            d.push(("display", "block"))
        }
        "p" => d.extend([("display", "block"), ("margin", "1em 0")]),
        "blockquote" => d.extend([("display", "block"), ("margin", "1em 40px")]),
        "pre" => d.extend([
            ("display", "block"),
            ("margin", "1em 0"),
            ("white-space", "pre"),
            ("font-family", "monospace"),
        ]),
        "hr" => d.extend([
            ("display", "block"),
            ("margin", "0.5em auto"),
            ("border-style", "inset"),
            ("border-width", "1px"),
        ]),
        "ul" | "ol" | "menu" => {
            d.extend([("display", "block"), ("margin", "1em 0"), ("padding-left", "40px")]);
            if tag == "ol" {
                d.push(("list-style-type", "decimal"));
            }
        }
        "li" => d.push(("display", "list-item")),
        "table" => d.extend([("display", "table"), ("border-collapse", "separate")]),
        "thead" => d.push(("display", "table-header-group")),
        "tbody" => d.push(("display", "table-row-group")),
        "tfoot" => d.push(("display", "table-footer-group")),
        "tr" => d.push(("display", "table-row")),
        "td" => d.extend([("display", "table-cell"), ("padding", "1px")]),
        "th" => d.extend([
            ("display", "table-cell"),
            ("padding", "1px"),
            ("font-weight", "bold"),
            ("text-align", "center"),
        ]),
        "b" | "strong" => d.push(("font-weight", "bold")),
        "em" | "i" | "cite" | "var" => d.push(("font-style", "italic")),
        "u" | "ins" => d.push(("text-decoration", "underline")),
        "s" | "del" | "strike" => d.push(("text-decoration", "line-through")),
        "a" => d.push(("text-decoration", "underline")),
        "code" | "kbd" | "samp" => d.push(("font-family", "monospace")),
        "small" => d.push(("font-size", "smaller")),
        "img" => d.push(("display", "inline-block")),
        _ => {}
    }
    if let Some(level) = tag.strip_prefix('h').and_then(|n| n.parse::<u8>().ok()) {
        let (size, margin) = match level {
            1 => ("2em", "0.67em 0"),
            2 => ("1.5em", "0.83em 0"),
            3 => ("1.17em", "1em 0"),
            4 => ("1em", "1.33em 0"),
            5 => ("0.83em", "1.67em 0"),
            _ => ("0.67em", "2.33em 0"),
        };
        if (1..=6).contains(&level) {
            d.extend([("display", "block"), ("font-size", size), ("margin", margin), ("font-weight", "bold")]);
        }
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    fn styles(markup: &str, css: &str) -> (Document, Vec<NodeId>, StyleMap) {
        let mut doc = Document::new();
        let root = doc.root();
        doc.append_markup(root, markup);
        let els = doc.descendant_elements(root);
        let sheet = Stylesheet::parse(css);
        let map = Cascade::new(&sheet).compute(&doc, els[0]);
        (doc, els, map)
    }

    #[test]
    fn specificity_and_order_decide_winner() {
        let (_, els, map) = styles(
            "<div class=\"cv\"><p id=\"x\" class=\"lead\">a</p></div>",
            "p { color: blue } .lead { color: green } #x { color: red } p { color: black }",
        );
        assert_eq!(map[&els[1]].get("color"), Some("red"));
    }

    #[test]
    fn sibling_and_structural_rules_apply() {
        let (_, els, map) = styles(
            "<div><h1>a</h1><p>b</p><ul><li>x</li><li>y</li></ul></div>",
            "h1 + p { color: red } li:first-child { font-weight: 700 } p { margin: 0 } li:hover { color: blue }",
        );
        assert_eq!(map[&els[2]].get("color"), Some("red"));
        assert_eq!(map[&els[2]].get("margin-top"), Some("0px"));
        assert_eq!(map[&els[4]].get("font-weight"), Some("700"));
        assert_eq!(map[&els[5]].get("font-weight"), Some("400"));
        assert_eq!(map[&els[5]].get("color"), Some("rgb(0, 0, 0)"));
    }

    #[test]
    fn important_beats_inline_and_inline_beats_rules() {
        let (_, els, map) = styles(
            "<div><p style=\"color: purple; margin-top: 2px\">a</p><span style=\"color: teal\">b</span></div>",
            "p { color: red !important; margin-top: 9px } #y span { color: olive }",
        );
        assert_eq!(map[&els[1]].get("color"), Some("red"));
        assert_eq!(map[&els[1]].get("margin-top"), Some("2px"));
        assert_eq!(map[&els[2]].get("color"), Some("teal"));
    }

    #[test]
    fn inheritance_and_relative_units() {
        let (_, els, map) = styles(
            "<div><h1>Name</h1><p>body</p></div>",
            "div { font-size: 12pt; color: #333; font-family: Inter, sans-serif; line-height: 1.5 }",
        );
        let div = &map[&els[0]];
        assert_eq!(div.get("font-size"), Some("16px"));
        assert_eq!(div.get("line-height"), Some("24px"));
        let h1 = &map[&els[1]];
        assert_eq!(h1.get("font-size"), Some("32px"));
        assert_eq!(h1.get("font-weight"), Some("700"));
        assert_eq!(h1.get("margin-top"), Some("21.44px"));
        assert_eq!(h1.get("color"), Some("#333"));
        assert_eq!(h1.get("font-family"), Some("Inter, sans-serif"));
        // computed line-height inherits as a length
        assert_eq!(h1.get("line-height"), Some("24px"));
        // non-inherited properties reset
        assert_eq!(map[&els[2]].get("display"), Some("block"));
        assert_eq!(map[&els[2]].get("background-color"), Some("rgba(0, 0, 0, 0)"));
    }

    #[test]
    fn borders_resolve_widths_and_current_color() {
        let (_, els, map) = styles(
            "<div><p>a</p></div>",
            "div { color: navy; border-bottom: thin solid; border-top-width: 4px }",
        );
        let div = &map[&els[0]];
        assert_eq!(div.get("border-bottom-width"), Some("1px"));
        assert_eq!(div.get("border-bottom-color"), Some("navy"));
        // a width without a style collapses to zero
        assert_eq!(div.get("border-top-width"), Some("0px"));
        assert_eq!(div.get("border-left-width"), Some("0px"));
    }

    #[test]
    fn inherit_and_initial_keywords() {
        let (_, els, map) = styles(
            "<div><p>a</p></div>",
            "div { padding-left: 1cm; color: red } p { padding-left: inherit; color: initial }",
        );
        assert_eq!(map[&els[1]].get("padding-left"), Some("37.7953px"));
        assert_eq!(map[&els[1]].get("color"), Some("rgb(0, 0, 0)"));
    }

    #[test]
    fn format_px_trims_trailing_zeros() {
        assert_eq!(format_px(16.0), "16px");
        assert_eq!(format_px(1.0 / 3.0), "0.3333px");
        assert_eq!(resolve_length("auto", 16.0), "auto");
        assert_eq!(resolve_length("50%", 16.0), "50%");
    }
}
