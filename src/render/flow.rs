//! Reference engine: block-flow text layout written straight to PDF
//!
//! `FlowEngine` lays a materialized clone out as stacked blocks of wrapped
//! text using the inline styles the materializer wrote, scales the root width
//! onto the printable page width and paginates onto the requested format.
//! Glyph metrics are approximated from the font size, text is set in the
//! standard Helvetica faces.

use super::{RenderEngine, RenderInput, RenderOptions};
use crate::dom::{Document, InlineStyle, NodeData, NodeId};
use crate::style::cascade::{parse_px, resolve_length, ROOT_FONT_PX};
use crate::{Error, PageFormat, Result};
use futures::future::BoxFuture;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, Stream, StringFormat};

const PT_PER_MM: f32 = 72.0 / 25.4;

const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "br", "code", "em", "i", "label", "small", "span", "strong", "sub", "sup", "u",
];

#[derive(Debug, Default, Clone)]
pub struct FlowEngine;

impl FlowEngine {
    pub fn new() -> Self {
        Self
    }
}

impl RenderEngine for FlowEngine {
    fn render(&self, input: RenderInput) -> BoxFuture<'_, Result<Vec<u8>>> {
        Box::pin(async move { render_pdf(&input.document, input.root, &input.options) })
    }
}

/// Lay out `root` of `document` and write the pages as a PDF
pub fn render_pdf(document: &Document, root: NodeId, options: &RenderOptions) -> Result<Vec<u8>> {
    let root_width = document
        .element(root)
        .and_then(|el| el.style.get("width"))
        .and_then(|w| parse_px(&resolve_length(w, ROOT_FONT_PX)))
        .filter(|w| *w > 0.0)
        .unwrap_or(options.window_width_px as f32);

    let mut items = Vec::new();
    let mut walker = Walker { document, items: &mut items };
    walker.block(root, 0.0, root_width);

    let frame = Frame::new(options, root_width);
    let pages = frame.paginate(&items);
    log::debug!("flow: {} items laid out on {} pages", items.len(), pages.len());
    write_pdf(&pages, &frame)
}

/// A PDF of `page_count` empty pages
pub fn empty_pdf(page_count: usize, page: PageFormat) -> Result<Vec<u8>> {
    let options = RenderOptions {
        mode: crate::RenderMode::Preview,
        scale: 1.0,
        margin_mm: 0.0,
        page,
        window_width_px: 794,
        image_quality: 1.0,
    };
    let frame = Frame::new(&options, 794.0);
    write_pdf(&vec![Vec::new(); page_count.max(1)], &frame)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Face {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl Face {
    fn resource(self) -> &'static str {
        match self {
            Face::Regular => "F1",
            Face::Bold => "F2",
            Face::Italic => "F3",
            Face::BoldItalic => "F4",
        }
    }

    fn advance(self) -> f32 {
        match self {
            Face::Bold | Face::BoldItalic => 0.55,
            _ => 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone)]
struct TextStyle {
    font_px: f32,
    line_px: f32,
    face: Face,
    color: [f32; 3],
    align: Align,
    transform: Option<String>,
}

impl TextStyle {
    fn from_inline(style: &InlineStyle) -> Self {
        let font_px = style.get("font-size").and_then(parse_px).unwrap_or(ROOT_FONT_PX);
        let line_px = match style.get("line-height") {
            Some(v) => parse_px(v)
                .or_else(|| v.trim().parse::<f32>().ok().map(|m| m * font_px))
                .unwrap_or(font_px * 1.2),
            None => font_px * 1.2,
        };
        let bold = match style.get("font-weight") {
            Some("bold") | Some("bolder") => true,
            Some(w) => w.parse::<u32>().map(|w| w >= 600).unwrap_or(false),
            None => false,
        };
        let italic = matches!(style.get("font-style"), Some("italic") | Some("oblique"));
        let face = match (bold, italic) {
            (false, false) => Face::Regular,
            (true, false) => Face::Bold,
            (false, true) => Face::Italic,
            (true, true) => Face::BoldItalic,
        };
        let align = match style.get("text-align") {
            Some("center") => Align::Center,
            Some("right") | Some("end") => Align::Right,
            _ => Align::Left,
        };
        Self {
            font_px,
            line_px: line_px.max(font_px),
            face,
            color: style.get("color").map(rgb).unwrap_or([0.0; 3]),
            align,
            transform: style.get("text-transform").map(str::to_string),
        }
    }

    fn apply_transform(&self, text: &str) -> String {
        match self.transform.as_deref() {
            Some("uppercase") => text.to_uppercase(),
            Some("lowercase") => text.to_lowercase(),
            Some("capitalize") => text
                .split(' ')
                .map(|w| {
                    let mut chars = w.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().chain(chars).collect(),
                        None => String::new(),
                    }
                })
                .collect::<Vec<_>>()
                .join(" "),
            _ => text.to_string(),
        }
    }
}

fn rgb(value: &str) -> [f32; 3] {
    match csscolorparser::parse(value) {
        Ok(c) => {
            let [r, g, b, _] = c.to_rgba8();
            [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]
        }
        Err(_) => [0.0; 3],
    }
}

/// Layout input in CSS pixels relative to the root's content box
#[derive(Debug, Clone)]
enum Item {
    Gap(f32),
    Paragraph { text: String, style: TextStyle, left: f32, width: f32 },
    Rule { left: f32, width: f32, thickness: f32, color: [f32; 3] },
}

struct Walker<'a> {
    document: &'a Document,
    items: &'a mut Vec<Item>,
}

impl Walker<'_> {
    fn block(&mut self, id: NodeId, left: f32, width: f32) {
        let document = self.document;
        let Some(el) = document.element(id) else { return };
        let style = &el.style;
        if style.get("display") == Some("none") {
            return;
        }
        let px = |name: &str| style.get(name).and_then(parse_px).unwrap_or(0.0);
        let edge = |side: &str| {
            let visible = !matches!(style.get(&format!("border-{}-style", side)), None | Some("none") | Some("hidden"));
            if visible {
                px(&format!("border-{}-width", side))
            } else {
                0.0
            }
        };

        self.items.push(Item::Gap(px("margin-top")));
        let outer_left = left + px("margin-left");
        let outer_width = (width - px("margin-left") - px("margin-right")).max(1.0);
        let top = edge("top");
        if top > 0.0 {
            self.items.push(Item::Rule {
                left: outer_left,
                width: outer_width,
                thickness: top,
                color: style.get("border-top-color").map(rgb).unwrap_or([0.0; 3]),
            });
        }
        self.items.push(Item::Gap(px("padding-top")));

        let inner_left = outer_left + edge("left") + px("padding-left");
        let inner_width = (outer_width - edge("left") - edge("right") - px("padding-left") - px("padding-right")).max(1.0);
        let text_style = TextStyle::from_inline(style);
        let mut bullet = style.get("display") == Some("list-item") && style.get("list-style-type") != Some("none");
        let mut buf = String::new();

        let children = document.get(id).map(|n| n.children()).unwrap_or_default();
        for &child in children {
            let Some(node) = document.get(child) else { continue };
            match &node.data {
                NodeData::Text(text) => buf.push_str(text),
                NodeData::Element(child_el) if is_inline(child_el.tag.as_str(), &child_el.style) => {
                    if child_el.tag == "br" {
                        buf.push('\n');
                    } else if child_el.style.get("display") != Some("none") {
                        buf.push_str(&document.text_content(child));
                    }
                }
                NodeData::Element(_) => {
                    self.flush(&mut buf, &text_style, inner_left, inner_width, &mut bullet);
                    self.block(child, inner_left, inner_width);
                }
                NodeData::Document => {}
            }
        }
        self.flush(&mut buf, &text_style, inner_left, inner_width, &mut bullet);

        self.items.push(Item::Gap(px("padding-bottom")));
        let bottom = edge("bottom");
        if bottom > 0.0 {
            self.items.push(Item::Rule {
                left: outer_left,
                width: outer_width,
                thickness: bottom,
                color: style.get("border-bottom-color").map(rgb).unwrap_or([0.0; 3]),
            });
        }
        self.items.push(Item::Gap(px("margin-bottom")));
    }

    fn flush(&mut self, buf: &mut String, style: &TextStyle, left: f32, width: f32, bullet: &mut bool) {
        let text = buf
            .split('\n')
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .collect::<Vec<_>>()
            .join("\n");
        buf.clear();
        if text.trim().is_empty() {
            return;
        }
        let mut text = style.apply_transform(text.trim());
        if std::mem::take(bullet) {
            text.insert_str(0, "\u{2022} ");
        }
        self.items.push(Item::Paragraph { text, style: style.clone(), left, width });
    }
}

fn is_inline(tag: &str, style: &InlineStyle) -> bool {
    match style.get("display") {
        Some(d) => d.starts_with("inline") || d == "contents",
        None => INLINE_TAGS.contains(&tag),
    }
}

/// Greedy word wrap against an approximate advance width
fn wrap(text: &str, style: &TextStyle, width: f32) -> Vec<String> {
    let max_chars = ((width / (style.font_px * style.face.advance())).floor() as usize).max(1);
    let mut lines = Vec::new();
    for source in text.split('\n') {
        let mut line = String::new();
        for word in source.split(' ').filter(|w| !w.is_empty()) {
            let needed = if line.is_empty() { word.chars().count() } else { line.chars().count() + 1 + word.chars().count() };
            if needed > max_chars && !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        lines.push(line);
    }
    lines
}

#[derive(Debug, Clone)]
enum Mark {
    Text { x: f32, baseline: f32, text: String, face: Face, size: f32, color: [f32; 3] },
    Rule { x: f32, y: f32, width: f32, thickness: f32, color: [f32; 3] },
}

/// Printable area of a page and the px-to-pt mapping onto it
struct Frame {
    page_w_pt: f32,
    page_h_pt: f32,
    margin_pt: f32,
    /// points per CSS pixel
    k: f32,
    content_h_px: f32,
}

impl Frame {
    fn new(options: &RenderOptions, root_width_px: f32) -> Self {
        let page_w_pt = options.page.width_mm * PT_PER_MM;
        let page_h_pt = options.page.height_mm * PT_PER_MM;
        let margin_pt = options.margin_mm * PT_PER_MM;
        let k = (page_w_pt - 2.0 * margin_pt) / root_width_px.max(1.0);
        let content_h_px = (page_h_pt - 2.0 * margin_pt) / k;
        Self { page_w_pt, page_h_pt, margin_pt, k, content_h_px }
    }

    fn paginate(&self, items: &[Item]) -> Vec<Vec<Mark>> {
        let mut pages: Vec<Vec<Mark>> = vec![Vec::new()];
        let mut y = 0.0f32;
        let reserve = |pages: &mut Vec<Vec<Mark>>, y: &mut f32, height: f32| {
            if *y > 0.0 && *y + height > self.content_h_px {
                pages.push(Vec::new());
                *y = 0.0;
            }
        };

        for item in items {
            match item {
                Item::Gap(h) => {
                    y += h;
                    if y >= self.content_h_px {
                        pages.push(Vec::new());
                        y = 0.0;
                    }
                }
                Item::Rule { left, width, thickness, color } => {
                    reserve(&mut pages, &mut y, *thickness);
                    if let Some(page) = pages.last_mut() {
                        page.push(Mark::Rule { x: *left, y: y + thickness / 2.0, width: *width, thickness: *thickness, color: *color });
                    }
                    y += thickness;
                }
                Item::Paragraph { text, style, left, width } => {
                    for line in wrap(text, style, *width) {
                        reserve(&mut pages, &mut y, style.line_px);
                        let line_w = line.chars().count() as f32 * style.font_px * style.face.advance();
                        let x = match style.align {
                            Align::Left => *left,
                            Align::Center => left + ((width - line_w) / 2.0).max(0.0),
                            Align::Right => left + (width - line_w).max(0.0),
                        };
                        let half_leading = (style.line_px - style.font_px) / 2.0;
                        if let Some(page) = pages.last_mut() {
                            page.push(Mark::Text {
                                x,
                                baseline: y + half_leading + style.font_px * 0.8,
                                text: line,
                                face: style.face,
                                size: style.font_px,
                                color: style.color,
                            });
                        }
                        y += style.line_px;
                    }
                }
            }
        }

        // a trailing gap may have opened a page with nothing on it
        if pages.len() > 1 && pages.last().is_some_and(|p| p.is_empty()) {
            pages.pop();
        }
        pages
    }

    fn x(&self, px: f32) -> f32 {
        self.margin_pt + px * self.k
    }

    fn y(&self, px: f32) -> f32 {
        self.page_h_pt - self.margin_pt - px * self.k
    }
}

fn operations(marks: &[Mark], frame: &Frame) -> Vec<Operation> {
    let mut ops = Vec::new();
    for mark in marks {
        match mark {
            Mark::Text { x, baseline, text, face, size, color } => {
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new("Tf", vec![Object::Name(face.resource().as_bytes().to_vec()), (size * frame.k).into()]));
                ops.push(Operation::new("rg", vec![color[0].into(), color[1].into(), color[2].into()]));
                ops.push(Operation::new("Td", vec![frame.x(*x).into(), frame.y(*baseline).into()]));
                ops.push(Operation::new("Tj", vec![Object::String(win_ansi(text), StringFormat::Literal)]));
                ops.push(Operation::new("ET", vec![]));
            }
            Mark::Rule { x, y, width, thickness, color } => {
                ops.push(Operation::new("w", vec![(thickness * frame.k).into()]));
                ops.push(Operation::new("RG", vec![color[0].into(), color[1].into(), color[2].into()]));
                ops.push(Operation::new("m", vec![frame.x(*x).into(), frame.y(*y).into()]));
                ops.push(Operation::new("l", vec![frame.x(x + width).into(), frame.y(*y).into()]));
                ops.push(Operation::new("S", vec![]));
            }
        }
    }
    ops
}

fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect()
}

fn write_pdf(pages: &[Vec<Mark>], frame: &Frame) -> Result<Vec<u8>> {
    let write_err = |e: lopdf::Error| Error::RenderError(e.to_string());

    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font = |base: &str| {
        dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => base.to_string(),
            "Encoding" => "WinAnsiEncoding",
        }
    };
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font("Helvetica"),
            "F2" => font("Helvetica-Bold"),
            "F3" => font("Helvetica-Oblique"),
            "F4" => font("Helvetica-BoldOblique"),
        },
    });
    let media_box: Vec<Object> = vec![0.0f32.into(), 0.0f32.into(), frame.page_w_pt.into(), frame.page_h_pt.into()];

    let mut kids = Vec::with_capacity(pages.len());
    for marks in pages {
        let content = Content { operations: operations(marks, frame) };
        let bytes = content.encode().map_err(write_err)?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, bytes));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => media_box.clone(),
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(|e| Error::RenderError(e.to_string()))?;
    Ok(out)
}
