//! Arena-backed document tree used for both the live document and its snapshots
//!
//! Markup is parsed with `scraper` and imported into a `Document` whose nodes
//! are addressed by `NodeId`. Ids stay stable for the lifetime of a document,
//! which lets snapshots keep an explicit live-to-clone id map instead of
//! relying on traversal order.

pub mod selector;

use cssparser::{Delimiter, ParseError, Parser, ParserInput, Token};
use scraper::{ElementRef, Html};
use std::fmt::Write as _;

pub use selector::{SelectorList, Specificity};

/// Identifier of a node inside one `Document`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A single `name: value` declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub value: String,
    pub important: bool,
}

/// Ordered inline declarations of an element (its `style` attribute)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineStyle {
    declarations: Vec<Declaration>,
}

impl InlineStyle {
    /// Parse the text of a `style` attribute
    pub fn parse(text: &str) -> Self {
        Self { declarations: parse_declarations(text) }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.declarations
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.value.as_str())
    }

    /// Set a property, replacing any existing declaration of the same name
    pub fn set(&mut self, name: &str, value: &str) {
        if let Some(existing) = self.declarations.iter_mut().find(|d| d.name == name) {
            existing.value = value.to_string();
            existing.important = false;
        } else {
            self.declarations.push(Declaration {
                name: name.to_string(),
                value: value.to_string(),
                important: false,
            });
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.declarations.retain(|d| d.name != name);
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Serialize back to `style` attribute text
    pub fn to_css_text(&self) -> String {
        let mut out = String::new();
        for d in &self.declarations {
            if !out.is_empty() {
                out.push(' ');
            }
            let _ = write!(out, "{}: {}", d.name, d.value);
            if d.important {
                out.push_str(" !important");
            }
            out.push(';');
        }
        out
    }
}

/// Parse a declaration block body (`a: b; c: d !important`)
///
/// Invalid declarations are dropped; the rest of the block still parses.
pub fn parse_declarations(text: &str) -> Vec<Declaration> {
    let mut input = ParserInput::new(text);
    let mut parser = Parser::new(&mut input);
    declaration_list(&mut parser)
}

/// Parse declarations until the parser is exhausted
pub(crate) fn declaration_list(input: &mut Parser<'_, '_>) -> Vec<Declaration> {
    let mut out = Vec::new();
    while !input.is_exhausted() {
        if let Ok(declaration) = input.parse_until_after(Delimiter::Semicolon, declaration) {
            out.push(declaration);
        }
    }
    out
}

fn declaration<'i>(input: &mut Parser<'i, '_>) -> Result<Declaration, ParseError<'i, ()>> {
    let name = input.expect_ident()?.to_ascii_lowercase();
    input.expect_colon()?;
    let start = input.position();
    while input.next().is_ok() {}
    let (value, important) = split_important(input.slice_from(start).trim());
    if value.is_empty() {
        return Err(input.new_custom_error(()));
    }
    Ok(Declaration { name, value: value.to_string(), important })
}

fn split_important(value: &str) -> (&str, bool) {
    if let Some(bang) = value.rfind('!') {
        if value[bang + 1..].trim().eq_ignore_ascii_case("important") {
            return (value[..bang].trim_end(), true);
        }
    }
    (value, false)
}

/// Split a property value into its top-level component values.
/// Functions and blocks stay whole: `1px solid rgb(1, 2, 3)` has three.
pub fn component_values(value: &str) -> Vec<&str> {
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    let mut out = Vec::new();
    loop {
        parser.skip_whitespace();
        let start = parser.position();
        let opens_block = match parser.next() {
            Err(_) => break,
            Ok(token) => matches!(
                token,
                Token::Function(_) | Token::ParenthesisBlock | Token::SquareBracketBlock | Token::CurlyBracketBlock
            ),
        };
        if opens_block {
            let _ = parser.parse_nested_block(|block| {
                while block.next().is_ok() {}
                Ok::<_, ParseError<()>>(())
            });
        }
        out.push(parser.slice_from(start));
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    pub tag: String,
    attrs: Vec<(String, String)>,
    pub style: InlineStyle,
}

impl ElementData {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        if name == "style" {
            self.style = InlineStyle::parse(value);
            return;
        }
        if let Some(slot) = self.attrs.iter_mut().find(|(k, _)| k == name) {
            slot.1 = value.to_string();
        } else {
            self.attrs.push((name.to_string(), value.to_string()));
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|(k, _)| k != name);
        before != self.attrs.len()
    }

    /// Remove every attribute for which `pred` returns true
    pub fn retain_attrs<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&str) -> bool,
    {
        let before = self.attrs.len();
        self.attrs.retain(|(k, _)| keep(k));
        before - self.attrs.len()
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|c| c.split_whitespace().any(|x| x == class))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Document,
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    pub data: NodeData,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// An arena of nodes with a synthetic document node at index 0
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node { parent: None, children: Vec::new(), data: NodeData::Document }],
        }
    }

    /// The synthetic document node
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Parse a markup fragment and append its nodes under `parent`
    pub fn append_markup(&mut self, parent: NodeId, markup: &str) {
        let fragment = Html::parse_fragment(markup);
        self.import_children(parent, fragment.root_element());
    }

    fn import_children(&mut self, parent: NodeId, source: ElementRef<'_>) {
        for child in source.children() {
            if let Some(element) = ElementRef::wrap(child) {
                let value = element.value();
                let attrs: Vec<(String, String)> = value
                    .attrs()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();
                let id = self.append_element(parent, value.name(), &attrs);
                self.import_children(id, element);
            } else if let Some(text) = child.value().as_text() {
                self.append_text(parent, &**text);
            }
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.get(id).and_then(Node::as_element)
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        self.get_mut(id).and_then(Node::as_element_mut)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    /// Parent only if it is an element (not the document node)
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|p| self.element(*p).is_some())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    fn push(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node { parent: Some(parent), children: Vec::new(), data });
        if let Some(p) = self.nodes.get_mut(parent.0) {
            p.children.push(id);
        }
        id
    }

    /// Append an element; a `style` attribute is parsed into the inline style
    pub fn append_element(&mut self, parent: NodeId, tag: &str, attrs: &[(String, String)]) -> NodeId {
        let mut data = ElementData {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            style: InlineStyle::default(),
        };
        for (k, v) in attrs {
            data.set_attr(k, v);
        }
        self.push(parent, NodeData::Element(data))
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push(parent, NodeData::Text(text.to_string()))
    }

    /// Element descendants of `id` in document order, excluding `id` itself
    pub fn descendant_elements(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .get(id)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(next) = stack.pop() {
            let Some(node) = self.get(next) else { continue };
            if node.as_element().is_some() {
                out.push(next);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Concatenated text content of a subtree
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.get(id) else { return };
        match &node.data {
            NodeData::Text(t) => out.push_str(t),
            _ => {
                for c in &node.children {
                    self.collect_text(*c, out);
                }
            }
        }
    }

    /// First element (including `from`) matching a selector
    pub fn select_first(&self, from: NodeId, selector: &str) -> Option<NodeId> {
        let list = SelectorList::parse(selector)?;
        std::iter::once(from)
            .chain(self.descendant_elements(from))
            .find(|id| list.matches(self, *id).is_some())
    }

    /// Deep copy the subtree rooted at `source_id` of `source` under `parent`.
    /// `on_copy` is called with (source id, new id) for every copied node.
    pub fn clone_subtree_from<F>(
        &mut self,
        source: &Document,
        source_id: NodeId,
        parent: NodeId,
        on_copy: &mut F,
    ) -> Option<NodeId>
    where
        F: FnMut(NodeId, NodeId),
    {
        let node = source.get(source_id)?;
        let data = match &node.data {
            NodeData::Document => return None,
            other => other.clone(),
        };
        let new_id = self.push(parent, data);
        on_copy(source_id, new_id);
        for child in node.children.clone() {
            self.clone_subtree_from(source, child, new_id, on_copy);
        }
        Some(new_id)
    }

    /// Serialize a subtree to HTML, inline styles included
    pub fn to_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.get(id) else { return };
        match &node.data {
            NodeData::Document => {
                for c in &node.children {
                    self.write_html(*c, out);
                }
            }
            NodeData::Text(t) => out.push_str(&escape_text(t)),
            NodeData::Element(e) => {
                let _ = write!(out, "<{}", e.tag);
                for (k, v) in &e.attrs {
                    let _ = write!(out, " {}=\"{}\"", k, escape_attr(v));
                }
                if !e.style.is_empty() {
                    let _ = write!(out, " style=\"{}\"", escape_attr(&e.style.to_css_text()));
                }
                out.push('>');
                if is_void(&e.tag) {
                    return;
                }
                for c in &node.children {
                    self.write_html(*c, out);
                }
                let _ = write!(out, "</{}>", e.tag);
            }
        }
    }
}

fn is_void(tag: &str) -> bool {
    matches!(
        tag,
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta" | "source" | "track" | "wbr"
    )
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}
