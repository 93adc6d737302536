//! Selector matching for the arena document
//!
//! Selectors are parsed and matched with the `selectors` crate. `ElementRef`
//! adapts a `Document` node to `selectors::Element`, so combinators and
//! structural pseudo-classes (`+`, `~`, `:first-child`, `:nth-child()`,
//! `:not()`, `:is()`) behave as in a browser. User-action states such as
//! `:hover` parse but never match: a snapshot has no pointer or focus.

use super::{Document, ElementData, NodeId};
use cssparser::{CowRcStr, ParseError, Parser, ParserInput, SourceLocation, ToCss};
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::bloom::BloomFilter;
use selectors::context::{QuirksMode, SelectorCaches};
use selectors::matching::{
    matches_selector, ElementSelectorFlags, MatchingContext, MatchingForInvalidation, MatchingMode,
    NeedsSelectorFlags,
};
use selectors::parser::{ParseRelative, SelectorImpl, SelectorParseErrorKind};
use selectors::{Element, OpaqueElement};
use std::fmt;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Selector specificity as packed by the `selectors` crate
/// (ids, then classes/attributes/pseudo-classes, then types)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Specificity(pub u32);

/// String atom used for every identifier slot of the selector grammar
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CssString(pub String);

impl From<&str> for CssString {
    fn from(s: &str) -> Self {
        CssString(s.to_string())
    }
}

impl From<String> for CssString {
    fn from(s: String) -> Self {
        CssString(s)
    }
}

impl std::ops::Deref for CssString {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::borrow::Borrow<str> for CssString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl ToCss for CssString {
    fn to_css<W>(&self, dest: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        dest.write_str(&self.0)
    }
}

impl precomputed_hash::PrecomputedHash for CssString {
    fn precomputed_hash(&self) -> u32 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        self.0.hash(&mut hasher);
        hasher.finish() as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentSelectors;

impl SelectorImpl for DocumentSelectors {
    type ExtraMatchingData<'a> = ();
    type AttrValue = CssString;
    type Identifier = CssString;
    type LocalName = CssString;
    type NamespacePrefix = CssString;
    type NamespaceUrl = CssString;
    type BorrowedLocalName = str;
    type BorrowedNamespaceUrl = str;

    type NonTSPseudoClass = PseudoClass;
    type PseudoElement = PseudoElement;
}

/// Pseudo-classes beyond the structural ones `selectors` handles itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PseudoClass {
    Link,
    AnyLink,
    Visited,
    Hover,
    Active,
    Focus,
    FocusWithin,
    FocusVisible,
}

impl selectors::parser::NonTSPseudoClass for PseudoClass {
    type Impl = DocumentSelectors;

    fn is_active_or_hover(&self) -> bool {
        matches!(self, PseudoClass::Active | PseudoClass::Hover)
    }

    fn is_user_action_state(&self) -> bool {
        matches!(
            self,
            PseudoClass::Hover
                | PseudoClass::Active
                | PseudoClass::Focus
                | PseudoClass::FocusWithin
                | PseudoClass::FocusVisible
        )
    }
}

impl ToCss for PseudoClass {
    fn to_css<W>(&self, dest: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        dest.write_str(match self {
            PseudoClass::Link => ":link",
            PseudoClass::AnyLink => ":any-link",
            PseudoClass::Visited => ":visited",
            PseudoClass::Hover => ":hover",
            PseudoClass::Active => ":active",
            PseudoClass::Focus => ":focus",
            PseudoClass::FocusWithin => ":focus-within",
            PseudoClass::FocusVisible => ":focus-visible",
        })
    }
}

/// Generated-content pseudo-elements; rules using them never style the element itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PseudoElement {
    Before,
    After,
    Marker,
    Placeholder,
    Selection,
}

impl selectors::parser::PseudoElement for PseudoElement {
    type Impl = DocumentSelectors;
}

impl ToCss for PseudoElement {
    fn to_css<W>(&self, dest: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        dest.write_str(match self {
            PseudoElement::Before => "::before",
            PseudoElement::After => "::after",
            PseudoElement::Marker => "::marker",
            PseudoElement::Placeholder => "::placeholder",
            PseudoElement::Selection => "::selection",
        })
    }
}

struct SelectorParser;

impl<'i> selectors::parser::Parser<'i> for SelectorParser {
    type Impl = DocumentSelectors;
    type Error = SelectorParseErrorKind<'i>;

    fn parse_non_ts_pseudo_class(
        &self,
        location: SourceLocation,
        name: CowRcStr<'i>,
    ) -> Result<PseudoClass, ParseError<'i, Self::Error>> {
        let pseudo = match name.to_ascii_lowercase().as_str() {
            "link" => PseudoClass::Link,
            "any-link" => PseudoClass::AnyLink,
            "visited" => PseudoClass::Visited,
            "hover" => PseudoClass::Hover,
            "active" => PseudoClass::Active,
            "focus" => PseudoClass::Focus,
            "focus-within" => PseudoClass::FocusWithin,
            "focus-visible" => PseudoClass::FocusVisible,
            _ => {
                return Err(location.new_custom_error(SelectorParseErrorKind::UnsupportedPseudoClassOrElement(name)))
            }
        };
        Ok(pseudo)
    }

    fn parse_pseudo_element(
        &self,
        location: SourceLocation,
        name: CowRcStr<'i>,
    ) -> Result<PseudoElement, ParseError<'i, Self::Error>> {
        let pseudo = match name.to_ascii_lowercase().as_str() {
            "before" => PseudoElement::Before,
            "after" => PseudoElement::After,
            "marker" => PseudoElement::Marker,
            "placeholder" => PseudoElement::Placeholder,
            "selection" => PseudoElement::Selection,
            _ => {
                return Err(location.new_custom_error(SelectorParseErrorKind::UnsupportedPseudoClassOrElement(name)))
            }
        };
        Ok(pseudo)
    }

    fn parse_is_and_where(&self) -> bool {
        true
    }
}

/// A comma separated selector list
#[derive(Debug, Clone)]
pub struct SelectorList(selectors::parser::SelectorList<DocumentSelectors>);

impl SelectorList {
    /// Parse selector text; `None` if any member is invalid
    pub fn parse(text: &str) -> Option<Self> {
        let mut input = ParserInput::new(text);
        let mut parser = Parser::new(&mut input);
        parser.parse_entirely(Self::parse_tokens).ok()
    }

    /// Parse a selector list from a rule prelude
    pub(crate) fn parse_tokens<'i>(
        input: &mut Parser<'i, '_>,
    ) -> Result<Self, ParseError<'i, SelectorParseErrorKind<'i>>> {
        selectors::parser::SelectorList::parse(&SelectorParser, input, ParseRelative::No).map(SelectorList)
    }

    /// Highest specificity among the members matching `id`
    ///
    /// Members ending in a pseudo-element are ignored.
    pub fn matches(&self, doc: &Document, id: NodeId) -> Option<Specificity> {
        let element = ElementRef::new(doc, id)?;
        let mut caches = SelectorCaches::default();
        let mut context = MatchingContext::new(
            MatchingMode::Normal,
            None,
            &mut caches,
            QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            MatchingForInvalidation::No,
        );
        let mut best: Option<Specificity> = None;
        for selector in self.0.slice().iter() {
            if selector.pseudo_element().is_some() {
                continue;
            }
            if matches_selector(selector, 0, None, &element, &mut context) {
                let spec = Specificity(selector.specificity());
                best = Some(best.map_or(spec, |b| b.max(spec)));
            }
        }
        best
    }
}

/// An element of a `Document`, as seen by the selector matcher
#[derive(Clone, Copy)]
pub struct ElementRef<'a> {
    doc: &'a Document,
    id: NodeId,
    data: &'a ElementData,
}

impl fmt::Debug for ElementRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementRef")
            .field("id", &self.id)
            .field("tag", &self.data.tag)
            .finish()
    }
}

impl<'a> ElementRef<'a> {
    /// `None` when `id` is not an element
    pub fn new(doc: &'a Document, id: NodeId) -> Option<Self> {
        doc.element(id).map(|data| Self { doc, id, data })
    }

    fn siblings(&self) -> &'a [NodeId] {
        self.doc
            .parent(self.id)
            .and_then(|p| self.doc.get(p))
            .map(|node| node.children())
            .unwrap_or(&[])
    }

    fn first_element_in<I>(&self, ids: I) -> Option<Self>
    where
        I: Iterator<Item = &'a NodeId>,
    {
        let doc = self.doc;
        ids.filter_map(|id| ElementRef::new(doc, *id)).next()
    }
}

impl<'a> Element for ElementRef<'a> {
    type Impl = DocumentSelectors;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(self.data)
    }

    fn parent_element(&self) -> Option<Self> {
        self.doc.parent_element(self.id).and_then(|p| ElementRef::new(self.doc, p))
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        let siblings = self.siblings();
        let pos = siblings.iter().position(|s| *s == self.id)?;
        self.first_element_in(siblings[..pos].iter().rev())
    }

    fn next_sibling_element(&self) -> Option<Self> {
        let siblings = self.siblings();
        let pos = siblings.iter().position(|s| *s == self.id)?;
        self.first_element_in(siblings[pos + 1..].iter())
    }

    fn first_element_child(&self) -> Option<Self> {
        let children = self.doc.get(self.id).map(|n| n.children()).unwrap_or(&[]);
        self.first_element_in(children.iter())
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, local_name: &str) -> bool {
        self.data.tag.eq_ignore_ascii_case(local_name)
    }

    fn has_namespace(&self, ns: &str) -> bool {
        ns.is_empty() || ns == HTML_NAMESPACE
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.data.tag == other.data.tag
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&CssString>,
        local_name: &CssString,
        operation: &AttrSelectorOperation<&CssString>,
    ) -> bool {
        if let NamespaceConstraint::Specific(url) = ns {
            if !(url.is_empty() || url.as_str() == HTML_NAMESPACE) {
                return false;
            }
        }
        let Some(actual) = self.data.attr(local_name.as_str()) else {
            return false;
        };
        match operation {
            AttrSelectorOperation::Exists => true,
            AttrSelectorOperation::WithValue {
                operator,
                case_sensitivity,
                value,
            } => operator.eval_str(actual, value.as_str(), *case_sensitivity),
        }
    }

    fn match_non_ts_pseudo_class(
        &self,
        pseudo: &PseudoClass,
        _context: &mut MatchingContext<Self::Impl>,
    ) -> bool {
        match pseudo {
            PseudoClass::Link | PseudoClass::AnyLink => self.is_link(),
            _ => false,
        }
    }

    fn match_pseudo_element(
        &self,
        _pseudo: &PseudoElement,
        _context: &mut MatchingContext<Self::Impl>,
    ) -> bool {
        false
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        matches!(self.data.tag.as_str(), "a" | "area" | "link") && self.data.attr("href").is_some()
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn has_id(&self, id: &CssString, case_sensitivity: CaseSensitivity) -> bool {
        self.data
            .id()
            .is_some_and(|actual| case_sensitivity.eq(actual.as_bytes(), id.as_bytes()))
    }

    fn has_class(&self, class: &CssString, case_sensitivity: CaseSensitivity) -> bool {
        self.data.attr("class").is_some_and(|classes| {
            classes
                .split_ascii_whitespace()
                .any(|c| case_sensitivity.eq(c.as_bytes(), class.as_bytes()))
        })
    }

    fn has_custom_state(&self, _name: &CssString) -> bool {
        false
    }

    fn imported_part(&self, _name: &CssString) -> Option<CssString> {
        None
    }

    fn is_part(&self, _name: &CssString) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        let children = self.doc.get(self.id).map(|n| n.children()).unwrap_or(&[]);
        children.iter().all(|c| match self.doc.get(*c) {
            Some(node) if node.as_element().is_some() => false,
            Some(node) => node.as_text().map_or(true, str::is_empty),
            None => true,
        })
    }

    fn is_root(&self) -> bool {
        self.doc.parent(self.id) == Some(self.doc.root())
    }

    fn add_element_unique_hashes(&self, _filter: &mut BloomFilter) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> (Document, Vec<NodeId>) {
        let mut d = Document::new();
        let root = d.root();
        d.append_markup(
            root,
            "<div class=\"cv\" id=\"main\"><section data-kind=\"work job\"><h2 class=\"title big\">Work</h2></section><p>x</p></div>",
        );
        let els = d.descendant_elements(root);
        (d, els)
    }

    fn matches(selector: &str, d: &Document, id: NodeId) -> bool {
        SelectorList::parse(selector).unwrap().matches(d, id).is_some()
    }

    #[test]
    fn specificity_orders_ids_over_classes_over_types() {
        let (d, els) = doc();
        let h2 = els[2];
        let spec = |s: &str| SelectorList::parse(s).unwrap().matches(&d, h2).unwrap();
        assert!(spec("#main h2") > spec(".cv .title.big"));
        assert!(spec(".cv .title.big") > spec("div section h2"));
        assert!(spec("h2") > spec("*"));
    }

    #[test]
    fn combinators_match_ancestry() {
        let (d, els) = doc();
        let h2 = els[2];
        assert!(matches(".cv h2", &d, h2));
        assert!(matches("section > h2.title.big", &d, h2));
        assert!(!matches("div > h2", &d, h2));
        assert!(matches("[data-kind~=job] h2", &d, h2));
        assert!(!matches("p h2", &d, h2));
    }

    #[test]
    fn sibling_combinators_and_structural_pseudo_classes() {
        let mut d = Document::new();
        let root = d.root();
        d.append_markup(root, "<h1>a</h1><p>b</p><ul><li>x</li><li>y</li><li>z</li></ul>");
        let els = d.descendant_elements(root);
        let (p, ul, first, second, last) = (els[1], els[2], els[3], els[4], els[5]);
        assert!(matches("h1 + p", &d, p));
        assert!(matches("h1 ~ ul", &d, ul));
        assert!(!matches("h1 + ul", &d, ul));
        assert!(matches("li:first-child", &d, first));
        assert!(!matches("li:first-child", &d, second));
        assert!(matches("li:nth-child(2n)", &d, second));
        assert!(matches("li:last-child", &d, last));
        assert!(matches("li:not(:first-child)", &d, last));
        assert!(matches(":is(ul, ol) > li", &d, second));
    }

    #[test]
    fn interactive_and_generated_states_never_match() {
        let (d, els) = doc();
        assert!(!matches("h2:hover", &d, els[2]));
        assert!(!matches("h2::before", &d, els[2]));
        assert!(SelectorList::parse("h2:no-such-state").is_none());
        assert!(SelectorList::parse("h2 >").is_none());
    }

    #[test]
    fn list_reports_best_specificity() {
        let (d, els) = doc();
        let list = SelectorList::parse("h2, .title").unwrap();
        let class_only = SelectorList::parse(".title").unwrap().matches(&d, els[2]);
        assert_eq!(list.matches(&d, els[2]), class_only);
        assert_eq!(list.matches(&d, els[3]), None);
    }
}
