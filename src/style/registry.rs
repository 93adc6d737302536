//! Observed-Property registry
//!
//! The explicit list of properties the materializer copies from a live node's
//! computed style onto its snapshot clone. Each entry pairs a read accessor on
//! `ComputedStyle` with a write accessor on the clone's `InlineStyle`; color
//! entries are canonicalized before being written. Bump `REGISTRY_VERSION`
//! whenever the list changes so logs and fingerprints can be told apart.

use super::ComputedStyle;
use crate::dom::InlineStyle;

pub const REGISTRY_VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Plain,
    Color,
}

pub struct ObservedProperty {
    pub name: &'static str,
    pub kind: ValueKind,
    pub read: fn(&ComputedStyle) -> Option<&str>,
    pub write: fn(&mut InlineStyle, &str),
}

impl std::fmt::Debug for ObservedProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservedProperty")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

macro_rules! observe {
    ($name:literal) => {
        observe!($name, ValueKind::Plain)
    };
    ($name:literal, color) => {
        observe!($name, ValueKind::Color)
    };
    ($name:literal, $kind:expr) => {
        ObservedProperty {
            name: $name,
            kind: $kind,
            read: |s| s.get($name),
            write: |t, v| t.set($name, v),
        }
    };
}

pub static OBSERVED_PROPERTIES: &[ObservedProperty] = &[
    // box model
    observe!("box-sizing"),
    observe!("display"),
    observe!("width"),
    observe!("min-width"),
    observe!("max-width"),
    observe!("min-height"),
    observe!("max-height"),
    // colors
    observe!("background-color", color),
    observe!("color", color),
    // typography
    observe!("font-family"),
    observe!("font-size"),
    observe!("font-weight"),
    observe!("font-style"),
    observe!("line-height"),
    observe!("text-align"),
    observe!("text-transform"),
    observe!("text-decoration-line"),
    observe!("letter-spacing"),
    observe!("white-space"),
    observe!("vertical-align"),
    observe!("list-style-type"),
    // borders, each edge on its own
    observe!("border-top-width"),
    observe!("border-top-style"),
    observe!("border-top-color", color),
    observe!("border-right-width"),
    observe!("border-right-style"),
    observe!("border-right-color", color),
    observe!("border-bottom-width"),
    observe!("border-bottom-style"),
    observe!("border-bottom-color", color),
    observe!("border-left-width"),
    observe!("border-left-style"),
    observe!("border-left-color", color),
    observe!("border-collapse"),
    // spacing
    observe!("padding-top"),
    observe!("padding-right"),
    observe!("padding-bottom"),
    observe!("padding-left"),
    observe!("margin-top"),
    observe!("margin-right"),
    observe!("margin-bottom"),
    observe!("margin-left"),
    // flex participation
    observe!("flex-direction"),
    observe!("flex-wrap"),
    observe!("justify-content"),
    observe!("align-items"),
    observe!("flex-grow"),
    observe!("flex-shrink"),
    observe!("flex-basis"),
    observe!("row-gap"),
    observe!("column-gap"),
    // effects
    observe!("box-shadow"),
];

pub fn find(name: &str) -> Option<&'static ObservedProperty> {
    OBSERVED_PROPERTIES.iter().find(|p| p.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::properties;
    use std::collections::HashSet;

    #[test]
    fn every_observed_property_is_computed() {
        for p in OBSERVED_PROPERTIES {
            assert!(properties::lookup(p.name).is_some(), "{} is not a cascade longhand", p.name);
        }
    }

    #[test]
    fn registry_has_no_duplicates() {
        let names: HashSet<_> = OBSERVED_PROPERTIES.iter().map(|p| p.name).collect();
        assert_eq!(names.len(), OBSERVED_PROPERTIES.len());
    }

    #[test]
    fn every_border_edge_is_observed() {
        for side in ["top", "right", "bottom", "left"] {
            for part in ["width", "style", "color"] {
                let name = format!("border-{side}-{part}");
                assert!(find(&name).is_some(), "missing {name}");
            }
            assert!(find(&format!("padding-{side}")).is_some());
            assert!(find(&format!("margin-{side}")).is_some());
        }
        assert_eq!(find("border-top-color").unwrap().kind, ValueKind::Color);
    }

    #[test]
    fn accessors_round_trip_through_inline_style() {
        let mut computed = ComputedStyle::default();
        computed.set("letter-spacing", "0.5px");
        let entry = find("letter-spacing").unwrap();
        let mut inline = InlineStyle::default();
        (entry.write)(&mut inline, (entry.read)(&computed).unwrap());
        assert_eq!(inline.get("letter-spacing"), Some("0.5px"));
    }
}
