//! Longhand property table and shorthand expansion used by the cascade

use crate::dom::component_values;

/// A longhand the cascade computes for every element
#[derive(Debug, Clone, Copy)]
pub struct PropertyDef {
    pub name: &'static str,
    pub inherited: bool,
    pub initial: &'static str,
}

const fn def(name: &'static str, inherited: bool, initial: &'static str) -> PropertyDef {
    PropertyDef { name, inherited, initial }
}

/// Every longhand the cascade produces. `font-size` and `color` come first
/// because other values resolve against them.
pub const LONGHANDS: &[PropertyDef] = &[
    def("font-size", true, "16px"),
    def("color", true, "rgb(0, 0, 0)"),
    def("font-family", true, "serif"),
    def("font-weight", true, "400"),
    def("font-style", true, "normal"),
    def("line-height", true, "normal"),
    def("text-align", true, "start"),
    def("text-transform", true, "none"),
    def("text-decoration-line", false, "none"),
    def("letter-spacing", true, "normal"),
    def("white-space", true, "normal"),
    def("border-collapse", true, "separate"),
    def("list-style-type", true, "disc"),
    def("box-sizing", false, "content-box"),
    def("display", false, "inline"),
    def("position", false, "static"),
    def("background-color", false, "rgba(0, 0, 0, 0)"),
    def("background-image", false, "none"),
    def("border-top-width", false, "medium"),
    def("border-right-width", false, "medium"),
    def("border-bottom-width", false, "medium"),
    def("border-left-width", false, "medium"),
    def("border-top-style", false, "none"),
    def("border-right-style", false, "none"),
    def("border-bottom-style", false, "none"),
    def("border-left-style", false, "none"),
    def("border-top-color", false, "currentcolor"),
    def("border-right-color", false, "currentcolor"),
    def("border-bottom-color", false, "currentcolor"),
    def("border-left-color", false, "currentcolor"),
    def("padding-top", false, "0px"),
    def("padding-right", false, "0px"),
    def("padding-bottom", false, "0px"),
    def("padding-left", false, "0px"),
    def("margin-top", false, "0px"),
    def("margin-right", false, "0px"),
    def("margin-bottom", false, "0px"),
    def("margin-left", false, "0px"),
    def("width", false, "auto"),
    def("height", false, "auto"),
    def("min-width", false, "auto"),
    def("min-height", false, "auto"),
    def("max-width", false, "none"),
    def("max-height", false, "none"),
    def("vertical-align", false, "baseline"),
    def("flex-direction", false, "row"),
    def("flex-wrap", false, "nowrap"),
    def("justify-content", false, "normal"),
    def("align-items", false, "normal"),
    def("flex-grow", false, "0"),
    def("flex-shrink", false, "1"),
    def("flex-basis", false, "auto"),
    def("row-gap", false, "normal"),
    def("column-gap", false, "normal"),
    def("box-shadow", false, "none"),
    def("opacity", false, "1"),
    def("transform", false, "none"),
    def("filter", false, "none"),
];

pub fn lookup(name: &str) -> Option<&'static PropertyDef> {
    LONGHANDS.iter().find(|d| d.name == name)
}

const SIDES: [&str; 4] = ["top", "right", "bottom", "left"];

/// Expand a declaration into longhands. Unknown properties yield nothing.
pub fn expand(name: &str, value: &str) -> Vec<(String, String)> {
    let value = value.trim();
    match name {
        "margin" | "padding" => box_sides(value)
            .map(|v| {
                SIDES
                    .iter()
                    .zip(v)
                    .map(|(side, v)| (format!("{name}-{side}"), v))
                    .collect()
            })
            .unwrap_or_default(),
        "border-width" | "border-style" | "border-color" => {
            let part = &name["border-".len()..];
            box_sides(value)
                .map(|v| {
                    SIDES
                        .iter()
                        .zip(v)
                        .map(|(side, v)| (format!("border-{side}-{part}"), v))
                        .collect()
                })
                .unwrap_or_default()
        }
        "border" => SIDES.iter().flat_map(|side| border_edge(side, value)).collect(),
        "border-top" | "border-right" | "border-bottom" | "border-left" => {
            border_edge(&name["border-".len()..], value)
        }
        "background" => background(value),
        "flex" => flex(value),
        "gap" => {
            let parts = component_values(value);
            let row = parts.first().copied().unwrap_or("normal");
            let col = parts.get(1).copied().unwrap_or(row);
            vec![("row-gap".into(), row.into()), ("column-gap".into(), col.into())]
        }
        "text-decoration" => {
            let line = component_values(value)
                .into_iter()
                .filter(|t| matches!(*t, "none" | "underline" | "overline" | "line-through"))
                .collect::<Vec<_>>()
                .join(" ");
            vec![("text-decoration-line".into(), if line.is_empty() { "none".into() } else { line })]
        }
        "list-style" => component_values(value)
            .into_iter()
            .find(|t| !matches!(*t, "inside" | "outside") && !t.starts_with("url("))
            .map(|t| vec![("list-style-type".to_string(), t.to_string())])
            .unwrap_or_default(),
        _ if lookup(name).is_some() => vec![(name.to_string(), value.to_string())],
        _ => Vec::new(),
    }
}

fn box_sides(value: &str) -> Option<[String; 4]> {
    let parts = component_values(value);
    let [t, r, b, l] = match parts.as_slice() {
        [a] => [*a, *a, *a, *a],
        [a, b] => [*a, *b, *a, *b],
        [a, b, c] => [*a, *b, *c, *b],
        [a, b, c, d] => [*a, *b, *c, *d],
        _ => return None,
    };
    Some([t.into(), r.into(), b.into(), l.into()])
}

const BORDER_STYLES: &[&str] = &[
    "none", "hidden", "dotted", "dashed", "solid", "double", "groove", "ridge", "inset", "outset",
];

fn border_edge(side: &str, value: &str) -> Vec<(String, String)> {
    let mut width = "medium".to_string();
    let mut style = "none".to_string();
    let mut color = "currentcolor".to_string();
    for token in component_values(value) {
        let lower = token.to_ascii_lowercase();
        if BORDER_STYLES.contains(&lower.as_str()) {
            style = lower;
        } else if is_length_like(&lower) || matches!(lower.as_str(), "thin" | "medium" | "thick") {
            width = token.to_string();
        } else {
            color = token.to_string();
        }
    }
    vec![
        (format!("border-{side}-width"), width),
        (format!("border-{side}-style"), style),
        (format!("border-{side}-color"), color),
    ]
}

fn background(value: &str) -> Vec<(String, String)> {
    let mut color = "rgba(0, 0, 0, 0)".to_string();
    let mut image = "none".to_string();
    for token in component_values(value) {
        if token.contains("gradient(") || token.starts_with("url(") {
            image = token.to_string();
        } else if csscolorparser::parse(token).is_ok() || token.eq_ignore_ascii_case("currentcolor") {
            color = token.to_string();
        }
    }
    vec![("background-color".into(), color), ("background-image".into(), image)]
}

fn flex(value: &str) -> Vec<(String, String)> {
    let parts = component_values(value);
    let (grow, shrink, basis) = match parts.as_slice() {
        ["none"] => ("0", "0", "auto"),
        ["auto"] => ("1", "1", "auto"),
        ["initial"] => ("0", "1", "auto"),
        [g] if g.parse::<f32>().is_ok() => (*g, "1", "0%"),
        [b] => ("1", "1", *b),
        [g, s] if s.parse::<f32>().is_ok() => (*g, *s, "0%"),
        [g, b] => (*g, "1", *b),
        [g, s, b, ..] => (*g, *s, *b),
        [] => return Vec::new(),
    };
    vec![
        ("flex-grow".into(), grow.into()),
        ("flex-shrink".into(), shrink.into()),
        ("flex-basis".into(), basis.into()),
    ]
}

/// True for `0` and numbers followed by a unit
pub fn is_length_like(token: &str) -> bool {
    if token == "0" {
        return true;
    }
    let digits_end = token
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(token.len());
    digits_end > 0 && digits_end < token.len() && token[..digits_end].parse::<f32>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get<'a>(v: &'a [(String, String)], name: &str) -> Option<&'a str> {
        v.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    #[test]
    fn box_shorthands_follow_css_order() {
        let m = expand("margin", "1px 2px 3px");
        assert_eq!(get(&m, "margin-top"), Some("1px"));
        assert_eq!(get(&m, "margin-right"), Some("2px"));
        assert_eq!(get(&m, "margin-bottom"), Some("3px"));
        assert_eq!(get(&m, "margin-left"), Some("2px"));
        assert!(expand("padding", "1px 2px 3px 4px 5px").is_empty());
    }

    #[test]
    fn border_shorthand_sets_every_edge() {
        let b = expand("border", "1px solid #ccc");
        assert_eq!(b.len(), 12);
        assert_eq!(get(&b, "border-left-color"), Some("#ccc"));
        let b = expand("border-bottom", "dashed rgb(1, 2, 3)");
        assert_eq!(get(&b, "border-bottom-width"), Some("medium"));
        assert_eq!(get(&b, "border-bottom-color"), Some("rgb(1, 2, 3)"));
    }

    #[test]
    fn background_and_flex_shorthands() {
        let bg = expand("background", "linear-gradient(red, blue) #fff");
        assert_eq!(get(&bg, "background-color"), Some("#fff"));
        assert_eq!(get(&bg, "background-image"), Some("linear-gradient(red, blue)"));
        let f = expand("flex", "1");
        assert_eq!(get(&f, "flex-basis"), Some("0%"));
        let f = expand("flex", "none");
        assert_eq!(get(&f, "flex-shrink"), Some("0"));
    }

    #[test]
    fn unknown_properties_are_dropped() {
        assert!(expand("grid-template-areas", "a").is_empty());
        assert_eq!(expand("color", "red"), vec![("color".to_string(), "red".to_string())]);
    }

    #[test]
    fn length_detection() {
        assert!(is_length_like("0"));
        assert!(is_length_like("1.5em"));
        assert!(!is_length_like("solid"));
        assert!(!is_length_like("12"));
    }
}
