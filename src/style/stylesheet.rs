//! Stylesheet parsing into ordered style rules

use crate::dom::{declaration_list, Declaration, SelectorList};
use cssparser::{Delimiter, ParseError, Parser, ParserInput, Token};
use selectors::parser::SelectorParseErrorKind;

#[derive(Debug, Clone)]
pub struct StyleRule {
    pub selectors: SelectorList,
    pub declarations: Vec<Declaration>,
    /// Position in the stylesheet, used as the final cascade tie breaker
    pub order: usize,
}

/// Parsed author stylesheet
#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    rules: Vec<StyleRule>,
    skipped: usize,
}

enum Parsed {
    Rule(SelectorList, Vec<Declaration>),
    AtRule(String),
}

impl Stylesheet {
    /// Parse stylesheet text. At-rules are skipped entirely, as are rules
    /// whose selector list is invalid.
    pub fn parse(text: &str) -> Self {
        let mut input = ParserInput::new(text);
        let mut parser = Parser::new(&mut input);
        let mut sheet = Stylesheet::default();

        while !parser.is_exhausted() {
            match parse_rule(&mut parser) {
                Ok(Parsed::Rule(selectors, declarations)) => {
                    let order = sheet.rules.len();
                    sheet.rules.push(StyleRule { selectors, declarations, order });
                }
                Ok(Parsed::AtRule(name)) => {
                    log::trace!("stylesheet: skipping @{} rule", name);
                    sheet.skipped += 1;
                }
                Err(e) => {
                    log::trace!("stylesheet: dropping rule at {:?}: {:?}", e.location, e.kind);
                    sheet.skipped += 1;
                    skip_block(&mut parser);
                }
            }
        }
        if sheet.skipped > 0 {
            log::debug!("stylesheet: {} rules kept, {} skipped", sheet.rules.len(), sheet.skipped);
        }
        sheet
    }

    pub fn rules(&self) -> &[StyleRule] {
        &self.rules
    }

    /// Number of rules or at-rules that were not kept
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

fn parse_rule<'i>(parser: &mut Parser<'i, '_>) -> Result<Parsed, ParseError<'i, SelectorParseErrorKind<'i>>> {
    let at_keyword = parser.try_parse(|p| match p.next()? {
        Token::AtKeyword(name) => Ok(name.to_string()),
        _ => Err(p.new_error_for_next_token::<()>()),
    });
    if let Ok(name) = at_keyword {
        // statement at-rules end at `;`, block at-rules at their block
        loop {
            match parser.next() {
                Ok(Token::Semicolon) | Ok(Token::CurlyBracketBlock) | Err(_) => break,
                Ok(_) => {}
            }
        }
        return Ok(Parsed::AtRule(name));
    }

    let selectors = parser.parse_until_before(Delimiter::CurlyBracketBlock, SelectorList::parse_tokens)?;
    parser.expect_curly_bracket_block()?;
    let declarations =
        parser.parse_nested_block(|block| Ok::<_, ParseError<SelectorParseErrorKind>>(declaration_list(block)))?;
    Ok(Parsed::Rule(selectors, declarations))
}

// Skip past the block of a rule whose prelude failed to parse
fn skip_block(parser: &mut Parser<'_, '_>) {
    loop {
        match parser.next() {
            Ok(Token::CurlyBracketBlock) | Err(_) => break,
            Ok(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rules_in_order() {
        let sheet = Stylesheet::parse(
            "/* theme */ h1 { color: #123; font-size: 2em }\n.cv p, li { margin: 0 0 4px; }",
        );
        assert_eq!(sheet.rules().len(), 2);
        assert_eq!(sheet.rules()[0].declarations[0].name, "color");
        assert_eq!(sheet.rules()[1].order, 1);
        assert_eq!(sheet.rules()[1].declarations[0].value, "0 0 4px");
    }

    #[test]
    fn skips_at_rules_and_invalid_selectors() {
        let sheet = Stylesheet::parse(
            "@import url(x.css);\n@media print { h1 { color: red } }\nh1:no-such-state { color: blue }\np { color: green }",
        );
        assert_eq!(sheet.rules().len(), 1);
        assert_eq!(sheet.skipped(), 3);
        assert_eq!(sheet.rules()[0].declarations[0].value, "green");
    }

    #[test]
    fn keeps_sibling_and_structural_rules() {
        let sheet = Stylesheet::parse("h1 + p { color: red } li:first-child { font-weight: 700 } p { margin: 0 }");
        assert_eq!(sheet.rules().len(), 3);
        assert_eq!(sheet.skipped(), 0);
    }

    #[test]
    fn braces_inside_strings_do_not_end_a_block() {
        let sheet = Stylesheet::parse("p::after { content: \"}\"; color: red } h2 { color: blue }");
        assert_eq!(sheet.rules().len(), 2);
        assert_eq!(sheet.rules()[1].declarations[0].value, "blue");
    }

    #[test]
    fn unbalanced_input_does_not_panic() {
        let sheet = Stylesheet::parse("p { color: red");
        assert_eq!(sheet.rules().len(), 1);
        let sheet = Stylesheet::parse("/* open comment");
        assert!(sheet.rules().is_empty());
    }
}
