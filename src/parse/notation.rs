//! The compact one-line notation: `reaction(child;child)->product`.
//!
//! Structure strings may themselves contain parentheses (SMILES branches), so
//! `NAME(` only opens a reaction when its balanced group is followed by `->`.

use tracing::trace;

use super::{ParseError, MAX_SYNTHESIS_DEPTH};
use crate::{BuildingBlock, ReactionNode, SynthesisNode};

pub(super) fn parse_notation(text: &str) -> Result<SynthesisNode, ParseError> {
    let mut parser = NotationParser { text, pos: 0, depth: 0 };
    parser.skip_whitespace();
    if parser.at_end() {
        return Err(ParseError::Empty);
    }
    let root = parser.node(None)?;
    parser.skip_whitespace();
    if !parser.at_end() {
        return Err(ParseError::TrailingInput {
            position: parser.pos,
            fragment: parser.rest().to_string(),
        });
    }
    Ok(root)
}

/// What the text at the cursor turns out to be after the reaction lookahead.
enum Lookahead {
    /// A reaction whose name ends (and whose `(` sits) at this offset.
    Reaction(usize),
    /// `NAME(a;b)` with no `->`, which can only be a reaction missing its product.
    ReactionWithoutProduct,
    Structure,
}

struct NotationParser<'a> {
    text: &'a str,
    pos: usize,
    /// Reactions currently open around the cursor.
    depth: usize,
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b':' | b'+')
}

impl<'a> NotationParser<'a> {
    fn bytes(&self) -> &'a [u8] {
        let text = self.text;
        text.as_bytes()
    }

    fn rest(&self) -> &'a str {
        let text = self.text;
        &text[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes().get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn found(&self) -> String {
        self.rest().chars().next().map(String::from).unwrap_or_default()
    }

    fn node(&mut self, parent: Option<&str>) -> Result<SynthesisNode, ParseError> {
        self.skip_whitespace();
        match (self.peek(), parent) {
            (None, _) => {
                return Err(ParseError::UnexpectedEnd {
                    position: self.pos,
                    expected: "a structure or reaction",
                })
            }
            (Some(b';' | b')'), Some(reaction)) => {
                return Err(ParseError::EmptyChild {
                    position: self.pos,
                    reaction: reaction.to_string(),
                })
            }
            _ => {}
        }
        if self.depth >= MAX_SYNTHESIS_DEPTH {
            return Err(ParseError::TooDeep { position: self.pos, limit: MAX_SYNTHESIS_DEPTH });
        }

        match self.lookahead() {
            Lookahead::Reaction(name_end) => self.reaction(name_end),
            Lookahead::ReactionWithoutProduct => {
                let name_end = self.pos + self.rest().bytes().take_while(|&b| is_name_byte(b)).count();
                Err(ParseError::MissingProduct {
                    position: self.pos,
                    reaction: self.text[self.pos..name_end].to_string(),
                })
            }
            Lookahead::Structure => {
                let position = self.pos;
                let structure = self.structure()?;
                if structure.is_empty() {
                    return Err(ParseError::Unexpected {
                        position,
                        found: self.found(),
                        expected: "a structure",
                    });
                }
                trace!(position, structure, "building block");
                Ok(BuildingBlock::new(structure).into())
            }
        }
    }

    /// Scans `NAME(...)` without consuming anything.
    fn lookahead(&self) -> Lookahead {
        let bytes = self.bytes();
        let mut i = self.pos;
        while i < bytes.len() && is_name_byte(bytes[i]) && !bytes[i..].starts_with(b"->") {
            i += 1;
        }
        if i == self.pos || bytes.get(i) != Some(&b'(') {
            return Lookahead::Structure;
        }
        let name_end = i;

        let mut depth = 0usize;
        let mut separated = false;
        for (offset, &b) in bytes[name_end..].iter().enumerate() {
            match b {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        let after = self.text[name_end + offset + 1..].trim_start();
                        return if after.starts_with("->") {
                            Lookahead::Reaction(name_end)
                        } else if separated {
                            Lookahead::ReactionWithoutProduct
                        } else {
                            Lookahead::Structure
                        };
                    }
                }
                b';' if depth == 1 => separated = true,
                _ => {}
            }
        }
        Lookahead::Structure
    }

    fn reaction(&mut self, name_end: usize) -> Result<SynthesisNode, ParseError> {
        let text = self.text;
        let start = self.pos;
        let name = &text[start..name_end];
        let open = name_end;
        self.pos = name_end + 1;

        self.depth += 1;
        let children = self.children(name, start, open);
        self.depth -= 1;
        let children = children?;

        self.skip_whitespace();
        if !self.rest().starts_with("->") {
            return Err(ParseError::MissingProduct { position: self.pos, reaction: name.to_string() });
        }
        self.pos += 2;
        self.skip_whitespace();
        let product_position = self.pos;
        let product = self.structure()?;
        if product.is_empty() {
            return Err(ParseError::MissingProduct {
                position: product_position,
                reaction: name.to_string(),
            });
        }

        trace!(position = start, name, children = children.len(), product, "reaction");
        Ok(ReactionNode::new(name, children, product).into())
    }

    /// Parses `child;child;...)` up to and including the closing parenthesis.
    fn children(&mut self, name: &str, start: usize, open: usize) -> Result<Vec<SynthesisNode>, ParseError> {
        let text = self.text;
        let mut children = vec![self.node(Some(name))?];
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b';') => {
                    self.pos += 1;
                    children.push(self.node(Some(name))?);
                }
                Some(b')') => {
                    self.pos += 1;
                    break;
                }
                None => {
                    return Err(ParseError::Unbalanced {
                        position: open,
                        fragment: text[start..].to_string(),
                    })
                }
                Some(_) => {
                    return Err(ParseError::Unexpected {
                        position: self.pos,
                        found: self.found(),
                        expected: "';' or ')'",
                    })
                }
            }
        }
        Ok(children)
    }

    /// Consumes a structure token. Parentheses inside it must balance; it ends
    /// at whitespace, `->`, or a `;` / `)` that is not nested in the token.
    fn structure(&mut self) -> Result<&'a str, ParseError> {
        let text = self.text;
        let bytes = text.as_bytes();
        let start = self.pos;
        let mut depth = 0usize;
        let mut outer_open = start;
        let mut i = start;
        while i < bytes.len() {
            match bytes[i] {
                b if b.is_ascii_whitespace() => break,
                b';' => break,
                b')' if depth == 0 => break,
                b')' => depth -= 1,
                b'(' => {
                    if depth == 0 {
                        outer_open = i;
                    }
                    depth += 1;
                }
                b'-' if depth == 0 && bytes[i..].starts_with(b"->") => break,
                _ => {}
            }
            i += 1;
        }
        if depth > 0 {
            return Err(ParseError::Unbalanced {
                position: outer_open,
                fragment: text[start..i].to_string(),
            });
        }
        self.pos = i;
        Ok(&text[start..i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(structure: &str) -> SynthesisNode {
        BuildingBlock::new(structure).into()
    }

    #[test]
    fn test_leaf_is_verbatim() {
        for token in ["CCO", "CC(=O)O", "c1ccccc1", "[NH4+]", "C(C)(C)C", "not_a_molecule"] {
            assert_eq!(parse_notation(token), Ok(leaf(token)));
        }
    }

    #[test]
    fn test_single_reaction() {
        let parsed = parse_notation("amide_coupling(CCO;CC(=O)O)->CC(=O)OCC").unwrap();
        let expected: SynthesisNode = ReactionNode::new(
            "amide_coupling",
            vec![leaf("CCO"), leaf("CC(=O)O")],
            "CC(=O)OCC",
        )
        .into();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_whitespace_around_delimiters() {
        let parsed = parse_notation("  amide_coupling( CCO ;\n CC(=O)O ) -> CC(=O)OCC \n").unwrap();
        assert_eq!(parsed.to_string(), "amide_coupling(CCO;CC(=O)O)->CC(=O)OCC");
    }

    #[test]
    fn test_nested_depth() {
        let parsed = parse_notation("a(b(c(CCO)->CC=O;N)->CC(=O)N;Cl)->ClCC(=O)N").unwrap();
        assert_eq!(parsed.depth(), 4);
        assert_eq!(parsed.reaction_count(), 3);
        let SynthesisNode::Reaction(outer) = &parsed else {
            panic!("expected a reaction, got {parsed:?}");
        };
        assert_eq!(outer.reaction_name, "a");
        assert_eq!(outer.children.len(), 2);
        assert_eq!(outer.children[1], leaf("Cl"));
        assert_eq!(outer.children[0].structure(), "CC(=O)N");
    }

    #[test]
    fn test_numeric_reaction_names() {
        let parsed = parse_notation("12(CCO;C(=O)Cl)->CCOC(=O)").unwrap();
        let SynthesisNode::Reaction(reaction) = parsed else {
            panic!("expected a reaction");
        };
        assert_eq!(reaction.reaction_name, "12");
        assert_eq!(reaction.children[1], leaf("C(=O)Cl"));
    }

    #[test]
    fn test_round_trip() {
        for text in [
            "CCO",
            "amide_coupling(CCO;CC(=O)O)->CC(=O)OCC",
            "suzuki(Brc1ccccc1;OB(O)c1ccccc1)->c1ccc(-c2ccccc2)cc1",
            "a(b(c(CCO)->CC=O;N)->CC(=O)N;Cl)->ClCC(=O)N",
        ] {
            let tree = parse_notation(text).unwrap();
            assert_eq!(tree.to_string(), text);
            assert_eq!(parse_notation(&tree.to_string()).unwrap(), tree);
        }
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse_notation(""), Err(ParseError::Empty));
        assert_eq!(parse_notation(" \n\t"), Err(ParseError::Empty));
    }

    #[test]
    fn test_unbalanced() {
        assert!(matches!(
            parse_notation("amide_coupling(CCO;CC(=O)O"),
            Err(ParseError::Unbalanced { position: 14, .. })
        ));
        assert!(matches!(
            parse_notation("CC(=O"),
            Err(ParseError::Unbalanced { position: 2, .. })
        ));
        assert!(matches!(
            parse_notation("CCO)"),
            Err(ParseError::TrailingInput { position: 3, .. })
        ));
        assert!(matches!(
            parse_notation("a(b(CCO)->CC;N->C"),
            Err(ParseError::Unbalanced { .. })
        ));
    }

    #[test]
    fn test_empty_children() {
        assert_eq!(
            parse_notation("rxn()->C"),
            Err(ParseError::EmptyChild { position: 4, reaction: "rxn".to_string() })
        );
        assert_eq!(
            parse_notation("rxn(CCO;)->C"),
            Err(ParseError::EmptyChild { position: 8, reaction: "rxn".to_string() })
        );
    }

    #[test]
    fn test_missing_product() {
        assert_eq!(
            parse_notation("rxn(CCO;CC)"),
            Err(ParseError::MissingProduct { position: 0, reaction: "rxn".to_string() })
        );
        assert_eq!(
            parse_notation("rxn(CCO;CC)->"),
            Err(ParseError::MissingProduct { position: 13, reaction: "rxn".to_string() })
        );
        assert_eq!(
            parse_notation("rxn(CCO;CC)->  ;"),
            Err(ParseError::MissingProduct { position: 15, reaction: "rxn".to_string() })
        );
    }

    #[test]
    fn test_trailing_input() {
        assert_eq!(
            parse_notation("CCO CC"),
            Err(ParseError::TrailingInput { position: 4, fragment: "CC".to_string() })
        );
        assert_eq!(
            parse_notation("rxn(CCO;CC)->C;X"),
            Err(ParseError::TrailingInput { position: 14, fragment: ";X".to_string() })
        );
    }

    /// `reactions` nested single-child reactions around one `C`.
    fn nested_chain(reactions: usize) -> String {
        format!("{}C{}", "r(".repeat(reactions), ")->C".repeat(reactions))
    }

    #[test]
    fn test_nesting_limit() {
        let tree = parse_notation(&nested_chain(MAX_SYNTHESIS_DEPTH - 1)).unwrap();
        assert_eq!(tree.depth(), MAX_SYNTHESIS_DEPTH);

        assert_eq!(
            parse_notation(&nested_chain(MAX_SYNTHESIS_DEPTH)),
            Err(ParseError::TooDeep { position: 2 * MAX_SYNTHESIS_DEPTH, limit: MAX_SYNTHESIS_DEPTH })
        );
        // far past the limit still fails cleanly instead of exhausting the stack
        assert!(matches!(parse_notation(&nested_chain(5000)), Err(ParseError::TooDeep { .. })));
    }

    #[test]
    fn test_wide_reaction() {
        let children = vec!["CCO"; 5000].join(";");
        let tree = parse_notation(&format!("mix({children})->CCO")).unwrap();
        let SynthesisNode::Reaction(reaction) = &tree else {
            panic!("expected a reaction");
        };
        assert_eq!(reaction.children.len(), 5000);
        assert_eq!(tree.depth(), 2);
    }
}
