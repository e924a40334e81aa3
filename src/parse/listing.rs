//! The indented listing printed by prexsyn's `synthesis_to_string()`:
//!
//! ```text
//! - Reaction Index: 12
//!   Possible Products:
//!     - CC(=O)OCC
//!   Reactants:
//!     - SMILES: CCO
//!       Building Block Index: 100
//!       ID: EN300-1
//!     - SMILES: CC(=O)O
//!       Building Block Index: 200
//! ```

use nom::{
    bytes::complete::tag,
    character::complete::{char, space0, space1},
    combinator::rest,
    sequence::{pair, preceded, tuple},
    IResult,
};
use tracing::trace;

use super::{ParseError, MAX_SYNTHESIS_DEPTH};
use crate::{BuildingBlock, ReactionNode, SynthesisNode};

/// A non-blank input line.
#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    /// 1-based line number in the input.
    number: usize,
    indent: usize,
    text: &'a str,
}

/// `Name: value`
fn field<'a>(name: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    preceded(tuple((tag(name), char(':'), space0)), rest)
}

/// `- Name: value`
fn item_field<'a>(name: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    preceded(pair(char('-'), space1), field(name))
}

/// `- value`
fn list_item(input: &str) -> IResult<&str, &str> {
    preceded(pair(char('-'), space1), rest)(input)
}

fn value_of<'a>(
    mut parser: impl FnMut(&'a str) -> IResult<&'a str, &'a str>,
    text: &'a str,
) -> Option<&'a str> {
    parser(text).ok().map(|(_, value)| value.trim())
}

fn is_item(text: &str) -> bool {
    list_item(text).is_ok()
}

pub(super) fn parse_listing(text: &str) -> Result<Vec<SynthesisNode>, ParseError> {
    let lines: Vec<Line> = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            let trimmed = line.trim_start();
            Line { number: i + 1, indent: line.len() - trimmed.len(), text: trimmed.trim_end() }
        })
        .collect();
    if lines.is_empty() {
        return Err(ParseError::Empty);
    }

    let base_indent = item_indent(&lines);
    split_into_blocks(&lines, base_indent)
        .into_iter()
        .map(|block| parse_block(block, base_indent, 1))
        .collect()
}

/// Indentation of the first `- ` line.
fn item_indent(lines: &[Line]) -> usize {
    lines
        .iter()
        .find(|line| is_item(line.text))
        .map_or(0, |line| line.indent)
}

/// Splits lines into blocks that each start with a `- ` item at `base_indent`.
fn split_into_blocks<'l, 'a>(lines: &'l [Line<'a>], base_indent: usize) -> Vec<&'l [Line<'a>]> {
    let mut blocks = Vec::new();
    let mut start = 0;
    for (i, line) in lines.iter().enumerate() {
        if i > start && line.indent == base_indent && is_item(line.text) {
            blocks.push(&lines[start..i]);
            start = i;
        }
    }
    if start < lines.len() {
        blocks.push(&lines[start..]);
    }
    blocks
}

/// `depth` is the level of the node this block describes, 1 for a root.
fn parse_block(block: &[Line], base_indent: usize, depth: usize) -> Result<SynthesisNode, ParseError> {
    let first = block[0];
    if depth > MAX_SYNTHESIS_DEPTH {
        return Err(ParseError::ListingTooDeep { line: first.number, limit: MAX_SYNTHESIS_DEPTH });
    }
    if value_of(item_field("SMILES"), first.text).is_some() {
        parse_building_block(block)
    } else if let Some(name) = value_of(item_field("Reaction Index"), first.text) {
        parse_reaction(block, name, base_indent, depth)
    } else {
        Err(ParseError::UnexpectedLine { line: first.number, text: first.text.to_string() })
    }
}

fn parse_building_block(block: &[Line]) -> Result<SynthesisNode, ParseError> {
    let first = block[0];
    let structure = value_of(item_field("SMILES"), first.text).unwrap_or_default();
    if structure.is_empty() {
        return Err(ParseError::MissingField { line: first.number, field: "SMILES" });
    }

    let mut building_block = BuildingBlock::new(structure);
    for line in &block[1..] {
        if let Some(index) = value_of(field("Building Block Index"), line.text) {
            building_block.index = Some(index.to_string()).filter(|s| !s.is_empty());
        } else if let Some(id) = value_of(field("ID"), line.text) {
            building_block.id = Some(id.to_string()).filter(|s| !s.is_empty());
        } else {
            trace!(line = line.number, text = line.text, "ignoring building block line");
        }
    }
    Ok(building_block.into())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Products,
    Reactants,
}

fn parse_reaction(
    block: &[Line],
    name: &str,
    base_indent: usize,
    depth: usize,
) -> Result<SynthesisNode, ParseError> {
    let first = block[0];
    if name.is_empty() {
        return Err(ParseError::MissingField { line: first.number, field: "Reaction Index" });
    }

    // section headers sit two columns right of this node's item marker
    let header_indent = base_indent + 2;
    let mut section = Section::Header;
    let mut products: Vec<String> = Vec::new();
    let mut reactant_lines: Vec<Line> = Vec::new();
    let mut reactant_indent: Option<usize> = None;

    for line in &block[1..] {
        if line.indent == header_indent && line.text == "Possible Products:" {
            section = Section::Products;
            continue;
        }
        if line.indent == header_indent && line.text == "Reactants:" {
            section = Section::Reactants;
            continue;
        }
        match section {
            Section::Header => trace!(line = line.number, text = line.text, "ignoring reaction line"),
            Section::Products => match value_of(list_item, line.text) {
                Some(product) if !product.is_empty() => products.push(product.to_string()),
                _ => {
                    return Err(ParseError::UnexpectedLine { line: line.number, text: line.text.to_string() })
                }
            },
            Section::Reactants => {
                if reactant_indent.is_none() && is_item(line.text) {
                    reactant_indent = Some(line.indent);
                }
                reactant_lines.push(*line);
            }
        }
    }

    let mut children = Vec::new();
    if let Some(indent) = reactant_indent {
        for sub_block in split_into_blocks(&reactant_lines, indent) {
            children.push(parse_block(sub_block, indent, depth + 1)?);
        }
    }
    if children.is_empty() {
        return Err(ParseError::NoReactants { line: first.number, reaction: name.to_string() });
    }

    let mut products = products.into_iter();
    let Some(product) = products.next() else {
        return Err(ParseError::MissingField { line: first.number, field: "Possible Products" });
    };

    let mut reaction = ReactionNode::new(name, children, product);
    reaction.alternative_products = products.collect();
    Ok(reaction.into())
}
