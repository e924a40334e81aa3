mod listing;
mod notation;

mod smiles;
pub use smiles::*;

use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

use crate::SynthesisNode;

/// Deepest synthesis tree the parsers accept; a lone building block has depth 1.
pub const MAX_SYNTHESIS_DEPTH: usize = 128;

/// Why a synthesis text could not be read.
///
/// Compact-notation errors carry a byte `position`; listing errors carry a
/// 1-based `line`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("synthesis text is empty")]
    Empty,
    #[error("unexpected end of input at position {position}: expected {expected}")]
    UnexpectedEnd { position: usize, expected: &'static str },
    #[error("unexpected '{found}' at position {position}: expected {expected}")]
    Unexpected { position: usize, found: String, expected: &'static str },
    #[error("unbalanced '(' at position {position} in \"{fragment}\"")]
    Unbalanced { position: usize, fragment: String },
    #[error("empty child at position {position} in reaction \"{reaction}\"")]
    EmptyChild { position: usize, reaction: String },
    #[error("reaction \"{reaction}\" at position {position} has no product structure")]
    MissingProduct { position: usize, reaction: String },
    #[error("unexpected trailing input at position {position}: \"{fragment}\"")]
    TrailingInput { position: usize, fragment: String },
    #[error("synthesis nested deeper than {limit} levels at position {position}")]
    TooDeep { position: usize, limit: usize },
    #[error("line {line}: unexpected \"{text}\"")]
    UnexpectedLine { line: usize, text: String },
    #[error("line {line}: missing {field}")]
    MissingField { line: usize, field: &'static str },
    #[error("line {line}: reaction \"{reaction}\" has no reactants")]
    NoReactants { line: usize, reaction: String },
    #[error("line {line}: synthesis nested deeper than {limit} levels")]
    ListingTooDeep { line: usize, limit: usize },
    #[error("expected a single synthesis tree, found {0}")]
    MultipleRoots(usize),
}

/// Parses every top-level tree in `text`.
///
/// Text whose first non-blank line starts with `- ` is read as a prexsyn
/// listing, which may hold several trees. Anything else is read as the compact
/// notation, which holds exactly one.
pub fn parse_forest(text: &str) -> Result<Vec<SynthesisNode>, ParseError> {
    let Some(first_line) = text.lines().find(|line| !line.trim().is_empty()) else {
        return Err(ParseError::Empty);
    };

    let forest = if first_line.trim_start().starts_with("- ") {
        debug!("parsing prexsyn listing");
        listing::parse_listing(text)?
    } else {
        debug!("parsing compact notation");
        vec![notation::parse_notation(text)?]
    };

    debug!(
        roots = forest.len(),
        reactions = forest.iter().map(SynthesisNode::reaction_count).sum::<usize>(),
        "parsed synthesis"
    );
    Ok(forest)
}

/// Parses `text` into a single synthesis tree.
pub fn parse_synthesis(text: &str) -> Result<SynthesisNode, ParseError> {
    let mut forest = parse_forest(text)?;
    if forest.len() != 1 {
        return Err(ParseError::MultipleRoots(forest.len()));
    }
    Ok(forest.remove(0))
}

impl FromStr for SynthesisNode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_synthesis(s)
    }
}
