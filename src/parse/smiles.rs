use std::collections::BTreeMap;

use petgraph::graph::NodeIndex;
use thiserror::Error;
use tracing::trace;

use crate::{Atom, Bond, Element, MoleculeGraph};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SmilesError {
    #[error("Empty SMILES string")]
    Empty,
    #[error("Unknown atom '{1}' at position {0}")]
    UnknownAtom(usize, String),
    #[error("Unexpected character '{1}' at position {0}")]
    UnexpectedCharacter(usize, char),
    #[error("Branch start '(' at position {0} without a current atom")]
    BranchNoCurrentAtom(usize),
    #[error("Branch end ')' at position {0} without a matching '('")]
    BranchEndNoStart(usize),
    #[error("Branch opened at position {0} is never closed")]
    UnclosedBranch(usize),
    #[error("Ring closure {1} at position {0} without a current atom")]
    RingClosureNoCurrentAtom(usize, u8),
    #[error("Ring closure {1} opened at position {0} is never closed")]
    UnclosedRing(usize, u8),
    #[error("Incomplete two-digit ring closure after '%' at position {0}")]
    IncompleteRingClosure(usize),
    #[error("Bond at position {0} is not followed by an atom")]
    DanglingBond(usize),
    #[error("Unclosed bracket '[' at position {0}")]
    UnclosedBracket(usize),
    #[error("Invalid bracket atom '[{1}]' at position {0}")]
    InvalidBracketAtom(usize, String),
}

/// Parses a SMILES string into a MoleculeGraph.
///
/// Supports the organic subset, aromatic atoms, bracket atoms (isotope,
/// chirality, hydrogen count, charge and class are accepted; charge is kept),
/// branches, single- and two-digit ring closures, bond symbols and `.`
/// disconnections. Stereo markers are read but not stored.
pub fn parse_smiles(smiles: &str) -> Result<MoleculeGraph, SmilesError> {
    let graph = SmilesReader::new(smiles).read()?;
    trace!(smiles, atoms = graph.node_count(), bonds = graph.edge_count(), "parsed SMILES");
    Ok(graph)
}

struct RingBond {
    atom: NodeIndex,
    bond: Option<Bond>,
    position: usize,
}

struct SmilesReader {
    chars: Vec<char>,
    graph: MoleculeGraph,
    current_atom: Option<NodeIndex>,
    pending_bond: Option<(Bond, usize)>,
    branch_stack: Vec<(NodeIndex, usize)>,
    ring_map: BTreeMap<u8, RingBond>,
}

impl SmilesReader {
    fn new(smiles: &str) -> Self {
        Self {
            chars: smiles.chars().collect(),
            graph: MoleculeGraph::new_undirected(),
            current_atom: None,
            pending_bond: None,
            branch_stack: Vec::new(),
            ring_map: BTreeMap::new(),
        }
    }

    fn read(mut self) -> Result<MoleculeGraph, SmilesError> {
        let mut i = 0;
        while i < self.chars.len() {
            let c = self.chars[i];
            match c {
                '(' => {
                    let atom = self.current_atom.ok_or(SmilesError::BranchNoCurrentAtom(i))?;
                    self.branch_stack.push((atom, i));
                    i += 1;
                }
                ')' => {
                    if let Some((_, position)) = self.pending_bond {
                        return Err(SmilesError::DanglingBond(position));
                    }
                    let (atom, _) = self.branch_stack.pop().ok_or(SmilesError::BranchEndNoStart(i))?;
                    self.current_atom = Some(atom);
                    i += 1;
                }
                '-' | '=' | '#' | '$' | ':' | '/' | '\\' => {
                    let bond = match c {
                        '=' => Bond::Double,
                        '#' => Bond::Triple,
                        '$' => Bond::Quadruple,
                        ':' => Bond::Aromatic,
                        // '/' and '\' are directional single bonds
                        _ => Bond::Single,
                    };
                    self.pending_bond = Some((bond, i));
                    i += 1;
                }
                '%' => {
                    let digits: Vec<u32> = self.chars[i + 1..]
                        .iter()
                        .take(2)
                        .map_while(|c| c.to_digit(10))
                        .collect();
                    if digits.len() != 2 {
                        return Err(SmilesError::IncompleteRingClosure(i));
                    }
                    self.ring_closure(i, (digits[0] * 10 + digits[1]) as u8)?;
                    i += 3;
                }
                '0'..='9' => {
                    let digit = c.to_digit(10).unwrap_or(0) as u8;
                    self.ring_closure(i, digit)?;
                    i += 1;
                }
                '[' => {
                    let end = self.chars[i..]
                        .iter()
                        .position(|&x| x == ']')
                        .map(|offset| i + offset)
                        .ok_or(SmilesError::UnclosedBracket(i))?;
                    let content: String = self.chars[i + 1..end].iter().collect();
                    let atom = parse_bracket_atom(&content)
                        .ok_or_else(|| SmilesError::InvalidBracketAtom(i, content.clone()))?;
                    self.add_atom(atom);
                    i = end + 1;
                }
                '.' => {
                    if let Some((_, position)) = self.pending_bond {
                        return Err(SmilesError::DanglingBond(position));
                    }
                    self.current_atom = None;
                    i += 1;
                }
                c if c.is_ascii_alphabetic() || c == '*' => {
                    let (atom, width) = self.organic_atom(i)?;
                    self.add_atom(atom);
                    i += width;
                }
                _ => return Err(SmilesError::UnexpectedCharacter(i, c)),
            }
        }

        if let Some((_, position)) = self.pending_bond {
            return Err(SmilesError::DanglingBond(position));
        }
        if let Some(&(_, position)) = self.branch_stack.last() {
            return Err(SmilesError::UnclosedBranch(position));
        }
        if let Some((&digit, ring)) = self.ring_map.iter().next() {
            return Err(SmilesError::UnclosedRing(ring.position, digit));
        }
        if self.graph.node_count() == 0 {
            return Err(SmilesError::Empty);
        }
        Ok(self.graph)
    }

    /// Reads an unbracketed atom starting at `i`, returning it and its width in characters.
    fn organic_atom(&self, i: usize) -> Result<(Atom, usize), SmilesError> {
        let c = self.chars[i];
        if let Some(&next) = self.chars.get(i + 1) {
            let pair: String = [c, next].iter().collect();
            if matches!(pair.as_str(), "Cl" | "Br") {
                if let Some(element) = Element::from_organic_subset(&pair) {
                    return Ok((Atom::new(element), 2));
                }
            }
        }
        let single = c.to_string();
        if let Some(element) = Element::from_organic_subset(&single) {
            return Ok((Atom::new(element), 1));
        }
        if let Some(element) = Element::from_aromatic_symbol(&single) {
            return Ok((Atom::aromatic(element), 1));
        }
        Err(SmilesError::UnknownAtom(i, single))
    }

    fn add_atom(&mut self, atom: Atom) {
        let new_atom = self.graph.add_node(atom);
        if let Some(prev_atom) = self.current_atom {
            let bond = self.bond_between(prev_atom, new_atom, None);
            self.graph.add_edge(prev_atom, new_atom, bond);
        }
        self.pending_bond = None;
        self.current_atom = Some(new_atom);
    }

    /// Resolves the bond order for a new bond, consuming any pending bond symbol.
    fn bond_between(&mut self, a: NodeIndex, b: NodeIndex, fallback: Option<Bond>) -> Bond {
        if let Some((bond, _)) = self.pending_bond.take() {
            return bond;
        }
        if let Some(bond) = fallback {
            return bond;
        }
        if self.graph[a].aromatic && self.graph[b].aromatic {
            Bond::Aromatic
        } else {
            Bond::Single
        }
    }

    fn ring_closure(&mut self, position: usize, digit: u8) -> Result<(), SmilesError> {
        let current = self
            .current_atom
            .ok_or(SmilesError::RingClosureNoCurrentAtom(position, digit))?;
        if let Some(open) = self.ring_map.remove(&digit) {
            let bond = self.bond_between(open.atom, current, open.bond);
            if open.atom != current {
                self.graph.add_edge(open.atom, current, bond);
            }
        } else {
            let bond = self.pending_bond.take().map(|(bond, _)| bond);
            self.ring_map.insert(digit, RingBond { atom: current, bond, position });
        }
        Ok(())
    }
}

/// Parses the content of a bracket atom such as `13CH3+`, `nH`, `C@@H` or `O-`.
fn parse_bracket_atom(content: &str) -> Option<Atom> {
    let chars: Vec<char> = content.chars().collect();
    let mut i = 0;

    // isotope
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }

    let first = *chars.get(i)?;
    let (element, aromatic) = if first == '*' {
        i += 1;
        (Element::WILDCARD, false)
    } else if first.is_ascii_uppercase() {
        let two: Option<String> = chars
            .get(i + 1)
            .filter(|c| c.is_ascii_lowercase())
            .map(|&second| [first, second].iter().collect());
        match two.as_deref().and_then(Element::from_symbol) {
            Some(element) => {
                i += 2;
                (element, false)
            }
            None => {
                i += 1;
                (Element::from_symbol(&first.to_string())?, false)
            }
        }
    } else if first.is_ascii_lowercase() {
        let two: Option<String> = chars.get(i + 1).map(|&second| [first, second].iter().collect());
        match two.as_deref().and_then(Element::from_aromatic_symbol) {
            Some(element) => {
                i += 2;
                (element, true)
            }
            None => {
                i += 1;
                (Element::from_aromatic_symbol(&first.to_string())?, true)
            }
        }
    } else {
        return None;
    };

    // chirality, including the @TH1 / @SP2 style classes
    if i < chars.len() && chars[i] == '@' {
        i += 1;
        if i < chars.len() && chars[i] == '@' {
            i += 1;
        } else {
            let class: String = chars[i..].iter().take(2).collect();
            if matches!(class.as_str(), "TH" | "AL" | "SP" | "TB" | "OH") {
                i += 2;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
        }
    }

    // hydrogen count
    if i < chars.len() && chars[i] == 'H' {
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }

    // charge
    let mut charge: i8 = 0;
    if i < chars.len() && (chars[i] == '+' || chars[i] == '-') {
        let sign = chars[i];
        let unit: i8 = if sign == '+' { 1 } else { -1 };
        i += 1;
        let digits_start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        if i > digits_start {
            let magnitude: String = chars[digits_start..i].iter().collect();
            charge = unit * magnitude.parse::<i8>().ok()?;
        } else {
            charge = unit;
            while i < chars.len() && chars[i] == sign {
                charge = charge.checked_add(unit)?;
                i += 1;
            }
        }
    }

    // atom class
    if i < chars.len() && chars[i] == ':' {
        i += 1;
        let class_start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        if i == class_start {
            return None;
        }
    }

    if i != chars.len() {
        return None;
    }
    Some(Atom { element, aromatic, charge })
}
