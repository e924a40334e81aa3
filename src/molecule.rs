use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use lazy_static::lazy_static;

/// Element symbols indexed by atomic number. Index 0 is the SMILES wildcard `*`.
const SYMBOLS: [&str; 119] = [
    "*", "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S",
    "Cl", "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge",
    "As", "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd",
    "In", "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd",
    "Tb", "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg",
    "Tl", "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm",
    "Bk", "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn",
    "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
];

lazy_static! {
    static ref ATOMIC_NUMBERS: HashMap<&'static str, u8> = SYMBOLS
        .iter()
        .enumerate()
        .filter_map(|(number, symbol)| u8::try_from(number).ok().map(|n| (*symbol, n)))
        .collect();
}

/// A chemical element, stored as its atomic number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Element(u8);

impl Element {
    pub const WILDCARD: Element = Element(0);
    pub const H: Element = Element(1);
    pub const B: Element = Element(5);
    pub const C: Element = Element(6);
    pub const N: Element = Element(7);
    pub const O: Element = Element(8);
    pub const F: Element = Element(9);
    pub const P: Element = Element(15);
    pub const S: Element = Element(16);
    pub const CL: Element = Element(17);
    pub const BR: Element = Element(35);
    pub const I: Element = Element(53);

    /// Look up an element by its capitalised symbol (`"Cl"`, not `"cl"`).
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        ATOMIC_NUMBERS.get(symbol).copied().map(Element)
    }

    /// Elements that may appear outside brackets in SMILES.
    pub fn from_organic_subset(symbol: &str) -> Option<Self> {
        match symbol {
            "B" | "C" | "N" | "O" | "P" | "S" | "F" | "Cl" | "Br" | "I" | "*" => {
                Self::from_symbol(symbol)
            }
            _ => None,
        }
    }

    /// Elements that may be written in lowercase to mark aromaticity.
    pub fn from_aromatic_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "b" | "c" | "n" | "o" | "p" | "s" | "se" | "as" => {
                let mut chars = symbol.chars();
                let first = chars.next()?.to_ascii_uppercase();
                let capitalised: String = std::iter::once(first).chain(chars).collect();
                Self::from_symbol(&capitalised)
            }
            _ => None,
        }
    }

    pub fn atomic_number(self) -> u8 {
        self.0
    }

    pub fn symbol(self) -> &'static str {
        SYMBOLS[usize::from(self.0)]
    }

    /// Graphviz colour used when drawing this element.
    pub fn color(self) -> &'static str {
        match self {
            Element::C => "black",
            Element::H => "gray",
            Element::O => "red",
            Element::N => "blue",
            Element::S => "gold3",
            Element::P => "darkorange",
            Element::F => "pink3",
            Element::CL => "darkgreen",
            Element::BR => "brown",
            Element::I => "purple",
            _ => "gray40",
        }
    }
}

impl Display for Element {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.symbol())
    }
}

/// An atom node of a molecule graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Atom {
    pub element: Element,
    pub aromatic: bool,
    pub charge: i8,
}

impl Atom {
    pub fn new(element: Element) -> Self {
        Self { element, aromatic: false, charge: 0 }
    }

    pub fn aromatic(element: Element) -> Self {
        Self { element, aromatic: true, charge: 0 }
    }

    /// Label drawn for the atom, e.g. `N+` or `O-`.
    pub fn label(&self) -> String {
        match self.charge {
            0 => self.element.symbol().to_string(),
            1 => format!("{}+", self.element),
            -1 => format!("{}-", self.element),
            c if c > 0 => format!("{}{}+", self.element, c),
            c => format!("{}{}-", self.element, -c),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bond {
    Single,
    Double,
    Triple,
    Quadruple,
    Aromatic,
}

impl Bond {
    /// Number of parallel strokes used to draw the bond.
    pub fn strokes(self) -> usize {
        match self {
            Bond::Single | Bond::Aromatic => 1,
            Bond::Double => 2,
            Bond::Triple => 3,
            Bond::Quadruple => 4,
        }
    }
}

pub type MoleculeGraph = petgraph::graph::UnGraph<Atom, Bond>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_symbols() {
        assert_eq!(Element::from_symbol("C"), Some(Element::C));
        assert_eq!(Element::from_symbol("Cl"), Some(Element::CL));
        assert_eq!(Element::from_symbol("Og").map(Element::atomic_number), Some(118));
        assert_eq!(Element::from_symbol("cl"), None);
        assert_eq!(Element::from_symbol("Xx"), None);
        assert_eq!(Element::BR.symbol(), "Br");
        assert_eq!(Element::WILDCARD.to_string(), "*");
    }

    #[test]
    fn test_organic_subset() {
        assert_eq!(Element::from_organic_subset("Br"), Some(Element::BR));
        assert_eq!(Element::from_organic_subset("Na"), None);
        assert_eq!(Element::from_aromatic_symbol("c"), Some(Element::C));
        assert_eq!(Element::from_aromatic_symbol("se").map(Element::symbol), Some("Se"));
        assert_eq!(Element::from_aromatic_symbol("t"), None);
    }

    #[test]
    fn test_atom_label() {
        let mut atom = Atom::new(Element::N);
        assert_eq!(atom.label(), "N");
        atom.charge = 1;
        assert_eq!(atom.label(), "N+");
        atom.charge = -2;
        assert_eq!(atom.label(), "N2-");
    }

    #[test]
    fn test_bond_strokes() {
        assert_eq!(Bond::Single.strokes(), 1);
        assert_eq!(Bond::Double.strokes(), 2);
        assert_eq!(Bond::Triple.strokes(), 3);
        assert_eq!(Bond::Aromatic.strokes(), 1);
    }
}
