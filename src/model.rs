use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::Serialize;

/// A leaf molecule of a synthesis tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BuildingBlock {
    /// SMILES of the molecule.
    pub structure: String,
    /// Catalogue index, when the input carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    /// Vendor identifier, when the input carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl BuildingBlock {
    pub fn new(structure: impl Into<String>) -> Self {
        Self { structure: structure.into(), index: None, id: None }
    }

    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// A reaction combining its children into a product.
///
/// The parser guarantees `children` is non-empty and `product_structure` is
/// not blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ReactionNode {
    pub reaction_name: String,
    pub children: Vec<SynthesisNode>,
    /// The product drawn for this step.
    pub product_structure: String,
    /// Further possible products, in the order they were listed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alternative_products: Vec<String>,
}

impl ReactionNode {
    /// Names made of ASCII letters, digits and `_ . : + -` survive a trip
    /// through the compact notation. Anything else is kept as given but
    /// will not parse back from [`SynthesisNode`]'s `Display` output.
    pub fn new(
        reaction_name: impl Into<String>,
        children: Vec<SynthesisNode>,
        product_structure: impl Into<String>,
    ) -> Self {
        Self {
            reaction_name: reaction_name.into(),
            children,
            product_structure: product_structure.into(),
            alternative_products: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SynthesisNode {
    BuildingBlock(BuildingBlock),
    Reaction(ReactionNode),
}

impl SynthesisNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self, SynthesisNode::BuildingBlock(_))
    }

    /// The molecule this node stands for: the block itself, or the reaction's product.
    pub fn structure(&self) -> &str {
        match self {
            SynthesisNode::BuildingBlock(block) => &block.structure,
            SynthesisNode::Reaction(reaction) => &reaction.product_structure,
        }
    }

    /// Number of levels in the tree; a lone building block has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            SynthesisNode::BuildingBlock(_) => 1,
            SynthesisNode::Reaction(reaction) => {
                1 + reaction.children.iter().map(SynthesisNode::depth).max().unwrap_or(0)
            }
        }
    }

    pub fn reaction_count(&self) -> usize {
        match self {
            SynthesisNode::BuildingBlock(_) => 0,
            SynthesisNode::Reaction(reaction) => {
                1 + reaction.children.iter().map(SynthesisNode::reaction_count).sum::<usize>()
            }
        }
    }

    /// The leaves of the tree, left to right.
    pub fn building_blocks(&self) -> Vec<&BuildingBlock> {
        let mut blocks = Vec::new();
        self.collect_building_blocks(&mut blocks);
        blocks
    }

    fn collect_building_blocks<'a>(&'a self, blocks: &mut Vec<&'a BuildingBlock>) {
        match self {
            SynthesisNode::BuildingBlock(block) => blocks.push(block),
            SynthesisNode::Reaction(reaction) => {
                for child in &reaction.children {
                    child.collect_building_blocks(blocks);
                }
            }
        }
    }
}

impl From<BuildingBlock> for SynthesisNode {
    fn from(block: BuildingBlock) -> Self {
        SynthesisNode::BuildingBlock(block)
    }
}

impl From<ReactionNode> for SynthesisNode {
    fn from(reaction: ReactionNode) -> Self {
        SynthesisNode::Reaction(reaction)
    }
}

/// Writes the compact notation, e.g. `amide_coupling(CCO;CC(=O)O)->CC(=O)OCC`.
///
/// Catalogue annotations and alternative products have no place in the
/// notation and are dropped. Nothing is escaped, so only trees whose reaction
/// names follow [`ReactionNode::new`]'s character set parse back unchanged.
impl Display for SynthesisNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SynthesisNode::BuildingBlock(block) => write!(f, "{}", block.structure),
            SynthesisNode::Reaction(reaction) => {
                write!(f, "{}(", reaction.reaction_name)?;
                for (i, child) in reaction.children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ";")?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, ")->{}", reaction.product_structure)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn esterification() -> SynthesisNode {
        ReactionNode::new(
            "esterification",
            vec![
                BuildingBlock::new("CCO").into(),
                ReactionNode::new(
                    "oxidation",
                    vec![BuildingBlock::new("CC=O").into()],
                    "CC(=O)O",
                )
                .into(),
            ],
            "CC(=O)OCC",
        )
        .into()
    }

    #[test]
    fn test_depth_and_counts() {
        let tree = esterification();
        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.reaction_count(), 2);
        assert!(!tree.is_leaf());
        assert_eq!(tree.structure(), "CC(=O)OCC");

        let leaf = SynthesisNode::from(BuildingBlock::new("CCO"));
        assert_eq!(leaf.depth(), 1);
        assert_eq!(leaf.reaction_count(), 0);
        assert!(leaf.is_leaf());
    }

    #[test]
    fn test_building_blocks_in_order() {
        let tree = esterification();
        let structures: Vec<&str> = tree
            .building_blocks()
            .into_iter()
            .map(|block| block.structure.as_str())
            .collect();
        assert_eq!(structures, vec!["CCO", "CC=O"]);
    }

    #[test]
    fn test_display_compact_notation() {
        assert_eq!(
            esterification().to_string(),
            "esterification(CCO;oxidation(CC=O)->CC(=O)O)->CC(=O)OCC"
        );
    }

    #[test]
    fn test_serialize_json() {
        let block = BuildingBlock::new("CCO").with_index("100").with_id("EN300-1");
        let json = serde_json::to_value(SynthesisNode::from(block)).unwrap();
        assert_eq!(json["kind"], "building_block");
        assert_eq!(json["structure"], "CCO");
        assert_eq!(json["index"], "100");
        assert_eq!(json["id"], "EN300-1");

        let json = serde_json::to_value(esterification()).unwrap();
        assert_eq!(json["kind"], "reaction");
        assert_eq!(json["children"][1]["reaction_name"], "oxidation");
        assert!(json.get("alternative_products").is_none());
    }

    #[test]
    fn test_display_round_trip_needs_plain_names() {
        let plain: SynthesisNode =
            ReactionNode::new("Pd-cat.2:suzuki+", vec![BuildingBlock::new("C").into()], "CC").into();
        assert_eq!(crate::parse_synthesis(&plain.to_string()), Ok(plain));

        let spaced: SynthesisNode =
            ReactionNode::new("amide coupling", vec![BuildingBlock::new("C").into()], "CC").into();
        assert_eq!(spaced.to_string(), "amide coupling(C)->CC");
        assert!(crate::parse_synthesis(&spaced.to_string()).is_err());
    }
}
