mod graphviz;
pub use graphviz::*;

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::{parse_smiles, MoleculeGraph, SmilesError, SynthesisNode};

pub const MIN_NODE_IMAGE_SIZE: u32 = 32;
pub const MAX_NODE_IMAGE_SIZE: u32 = 1024;
pub const MIN_DPI: u32 = 36;
pub const MAX_DPI: u32 = 600;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("invalid structure \"{structure}\": {source}")]
    InvalidStructure {
        structure: String,
        #[source]
        source: SmilesError,
    },
    #[error("invalid render options: {0}")]
    InvalidOptions(String),
    #[error("nothing to render")]
    Empty,
    #[error("graphviz program `{program}` is not available")]
    EngineUnavailable { program: String },
    #[error("`{program}` failed: {message}")]
    Engine { program: String, message: String },
    #[error("I/O error while rendering: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Whether the error was caused by the request rather than the rendering machinery.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            RenderError::InvalidStructure { .. } | RenderError::InvalidOptions(_) | RenderError::Empty
        )
    }
}

/// Graphviz `rankdir`: the direction reactions flow in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RankDir {
    #[default]
    LR,
    RL,
    TB,
    BT,
}

impl Display for RankDir {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            RankDir::LR => "LR",
            RankDir::RL => "RL",
            RankDir::TB => "TB",
            RankDir::BT => "BT",
        };
        write!(f, "{name}")
    }
}

impl FromStr for RankDir {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LR" => Ok(RankDir::LR),
            "RL" => Ok(RankDir::RL),
            "TB" => Ok(RankDir::TB),
            "BT" => Ok(RankDir::BT),
            _ => Err(RenderError::InvalidOptions(format!(
                "unknown layout direction \"{s}\" (expected LR, RL, TB or BT)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Width and height of each molecule depiction, in pixels.
    pub node_image_size: u32,
    pub rankdir: RankDir,
    pub dpi: u32,
    pub fontname: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            node_image_size: 200,
            rankdir: RankDir::LR,
            dpi: 200,
            fontname: "Fira Sans".to_string(),
        }
    }
}

impl RenderOptions {
    pub fn validate(&self) -> Result<(), RenderError> {
        if !(MIN_NODE_IMAGE_SIZE..=MAX_NODE_IMAGE_SIZE).contains(&self.node_image_size) {
            return Err(RenderError::InvalidOptions(format!(
                "node image size {} is outside {MIN_NODE_IMAGE_SIZE}..={MAX_NODE_IMAGE_SIZE}",
                self.node_image_size
            )));
        }
        if !(MIN_DPI..=MAX_DPI).contains(&self.dpi) {
            return Err(RenderError::InvalidOptions(format!(
                "dpi {} is outside {MIN_DPI}..={MAX_DPI}",
                self.dpi
            )));
        }
        if self.fontname.trim().is_empty() {
            return Err(RenderError::InvalidOptions("font name is empty".to_string()));
        }
        Ok(())
    }
}

/// Draws a molecule as a square PNG file.
pub trait MoleculeDepictor: Send + Sync {
    fn depict(&self, molecule: &MoleculeGraph, size: u32, output: &Path) -> Result<(), RenderError>;
}

/// Lays out a DOT graph and rasterizes it to PNG bytes.
///
/// `workdir` holds the depiction images the graph refers to.
pub trait LayoutEngine: Send + Sync {
    fn rasterize(&self, dot: &str, workdir: &Path) -> Result<Vec<u8>, RenderError>;
}

/// One box of the diagram: a depiction and the text lines under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramNode {
    pub image: PathBuf,
    pub annotations: Vec<String>,
}

/// Edges run from a reactant to the reaction that consumes it.
pub type Diagram = DiGraph<DiagramNode, ()>;

pub struct Renderer {
    depictor: Box<dyn MoleculeDepictor>,
    layout: Box<dyn LayoutEngine>,
}

impl Renderer {
    pub fn new(depictor: impl MoleculeDepictor + 'static, layout: impl LayoutEngine + 'static) -> Self {
        Self { depictor: Box::new(depictor), layout: Box::new(layout) }
    }

    /// A renderer that shells out to Graphviz for both molecules and the diagram.
    pub fn graphviz(graphviz: Graphviz) -> Self {
        Self::new(graphviz.clone(), graphviz)
    }

    pub fn render(&self, root: &SynthesisNode, options: &RenderOptions) -> Result<Vec<u8>, RenderError> {
        self.render_forest(std::slice::from_ref(root), options)
    }

    /// Renders several trees side by side in one image.
    #[instrument(skip_all, fields(roots = roots.len()))]
    pub fn render_forest(&self, roots: &[SynthesisNode], options: &RenderOptions) -> Result<Vec<u8>, RenderError> {
        options.validate()?;
        if roots.is_empty() {
            return Err(RenderError::Empty);
        }

        let scratch = tempfile::Builder::new().prefix("synthviz-").tempdir()?;
        let diagram = self.build_diagram(roots, options, scratch.path())?;
        let dot = diagram_to_dot(&diagram, options);
        debug!(nodes = diagram.node_count(), edges = diagram.edge_count(), "laying out diagram");

        let png = self.layout.rasterize(&dot, scratch.path())?;
        debug!(bytes = png.len(), "rendered synthesis diagram");
        Ok(png)
    }

    fn build_diagram(
        &self,
        roots: &[SynthesisNode],
        options: &RenderOptions,
        workdir: &Path,
    ) -> Result<Diagram, RenderError> {
        let mut diagram = Diagram::new();
        for root in roots {
            self.add_node(&mut diagram, root, options, workdir)?;
        }
        Ok(diagram)
    }

    /// Depth-first: a node is added before its children.
    fn add_node(
        &self,
        diagram: &mut Diagram,
        node: &SynthesisNode,
        options: &RenderOptions,
        workdir: &Path,
    ) -> Result<NodeIndex, RenderError> {
        let image = workdir.join(format!("n{}.png", diagram.node_count()));
        self.depict(node.structure(), options.node_image_size, &image)?;

        let annotations = match node {
            SynthesisNode::BuildingBlock(block) => block
                .index
                .iter()
                .cloned()
                .chain(block.id.iter().map(|id| format!("ID: {id}")))
                .collect(),
            SynthesisNode::Reaction(reaction) => vec![format!("Reaction: {}", reaction.reaction_name)],
        };
        let index = diagram.add_node(DiagramNode { image, annotations });

        if let SynthesisNode::Reaction(reaction) = node {
            for child in &reaction.children {
                let child_index = self.add_node(diagram, child, options, workdir)?;
                diagram.add_edge(child_index, index, ());
            }
        }
        Ok(index)
    }

    fn depict(&self, structure: &str, size: u32, output: &Path) -> Result<(), RenderError> {
        let molecule = parse_smiles(structure).map_err(|source| RenderError::InvalidStructure {
            structure: structure.to_string(),
            source,
        })?;
        self.depictor.depict(&molecule, size, output)
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn escape_quoted(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// HTML-like Graphviz label: the depiction on top, annotations below.
fn node_label(node: &DiagramNode) -> String {
    let mut label = String::from(
        r#"<TABLE STYLE="ROUNDED" BORDER="0" CELLBORDER="0" CELLSPACING="5" CELLPADDING="0" BGCOLOR="grey97">"#,
    );
    label.push_str(&format!(
        r#"<TR><TD><IMG SRC="{}"/></TD></TR>"#,
        escape_html(&node.image.to_string_lossy())
    ));
    for annotation in node.annotations.iter().filter(|a| !a.is_empty()) {
        label.push_str(&format!("<TR><TD>{}</TD></TR>", escape_html(annotation)));
    }
    label.push_str("</TABLE>");
    label
}

/// Generates the DOT source for a diagram.
pub(crate) fn diagram_to_dot(diagram: &Diagram, options: &RenderOptions) -> String {
    let font = escape_quoted(&options.fontname);
    let mut dot = String::from("digraph synthesis {\n");
    dot.push_str(&format!(
        "    graph [rankdir={}, fontname=\"{font}\", fontsize=8, dpi={}, bgcolor=\"transparent\", nodesep=0.02];\n",
        options.rankdir, options.dpi
    ));
    dot.push_str(&format!("    node [shape=plaintext, fontsize=11, fontname=\"{font}\"];\n"));
    dot.push_str("    edge [color=\"grey50\"];\n");

    for index in diagram.node_indices() {
        dot.push_str(&format!("    n{} [label=<{}>];\n", index.index(), node_label(&diagram[index])));
    }
    for edge in diagram.edge_references() {
        dot.push_str(&format!("    n{} -> n{};\n", edge.source().index(), edge.target().index()));
    }

    dot.push_str("}\n");
    dot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse_synthesis, BuildingBlock, ReactionNode};
    use std::sync::{Arc, Mutex};

    struct FakeDepictor;

    impl MoleculeDepictor for FakeDepictor {
        fn depict(&self, molecule: &MoleculeGraph, _size: u32, output: &Path) -> Result<(), RenderError> {
            std::fs::write(output, format!("{} atoms", molecule.node_count()))?;
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct CapturingLayout {
        dot: Arc<Mutex<Option<String>>>,
    }

    impl CapturingLayout {
        fn captured(&self) -> Option<String> {
            self.dot.lock().unwrap().clone()
        }
    }

    impl LayoutEngine for CapturingLayout {
        fn rasterize(&self, dot: &str, workdir: &Path) -> Result<Vec<u8>, RenderError> {
            // every referenced depiction must exist while the layout runs
            for entry in std::fs::read_dir(workdir)? {
                assert!(entry?.metadata()?.len() > 0);
            }
            *self.dot.lock().unwrap() = Some(dot.to_string());
            Ok(b"\x89PNG\r\n\x1a\n".to_vec())
        }
    }

    fn renderer() -> (Renderer, CapturingLayout) {
        let layout = CapturingLayout::default();
        (Renderer::new(FakeDepictor, layout.clone()), layout)
    }

    #[test]
    fn test_render_amide_coupling() {
        let (renderer, layout) = renderer();
        let tree = parse_synthesis("amide_coupling(CCO;CC(=O)O)->CC(=O)OCC").unwrap();
        let png = renderer.render(&tree, &RenderOptions::default()).unwrap();
        assert!(png.starts_with(b"\x89PNG"));

        let dot = layout.captured().expect("layout was not invoked");
        assert!(dot.starts_with("digraph synthesis {"));
        assert!(dot.contains("rankdir=LR"));
        assert!(dot.contains("dpi=200"));
        assert!(dot.contains("<TR><TD>Reaction: amide_coupling</TD></TR>"));
        assert!(dot.contains("n0 [label=<"));
        assert!(dot.contains("n1 -> n0;"));
        assert!(dot.contains("n2 -> n0;"));
        assert_eq!(dot.matches("<IMG SRC=").count(), 3);
    }

    #[test]
    fn test_invalid_structure_is_named() {
        let (renderer, layout) = renderer();
        let tree: SynthesisNode = ReactionNode::new(
            "coupling",
            vec![BuildingBlock::new("CCO").into(), BuildingBlock::new("not_a_molecule").into()],
            "CCOC",
        )
        .into();

        let err = renderer.render(&tree, &RenderOptions::default()).unwrap_err();
        match &err {
            RenderError::InvalidStructure { structure, .. } => assert_eq!(structure, "not_a_molecule"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("not_a_molecule"));
        assert!(err.is_user_error());
        assert!(layout.captured().is_none());
    }

    #[test]
    fn test_invalid_product_is_named() {
        let (renderer, _) = renderer();
        let tree = parse_synthesis("coupling(CCO;CC)->C1CC").unwrap();
        let err = renderer.render(&tree, &RenderOptions::default()).unwrap_err();
        assert!(matches!(err, RenderError::InvalidStructure { ref structure, .. } if structure == "C1CC"));
    }

    #[test]
    fn test_building_block_annotations() {
        let (renderer, layout) = renderer();
        let block = BuildingBlock::new("CCO").with_index("100").with_id("EN300-1");
        renderer.render(&block.into(), &RenderOptions::default()).unwrap();

        let dot = layout.captured().unwrap();
        assert!(dot.contains("<TR><TD>100</TD></TR>"));
        assert!(dot.contains("<TR><TD>ID: EN300-1</TD></TR>"));
        assert!(!dot.contains("->"));
    }

    #[test]
    fn test_labels_are_escaped() {
        let (renderer, layout) = renderer();
        let tree = ReactionNode::new("a<b&c", vec![BuildingBlock::new("C").into()], "CC");
        let options = RenderOptions { fontname: "My \"Font\"".to_string(), ..RenderOptions::default() };
        renderer.render(&tree.into(), &options).unwrap();

        let dot = layout.captured().unwrap();
        assert!(dot.contains("Reaction: a&lt;b&amp;c"));
        assert!(dot.contains(r#"fontname="My \"Font\"""#));
    }

    #[test]
    fn test_forest_and_layout_direction() {
        let (renderer, layout) = renderer();
        let roots = vec![
            parse_synthesis("r(C;N)->CN").unwrap(),
            SynthesisNode::from(BuildingBlock::new("O")),
        ];
        let options = RenderOptions { rankdir: RankDir::TB, dpi: 96, ..RenderOptions::default() };
        renderer.render_forest(&roots, &options).unwrap();

        let dot = layout.captured().unwrap();
        assert!(dot.contains("rankdir=TB"));
        assert!(dot.contains("dpi=96"));
        assert!(dot.contains("n3 [label=<"));
        assert_eq!(dot.matches(" -> ").count(), 2);
    }

    #[test]
    fn test_options_are_validated() {
        let (renderer, layout) = renderer();
        let tree = parse_synthesis("CCO").unwrap();
        for options in [
            RenderOptions { node_image_size: 8, ..RenderOptions::default() },
            RenderOptions { dpi: 5000, ..RenderOptions::default() },
            RenderOptions { fontname: " ".to_string(), ..RenderOptions::default() },
        ] {
            let err = renderer.render(&tree, &options).unwrap_err();
            assert!(matches!(err, RenderError::InvalidOptions(_)), "{err}");
        }
        assert!(matches!(renderer.render_forest(&[], &RenderOptions::default()), Err(RenderError::Empty)));
        assert!(layout.captured().is_none());
    }

    #[test]
    fn test_rankdir_from_str() {
        assert_eq!("tb".parse::<RankDir>().unwrap(), RankDir::TB);
        assert_eq!("LR".parse::<RankDir>().unwrap(), RankDir::LR);
        assert!("sideways".parse::<RankDir>().is_err());
        assert_eq!(RankDir::BT.to_string(), "BT");
    }
}
