use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;

use petgraph::visit::EdgeRef;
use tracing::{debug, trace};

use super::{LayoutEngine, MoleculeDepictor, RenderError};
use crate::{Bond, MoleculeGraph};

/// Graphviz command-line tools: `neato` draws molecules, `dot` lays out the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graphviz {
    pub dot_program: String,
    pub neato_program: String,
}

impl Default for Graphviz {
    fn default() -> Self {
        Self { dot_program: "dot".to_string(), neato_program: "neato".to_string() }
    }
}

impl Graphviz {
    pub fn new(dot_program: impl Into<String>, neato_program: impl Into<String>) -> Self {
        Self { dot_program: dot_program.into(), neato_program: neato_program.into() }
    }

    /// Runs `program -Tpng input -o output`.
    fn run(program: &str, input: &Path, output: &Path) -> Result<(), RenderError> {
        trace!(program, input = %input.display(), output = %output.display(), "running graphviz");
        let result = Command::new(program).arg("-Tpng").arg(input).arg("-o").arg(output).output();
        let result = match result {
            Ok(result) => result,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(RenderError::EngineUnavailable { program: program.to_string() })
            }
            Err(e) => return Err(RenderError::Io(e)),
        };

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            let message = if stderr.is_empty() { result.status.to_string() } else { stderr };
            return Err(RenderError::Engine { program: program.to_string(), message });
        }
        Ok(())
    }
}

impl MoleculeDepictor for Graphviz {
    fn depict(&self, molecule: &MoleculeGraph, size: u32, output: &Path) -> Result<(), RenderError> {
        let dot_path = output.with_extension("dot");
        std::fs::write(&dot_path, molecule_to_dot(molecule, size))?;
        Self::run(&self.neato_program, &dot_path, output)
    }
}

impl LayoutEngine for Graphviz {
    fn rasterize(&self, dot: &str, workdir: &Path) -> Result<Vec<u8>, RenderError> {
        let dot_path = workdir.join("diagram.dot");
        let png_path = workdir.join("diagram.png");
        std::fs::write(&dot_path, dot)?;
        Self::run(&self.dot_program, &dot_path, &png_path)?;
        let png = std::fs::read(&png_path)?;
        debug!(bytes = png.len(), "graphviz produced diagram");
        Ok(png)
    }
}

/// Maps Bond types to Graphviz edge styles and extra attributes.
fn bond_to_style(bond: Bond) -> (&'static str, &'static str) {
    match bond {
        Bond::Aromatic => ("dashed", "color=purple"),
        Bond::Single | Bond::Double | Bond::Triple | Bond::Quadruple => ("solid", "color=black"),
    }
}

/// Generates a DOT drawing of a molecule: one filled circle per atom, one
/// stroke per bond order, laid out by `neato` into a `size` pixel square.
pub(crate) fn molecule_to_dot(graph: &MoleculeGraph, size: u32) -> String {
    // graphviz sizes are in inches at 72 points per inch
    let inches = f64::from(size) / 72.0;
    let mut dot = String::from("graph molecule {\n");
    dot.push_str(&format!(
        "    graph [layout=neato, overlap=false, bgcolor=\"transparent\", dpi=72, size=\"{inches:.3},{inches:.3}!\"];\n"
    ));
    dot.push_str("    node [shape=circle, style=filled, fixedsize=true, width=0.35, fontsize=11, fontcolor=white];\n");

    for node in graph.node_indices() {
        let atom = &graph[node];
        dot.push_str(&format!(
            "    {} [label=\"{}\", fillcolor={}];\n",
            node.index(),
            atom.label(),
            atom.element.color()
        ));
    }

    for edge in graph.edge_references() {
        let (style, extra) = bond_to_style(*edge.weight());
        for _ in 0..edge.weight().strokes() {
            dot.push_str(&format!(
                "    {} -- {} [style={style}, penwidth=2, {extra}];\n",
                edge.source().index(),
                edge.target().index()
            ));
        }
    }

    dot.push_str("}\n");
    dot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_smiles;

    #[test]
    fn test_molecule_dot_for_ethanol() {
        let molecule = parse_smiles("CCO").unwrap();
        let dot = molecule_to_dot(&molecule, 144);
        assert!(dot.starts_with("graph molecule {"));
        assert!(dot.contains("size=\"2.000,2.000!\""));
        assert!(dot.contains("0 [label=\"C\", fillcolor=black];"));
        assert!(dot.contains("2 [label=\"O\", fillcolor=red];"));
        assert_eq!(dot.matches(" -- ").count(), 2);
    }

    #[test]
    fn test_molecule_dot_bond_strokes() {
        let acetylene = parse_smiles("C#C").unwrap();
        assert_eq!(molecule_to_dot(&acetylene, 200).matches("0 -- 1").count(), 3);

        let benzene = parse_smiles("c1ccccc1").unwrap();
        let dot = molecule_to_dot(&benzene, 200);
        assert_eq!(dot.matches("style=dashed").count(), 6);
    }

    #[test]
    fn test_molecule_dot_charges() {
        let molecule = parse_smiles("[NH4+]").unwrap();
        assert!(molecule_to_dot(&molecule, 200).contains("label=\"N+\""));
    }

    #[test]
    fn test_missing_program() {
        let graphviz = Graphviz::new("synthviz-no-such-dot", "synthviz-no-such-neato");
        let workdir = tempfile::tempdir().unwrap();
        let molecule = parse_smiles("CCO").unwrap();

        let err = graphviz.depict(&molecule, 200, &workdir.path().join("m.png")).unwrap_err();
        assert!(
            matches!(err, RenderError::EngineUnavailable { ref program } if program == "synthviz-no-such-neato"),
            "{err}"
        );
        let err = graphviz.rasterize("digraph {}", workdir.path()).unwrap_err();
        assert!(matches!(err, RenderError::EngineUnavailable { .. }), "{err}");
    }

    #[test]
    fn test_render_with_installed_graphviz() {
        // only meaningful where graphviz is installed
        let graphviz = Graphviz::default();
        if Command::new(&graphviz.dot_program).arg("-V").output().is_err()
            || Command::new(&graphviz.neato_program).arg("-V").output().is_err()
        {
            return;
        }

        let renderer = crate::Renderer::graphviz(graphviz);
        let tree = crate::parse_synthesis("amide_coupling(CCO;CC(=O)O)->CC(=O)OCC").unwrap();
        let png = renderer.render(&tree, &crate::RenderOptions::default()).unwrap();
        assert!(png.starts_with(b"\x89PNG"));
    }
}
