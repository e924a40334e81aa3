//! Draw chemical synthesis pathways.
//!
//! A synthesis is read from text (the compact `reaction(a;b)->product`
//! notation, or the indented listing printed by prexsyn), turned into a tree of
//! [`BuildingBlock`]s and [`ReactionNode`]s, and rendered with Graphviz into a
//! PNG showing each molecule and the reactions joining them.
//!
//! ```no_run
//! use synthviz::{parse_synthesis, Graphviz, RenderOptions, Renderer};
//!
//! let tree = parse_synthesis("amide_coupling(CCO;CC(=O)O)->CC(=O)OCC")?;
//! let png = Renderer::graphviz(Graphviz::default()).render(&tree, &RenderOptions::default())?;
//! std::fs::write("synthesis.png", png)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod molecule;
pub use molecule::*;

mod model;
pub use model::*;

mod parse;
pub use parse::*;

mod visualize;
pub use visualize::*;

pub mod config;
pub mod web;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `level` when it is set. Calling this more
/// than once is harmless.
pub fn init_logging(level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .try_init();
}
