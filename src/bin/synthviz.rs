use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use synthviz::*;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "synthviz", about = "Parse and draw chemical synthesis pathways")]
struct Cli {
    #[arg(long, env = "SYNTHVIZ_LOG", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a synthesis and print it back.
    Parse(ParseCommand),
    /// Render a synthesis to a PNG file.
    Render(RenderCommand),
}

#[derive(Args, Debug)]
struct ParseCommand {
    /// Input file, or `-` for stdin.
    input: String,

    /// Print the parsed trees as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct RenderCommand {
    /// Input file, or `-` for stdin.
    input: String,

    #[arg(short, long)]
    output: PathBuf,

    #[arg(long, default_value = "LR")]
    rankdir: RankDir,

    /// Width and height of each molecule, in pixels.
    #[arg(long, default_value_t = 200)]
    size: u32,

    #[arg(long, default_value_t = 200)]
    dpi: u32,

    #[arg(long, env = "SYNTHVIZ_FONT", default_value = "Fira Sans")]
    font: String,

    #[arg(long, env = "SYNTHVIZ_DOT", default_value = "dot")]
    dot: String,

    #[arg(long, env = "SYNTHVIZ_NEATO", default_value = "neato")]
    neato: String,
}

impl RenderCommand {
    fn options(&self) -> RenderOptions {
        RenderOptions {
            node_image_size: self.size,
            rankdir: self.rankdir,
            dpi: self.dpi,
            fontname: self.font.clone(),
        }
    }
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text).context("failed to read stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("failed to read {input}"))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Command::Parse(cmd) => {
            let forest = parse_forest(&read_input(&cmd.input)?)?;
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(&forest)?);
            } else {
                for tree in &forest {
                    println!("{tree}");
                }
            }
        }
        Command::Render(cmd) => {
            let forest = parse_forest(&read_input(&cmd.input)?)?;
            let options = cmd.options();
            let renderer = Renderer::graphviz(Graphviz::new(cmd.dot, cmd.neato));
            let png = renderer.render_forest(&forest, &options)?;
            std::fs::write(&cmd.output, &png)
                .with_context(|| format!("failed to write {}", cmd.output.display()))?;
            info!(output = %cmd.output.display(), bytes = png.len(), "wrote diagram");
        }
    }
    Ok(())
}
