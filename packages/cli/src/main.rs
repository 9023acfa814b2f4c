mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{init, render, serve, InitArgs, RenderArgs, ServeArgs};
use tracing_subscriber::EnvFilter;

/// Pen - live preview for multi-language web projects
#[derive(Parser, Debug)]
#[command(name = "pen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new project with one editor per dialect
    Init(InitArgs),

    /// Compose a project into a single HTML document
    Render(RenderArgs),

    /// Serve a project to editor clients with live preview
    Serve(ServeArgs),
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pen=info")))
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Command::Init(args) => init(args),
        Command::Render(args) => render(args),
        Command::Serve(args) => serve(args),
    };

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
