use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use pen_common::CONFIG_FILENAME;
use pen_workspace::server::DEFAULT_PORT;
use pen_workspace::{run, ServerOptions};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Project directory
    #[arg(default_value = ".")]
    pub path: PathBuf,

    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    #[arg(long, default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Quiet period before a burst of file changes is applied
    #[arg(long, default_value_t = 100)]
    pub debounce_ms: u64,

    /// How long our own writes are ignored by the file watcher
    #[arg(long, default_value_t = 1000)]
    pub echo_ms: u64,

    /// Directory of starter projects offered to clients
    #[arg(long)]
    pub templates: Option<PathBuf>,

    /// Leave the devtools bridge out of previews
    #[arg(long)]
    pub no_dev_tools: bool,
}

pub fn serve(args: ServeArgs) -> Result<()> {
    if !args.path.join(CONFIG_FILENAME).exists() {
        bail!("No {} in {} (run `pen init` first)", CONFIG_FILENAME, args.path.display());
    }

    let options = ServerOptions {
        host: args.host,
        port: args.port,
        watch_debounce: Duration::from_millis(args.debounce_ms),
        echo_window: Duration::from_millis(args.echo_ms),
        templates_dir: args.templates,
        dev: !args.no_dev_tools,
        ..ServerOptions::new(args.path)
    };

    println!("{} {}", "🚀 Serving".bright_blue().bold(), options.root.display());
    println!("   Preview:  http://{}/", options.addr());
    println!("   Sync:     ws://{}/ws", options.addr());
    println!();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(options))?;
    Ok(())
}
