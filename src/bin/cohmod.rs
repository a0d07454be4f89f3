// CLASSIFICATION: COMMUNITY
// Filename: cohmod.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-01-19

//! One-shot kernel module loader.

use anyhow::Context;
use clap::Parser;

use cohdevd::config::Config;
use cohdevd::kmod::KMod;

#[derive(Parser)]
#[command(
    name = "cohmod",
    about = "Load kernel modules by name or modalias",
    version = "0.1"
)]
struct Cli {
    /// Module names or modalias strings to load, in order.
    #[arg(required = true, value_name = "MOD")]
    modules: Vec<String>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load();
    let kmod = KMod::new(&config).context("cannot build module index")?;
    for name in &cli.modules {
        kmod.load(name)
            .with_context(|| format!("cannot load module {name:?}"))?;
    }
    Ok(())
}
