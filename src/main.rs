// CLASSIFICATION: COMMUNITY
// Filename: main.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-02-11

//! Entry point for the `cohdevd` daemon binary.

use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context};
use clap::Parser;
use log::{error, info};

use cohdevd::config::Config;
use cohdevd::devmgr::DevMgr;
use cohdevd::enumerator;
use cohdevd::kmod::KMod;
use cohdevd::monitor::Monitor;

#[derive(Parser)]
#[command(
    name = "cohdevd",
    about = "Cohesix device hotplug daemon",
    version = "0.2"
)]
struct Cli {
    /// Coldplug: re-trigger "add" events for devices already present,
    /// then exit.
    #[arg(short = 'e', long)]
    enumerate: bool,
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
    if cli.enumerate {
        coldplug(&config)
    } else {
        daemon(&config)
    }
}

fn coldplug(config: &Config) -> anyhow::Result<()> {
    let devices = enumerator::enumerate(&config.sysfs_root, &config.classes)
        .context("cannot enumerate devices")?;
    for device in devices {
        println!("{}", device.display());
        if let Err(err) = enumerator::trigger(&device) {
            error!("cannot trigger {device:?}: {err}");
        }
    }
    Ok(())
}

fn daemon(config: &Config) -> anyhow::Result<()> {
    let kmod = Arc::new(KMod::new(config).context("cannot build module index")?);
    let devmgr = DevMgr::new(Arc::clone(&kmod), config.sysfs_root.clone());
    let monitor =
        Arc::new(Monitor::new(Box::new(devmgr)).context("cannot create device monitor")?);

    info!("listening for kernel uevents");
    let worker = {
        let monitor = Arc::clone(&monitor);
        thread::spawn(move || monitor.bind())
    };
    worker
        .join()
        .map_err(|_| anyhow!("device monitor worker panicked"))?;
    monitor.close().context("cannot close device monitor")?;
    Ok(())
}
