// CLASSIFICATION: COMMUNITY
// Filename: config.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-02-11

//! Runtime configuration.
//!
//! Roots default to the conventional mount points and may be overridden
//! first by `/etc/cohdevd.conf` and then by environment variables.
//! A missing or invalid config file falls back to defaults.

use std::env;
use std::path::PathBuf;

use log::warn;
use serde::Deserialize;

const DEFAULT_CONF_PATH: &str = "/etc/cohdevd.conf";

/// Device classes coldplugged by default.
pub const DEFAULT_CLASSES: &[&str] = &[
    "ata_device",
    "block",
    "mmc_host",
    "nvme",
    "nvme-generic",
    "nvme-subsystem",
    "phy",
    "scsi_device",
    "scsi_disk",
    "scsi_generic",
    "scsi_host",
    "net",
];

/// Resolved daemon configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Sysfs mount point.
    pub sysfs_root: PathBuf,
    /// Procfs mount point.
    pub proc_root: PathBuf,
    /// Module tree base; the kernel release is appended.
    pub modules_base: PathBuf,
    /// Device classes to coldplug with `--enumerate`.
    pub classes: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfFile {
    sysfs_root: Option<PathBuf>,
    proc_root: Option<PathBuf>,
    modules_base: Option<PathBuf>,
    classes: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sysfs_root: PathBuf::from("/sys"),
            proc_root: PathBuf::from("/proc"),
            modules_base: PathBuf::from("/lib/modules"),
            classes: DEFAULT_CLASSES.iter().map(|class| class.to_string()).collect(),
        }
    }
}

impl Config {
    /// Resolve the configuration: built-in defaults, then the config
    /// file, then `COH_*` environment variables.
    pub fn load() -> Self {
        let conf_path =
            env::var("COH_DEVD_CONF").unwrap_or_else(|_| DEFAULT_CONF_PATH.to_string());
        let file = match std::fs::read_to_string(&conf_path) {
            Ok(data) => match toml::from_str::<ConfFile>(&data) {
                Ok(file) => file,
                Err(err) => {
                    warn!("invalid config {conf_path:?}: {err}; using defaults");
                    ConfFile::default()
                }
            },
            Err(_) => ConfFile::default(),
        };

        let defaults = Config::default();
        Config {
            sysfs_root: env_path("COH_SYSFS_ROOT")
                .or(file.sysfs_root)
                .unwrap_or(defaults.sysfs_root),
            proc_root: env_path("COH_PROC_ROOT")
                .or(file.proc_root)
                .unwrap_or(defaults.proc_root),
            modules_base: env_path("COH_MODULES_ROOT")
                .or(file.modules_base)
                .unwrap_or(defaults.modules_base),
            classes: file.classes.unwrap_or(defaults.classes),
        }
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    env::var_os(name).map(PathBuf::from)
}
