// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.4
// Author: Lukas Bower
// Date Modified: 2026-02-13

//! Kernel module loader.
//!
//! [`KMod`] wraps the module [`Index`] and performs the actual load
//! syscall, decompressing zstd-packed images on the way. Loads are
//! serialised by a single process-wide mutex held for the whole call.

pub mod index;
pub mod paths;

use std::fs::File;
use std::io::{self, Read};
use std::os::fd::{AsRawFd, RawFd};
use std::path::PathBuf;
use std::sync::Mutex;

use log::{debug, info};
use thiserror::Error;

use crate::config::Config;
pub use index::{Index, ModState, Module};

/// Errors raised by the module index and loader.
#[derive(Debug, Error)]
pub enum KmodError {
    #[error("cannot read module database {path:?}")]
    Index {
        path: PathBuf,
        source: io::Error,
    },
    #[error("cannot determine kernel release")]
    Release(#[source] io::Error),
    #[error("cannot find module {0:?}")]
    NotFound(String),
    #[error("module {0:?} is built-in")]
    Builtin(String),
    #[error("module {0:?} is busy")]
    Busy(String),
    #[error("cannot load module {name:?}")]
    LoadFailed {
        name: String,
        source: io::Error,
    },
    #[error("module index lock poisoned")]
    LockPoisoned,
}

/// Module loader over a shared catalogue.
pub struct KMod {
    index: Mutex<Index>,
}

impl KMod {
    /// Build the catalogue for the running kernel using the configured
    /// roots. Any unreadable database file is fatal.
    pub fn new(config: &Config) -> Result<Self, KmodError> {
        let modroot =
            paths::current_modules_root(&config.modules_base).map_err(KmodError::Release)?;
        Self::with_roots(modroot, config.proc_root.clone())
    }

    /// Build the catalogue against explicit module tree and procfs
    /// roots.
    pub fn with_roots(modroot: PathBuf, procroot: PathBuf) -> Result<Self, KmodError> {
        let index = Index::new(modroot, procroot)?;
        Ok(KMod {
            index: Mutex::new(index),
        })
    }

    /// Re-read the running-modules table into the state cache.
    pub fn refresh(&self) -> Result<(), KmodError> {
        let mut index = self.index.lock().map_err(|_| KmodError::LockPoisoned)?;
        index.refresh()
    }

    /// Load the module named by `name`, which may be a module name or a
    /// modalias string.
    ///
    /// Idempotent for modules already live; modules mid-load or
    /// mid-unload fail busy. The state cache is not refreshed here; a
    /// successful load is observed by the next [`KMod::refresh`].
    pub fn load(&self, name: &str) -> Result<(), KmodError> {
        let index = self.index.lock().map_err(|_| KmodError::LockPoisoned)?;

        let module = index.find(name)?;
        if module.builtin {
            return Err(KmodError::Builtin(name.to_string()));
        }
        match module.state {
            ModState::Live => return Ok(()),
            ModState::Coming | ModState::Going => return Err(KmodError::Busy(name.to_string())),
            ModState::Gone => {}
        }

        let realpath = index.modroot().join(&module.path);
        debug!("loading module image {realpath:?}");
        let failed = |source: io::Error| KmodError::LoadFailed {
            name: name.to_string(),
            source,
        };
        let file = File::open(&realpath).map_err(failed)?;
        if realpath.extension().is_some_and(|ext| ext == "zst") {
            let mut image = Vec::new();
            zstd::Decoder::new(file)
                .and_then(|mut decoder| decoder.read_to_end(&mut image))
                .map_err(failed)?;
            load_from_image(&image).map_err(failed)?;
        } else {
            load_from_fd(file.as_raw_fd()).map_err(failed)?;
        }
        info!("loaded module {name:?} from {realpath:?}");
        Ok(())
    }
}

const NO_PARAMS: &[u8] = b"\0";

/// `finit_module(2)`: load an uncompressed module image straight from
/// an open file descriptor.
fn load_from_fd(fd: RawFd) -> io::Result<()> {
    let rc = unsafe {
        libc::syscall(
            libc::SYS_finit_module,
            fd,
            NO_PARAMS.as_ptr() as *const libc::c_char,
            0,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// `init_module(2)`: load a module image already read into memory.
fn load_from_image(image: &[u8]) -> io::Result<()> {
    let rc = unsafe {
        libc::syscall(
            libc::SYS_init_module,
            image.as_ptr() as *const libc::c_void,
            image.len() as libc::c_ulong,
            NO_PARAMS.as_ptr() as *const libc::c_char,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
