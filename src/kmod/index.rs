// CLASSIFICATION: COMMUNITY
// Filename: index.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-02-11

//! In-memory module catalogue.
//!
//! Built once at startup from the on-disk module database under the
//! module tree root (`modules.builtin`, `modules.dep`, `modules.alias`)
//! plus the running-modules table under procfs. Malformed lines in any
//! of these files are skipped; missing or unreadable files are fatal.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use super::paths::modpath_to_modname;
use super::KmodError;

const BUILTIN_NAME: &str = "modules.builtin";
const MODDEPS_NAME: &str = "modules.dep";
const MODALIAS_NAME: &str = "modules.alias";
const PROC_MODULES: &str = "modules";

/// Lifecycle state of a module, as last read from the running-modules
/// table. Advisory: refreshed only by [`Index::refresh`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModState {
    /// Not currently loaded.
    Gone,
    /// Loaded and running.
    Live,
    /// Being loaded.
    Coming,
    /// Being unloaded.
    Going,
}

/// A known kernel module.
#[derive(Debug)]
pub struct Module {
    /// Statically linked into the kernel; present in the catalogue but
    /// never loadable.
    pub builtin: bool,
    pub state: ModState,
    /// Image path relative to the module tree root.
    pub path: String,
    /// Transitive prerequisites in load-before-me order. Unused by the
    /// loader (the kernel resolves them) but kept for diagnostics.
    pub deps: Vec<String>,
}

/// Catalogue of every module the running kernel knows about.
#[derive(Debug)]
pub struct Index {
    modroot: PathBuf,
    procroot: PathBuf,
    modules: HashMap<String, Module>,
    aliases: HashMap<String, String>,
    // Alias patterns in modules.alias definition order. A redefinition
    // overwrites the target in `aliases` but keeps its scan position.
    patterns: Vec<(String, Regex)>,
}

impl Index {
    /// Build the catalogue from the database under `modroot` and the
    /// running-modules table under `procroot`.
    pub fn new(modroot: PathBuf, procroot: PathBuf) -> Result<Self, KmodError> {
        let mut index = Index {
            modroot,
            procroot,
            modules: HashMap::new(),
            aliases: HashMap::new(),
            patterns: Vec::new(),
        };
        index.read_builtin()?;
        index.read_deps()?;
        index.read_aliases()?;
        index.refresh()?;
        Ok(index)
    }

    pub fn modroot(&self) -> &Path {
        &self.modroot
    }

    fn read_index_file(&self, name: &str) -> Result<String, KmodError> {
        let path = self.modroot.join(name);
        fs::read_to_string(&path).map_err(|source| KmodError::Index { path, source })
    }

    fn read_builtin(&mut self) -> Result<(), KmodError> {
        for line in self.read_index_file(BUILTIN_NAME)?.lines() {
            if line.is_empty() {
                continue;
            }
            let module = Module {
                builtin: true,
                state: ModState::Gone,
                path: line.to_string(),
                deps: Vec::new(),
            };
            self.modules.insert(modpath_to_modname(line), module);
        }
        Ok(())
    }

    fn read_deps(&mut self) -> Result<(), KmodError> {
        for line in self.read_index_file(MODDEPS_NAME)?.lines() {
            // Path before the colon is the module path, paths after it
            // are dependency paths.
            let Some((modpath, deppaths)) = line.split_once(':') else {
                continue;
            };
            let module = Module {
                builtin: false,
                state: ModState::Gone,
                path: modpath.to_string(),
                deps: deppaths
                    .split_whitespace()
                    .map(modpath_to_modname)
                    .collect(),
            };
            self.modules.insert(modpath_to_modname(modpath), module);
        }
        Ok(())
    }

    fn read_aliases(&mut self) -> Result<(), KmodError> {
        for line in self.read_index_file(MODALIAS_NAME)?.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 3 || fields[0] != "alias" {
                continue;
            }
            let (pattern, target) = (glob_to_regex(fields[1]), fields[2]);
            if self.aliases.insert(pattern.clone(), target.to_string()).is_none() {
                if let Ok(regex) = Regex::new(&pattern) {
                    self.patterns.push((pattern, regex));
                }
            }
        }
        Ok(())
    }

    /// Re-derive every module's state from the running-modules table.
    /// Modules absent from the table are marked [`ModState::Gone`];
    /// names the catalogue does not know (out-of-tree loads) are
    /// ignored.
    pub fn refresh(&mut self) -> Result<(), KmodError> {
        let path = self.procroot.join(PROC_MODULES);
        let table =
            fs::read_to_string(&path).map_err(|source| KmodError::Index { path, source })?;

        // Every module is gone until the table proves otherwise.
        let mut gone: HashSet<String> = self.modules.keys().cloned().collect();
        for line in table.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 6 {
                continue;
            }
            let (name, state) = (fields[0], fields[2]);
            if let Some(module) = self.modules.get_mut(name) {
                module.state = match state {
                    "Live" => ModState::Live,
                    "Loading" => ModState::Coming,
                    "Unloading" => ModState::Going,
                    _ => continue,
                };
                gone.remove(name);
            }
        }
        for name in gone {
            if let Some(module) = self.modules.get_mut(&name) {
                module.state = ModState::Gone;
            }
        }
        Ok(())
    }

    /// Resolve a module name or modalias string to a catalogue entry.
    ///
    /// Lookup order: direct name hit, exact alias-pattern hit (the name
    /// run through the same glob transform), then a first-match scan
    /// over the alias patterns in definition order. Alias targets are
    /// resolved recursively; a cycle terminates as not-found.
    pub fn find(&self, name: &str) -> Result<&Module, KmodError> {
        self.find_visited(name, &mut HashSet::new())
    }

    fn find_visited<'a>(
        &'a self,
        name: &str,
        visited: &mut HashSet<String>,
    ) -> Result<&'a Module, KmodError> {
        if !visited.insert(name.to_string()) {
            return Err(KmodError::NotFound(name.to_string()));
        }
        if let Some(module) = self.modules.get(name) {
            return Ok(module);
        }
        if let Some(target) = self.aliases.get(&glob_to_regex(name)) {
            return self.find_visited(target, visited);
        }
        for (pattern, regex) in &self.patterns {
            if regex.is_match(name) {
                if let Some(target) = self.aliases.get(pattern) {
                    return self.find_visited(target, visited);
                }
            }
        }
        Err(KmodError::NotFound(name.to_string()))
    }
}

/// Translate a `modules.alias` glob into a regex pattern: escape the
/// whole string, then turn each escaped `*` back into `.*`. Globs use
/// `*` only; everything else matches literally.
fn glob_to_regex(glob: &str) -> String {
    regex::escape(glob).replace("\\*", ".*")
}
