// CLASSIFICATION: COMMUNITY
// Filename: paths.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-01-08

//! Module tree location and module name canonicalisation.

use std::ffi::CStr;
use std::io;
use std::mem;
use std::path::{Path, PathBuf};

/// Return `<base>/<kernel release>`, the module tree of the running
/// kernel, by querying `uname(2)`.
pub fn current_modules_root(base: &Path) -> io::Result<PathBuf> {
    let mut uts: libc::utsname = unsafe { mem::zeroed() };
    if unsafe { libc::uname(&mut uts) } != 0 {
        return Err(io::Error::last_os_error());
    }
    // The release field is NUL-terminated inside a fixed-size buffer.
    let release = unsafe { CStr::from_ptr(uts.release.as_ptr()) };
    Ok(base.join(release.to_string_lossy().as_ref()))
}

/// Canonicalise a module file path into a module name: basename, every
/// suffix from the first `.` stripped, `-` replaced with `_`.
///
/// `dir/foo-bar.ko.zst` becomes `foo_bar`.
pub fn modpath_to_modname(path: &str) -> String {
    let basename = Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = basename.split('.').next().unwrap_or_default();
    stem.replace('-', "_")
}
