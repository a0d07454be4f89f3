// CLASSIFICATION: COMMUNITY
// Filename: enumerator.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-02-11

//! Coldplug device enumeration.
//!
//! Walks sysfs for devices that were already present before the daemon
//! started and re-triggers their "add" uevents, so the kernel
//! re-broadcasts them to the monitor socket.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

const UEVENT_NAME: &str = "uevent";

/// Collect the uevent trigger files of existing devices.
///
/// The `bus` subtree is always walked in full for regular files named
/// `uevent`. With an empty `classes` list every symlinked entry under
/// `class` contributes its `uevent` if present; otherwise only the
/// named class directories are listed one level deep, and a symlinked
/// entry without a `uevent` is an error.
pub fn enumerate(sysfs: &Path, classes: &[String]) -> io::Result<Vec<PathBuf>> {
    let mut uevent_paths = Vec::new();

    for entry in WalkDir::new(sysfs.join("bus")) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() && entry.file_name() == UEVENT_NAME {
            uevent_paths.push(entry.into_path());
        }
    }

    let class_root = sysfs.join("class");
    if classes.is_empty() {
        for entry in WalkDir::new(&class_root) {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.path_is_symlink() {
                continue;
            }
            let uevent_path = entry.path().join(UEVENT_NAME);
            match uevent_path.metadata() {
                Ok(_) => uevent_paths.push(uevent_path),
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err),
            }
        }
    } else {
        for class in classes {
            for entry in fs::read_dir(class_root.join(class))? {
                let entry = entry?;
                if !entry.file_type()?.is_symlink() {
                    continue;
                }
                // A class entry is a device symlink; it is expected to
                // expose a uevent file.
                let uevent_path = entry.path().join(UEVENT_NAME);
                uevent_path.metadata()?;
                uevent_paths.push(uevent_path);
            }
        }
    }

    Ok(uevent_paths)
}

/// Write the literal `add` into a device's uevent file, making the
/// kernel re-emit a synthetic add event over the broadcast socket.
pub fn trigger(uevent_path: &Path) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .custom_flags(libc::O_EXCL)
        .open(uevent_path)?;
    file.write_all(b"add")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn fake_sysfs() -> TempDir {
        let dir = TempDir::new().unwrap();
        let sysfs = dir.path();
        // A device hanging off a bus subtree.
        let bus_dev = sysfs.join("bus/usb/devices/1-1");
        fs::create_dir_all(&bus_dev).unwrap();
        fs::write(bus_dev.join("uevent"), "").unwrap();
        // A class entry symlinked to its device directory.
        let net_dev = sysfs.join("devices/pci0000:00/net/eth0");
        fs::create_dir_all(&net_dev).unwrap();
        fs::write(net_dev.join("uevent"), "").unwrap();
        fs::create_dir_all(sysfs.join("class/net")).unwrap();
        symlink(&net_dev, sysfs.join("class/net/eth0")).unwrap();
        dir
    }

    #[test]
    fn bus_walk_collects_uevent_files() {
        let dir = fake_sysfs();
        let paths = enumerate(dir.path(), &["net".to_string()]).unwrap();
        assert!(paths.contains(&dir.path().join("bus/usb/devices/1-1/uevent")));
    }

    #[test]
    fn named_class_lists_symlinked_devices() {
        let dir = fake_sysfs();
        let paths = enumerate(dir.path(), &["net".to_string()]).unwrap();
        assert!(paths.contains(&dir.path().join("class/net/eth0/uevent")));
        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn empty_class_list_walks_all_classes() {
        let dir = fake_sysfs();
        let paths = enumerate(dir.path(), &[]).unwrap();
        assert!(paths.contains(&dir.path().join("bus/usb/devices/1-1/uevent")));
        assert!(paths.contains(&dir.path().join("class/net/eth0/uevent")));
    }

    #[test]
    fn unknown_class_is_an_error() {
        let dir = fake_sysfs();
        assert!(enumerate(dir.path(), &["missing".to_string()]).is_err());
    }

    #[test]
    fn named_class_entry_without_uevent_is_an_error() {
        let dir = fake_sysfs();
        let bare = dir.path().join("devices/bare");
        fs::create_dir_all(&bare).unwrap();
        symlink(&bare, dir.path().join("class/net/bare")).unwrap();
        assert!(enumerate(dir.path(), &["net".to_string()]).is_err());
    }

    #[test]
    fn all_classes_walk_skips_entries_without_uevent() {
        let dir = fake_sysfs();
        fs::create_dir_all(dir.path().join("class/block")).unwrap();
        let bare = dir.path().join("devices/bare");
        fs::create_dir_all(&bare).unwrap();
        symlink(&bare, dir.path().join("class/block/bare")).unwrap();
        let paths = enumerate(dir.path(), &[]).unwrap();
        assert!(!paths.iter().any(|p| p.ends_with("bare/uevent")));
    }

    #[test]
    fn trigger_writes_add() {
        let dir = fake_sysfs();
        let uevent = dir.path().join("class/net/eth0/uevent");
        trigger(&uevent).unwrap();
        assert_eq!(fs::read_to_string(&uevent).unwrap(), "add");
    }

    #[test]
    fn trigger_surfaces_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(trigger(&dir.path().join("nope")).is_err());
    }
}
