// CLASSIFICATION: COMMUNITY
// Filename: devmgr.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-02-11

//! Device manager: uevent to driver glue.
//!
//! For every device the kernel announces, reads its modalias attribute
//! from sysfs and asks the loader for a matching module. Failures are
//! warnings only; one undrivable device never stops the daemon.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use log::warn;

use crate::kmod::KMod;
use crate::monitor::{Uevent, UeventAction, UeventHandler};

/// Uevent handler that loads a driver module per attached device.
pub struct DevMgr {
    kmod: Arc<KMod>,
    sysfs_root: PathBuf,
}

impl DevMgr {
    pub fn new(kmod: Arc<KMod>, sysfs_root: PathBuf) -> Self {
        DevMgr { kmod, sysfs_root }
    }

    /// Read `<sysfs>/<devpath>/modalias`, without its trailing newline.
    fn device_modalias(&self, devpath: &str) -> io::Result<String> {
        // Device paths arrive absolute relative to the sysfs root.
        let path = self
            .sysfs_root
            .join(devpath.trim_start_matches('/'))
            .join("modalias");
        let contents = fs::read_to_string(path)?;
        Ok(match contents.strip_suffix('\n') {
            Some(trimmed) => trimmed.to_string(),
            None => contents,
        })
    }
}

impl UeventHandler for DevMgr {
    fn handle_uevent(&self, event: &Uevent) {
        if *event.action() != UeventAction::Add {
            return;
        }
        let modalias = match self.device_modalias(event.devpath()) {
            Ok(modalias) => modalias,
            Err(err) => {
                warn!(
                    "cannot find modalias for device {:?}: {err}",
                    event.devpath()
                );
                return;
            }
        };
        if let Err(err) = self.kmod.load(&modalias) {
            warn!("cannot load module for device {:?}: {err}", event.devpath());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fake_roots() -> (TempDir, Arc<KMod>) {
        let dir = TempDir::new().unwrap();
        let modroot = dir.path().join("modules");
        let procroot = dir.path().join("proc");
        fs::create_dir_all(&modroot).unwrap();
        fs::create_dir_all(&procroot).unwrap();
        fs::write(modroot.join("modules.builtin"), "").unwrap();
        fs::write(modroot.join("modules.dep"), "usbcore.ko:\n").unwrap();
        fs::write(
            modroot.join("modules.alias"),
            "alias usb:v*p*d* usbcore\n",
        )
        .unwrap();
        fs::write(procroot.join("modules"), "usbcore 16384 Live 1 - 0x0\n").unwrap();
        let kmod = Arc::new(KMod::with_roots(modroot, procroot).unwrap());
        (dir, kmod)
    }

    #[test]
    fn add_event_loads_device_module() {
        let (dir, kmod) = fake_roots();
        let devpath = "/devices/pci0000:00/usb1";
        let device = dir.path().join("sys/devices/pci0000:00/usb1");
        fs::create_dir_all(&device).unwrap();
        fs::write(device.join("modalias"), "usb:v1234p5678d9abc\n").unwrap();
        let devmgr = DevMgr::new(kmod, dir.path().join("sys"));
        // The alias resolves to a live module; the handler is a no-op
        // beyond the idempotent load.
        let event = Uevent::parse(
            format!("add@{devpath}\0SUBSYSTEM=usb\0").as_bytes(),
        )
        .unwrap();
        devmgr.handle_uevent(&event);
    }

    #[test]
    fn modalias_newline_is_trimmed() {
        let (dir, kmod) = fake_roots();
        let device = dir.path().join("sys/devices/eth0");
        fs::create_dir_all(&device).unwrap();
        fs::write(device.join("modalias"), "usb:v1p2d3\n").unwrap();
        let devmgr = DevMgr::new(kmod, dir.path().join("sys"));
        assert_eq!(devmgr.device_modalias("/devices/eth0").unwrap(), "usb:v1p2d3");
    }

    #[test]
    fn missing_modalias_is_an_error_not_a_panic() {
        let (dir, kmod) = fake_roots();
        let devmgr = DevMgr::new(kmod, dir.path().join("sys"));
        assert!(devmgr.device_modalias("/devices/ghost").is_err());
        // The handler demotes the failure to a warning.
        let event = Uevent::parse(b"add@/devices/ghost\0").unwrap();
        devmgr.handle_uevent(&event);
    }

    #[test]
    fn non_add_actions_are_ignored() {
        let (dir, kmod) = fake_roots();
        let devmgr = DevMgr::new(kmod, dir.path().join("sys"));
        let event = Uevent::parse(b"remove@/devices/ghost\0").unwrap();
        // No modalias exists; remove must not even look for it.
        devmgr.handle_uevent(&event);
    }
}
