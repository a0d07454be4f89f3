// CLASSIFICATION: COMMUNITY
// Filename: coldplug.rs v0.1
// Author: Cohesix Codex
// Date Modified: 2026-02-11

use std::fs;
use std::os::unix::fs::symlink;
use std::path::Path;

use tempfile::TempDir;

use cohdevd::config::DEFAULT_CLASSES;
use cohdevd::enumerator;

fn add_class_device(sysfs: &Path, class: &str, device: &str) {
    let target = sysfs.join("devices/platform").join(device);
    fs::create_dir_all(&target).unwrap();
    fs::write(target.join("uevent"), "").unwrap();
    let class_dir = sysfs.join("class").join(class);
    fs::create_dir_all(&class_dir).unwrap();
    symlink(&target, class_dir.join(device)).unwrap();
}

#[test]
fn single_class_coldplug_yields_exactly_its_devices() {
    let dir = TempDir::new().unwrap();
    let sysfs = dir.path();
    fs::create_dir_all(sysfs.join("bus")).unwrap();
    add_class_device(sysfs, "net", "eth0");

    let devices = enumerator::enumerate(sysfs, &["net".to_string()]).unwrap();
    assert_eq!(devices, vec![sysfs.join("class/net/eth0/uevent")]);

    enumerator::trigger(&devices[0]).unwrap();
    let written = fs::read(&devices[0]).unwrap();
    assert_eq!(written, b"add");
}

#[test]
fn default_class_list_enumerates_across_all_classes() {
    let dir = TempDir::new().unwrap();
    let sysfs = dir.path();
    fs::create_dir_all(sysfs.join("bus")).unwrap();
    // Every configured class directory must exist, populated or not.
    for class in DEFAULT_CLASSES {
        fs::create_dir_all(sysfs.join("class").join(class)).unwrap();
    }
    add_class_device(sysfs, "net", "eth0");
    add_class_device(sysfs, "block", "sda");

    let classes: Vec<String> = DEFAULT_CLASSES.iter().map(|c| c.to_string()).collect();
    let devices = enumerator::enumerate(sysfs, &classes).unwrap();
    assert_eq!(devices.len(), 2);
    assert!(devices.contains(&sysfs.join("class/net/eth0/uevent")));
    assert!(devices.contains(&sysfs.join("class/block/sda/uevent")));
}

#[test]
fn bus_devices_come_before_class_devices() {
    let dir = TempDir::new().unwrap();
    let sysfs = dir.path();
    let bus_dev = sysfs.join("bus/pci/devices/0000:00:01.0");
    fs::create_dir_all(&bus_dev).unwrap();
    fs::write(bus_dev.join("uevent"), "").unwrap();
    add_class_device(sysfs, "net", "eth0");

    let devices = enumerator::enumerate(sysfs, &["net".to_string()]).unwrap();
    assert_eq!(
        devices,
        vec![
            bus_dev.join("uevent"),
            sysfs.join("class/net/eth0/uevent"),
        ]
    );
}

#[test]
fn missing_class_directory_aborts_the_pass() {
    let dir = TempDir::new().unwrap();
    let sysfs = dir.path();
    fs::create_dir_all(sysfs.join("bus")).unwrap();
    fs::create_dir_all(sysfs.join("class")).unwrap();
    assert!(enumerator::enumerate(sysfs, &["net".to_string()]).is_err());
}

#[test]
fn triggering_every_enumerated_device_is_idempotent_on_the_list() {
    let dir = TempDir::new().unwrap();
    let sysfs = dir.path();
    fs::create_dir_all(sysfs.join("bus")).unwrap();
    add_class_device(sysfs, "net", "eth0");
    add_class_device(sysfs, "net", "wlan0");

    let devices = enumerator::enumerate(sysfs, &["net".to_string()]).unwrap();
    assert_eq!(devices.len(), 2);
    for device in &devices {
        enumerator::trigger(device).unwrap();
    }
    let again = enumerator::enumerate(sysfs, &["net".to_string()]).unwrap();
    assert_eq!(again.len(), 2);
}
