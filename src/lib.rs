// CLASSIFICATION: COMMUNITY
// Filename: lib.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-02-11

//! Cohesix device hotplug daemon library.
//!
//! `cohdevd` watches the kernel uevent broadcast socket and loads the
//! kernel module matching each newly attached device. The pieces are
//! exposed as a library so the daemon, the one-shot `cohmod` loader,
//! and the tests can share them.

/// Runtime configuration: filesystem roots and coldplug classes.
pub mod config;
/// Uevent handler glue between the monitor and the module loader.
pub mod devmgr;
/// Sysfs device enumeration and synthetic "add" triggers.
pub mod enumerator;
/// Kernel module index and loader.
pub mod kmod;
/// Netlink uevent monitor.
pub mod monitor;
