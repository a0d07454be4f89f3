// CLASSIFICATION: COMMUNITY
// Filename: monitor.rs v0.5
// Author: Lukas Bower
// Date Modified: 2026-02-13

//! Kernel uevent monitor.
//!
//! Owns a raw netlink socket subscribed to the kernel's device event
//! broadcast group, parses the NUL-delimited datagrams into [`Uevent`]s
//! and dispatches them synchronously to a [`UeventHandler`]. Datagrams
//! not originating from the kernel are rejected.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::mem;
use std::os::fd::RawFd;
use std::sync::Mutex;

use log::{debug, error, info, warn};
use thiserror::Error;

// Netlink broadcast group for packets coming from the kernel.
// See uevent_net_broadcast() in lib/kobject_uevent.c.
const GROUP_KERNEL: u32 = 1;

// Uevents larger than one receive buffer are truncated.
const RECV_BUF_SIZE: usize = 1024;

/// Errors raised by the uevent monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("cannot create uevent socket")]
    Socket(#[source] io::Error),
    #[error("cannot receive uevent")]
    Recv(#[source] io::Error),
    #[error("uevent from a sender other than the kernel (pid {0})")]
    WrongSender(u32),
    #[error("invalid uevent: {0}")]
    InvalidUevent(String),
}

/// Device lifecycle transition named by a uevent. Unrecognised actions
/// are passed through verbatim for the handler to judge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UeventAction {
    Add,
    Remove,
    Change,
    Other(String),
}

impl From<&str> for UeventAction {
    fn from(action: &str) -> Self {
        match action {
            "add" => UeventAction::Add,
            "remove" => UeventAction::Remove,
            "change" => UeventAction::Change,
            other => UeventAction::Other(other.to_string()),
        }
    }
}

impl fmt::Display for UeventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UeventAction::Add => f.write_str("add"),
            UeventAction::Remove => f.write_str("remove"),
            UeventAction::Change => f.write_str("change"),
            UeventAction::Other(other) => f.write_str(other),
        }
    }
}

/// A parsed kernel device event.
#[derive(Debug)]
pub struct Uevent {
    action: UeventAction,
    devpath: String,
    attrs: HashMap<String, String>,
}

impl Uevent {
    /// Parse one datagram of the form
    /// `ACTION@DEVPATH\0KEY1=VALUE1\0KEY2=VALUE2\0...\0`.
    ///
    /// Trailing NULs are stripped. A header without `@` or an attribute
    /// record without `=` invalidates the whole event. Repeated keys
    /// keep the last value.
    pub fn parse(datagram: &[u8]) -> Result<Self, MonitorError> {
        let text = std::str::from_utf8(datagram)
            .map_err(|_| MonitorError::InvalidUevent("not valid UTF-8".to_string()))?;
        let text = text.trim_end_matches('\0');
        let mut records = text.split('\0');
        let header = records
            .next()
            .filter(|header| !header.is_empty())
            .ok_or_else(|| MonitorError::InvalidUevent("empty datagram".to_string()))?;
        let (action, devpath) = header
            .split_once('@')
            .ok_or_else(|| MonitorError::InvalidUevent(format!("malformed header {header:?}")))?;

        let mut attrs = HashMap::new();
        for record in records {
            let (key, value) = record.split_once('=').ok_or_else(|| {
                MonitorError::InvalidUevent(format!("malformed attribute {record:?}"))
            })?;
            attrs.insert(key.to_string(), value.to_string());
        }
        Ok(Uevent {
            action: action.into(),
            devpath: devpath.to_string(),
            attrs,
        })
    }

    pub fn action(&self) -> &UeventAction {
        &self.action
    }

    /// Device path relative to the sysfs root, starting with `/`.
    pub fn devpath(&self) -> &str {
        &self.devpath
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for Uevent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}@{}", self.action, self.devpath)?;
        for (key, value) in &self.attrs {
            writeln!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

/// Contract for consumers of parsed uevents. Invoked synchronously on
/// the monitor's receive thread; one event at a time.
pub trait UeventHandler {
    fn handle_uevent(&self, event: &Uevent);
}

/// Netlink uevent monitor.
///
/// [`Monitor::bind`] blocks receiving events until [`Monitor::close`]
/// is called from another thread, which ends the loop before its next
/// receive.
pub struct Monitor {
    // -1 once closed. Each receive runs on a private duplicate taken
    // under this lock, so a concurrent close() cannot invalidate a
    // descriptor mid-receive.
    sock: Mutex<RawFd>,
    // Held for the whole receive loop; one bind at a time.
    recv_lock: Mutex<()>,
    handler: Box<dyn UeventHandler + Send + Sync>,
}

impl Monitor {
    /// Open and bind the uevent socket, subscribed to kernel-originated
    /// broadcasts only.
    pub fn new(handler: Box<dyn UeventHandler + Send + Sync>) -> Result<Self, MonitorError> {
        let fd = unsafe {
            libc::socket(
                libc::AF_NETLINK,
                libc::SOCK_RAW,
                libc::NETLINK_KOBJECT_UEVENT,
            )
        };
        if fd < 0 {
            return Err(MonitorError::Socket(io::Error::last_os_error()));
        }

        let mut addr: libc::sockaddr_nl = unsafe { mem::zeroed() };
        addr.nl_family = libc::AF_NETLINK as libc::sa_family_t;
        addr.nl_groups = GROUP_KERNEL;

        // The kernel assigns the process ID as port ID to the first
        // netlink socket of a process and picks unique ones for the
        // rest; ask which one this socket got before binding.
        let mut assigned: libc::sockaddr_nl = unsafe { mem::zeroed() };
        let mut addrlen = mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t;
        let rc = unsafe {
            libc::getsockname(
                fd,
                &mut assigned as *mut libc::sockaddr_nl as *mut libc::sockaddr,
                &mut addrlen,
            )
        };
        if rc != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(MonitorError::Socket(err));
        }
        addr.nl_pid = assigned.nl_pid;

        let rc = unsafe {
            libc::bind(
                fd,
                &addr as *const libc::sockaddr_nl as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(MonitorError::Socket(err));
        }

        Ok(Monitor {
            sock: Mutex::new(fd),
            recv_lock: Mutex::new(()),
            handler,
        })
    }

    /// Receive and dispatch uevents until the socket is closed.
    ///
    /// Malformed datagrams and non-kernel senders are logged and
    /// skipped; a receive error ends the loop. A receive already
    /// blocked when [`Monitor::close`] runs finishes with the next
    /// datagram; the loop observes the closure before blocking again.
    pub fn bind(&self) {
        let _guard = self.recv_lock.lock().expect("monitor receive lock");
        loop {
            // Duplicate the descriptor under the lock and receive on
            // the duplicate: a concurrent close() can then never leave
            // the receive on a number the OS has already reassigned.
            let fd = {
                let sock = self.sock.lock().expect("monitor socket lock");
                if *sock < 0 {
                    return;
                }
                let dup = unsafe { libc::dup(*sock) };
                if dup < 0 {
                    error!(
                        "cannot duplicate uevent socket: {}",
                        io::Error::last_os_error()
                    );
                    return;
                }
                dup
            };
            let received = recv_uevent(fd);
            unsafe { libc::close(fd) };
            match received {
                Ok(event) => {
                    debug!("uevent: {event}");
                    self.handler.handle_uevent(&event);
                }
                Err(err @ (MonitorError::WrongSender(_) | MonitorError::InvalidUevent(_))) => {
                    warn!("received invalid uevent: {err}");
                }
                Err(err) => {
                    if *self.sock.lock().expect("monitor socket lock") < 0 {
                        info!("uevent socket closed; monitor exiting");
                    } else {
                        error!("uevent receive failed: {err}");
                    }
                    return;
                }
            }
        }
    }

    /// Close the uevent socket. [`Monitor::bind`] exits before its next
    /// receive; one already blocked drains at most one more datagram
    /// first.
    pub fn close(&self) -> io::Result<()> {
        let mut sock = self.sock.lock().expect("monitor socket lock");
        if *sock < 0 {
            return Ok(());
        }
        let rc = unsafe { libc::close(*sock) };
        *sock = -1;
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Receive one datagram and parse it, verifying it came from the
/// kernel (netlink sender port ID zero).
fn recv_uevent(fd: RawFd) -> Result<Uevent, MonitorError> {
    let mut buf = [0u8; RECV_BUF_SIZE];
    let mut sender: libc::sockaddr_nl = unsafe { mem::zeroed() };
    let mut senderlen = mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t;
    let received = unsafe {
        libc::recvfrom(
            fd,
            buf.as_mut_ptr() as *mut libc::c_void,
            buf.len(),
            0,
            &mut sender as *mut libc::sockaddr_nl as *mut libc::sockaddr,
            &mut senderlen,
        )
    };
    if received < 0 {
        return Err(MonitorError::Recv(io::Error::last_os_error()));
    }
    if sender.nl_pid != 0 {
        return Err(MonitorError::WrongSender(sender.nl_pid));
    }
    Uevent::parse(&buf[..received as usize])
}
