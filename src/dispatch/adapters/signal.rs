//! Liveness check using signal 0.

use crate::dispatch::ports::ProcessMonitor;
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;

/// Checks processes with `kill(pid, 0)`.
///
/// A process owned by another user still counts as alive.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalMonitor;

impl ProcessMonitor for SignalMonitor {
    fn is_alive(&self, pid: u32) -> bool {
        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        if raw <= 0 {
            return false;
        }
        match kill(Pid::from_raw(raw), None) {
            Ok(()) | Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }
}
