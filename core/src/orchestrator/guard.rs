use std::time::{Duration, SystemTime};

/// Confirmation window for restarting a staged scan.
///
/// Once a staged scan holds state, starting stage 1 again is refused and
/// arms the window. Repeating the call while the window is open confirms the
/// restart and disarms it. The arming time is wall-clock so that a
/// workspace can carry it from one `gummy run` to the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartGuard {
    window: Duration,
    armed_at: Option<SystemTime>,
}

impl Default for RestartGuard {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl RestartGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            armed_at: None,
        }
    }

    /// Continues a window armed by an earlier process.
    pub fn with_armed_at(mut self, armed_at: Option<SystemTime>) -> Self {
        self.armed_at = armed_at;
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn armed_at(&self) -> Option<SystemTime> {
        self.armed_at
    }

    /// Returns whether stage 1 may start at `now`.
    pub fn admit(&mut self, has_state: bool, now: SystemTime) -> bool {
        if !has_state {
            return true;
        }
        if let Some(armed_at) = self.armed_at.take() {
            let elapsed = now.duration_since(armed_at).unwrap_or_default();
            if elapsed < self.window {
                return true;
            }
        }
        self.armed_at = Some(now);
        false
    }
}

/// Monotonic sequence shared by every run of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounter {
    last: usize,
}

impl RunCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continues after `last`, typically the highest sequence in a workspace.
    pub fn resume(last: usize) -> Self {
        Self { last }
    }

    pub fn next(&mut self) -> usize {
        self.last += 1;
        self.last
    }

    pub fn last(&self) -> usize {
        self.last
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
