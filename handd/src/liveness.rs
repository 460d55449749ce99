use chrono::{DateTime, Local};
use std::fmt;
use tokio::time::{Duration, Instant};

/// Without a status or heartbeat message for this long the device is
/// considered offline
pub const DECAY_WINDOW: Duration = Duration::from_secs(10);

/// Derived on demand, never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastSeen {
    Now,
    Ago(Duration),
    Never,
}

impl fmt::Display for LastSeen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LastSeen::Now => f.write_str("now"),
            LastSeen::Never => f.write_str("never"),
            LastSeen::Ago(elapsed) => {
                let secs = elapsed.as_secs();
                if secs < 60 {
                    write!(f, "{secs}s ago")
                } else if secs < 3600 {
                    write!(f, "{}m {}s ago", secs / 60, secs % 60)
                } else {
                    write!(f, "{}h {}m ago", secs / 3600, (secs % 3600) / 60)
                }
            }
        }
    }
}

/// Device liveness indicator as drawn by the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivenessView {
    pub online: bool,
    pub last_seen: LastSeen,
    /// Wall clock time of the last heartbeat, for display only
    pub last_heartbeat: Option<DateTime<Local>>,
}

/// [`LivenessTracker`] infers whether the physical device is alive from
/// status and heartbeat arrivals, independent of broker connectivity.
///
/// The decay timer is a single slot deadline: every heartbeat replaces
/// it, so at most one is ever armed, and `online` is only true while it
/// is armed. The event loop sleeps until [`LivenessTracker::deadline`]
/// and then calls [`LivenessTracker::expire`].
#[derive(Debug)]
pub struct LivenessTracker {
    online: bool,
    last_heartbeat_at: Option<Instant>,
    last_heartbeat_wall: Option<DateTime<Local>>,
    decay_deadline: Option<Instant>,
    window: Duration,
}

impl Default for LivenessTracker {
    fn default() -> Self {
        Self::new(DECAY_WINDOW)
    }
}

impl LivenessTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            online: false,
            last_heartbeat_at: None,
            last_heartbeat_wall: None,
            decay_deadline: None,
            window,
        }
    }

    pub fn register_heartbeat(&mut self, now: Instant) {
        if !self.online {
            log::info!("Device is online");
        }
        self.online = true;
        self.last_heartbeat_at = Some(now);
        self.last_heartbeat_wall = Some(Local::now());
        // cancel and replace
        self.decay_deadline = Some(now + self.window);
    }

    /// Fires the decay timer if its deadline has passed. Returns true when
    /// this call took the device offline
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.decay_deadline {
            Some(deadline) if now >= deadline => {
                self.decay_deadline = None;
                self.online = false;
                log::warn!("No heartbeat for {:?}, device is offline", self.window);
                true
            }
            _ => false,
        }
    }

    /// Takes the device offline immediately, dropping any armed timer
    pub fn force_offline(&mut self) {
        if self.online {
            log::warn!("Forcing device offline");
        }
        self.decay_deadline = None;
        self.online = false;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.decay_deadline
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn last_heartbeat_at(&self) -> Option<Instant> {
        self.last_heartbeat_at
    }

    pub fn last_seen(&self, now: Instant) -> LastSeen {
        if self.online {
            return LastSeen::Now;
        }
        match self.last_heartbeat_at {
            Some(at) => LastSeen::Ago(now.saturating_duration_since(at)),
            None => LastSeen::Never,
        }
    }

    pub fn view(&self, now: Instant) -> LivenessView {
        LivenessView {
            online: self.online,
            last_seen: self.last_seen(now),
            last_heartbeat: self.last_heartbeat_wall,
        }
    }
}
