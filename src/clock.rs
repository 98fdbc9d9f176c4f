use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Time source for the car workers. Injected so tests and demo runs can
/// compress the fixed delays without touching the control loops.
pub trait Clock: Send + Sync {
    /// Current time as unix seconds.
    fn now(&self) -> u64;

    /// Block the calling worker for the given duration.
    fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}
