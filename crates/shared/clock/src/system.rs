use chrono::Utc;
use keel_core::Timestamp;
use keel_ports::Clock;

/// Wall-clock time, used by the keeper binary
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }

    fn name(&self) -> &str {
        "SystemClock"
    }
}
