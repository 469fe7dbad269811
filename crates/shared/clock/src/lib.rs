//! Keel Clock Infrastructure
//!
//! Time sources for the vault:
//!
//! - [`SystemClock`]: wall-clock time for production
//! - [`ManualClock`]: frozen time that only moves when advanced, for
//!   deterministic rebalance cooldown and fee accrual tests
//!
//! ## Usage
//!
//! ```ignore
//! use keel_clock::ManualClock;
//! use chrono::Duration;
//!
//! let clock = ManualClock::new(None);
//! clock.advance(Duration::hours(4)); // pass the rebalance cooldown
//! ```

mod manual;
mod system;

pub use manual::ManualClock;
pub use system::SystemClock;

// Re-export the Clock trait for convenience
pub use keel_ports::Clock;
