use chrono::{DateTime, Utc};

/// Time source injected into every service that makes time-based decisions.
///
/// Expiry windows, invitation validity, MFA step checks, and session TTLs all
/// read the clock through this trait so tests can pin the instant exactly.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used outside of tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
