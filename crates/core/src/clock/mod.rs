//! Time and randomness sources.
//!
//! The upload service never reads the wall clock or the OS random generator
//! directly; both are injected so that hash allocation and bucket placement
//! can be pinned in tests.

use chrono::{DateTime, Utc};
use rand::RngCore;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Source of random numbers for candidate hashes.
pub trait Entropy: Send + Sync {
    /// Returns the next random value.
    fn next_u64(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Thread-local CSPRNG seeded by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl Entropy for OsEntropy {
    fn next_u64(&self) -> u64 {
        rand::rng().next_u64()
    }
}
