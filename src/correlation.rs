use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Correlation identifier carried in the `request_id` field of a message.
///
/// Identifiers are opaque to the daemon, which echoes them back on the
/// response. Format: 32 lowercase hex characters, a per-channel session
/// prefix followed by a per-channel sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Borrow the correlation ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CorrelationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates collision-free correlation IDs for one channel.
///
/// The sequence half never repeats for the generator's lifetime; the random
/// prefix keeps IDs from different channels (and earlier connections to the
/// same daemon) apart.
#[derive(Debug)]
pub struct CorrelationIdGenerator {
    // ---
    prefix: u64,
    next: AtomicU64,
}

impl CorrelationIdGenerator {
    /// Create a generator with a fresh random prefix.
    pub fn new() -> Self {
        // ---
        let (prefix, _) = Uuid::new_v4().as_u64_pair();
        Self {
            prefix,
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next identifier.
    pub fn next_id(&self) -> CorrelationId {
        // ---
        let seq = self.next.fetch_add(1, Ordering::Relaxed);
        CorrelationId(format!("{:016x}{:016x}", self.prefix, seq))
    }
}

impl Default for CorrelationIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
