//! Time-ordered platform identifiers
//!
//! Message, channel and user ids are snowflakes: bits 22..64 hold a
//! millisecond offset from the platform epoch (2015-01-01T00:00:00Z).
//! Range comparisons therefore never need a separate timestamp field.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::SweepError;

/// Milliseconds between the Unix epoch and the platform epoch
pub const PLATFORM_EPOCH_MS: u64 = 1_420_070_400_000;

/// A platform-issued time-ordered unique identifier
///
/// Serialized as a decimal string on the wire and in persisted documents,
/// matching the platform's JSON representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Snowflake(u64);

impl Snowflake {
    /// Build a snowflake from its raw numeric value
    pub const fn from_raw(value: u64) -> Self {
        Snowflake(value)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Embedded creation time in milliseconds since the Unix epoch
    pub fn timestamp_ms(&self) -> u64 {
        (self.0 >> 22) + PLATFORM_EPOCH_MS
    }

    /// Embedded creation time
    pub fn timestamp(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp_ms() as i64).unwrap_or_default()
    }

    /// Generate a fresh snowflake from the current time
    ///
    /// A process-local sequence keeps ids generated within the same
    /// millisecond distinct and monotonic. Used for run ids.
    pub fn generate() -> Self {
        static SEQUENCE: AtomicU64 = AtomicU64::new(0);
        let millis = (Utc::now().timestamp_millis() as u64).saturating_sub(PLATFORM_EPOCH_MS);
        let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed) & 0xFFF;
        Snowflake((millis << 22) | sequence)
    }
}

impl FromStr for Snowflake {
    type Err = SweepError;

    /// Parse a snowflake from its decimal string form
    ///
    /// Well-formed snowflakes are 17 to 20 digits; anything else is
    /// rejected before a numeric parse is attempted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < 17 || s.len() > 20 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SweepError::Validation(format!(
                "`{}` is not a valid snowflake",
                truncate(s, 20)
            )));
        }
        s.parse::<u64>()
            .map(Snowflake)
            .map_err(|_| SweepError::Validation(format!("`{}` is not a valid snowflake", s)))
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for Snowflake {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Snowflake {
    /// Documents we wrote ourselves are trusted: any decimal u64 is
    /// accepted here, while the 17-20 digit rule stays at the
    /// user-input boundary in [`FromStr`]
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::Deserialize;
        let raw = String::deserialize(deserializer)?;
        raw.parse::<u64>()
            .map(Snowflake)
            .map_err(serde::de::Error::custom)
    }
}

fn truncate(s: &str, limit: usize) -> &str {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
