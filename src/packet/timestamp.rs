// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Logical timestamps carried by every packet.
//!
//! A `Timestamp` is a totally ordered 64-bit value. The extremes of the range
//! are reserved for sentinels so that ordinary comparisons order them
//! correctly against regular values:
//!
//! ```text
//! Unset < Unstarted < PreStream < Min ..= Max < PostStream < Done
//! ```
//!
//! Only `PreStream`, `[Min, Max]` and `PostStream` may be attached to a packet
//! that travels on a stream. `Unstarted` is the bound of a stream that has not
//! seen anything yet and `Done` is the bound of a closed stream.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::ops::{Add, Sub};

/// Signed distance between two timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimestampDiff(pub i64);

/// A logical point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// No timestamp assigned.
    pub const UNSET: Timestamp = Timestamp(i64::MIN);
    /// Bound of a stream before anything was sent or propagated.
    pub const UNSTARTED: Timestamp = Timestamp(i64::MIN + 1);
    /// Bracket value for per-run setup data, before every regular value.
    pub const PRE_STREAM: Timestamp = Timestamp(i64::MIN + 2);
    /// Smallest regular value.
    pub const MIN: Timestamp = Timestamp(i64::MIN + 3);
    /// Largest regular value.
    pub const MAX: Timestamp = Timestamp(i64::MAX - 2);
    /// Bracket value for per-run summary data, after every regular value.
    pub const POST_STREAM: Timestamp = Timestamp(i64::MAX - 1);
    /// Terminal bound: no packet will ever arrive again.
    pub const DONE: Timestamp = Timestamp(i64::MAX);

    /// Builds a timestamp from a raw value. Values that fall on a sentinel are
    /// accepted as that sentinel.
    pub const fn new(value: i64) -> Self {
        Timestamp(value)
    }

    pub const fn value(self) -> i64 {
        self.0
    }

    /// True for regular values in `[Min, Max]`.
    pub const fn is_range_value(self) -> bool {
        self.0 >= Self::MIN.0 && self.0 <= Self::MAX.0
    }

    pub const fn is_special_value(self) -> bool {
        !self.is_range_value()
    }

    /// True for values a packet may carry on a stream.
    pub const fn is_allowed_in_stream(self) -> bool {
        self.is_range_value() || self.0 == Self::PRE_STREAM.0 || self.0 == Self::POST_STREAM.0
    }

    /// Smallest timestamp strictly greater than `self` that a packet could
    /// still carry after a packet at `self` has been fully consumed.
    pub const fn next_allowed_in_stream(self) -> Self {
        if self.0 < Self::PRE_STREAM.0 {
            Self::PRE_STREAM
        } else if self.0 == Self::PRE_STREAM.0 {
            Self::MIN
        } else if self.0 < Self::MAX.0 {
            Timestamp(self.0 + 1)
        } else if self.0 == Self::MAX.0 {
            Self::POST_STREAM
        } else {
            Self::DONE
        }
    }

    /// Largest timestamp strictly smaller than `self` that a packet could carry.
    pub const fn previous_allowed_in_stream(self) -> Self {
        if self.0 <= Self::PRE_STREAM.0 {
            Self::UNSTARTED
        } else if self.0 == Self::MIN.0 {
            Self::PRE_STREAM
        } else if self.0 <= Self::MAX.0 {
            Timestamp(self.0 - 1)
        } else if self.0 == Self::POST_STREAM.0 {
            Self::MAX
        } else {
            Self::POST_STREAM
        }
    }

    /// Offsets a regular value, saturating inside `[Min, Max]`. Sentinels are
    /// returned unchanged so that offsets never turn data into a bound.
    pub fn offset(self, diff: TimestampDiff) -> Self {
        if !self.is_range_value() {
            return self;
        }
        let shifted = self.0.saturating_add(diff.0);
        Timestamp(shifted.clamp(Self::MIN.0, Self::MAX.0))
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::UNSET
    }
}

impl From<i64> for Timestamp {
    fn from(value: i64) -> Self {
        Timestamp::new(value)
    }
}

impl Add<TimestampDiff> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: TimestampDiff) -> Self::Output {
        self.offset(rhs)
    }
}

impl Sub for Timestamp {
    type Output = TimestampDiff;

    fn sub(self, rhs: Timestamp) -> Self::Output {
        TimestampDiff(self.0.saturating_sub(rhs.0))
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::UNSET => write!(f, "Timestamp::Unset"),
            Self::UNSTARTED => write!(f, "Timestamp::Unstarted"),
            Self::PRE_STREAM => write!(f, "Timestamp::PreStream"),
            Self::MIN => write!(f, "Timestamp::Min"),
            Self::MAX => write!(f, "Timestamp::Max"),
            Self::POST_STREAM => write!(f, "Timestamp::PostStream"),
            Self::DONE => write!(f, "Timestamp::Done"),
            Timestamp(value) => write!(f, "{}", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_ordering() {
        let ordered = [
            Timestamp::UNSET,
            Timestamp::UNSTARTED,
            Timestamp::PRE_STREAM,
            Timestamp::MIN,
            Timestamp::new(0),
            Timestamp::MAX,
            Timestamp::POST_STREAM,
            Timestamp::DONE,
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0] < pair[1], "{} should sort before {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_next_allowed_in_stream() {
        let cases = vec![
            (Timestamp::UNSTARTED, Timestamp::PRE_STREAM),
            (Timestamp::PRE_STREAM, Timestamp::MIN),
            (Timestamp::new(41), Timestamp::new(42)),
            (Timestamp::MAX, Timestamp::POST_STREAM),
            (Timestamp::POST_STREAM, Timestamp::DONE),
            (Timestamp::DONE, Timestamp::DONE),
        ];
        for (input, expected) in cases {
            assert_eq!(input.next_allowed_in_stream(), expected, "next of {}", input);
        }
    }

    #[test]
    fn test_previous_is_inverse_of_next_for_stream_values() {
        for ts in [Timestamp::PRE_STREAM, Timestamp::MIN, Timestamp::new(7), Timestamp::MAX] {
            assert_eq!(ts.next_allowed_in_stream().previous_allowed_in_stream(), ts);
        }
    }

    #[test]
    fn test_allowed_in_stream() {
        assert!(Timestamp::PRE_STREAM.is_allowed_in_stream());
        assert!(Timestamp::POST_STREAM.is_allowed_in_stream());
        assert!(Timestamp::new(-5).is_allowed_in_stream());
        assert!(!Timestamp::UNSET.is_allowed_in_stream());
        assert!(!Timestamp::UNSTARTED.is_allowed_in_stream());
        assert!(!Timestamp::DONE.is_allowed_in_stream());
        assert!(Timestamp::POST_STREAM.is_special_value());
        assert!(!Timestamp::new(-5).is_special_value());
    }

    #[test]
    fn test_offset_saturates_and_keeps_sentinels() {
        assert_eq!(Timestamp::new(10) + TimestampDiff(5), Timestamp::new(15));
        assert_eq!(Timestamp::MAX + TimestampDiff(1), Timestamp::MAX);
        assert_eq!(Timestamp::MIN + TimestampDiff(-1), Timestamp::MIN);
        assert_eq!(Timestamp::PRE_STREAM + TimestampDiff(3), Timestamp::PRE_STREAM);
        assert_eq!(Timestamp::DONE + TimestampDiff(-3), Timestamp::DONE);
        assert_eq!(Timestamp::new(10) - Timestamp::new(4), TimestampDiff(6));
    }

    #[test]
    fn test_display() {
        assert_eq!(Timestamp::new(3).to_string(), "3");
        assert_eq!(Timestamp::DONE.to_string(), "Timestamp::Done");
    }
}
