// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Defines time related datatypes used by the PCC core.

pub use core::time::Duration;
use core::{fmt, ops};

/// An absolute point in time, expressed in microseconds on the host's
/// monotonic clock.
///
/// The absolute value of a `Timestamp` is opaque: it is whatever the host
/// passes as `now_us` in a [`Sample`](crate::pcc::Sample). `Timestamp`s
/// should only be compared against other `Timestamp`s sourced from the same
/// clock, which is guaranteed within a single connection since the host is
/// required to supply a monotonic clock (see §5 of the design).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "generator", derive(bolero_generator::TypeGenerator))]
pub struct Timestamp(u64);

impl Timestamp {
    /// Constructs a `Timestamp` from a microsecond value read from the host's
    /// monotonic clock.
    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Returns the number of microseconds since the (opaque) clock epoch.
    #[inline]
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// Returns the saturating duration elapsed between `earlier` and `self`.
    ///
    /// Unlike [`ops::Sub`], this never panics: if `earlier` is later than
    /// `self` the result is `Duration::ZERO`. Host samples are expected to be
    /// monotonic, but a saturating subtraction keeps a single out-of-order
    /// sample from poisoning the whole controller.
    #[inline]
    pub fn saturating_duration_since(self, earlier: Timestamp) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let micros = self.0 % 1_000_000;
        let secs = self.0 / 1_000_000 % 60;
        let mins = self.0 / 1_000_000 / 60 % 60;
        let hours = self.0 / 1_000_000 / 60 / 60;
        write!(f, "{hours}:{mins:02}:{secs:02}.{micros:06}")
    }
}

impl ops::Sub for Timestamp {
    type Output = Duration;

    /// Computes the duration between two timestamps.
    ///
    /// # Panics
    ///
    /// Panics if `rhs` is later than `self`. Use
    /// [`Timestamp::saturating_duration_since`] on a hot path where an
    /// out-of-order sample cannot be ruled out.
    #[inline]
    fn sub(self, rhs: Timestamp) -> Duration {
        Duration::from_micros(
            self.0
                .checked_sub(rhs.0)
                .expect("rhs must not be later than self"),
        )
    }
}

#[test]
fn display_test() {
    assert_eq!(
        format!("{}", Timestamp::from_micros(1_000_001)),
        "0:00:01.000001"
    );
    assert_eq!(format!("{}", Timestamp::from_micros(60_000_000)), "0:01:00.000000");
}

#[test]
fn saturating_duration_since_test() {
    let earlier = Timestamp::from_micros(10);
    let later = Timestamp::from_micros(15);
    assert_eq!(later.saturating_duration_since(earlier), Duration::from_micros(5));
    assert_eq!(earlier.saturating_duration_since(later), Duration::ZERO);
}
