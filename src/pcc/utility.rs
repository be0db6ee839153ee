// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Scalar utility functions over a finished [`MonitorInterval`].
//!
//! Utility orders rate choices by how "good" they were: some combination of
//! throughput, loss, and (for `Vivace`) latency inflation. All arithmetic is
//! fixed-point, scaled by [`SCALE`]; floating point is never used so that
//! the controller's decisions are reproducible across platforms.

use crate::pcc::interval::MonitorInterval;

/// A utility value. Wide and signed so that [`UTILITY_UNDEFINED`] can serve
/// as a sentinel strictly below any value a real computation can produce.
pub type Utility = i64;

/// Sentinel meaning "this interval produced no usable measurement". Strictly
/// less than any utility a real computation can produce, so it always loses
/// a `>` comparison against a real measurement.
pub const UTILITY_UNDEFINED: Utility = i64::MIN;

/// Fixed-point scale applied to rates, ratios, and utilities.
pub const SCALE: i64 = 1000;

/// Scale applied on top of [`SCALE`] to the loss ratio in Allegro, giving it
/// extra fixed-point precision (see §4.3).
const ALPHA: i64 = 100;

/// The loss ratio, in 5% margin, above which Allegro stops granting any
/// utility credit for throughput (see §4.3).
const MAX_LOSS: i64 = 10;

/// The two utility variants the core can be bound to at construction.
///
/// Per §1 / §6, the utility function is bound at construction and is never
/// selected at runtime by a configuration channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "generator", derive(bolero_generator::TypeGenerator))]
pub enum UtilityKind {
    /// Loss-only utility (§4.3).
    Allegro,
    /// Loss + latency utility (§4.4).
    Vivace,
}

impl UtilityKind {
    /// Computes the utility of a finished interval at the given `rate`.
    ///
    /// `mss` is the connection's maximum segment size, in bytes. `slow_start`
    /// selects the noise-suppression rules that only apply to Vivace while
    /// still in the slow-start mode (see §4.4).
    #[inline]
    pub fn compute(self, interval: &MonitorInterval, rate: u64, mss: u64, slow_start: bool) -> Utility {
        match self {
            UtilityKind::Allegro => allegro(interval, rate, mss),
            UtilityKind::Vivace => vivace(interval, rate, mss, slow_start),
        }
    }
}

/// `1e6 * delivered * mss / (recv_end - recv_start)` bytes/s, or `0` if the
/// receive window is degenerate.
///
/// Per §9, the source does not guard against a zero window when `delivered >
/// 0` in the Allegro variant; `Vivace` does guard. We apply the same
/// zero-window guard in both (it is strictly safer and produces the same
/// result whenever the source's unguarded division would not itself divide
/// by zero), recorded as a resolved ambiguity in DESIGN.md.
#[inline]
pub(crate) fn throughput(interval: &MonitorInterval, mss: u64) -> u64 {
    let window_us = interval
        .recv_end_ts
        .saturating_duration_since(interval.recv_start_ts)
        .as_micros() as u64;
    if window_us == 0 {
        return 0;
    }
    1_000_000u64
        .saturating_mul(u64::from(*interval.delivered))
        .saturating_mul(mss)
        / window_us
}

/// A fixed-point truncating Taylor series approximation of `exp(x / SCALE)`,
/// itself scaled by `SCALE`. Converges for `|x|` up to roughly `10 * SCALE`
/// (see §8 boundary behaviors).
fn exp_scaled(x: i64) -> i64 {
    // Generous enough for the |x| <= ~10*SCALE convergence window this
    // is specified to handle, while still bounding the loop for pathological
    // inputs.
    const MAX_TERMS: i64 = 64;

    let mut sum = SCALE;
    let mut term = SCALE;
    let mut i = 1;
    while i <= MAX_TERMS {
        term = term.saturating_mul(x) / i / SCALE;
        if term == 0 {
            break;
        }
        sum = sum.saturating_add(term);
        i += 1;
    }
    sum
}

/// Allegro: loss-only utility (§4.3).
fn allegro(interval: &MonitorInterval, rate: u64, mss: u64) -> Utility {
    let lost = i64::from(*interval.lost);
    let delivered = i64::from(*interval.delivered);
    let total = lost + delivered;
    if total == 0 {
        return UTILITY_UNDEFINED;
    }

    let loss_ratio = lost * SCALE * ALPHA / total;
    let throughput = throughput(interval, mss) as i64;

    let u = loss_ratio - 5 * SCALE;
    let u_prime = if u < MAX_LOSS * SCALE {
        throughput * SCALE / (exp_scaled(u) + SCALE)
    } else {
        0
    };

    let rate = rate as i64;
    u_prime * (SCALE * ALPHA - loss_ratio) / (SCALE * ALPHA) - (rate * loss_ratio) / (ALPHA * SCALE)
}

/// Vivace: loss + latency utility (§4.4).
fn vivace(interval: &MonitorInterval, rate: u64, mss: u64, slow_start: bool) -> Utility {
    if *interval.delivered == 0 {
        return 0;
    }

    let throughput = throughput(interval, mss) as i64;

    let rtt_diff = i64::from(interval.end_rtt) - i64::from(interval.start_rtt);
    let rtt_diff_thresh = if throughput == 0 {
        i64::MAX
    } else {
        2 * 1_000_000 * mss as i64 / throughput
    };

    let mut lat_infl = if rtt_diff.abs() < rtt_diff_thresh {
        0
    } else {
        let send_window_us = interval
            .send_end_ts
            .saturating_duration_since(interval.send_start_ts)
            .as_micros() as i64;
        if send_window_us == 0 {
            0
        } else {
            SCALE * rtt_diff / send_window_us
        }
    };

    if lat_infl.abs() < 30 {
        lat_infl = 0;
    }
    if slow_start && lat_infl < 0 {
        lat_infl = 0;
    }

    let lost = i64::from(*interval.lost);
    let delivered = i64::from(*interval.delivered);
    let mut loss_ratio = lost * SCALE / (lost + delivered);
    if slow_start && loss_ratio < 100 {
        loss_ratio = 0;
    }

    let rate = rate as i64;
    rate - rate * (900 * lat_infl + 11 * loss_ratio) / SCALE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Timestamp;

    const MSS: u64 = 1460;

    fn interval_with(lost: u32, delivered: u32, window_us: u64) -> MonitorInterval {
        let mut interval = MonitorInterval::default();
        interval.lost = lost.into();
        interval.delivered = delivered.into();
        interval.recv_start_ts = Timestamp::from_micros(0);
        interval.recv_end_ts = Timestamp::from_micros(window_us);
        interval.send_start_ts = Timestamp::from_micros(0);
        interval.send_end_ts = Timestamp::from_micros(window_us);
        interval.start_rtt = 10_000;
        interval.end_rtt = 10_000;
        interval
    }

    #[test]
    fn allegro_no_samples_is_undefined() {
        let interval = interval_with(0, 0, 1_000_000);
        assert_eq!(allegro(&interval, 1_000_000, MSS), UTILITY_UNDEFINED);
    }

    #[test]
    fn allegro_rewards_throughput_when_loss_is_low() {
        let high = interval_with(0, 1_000, 1_000_000);
        let low = interval_with(0, 500, 1_000_000);
        assert!(allegro(&high, 1_000_000, MSS) > allegro(&low, 1_000_000, MSS));
    }

    #[test]
    fn allegro_penalizes_high_loss() {
        // 50% loss is well past the 5% margin and the MAX_LOSS cliff.
        let lossy = interval_with(500, 500, 1_000_000);
        let clean = interval_with(0, 1_000, 1_000_000);
        assert!(allegro(&clean, 1_000_000, MSS) > allegro(&lossy, 1_000_000, MSS));
    }

    #[test]
    fn exp_scaled_of_zero_is_scale() {
        assert_eq!(exp_scaled(0), SCALE);
    }

    #[test]
    fn exp_scaled_is_monotonic_increasing() {
        assert!(exp_scaled(1000) > exp_scaled(0));
        assert!(exp_scaled(2000) > exp_scaled(1000));
    }

    #[test]
    fn vivace_no_delivered_is_zero() {
        let interval = interval_with(0, 0, 1_000_000);
        assert_eq!(vivace(&interval, 1_000_000, MSS, false), 0);
    }

    #[test]
    fn vivace_penalizes_latency_inflation() {
        let mut inflated = interval_with(0, 1_000, 1_000_000);
        inflated.start_rtt = 10_000;
        inflated.end_rtt = 20_000;

        let stable = interval_with(0, 1_000, 1_000_000);

        assert!(
            vivace(&stable, 1_000_000, MSS, false) > vivace(&inflated, 1_000_000, MSS, false)
        );
    }
}
