// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{counter::Counter, pcc::utility::Utility, random, time::Timestamp};

/// The number of monitor intervals held by the ring.
///
/// Probing uses all four slots to run two independent paired comparisons;
/// slow-start and moving use only slot `0`.
pub const INTERVALS: usize = 4;

/// The fraction (in thousandths) probing perturbs the base rate by, in
/// either direction. Design default: 5/100 (`50` permille).
pub const DEFAULT_PROBING_EPSILON_PERMILLE: u32 = 50;

/// One measurement window: a rate target paced for some span of time, and
/// the delivery/loss/latency accumulated while packets sent during that span
/// were acknowledged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonitorInterval {
    /// The pacing rate requested while this interval was the sending
    /// interval, in bytes/s.
    pub target_rate: u64,
    /// `data_segs_out` at the moment sending started. `0` means sending has
    /// not started yet.
    pub packets_sent_base: u32,
    /// `data_segs_out` at the moment sending ended. `0` means sending has
    /// not ended yet.
    pub packets_ended: Counter<u32>,
    pub send_start_ts: Timestamp,
    pub send_end_ts: Timestamp,
    pub recv_start_ts: Timestamp,
    pub recv_end_ts: Timestamp,
    pub start_rtt: u32,
    pub end_rtt: u32,
    pub lost: Counter<u32>,
    pub delivered: Counter<u32>,
    /// The computed utility for this interval, or [`None`] if it has not
    /// been computed yet. Once set, it is never recomputed: utility is
    /// meant to be computed exactly once per finished interval.
    utility: Option<Utility>,
}

impl Default for MonitorInterval {
    fn default() -> Self {
        Self {
            target_rate: 0,
            packets_sent_base: 0,
            packets_ended: Counter::new(0),
            send_start_ts: Timestamp::default(),
            send_end_ts: Timestamp::default(),
            recv_start_ts: Timestamp::default(),
            recv_end_ts: Timestamp::default(),
            start_rtt: 0,
            end_rtt: 0,
            lost: Counter::new(0),
            delivered: Counter::new(0),
            utility: None,
        }
    }
}

impl MonitorInterval {
    /// Resets the counters and timestamps of this interval so it can be
    /// reused for a new measurement window, keeping only `target_rate`
    /// (which the caller is expected to overwrite as needed).
    #[inline]
    pub fn reset(&mut self, target_rate: u64) {
        *self = Self {
            target_rate,
            ..Default::default()
        };
    }

    /// Whether sending has started for this interval.
    #[inline]
    pub fn has_started_sending(&self) -> bool {
        self.packets_sent_base != 0
    }

    /// Whether sending has ended for this interval.
    #[inline]
    pub fn has_ended_sending(&self) -> bool {
        *self.packets_ended != 0
    }

    /// Whether at least one sample has been folded into this interval.
    #[inline]
    pub fn has_folded_a_sample(&self) -> bool {
        *self.lost + *self.delivered != 0
    }

    /// Returns the previously-computed utility, if any.
    #[inline]
    pub fn utility(&self) -> Option<Utility> {
        self.utility
    }

    /// Records the utility for this interval.
    ///
    /// # Panics
    ///
    /// Panics (in debug builds) if the utility has already been set: §3
    /// requires an interval's utility is never recomputed.
    #[inline]
    pub fn set_utility(&mut self, utility: Utility) {
        debug_assert!(
            self.utility.is_none(),
            "an interval's utility must only be computed once"
        );
        self.utility = Some(utility);
    }
}

/// Fixed-size storage for the four monitor intervals used by probing, plus
/// the independent send/receive cursors that walk it.
#[derive(Clone, Copy, Debug)]
pub struct IntervalRing {
    intervals: [MonitorInterval; INTERVALS],
    send_index: usize,
    recv_index: usize,
}

impl Default for IntervalRing {
    fn default() -> Self {
        Self {
            intervals: [MonitorInterval::default(); INTERVALS],
            send_index: 0,
            recv_index: 0,
        }
    }
}

impl IntervalRing {
    #[inline]
    pub fn send_index(&self) -> usize {
        self.send_index
    }

    #[inline]
    pub fn recv_index(&self) -> usize {
        self.recv_index
    }

    #[inline]
    pub fn get(&self, index: usize) -> &MonitorInterval {
        &self.intervals[index]
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> &mut MonitorInterval {
        &mut self.intervals[index]
    }

    #[inline]
    pub fn current_send(&self) -> &MonitorInterval {
        self.get(self.send_index)
    }

    #[inline]
    pub fn current_send_mut(&mut self) -> &mut MonitorInterval {
        self.get_mut(self.send_index)
    }

    #[inline]
    pub fn current_recv(&self) -> &MonitorInterval {
        self.get(self.recv_index)
    }

    #[inline]
    pub fn current_recv_mut(&mut self) -> &mut MonitorInterval {
        self.get_mut(self.recv_index)
    }

    #[inline]
    pub fn all(&self) -> &[MonitorInterval; INTERVALS] {
        &self.intervals
    }

    /// Advances the send cursor by one slot. Returns `true` if this would
    /// have advanced past the last slot (in which case the cursor is left
    /// at the last slot and the caller is expected to set `wait`).
    #[inline]
    pub fn advance_send(&mut self) -> bool {
        if self.send_index + 1 >= INTERVALS {
            true
        } else {
            self.send_index += 1;
            false
        }
    }

    /// Advances the receive cursor by one slot, saturating at the last slot.
    #[inline]
    pub fn advance_recv(&mut self) {
        if self.recv_index + 1 < INTERVALS {
            self.recv_index += 1;
        }
    }

    /// Resets both cursors to slot `0`, used when (re)launching slow-start
    /// or a single-interval moving step.
    #[inline]
    pub fn reset_cursors(&mut self) {
        self.send_index = 0;
        self.recv_index = 0;
    }

    /// Lays out a probing round: two paired comparisons of `rate * (1 + eps)`
    /// and `rate * (1 - eps)`, with the order of each pair drawn
    /// independently from `rng`.
    ///
    /// `epsilon_permille` is the perturbation size in thousandths (design
    /// default `50`, i.e. 5%).
    pub fn lay_out_probing(
        &mut self,
        rate: u64,
        epsilon_permille: u32,
        rng: &mut dyn random::Generator,
    ) {
        let epsilon_permille = u64::from(epsilon_permille);
        let up = rate + rate * epsilon_permille / 1000;
        let down = rate - rate * epsilon_permille / 1000;

        for pair in 0..2 {
            let bit = rng.gen_bool(0.5);
            let (first, second) = if bit { (up, down) } else { (down, up) };
            self.intervals[pair * 2].reset(first);
            self.intervals[pair * 2 + 1].reset(second);
        }

        self.reset_cursors();
    }

    /// Lays out a single moving interval at slot `0`.
    pub fn lay_out_moving(&mut self, rate: u64) {
        self.intervals[0].reset(rate);
        self.reset_cursors();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::testing::Generator;

    #[test]
    fn lay_out_probing_pairs_complement() {
        let mut ring = IntervalRing::default();
        let mut rng = Generator {
            gen_bool_result: true,
            ..Default::default()
        };
        ring.lay_out_probing(1_000_000, 50, &mut rng);

        assert_eq!(ring.get(0).target_rate, 1_050_000);
        assert_eq!(ring.get(1).target_rate, 950_000);
        assert_eq!(ring.get(2).target_rate, 1_050_000);
        assert_eq!(ring.get(3).target_rate, 950_000);
        assert_eq!(ring.send_index(), 0);
        assert_eq!(ring.recv_index(), 0);
    }

    #[test]
    fn advance_send_reports_overflow_at_last_slot() {
        let mut ring = IntervalRing::default();
        assert!(!ring.advance_send());
        assert!(!ring.advance_send());
        assert!(!ring.advance_send());
        assert!(ring.advance_send());
        assert_eq!(ring.send_index(), 3);
    }

    #[test]
    fn set_utility_twice_panics() {
        let mut interval = MonitorInterval::default();
        interval.set_utility(1);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            interval.set_utility(2);
        }));
        assert!(result.is_err());
    }
}
