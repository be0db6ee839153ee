// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Ambient, host-diagnostics-facing event hooks.
//!
//! This mirrors `s2n_quic_core::recovery::congestion_controller::Publisher`:
//! a small trait invoked on externally-interesting transitions, never read
//! back by the core. The core does not format strings or allocate on the
//! hot path; any such work belongs in a `Publisher` implementation like
//! [`TracingPublisher`].

use crate::pcc::{decider::Decision, decider::Mode, utility::Utility};

/// Invoked by the controller whenever something diagnostically interesting
/// happens. Implementations must not call back into the controller: this is
/// a one-way notification, exactly like the teacher's own
/// `congestion_controller::Publisher`.
pub trait Publisher {
    /// The controller switched from one mode to another.
    fn on_mode_changed(&mut self, from: Mode, to: Mode);

    /// A probing or moving round produced a decision.
    fn on_decision(&mut self, decision: Decision, rate: u64);

    /// Slow start exited, reverting to `reverted_rate`.
    fn on_slow_start_exited(&mut self, reverted_rate: u64);

    /// A monitor interval folded a new delivery-rate sample.
    fn on_delivery_rate_sampled(&mut self, utility: Option<Utility>, throughput_bytes_per_second: u64);

    /// The pacer was reprogrammed.
    fn on_pacing_rate_updated(&mut self, bytes_per_second: u64);

    /// The host entered (`true`) or exited (`false`) loss recovery.
    fn on_loss_recovery(&mut self, entered: bool);
}

/// A zero-cost `Publisher` that discards every event, used by default and
/// in tests that don't care about diagnostics.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopPublisher;

impl Publisher for NoopPublisher {
    #[inline]
    fn on_mode_changed(&mut self, _from: Mode, _to: Mode) {}
    #[inline]
    fn on_decision(&mut self, _decision: Decision, _rate: u64) {}
    #[inline]
    fn on_slow_start_exited(&mut self, _reverted_rate: u64) {}
    #[inline]
    fn on_delivery_rate_sampled(&mut self, _utility: Option<Utility>, _throughput_bytes_per_second: u64) {}
    #[inline]
    fn on_pacing_rate_updated(&mut self, _bytes_per_second: u64) {}
    #[inline]
    fn on_loss_recovery(&mut self, _entered: bool) {}
}

/// A `Publisher` that forwards every event to `tracing`, gated behind the
/// `event-tracing` feature, matching the teacher's own `event-tracing`
/// feature name and intent of keeping `tracing` out of the default hot path.
#[cfg(feature = "event-tracing")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingPublisher;

#[cfg(feature = "event-tracing")]
impl Publisher for TracingPublisher {
    #[inline]
    fn on_mode_changed(&mut self, from: Mode, to: Mode) {
        tracing::debug!(?from, ?to, "mode changed");
    }

    #[inline]
    fn on_decision(&mut self, decision: Decision, rate: u64) {
        tracing::trace!(?decision, rate, "decision");
    }

    #[inline]
    fn on_slow_start_exited(&mut self, reverted_rate: u64) {
        tracing::debug!(reverted_rate, "slow start exited");
    }

    #[inline]
    fn on_delivery_rate_sampled(&mut self, utility: Option<Utility>, throughput_bytes_per_second: u64) {
        tracing::trace!(?utility, throughput_bytes_per_second, "delivery rate sampled");
    }

    #[inline]
    fn on_pacing_rate_updated(&mut self, bytes_per_second: u64) {
        tracing::trace!(bytes_per_second, "pacing rate updated");
    }

    #[inline]
    fn on_loss_recovery(&mut self, entered: bool) {
        tracing::debug!(entered, "loss recovery");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingPublisher {
        mode_changes: u32,
        decisions: u32,
    }

    impl Publisher for RecordingPublisher {
        fn on_mode_changed(&mut self, _from: Mode, _to: Mode) {
            self.mode_changes += 1;
        }
        fn on_decision(&mut self, _decision: Decision, _rate: u64) {
            self.decisions += 1;
        }
        fn on_slow_start_exited(&mut self, _reverted_rate: u64) {}
        fn on_delivery_rate_sampled(&mut self, _utility: Option<Utility>, _throughput_bytes_per_second: u64) {}
        fn on_pacing_rate_updated(&mut self, _bytes_per_second: u64) {}
        fn on_loss_recovery(&mut self, _entered: bool) {}
    }

    #[test]
    fn noop_publisher_compiles_for_every_hook() {
        let mut publisher = NoopPublisher;
        publisher.on_mode_changed(Mode::SlowStart, Mode::Probing);
        publisher.on_decision(Decision::RateUp, 1_000_000);
        publisher.on_slow_start_exited(500_000);
        publisher.on_delivery_rate_sampled(Some(10), 1_000_000);
        publisher.on_pacing_rate_updated(1_000_000);
        publisher.on_loss_recovery(true);
    }

    #[test]
    fn recording_publisher_counts_events() {
        let mut publisher = RecordingPublisher::default();
        publisher.on_mode_changed(Mode::SlowStart, Mode::Probing);
        publisher.on_decision(Decision::RateUp, 1_000_000);
        assert_eq!(publisher.mode_changes, 1);
        assert_eq!(publisher.decisions, 1);
    }
}
