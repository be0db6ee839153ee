// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The mode-dependent reaction to a finished monitor interval.
//!
//! This module holds the pure, unit-testable pieces of the decision engine:
//! the mode/decision vocabulary, the probing vote, and the gradient-ascent
//! step-size adaptation. The parts of the decider that need to mutate
//! `Controller` state directly (laying out the next round of intervals,
//! swapping `rate`/`last_rate`) live on `Controller` in `controller.rs`,
//! which calls into these pure helpers.

use crate::pcc::utility::Utility;

/// The controller's current operating mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Multiplicative rate growth (1.5x) while utility keeps improving.
    SlowStart,
    /// Comparing four rates (two paired comparisons) to pick a direction.
    Probing,
    /// Single-interval gradient-ascent step in one direction.
    Moving,
    /// The host has reported loss recovery; measurement is suspended.
    Loss,
}

/// The direction a moving step took, relative to the interval's base rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    RateUp,
    RateDown,
    RateStay,
}

impl Decision {
    /// Classifies a rate change into a [`Decision`].
    #[inline]
    pub fn of(new_rate: u64, old_rate: u64) -> Self {
        match new_rate.cmp(&old_rate) {
            core::cmp::Ordering::Greater => Decision::RateUp,
            core::cmp::Ordering::Less => Decision::RateDown,
            core::cmp::Ordering::Equal => Decision::RateStay,
        }
    }
}

/// The outcome of a 4-interval probing round (§4.5).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbingOutcome {
    /// Both paired comparisons preferred the same direction; `winning_rate`
    /// is the rate to move to.
    Agreement { winning_rate: u64, utility: Utility },
    /// The two paired comparisons disagreed; stay at the current rate and
    /// probe again.
    Disagreement,
}

/// Evaluates a finished probing round.
///
/// `rates` and `utilities` are the four intervals' `target_rate` and
/// computed utility, in slot order. Slots `0`/`1` are the first paired
/// comparison, slots `2`/`3` are the second.
pub fn evaluate_probing(rates: [u64; 4], utilities: [Utility; 4]) -> ProbingOutcome {
    let a = utilities[0] > utilities[1];
    let b = utilities[2] > utilities[3];

    // The pair of pairs "agrees" iff the pair that preferred the higher rate
    // is the same in both comparisons.
    let agrees = (a == b) == (rates[0] == rates[2]);

    if agrees {
        let (winning_rate, utility) = if b {
            (rates[2], utilities[2])
        } else {
            (rates[3], utilities[3])
        };
        ProbingOutcome::Agreement {
            winning_rate,
            utility,
        }
    } else {
        ProbingOutcome::Disagreement
    }
}

/// Step-size adaptation (§4.6): amplifier, swing buffer, and change bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GradientState {
    pub amplifier: i64,
    pub swing_buffer: i64,
    pub change_bound: i64,
}

/// Initial/reset value of `amplifier`.
pub const AMP_MIN: i64 = 2;
/// Initial/reset value of `change_bound`, in thousandths (10%).
pub const MIN_CHANGE_BOUND: i64 = 100;
/// Amount `change_bound` grows by each time a step is clamped.
const CHANGE_BOUND_INCREMENT: i64 = 70;
/// Maximum value `swing_buffer` saturates at.
const MAX_SWING_BUFFER: i64 = 2;
/// Scale multiplier applied to `grad` before dividing by `SCALE`.
const STEP_SIZE: i64 = 25;
/// The relative rate-change threshold (in thousandths) below which a
/// gradient sample is considered too noisy to trust (2%).
pub const GRADIENT_NOISE_PERMILLE: i64 = 20;

impl Default for GradientState {
    fn default() -> Self {
        Self {
            amplifier: AMP_MIN,
            swing_buffer: 0,
            change_bound: MIN_CHANGE_BOUND,
        }
    }
}

impl GradientState {
    /// Computes the gradient between two consecutive moving-mode
    /// measurements.
    ///
    /// Returns `0` (too noisy) unless the rate moved by at least
    /// [`GRADIENT_NOISE_PERMILLE`] relative to `rate_prev`.
    pub fn gradient(
        utility_new: Utility,
        utility_prev: Utility,
        rate_new: u64,
        rate_prev: u64,
    ) -> Utility {
        if rate_prev == 0 {
            return 0;
        }
        let rate_diff = rate_new as i64 - rate_prev as i64;
        if rate_diff.unsigned_abs() * SCALE_U64 / rate_prev < GRADIENT_NOISE_PERMILLE as u64 {
            return 0;
        }

        SCALE * SCALE * (utility_new - utility_prev) / rate_diff
    }

    /// Computes the bounded, adapted, noise-floored step for this round, and
    /// updates the amplifier/swing-buffer/change-bound state per §4.6.
    ///
    /// `rate` is the base rate the gradient was computed at; `last_rate` is
    /// the previous base rate, used to determine whether this step continues
    /// or reverses the prior direction of movement.
    pub fn step(&mut self, grad: Utility, rate: u64, last_rate: u64) -> i64 {
        let mut step = grad * STEP_SIZE * self.amplifier / SCALE;

        let bound = (self.change_bound * rate as i64 / SCALE).abs();
        let bound_hit = step.unsigned_abs() as i64 > bound;
        if bound_hit {
            step = step.clamp(-bound, bound);
        }

        let move_direction = (rate as i64 - last_rate as i64).signum();
        let same_direction = move_direction == 0 || step.signum() == 0 || step.signum() == move_direction;

        if same_direction {
            if self.swing_buffer > 0 {
                self.swing_buffer -= 1;
            } else {
                self.amplifier += 1;
            }
        } else {
            self.swing_buffer = (self.swing_buffer + 1).min(MAX_SWING_BUFFER);
            self.amplifier = AMP_MIN;
            self.change_bound = MIN_CHANGE_BOUND;
        }

        if bound_hit {
            self.change_bound += CHANGE_BOUND_INCREMENT;
        }

        let min_step = 11 * rate as i64 * GRADIENT_NOISE_PERMILLE / (10 * SCALE);
        if step.unsigned_abs() < min_step.unsigned_abs() {
            let sign = match step.signum() {
                0 => {
                    if move_direction != 0 {
                        move_direction
                    } else {
                        1
                    }
                }
                s => s,
            };
            step = sign * min_step;
        }

        step
    }
}

const SCALE_U64: u64 = crate::pcc::utility::SCALE as u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_of_classifies_direction() {
        assert_eq!(Decision::of(110, 100), Decision::RateUp);
        assert_eq!(Decision::of(90, 100), Decision::RateDown);
        assert_eq!(Decision::of(100, 100), Decision::RateStay);
    }

    #[test]
    fn probing_agreement_picks_second_pair_winner() {
        // Both pairs prefer the "up" slot (0 and 2); agreement.
        let rates = [1_050_000, 950_000, 1_050_000, 950_000];
        let utilities = [10, 5, 20, 8];
        match evaluate_probing(rates, utilities) {
            ProbingOutcome::Agreement { winning_rate, utility } => {
                assert_eq!(winning_rate, 1_050_000);
                assert_eq!(utility, 20);
            }
            ProbingOutcome::Disagreement => panic!("expected agreement"),
        }
    }

    #[test]
    fn probing_disagreement_when_pairs_differ() {
        // First pair prefers "up", second pair prefers "down": disagreement.
        let rates = [1_050_000, 950_000, 1_050_000, 950_000];
        let utilities = [10, 5, 8, 20];
        assert_eq!(evaluate_probing(rates, utilities), ProbingOutcome::Disagreement);
    }

    #[test]
    fn gradient_is_zero_below_noise_floor() {
        // rate changed by less than 2%.
        assert_eq!(GradientState::gradient(100, 0, 1_005_000, 1_000_000), 0);
    }

    #[test]
    fn gradient_nonzero_above_noise_floor() {
        assert_ne!(GradientState::gradient(100, 0, 1_100_000, 1_000_000), 0);
    }

    #[test]
    fn step_resets_amplifier_on_direction_change() {
        let mut state = GradientState::default();
        // moving up last time (rate > last_rate), gradient now says go down.
        let step = state.step(-1_000_000, 1_100_000, 1_000_000);
        assert!(step < 0);
        assert_eq!(state.amplifier, AMP_MIN);
        assert_eq!(state.change_bound, MIN_CHANGE_BOUND);
        assert_eq!(state.swing_buffer, 1);
    }

    #[test]
    fn step_grows_amplifier_on_same_direction() {
        let mut state = GradientState::default();
        state.step(1_000_000, 1_100_000, 1_000_000);
        let amp_after_first = state.amplifier;
        state.step(1_000_000, 1_200_000, 1_100_000);
        assert!(state.amplifier >= amp_after_first);
    }

    #[test]
    fn step_enforces_minimum_magnitude() {
        let mut state = GradientState::default();
        let step = state.step(0, 1_000_000, 1_000_000);
        let min_step = 11 * 1_000_000 * GRADIENT_NOISE_PERMILLE / (10 * SCALE);
        assert!(step.unsigned_abs() as i64 >= min_step);
    }
}
