// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The decision loop that ties the other `pcc` modules together.
//!
//! `Controller` owns the four-slot [`IntervalRing`], the mode the core is
//! currently operating in, and the small pieces of cross-round state
//! (`rate`, `last_rate`, `prev_utility`, [`GradientState`]) that the original
//! kernel module keeps directly on its per-socket struct. [`Controller::new`]
//! validates its [`Config`] up front and never produces a half-built value
//! (§7): every other method is infallible.
//!
//! The host drives the loop two ways: [`Controller::on_sample`] on every ack
//! (or ack-equivalent) event, and [`Controller::on_state_change`] whenever
//! its own loss-recovery state flips. Both take the `Pacer`/`Publisher` the
//! call should use as generic parameters, the same way
//! `congestion_controller::CongestionController` takes its `Publisher`,
//! rather than storing them on `self`.

use crate::{
    counter::Counter,
    event::Publisher,
    pcc::{
        config::Config,
        decider::{evaluate_probing, Decision, GradientState, Mode, ProbingOutcome},
        error::Error,
        interval::{IntervalRing, INTERVALS},
        loss_gate,
        pacer::Pacer,
        sample::{HostState, Sample},
        utility::{self, Utility, UTILITY_UNDEFINED},
    },
    random,
};

/// The smallest number of newly-sent packets that ends a send interval.
const MIN_SEND_PACKETS: u32 = 50;

/// Packets attributed to the host's own bookkeeping slack (retransmits,
/// reordering) that are ignored when deciding whether an interval's data has
/// arrived yet.
const IGNORE_PACKETS: i64 = 10;

/// A conservative budget for the inline size of a `Controller`: four
/// [`crate::pcc::interval::MonitorInterval`]s plus a handful of scalar
/// fields, meant to fit comfortably inside a host's per-connection private
/// data without a separate heap allocation.
const SIZE_BUDGET_BYTES: usize = 1024;

const _: () = assert!(
    core::mem::size_of::<Controller>() <= SIZE_BUDGET_BYTES,
    "Controller grew past its inline size budget"
);

/// A rate-based congestion controller implementing the PCC decision loop
/// (monitor intervals, probing, gradient-ascent moving, slow start).
///
/// There is no explicit `release`: dropping the value is the release, since
/// `Controller` owns no resources beyond its own inline storage.
#[derive(Clone, Copy, Debug)]
pub struct Controller {
    id: u64,
    config: Config,
    mode: Mode,
    /// The rate the core currently wants the host to pace at, in bytes/s.
    rate: u64,
    /// The base rate the current `rate` was derived from.
    last_rate: u64,
    /// The most recent rate actually programmed into the pacer, after the
    /// host's `min_rate`/`max_pacing_rate` clamp.
    paced_rate: u64,
    /// The last fully-computed utility value, used as the comparison
    /// baseline for the next round. Starts at [`UTILITY_UNDEFINED`].
    prev_utility: Utility,
    last_decision: Decision,
    gradient: GradientState,
    ring: IntervalRing,
    /// Set once a send interval has overflowed the ring (in `Probing`) or
    /// after every `SlowStart`/`Moving` round, so the next interval does not
    /// start until the decider lays out a fresh one.
    wait: bool,
    /// Whether the first interval has been started yet. The source starts
    /// its first interval synchronously at init time; we defer that to the
    /// first `on_sample`, since construction has no `Sample` to start one
    /// from.
    started: bool,
    lost_base: u32,
    delivered_base: u32,
    /// Reconciliation offset absorbing counter drift across loss recovery
    /// (§4.8). `packets_counted = delivered + lost - spare`.
    spare: i64,
    packets_counted: i64,
    decisions_count: u64,
}

impl Controller {
    /// Constructs a new controller in `SlowStart`, with a probing round
    /// pre-laid-out so it is ready the moment the core leaves slow start.
    ///
    /// Returns [`Error::InvalidConfig`] if `config` is not usable. There is
    /// no other failure mode: the returned value is always fully valid.
    pub fn new(config: Config, rng: &mut dyn random::Generator) -> Result<Self, Error> {
        config.validate()?;

        static NEXT_ID: core::sync::atomic::AtomicU64 = core::sync::atomic::AtomicU64::new(1);
        let id = NEXT_ID.fetch_add(1, core::sync::atomic::Ordering::Relaxed);

        let mut ring = IntervalRing::default();
        ring.lay_out_probing(config.initial_rate, config.probing_epsilon_permille, rng);

        Ok(Self {
            id,
            rate: config.initial_rate,
            last_rate: config.initial_rate,
            paced_rate: config.initial_rate,
            mode: Mode::SlowStart,
            last_decision: Decision::RateStay,
            prev_utility: UTILITY_UNDEFINED,
            gradient: GradientState::default(),
            ring,
            wait: false,
            started: false,
            lost_base: 0,
            delivered_base: 0,
            spare: 0,
            packets_counted: 0,
            decisions_count: 0,
            config,
        })
    }

    /// A process-wide identifier, stable for the lifetime of the value,
    /// useful for correlating `Publisher` events across connections.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The rate the core currently wants the host to pace at, in bytes/s.
    #[inline]
    pub fn rate(&self) -> u64 {
        self.rate
    }

    /// The rate actually last programmed into the pacer, after clamping.
    #[inline]
    pub fn paced_rate(&self) -> u64 {
        self.paced_rate
    }

    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The configuration this controller was constructed with.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn send_index(&self) -> usize {
        self.ring.send_index()
    }

    #[inline]
    pub fn recv_index(&self) -> usize {
        self.ring.recv_index()
    }

    #[inline]
    pub fn spare(&self) -> i64 {
        self.spare
    }

    /// Feeds one host measurement through the decision loop.
    ///
    /// Phase order (§4.2): refresh the congestion window, then, unless the
    /// host is in loss recovery, progress the send cursor and fold the
    /// sample into the receive interval, possibly triggering a decision.
    /// Finally roll the counter baselines forward for the next sample.
    pub fn on_sample<P: Pacer, Pub: Publisher>(
        &mut self,
        sample: &Sample,
        rng: &mut dyn random::Generator,
        pacer: &mut P,
        publisher: &mut Pub,
    ) {
        if !self.started {
            self.started = true;
            self.start_interval(sample, pacer, publisher);
        }

        let cwnd = compute_cwnd(
            self.paced_rate,
            sample.srtt_us_or_default(),
            sample.mss,
            sample.snd_cwnd_clamp,
        );
        pacer.set_cwnd(cwnd);

        if self.mode != Mode::Loss {
            if !self.wait {
                self.progress_send(sample, pacer, publisher);
            }
            self.fold_and_decide(sample, rng, pacer, publisher);
        }

        self.lost_base = sample.lost;
        self.delivered_base = sample.delivered;
    }

    /// Reacts to the host's loss-recovery state flipping (§4.8).
    ///
    /// Entering suspends measurement at the current rate; exiting reconciles
    /// `spare` against the counter drift accumulated during recovery and
    /// returns to `Probing` with a freshly laid out round.
    pub fn on_state_change<P: Pacer, Pub: Publisher>(
        &mut self,
        new_state: HostState,
        sample: &Sample,
        rng: &mut dyn random::Generator,
        pacer: &mut P,
        publisher: &mut Pub,
    ) {
        match (self.mode, new_state) {
            (Mode::Loss, HostState::Other) => {
                self.spare = loss_gate::reconcile_spare_on_recovery_exit(
                    sample.delivered,
                    sample.lost,
                    sample.in_flight,
                    sample.data_segs_out,
                    self.spare,
                );
                publisher.on_loss_recovery(false);
                publisher.on_mode_changed(Mode::Loss, Mode::Probing);
                self.mode = Mode::Probing;
                self.enter_probing(rng);
                self.start_interval(sample, pacer, publisher);
            }
            (mode, HostState::LossRecovery) if mode != Mode::Loss => {
                publisher.on_loss_recovery(true);
                publisher.on_mode_changed(mode, Mode::Loss);
                self.mode = Mode::Loss;
                self.wait = true;
                self.start_interval(sample, pacer, publisher);
            }
            _ => {}
        }
    }

    /// Phase 3: if enough new packets have been sent to close out the
    /// current send interval, stamp it and start the next one.
    fn progress_send<P: Pacer, Pub: Publisher>(&mut self, sample: &Sample, pacer: &mut P, publisher: &mut Pub) {
        let idx = self.ring.send_index();
        let packets_sent_base = self.ring.get(idx).packets_sent_base;
        let packets_sent = Counter::<u32>::wrapping_delta(sample.data_segs_out, packets_sent_base);

        if packets_sent >= MIN_SEND_PACKETS && self.packets_counted > i64::from(packets_sent_base) {
            {
                let interval = self.ring.get_mut(idx);
                interval.packets_ended = Counter::from(sample.data_segs_out);
                interval.send_end_ts = sample.now;
            }

            let overflowed = self.ring.advance_send();
            if overflowed || matches!(self.mode, Mode::SlowStart | Mode::Moving) {
                self.wait = true;
            }
            self.start_interval(sample, pacer, publisher);
        }
    }

    /// Phase 4/5: folds the sample into the receive interval and, once it
    /// has enough data to be considered finished, dispatches to the
    /// mode-appropriate decider.
    fn fold_and_decide<P: Pacer, Pub: Publisher>(
        &mut self,
        sample: &Sample,
        rng: &mut dyn random::Generator,
        pacer: &mut P,
        publisher: &mut Pub,
    ) {
        let before = self.packets_counted;
        self.packets_counted = i64::from(sample.delivered) + i64::from(sample.lost) - self.spare;

        let recv_idx = self.ring.recv_index();
        if self.ring.get(recv_idx).packets_sent_base == 0 {
            return;
        }

        let sent_base = i64::from(self.ring.get(recv_idx).packets_sent_base);
        if before > sent_base + IGNORE_PACKETS {
            self.fold_sample(sample, publisher, recv_idx);
        }

        let ended = {
            let interval = self.ring.get(recv_idx);
            interval.has_ended_sending()
                && i64::from(*interval.packets_ended) - IGNORE_PACKETS < self.packets_counted
        };
        if !ended {
            return;
        }

        let was_last_probing_slot = recv_idx == INTERVALS - 1;
        self.ring.advance_recv();

        match self.mode {
            Mode::SlowStart => self.decide_slow_start(sample, rng, pacer, publisher),
            Mode::Moving => self.decide_moving(sample, rng, pacer, publisher),
            Mode::Probing if was_last_probing_slot => self.decide_probing(sample, rng, pacer, publisher),
            _ => {}
        }
    }

    /// Accumulates one sample's delivered/lost delta and timing into the
    /// receive interval at `recv_idx`.
    fn fold_sample<Pub: Publisher>(&mut self, sample: &Sample, publisher: &mut Pub, recv_idx: usize) {
        let first_fold = !self.ring.get(recv_idx).has_folded_a_sample();
        let interval = self.ring.get_mut(recv_idx);

        interval.lost += Counter::<u32>::wrapping_delta(sample.lost, self.lost_base);
        interval.delivered += Counter::<u32>::wrapping_delta(sample.delivered, self.delivered_base);
        interval.recv_end_ts = sample.now;
        interval.end_rtt = sample.srtt_us_or_default();
        if first_fold {
            interval.recv_start_ts = sample.now;
            interval.start_rtt = sample.srtt_us_or_default();
        }

        let throughput = utility::throughput(interval, u64::from(sample.mss));
        publisher.on_delivery_rate_sampled(None, throughput);
    }

    /// Evaluates a finished probing round: on agreement, switches to
    /// `Moving` at the winning rate; on disagreement, stays put and probes
    /// again.
    fn decide_probing<P: Pacer, Pub: Publisher>(
        &mut self,
        sample: &Sample,
        rng: &mut dyn random::Generator,
        pacer: &mut P,
        publisher: &mut Pub,
    ) {
        let mss = u64::from(sample.mss);
        let mut rates = [0u64; INTERVALS];
        let mut utilities = [0 as Utility; INTERVALS];

        for i in 0..INTERVALS {
            let target_rate = self.ring.get(i).target_rate;
            let interval = self.ring.get_mut(i);
            let utility = self.config.utility.compute(interval, target_rate, mss, false);
            interval.set_utility(utility);

            let throughput = utility::throughput(interval, mss);
            publisher.on_delivery_rate_sampled(Some(utility), throughput);

            rates[i] = target_rate;
            utilities[i] = utility;
        }

        self.decisions_count += 1;

        match evaluate_probing(rates, utilities) {
            ProbingOutcome::Agreement { winning_rate, utility } => {
                let decision = Decision::of(winning_rate, self.rate);
                self.last_rate = winning_rate;
                self.rate = winning_rate;
                self.prev_utility = utility;
                self.last_decision = decision;

                publisher.on_mode_changed(self.mode, Mode::Moving);
                self.mode = Mode::Moving;
                self.enter_moving();
                publisher.on_decision(decision, winning_rate);
            }
            ProbingOutcome::Disagreement => {
                self.enter_probing(rng);
            }
        }

        self.start_interval(sample, pacer, publisher);
    }

    /// Takes one gradient-ascent step from the single finished moving
    /// interval, and either stays in `Moving` or, on a direction reversal,
    /// falls back to `Probing` (depending on [`Config::use_probing_after_moving`]).
    fn decide_moving<P: Pacer, Pub: Publisher>(
        &mut self,
        sample: &Sample,
        rng: &mut dyn random::Generator,
        pacer: &mut P,
        publisher: &mut Pub,
    ) {
        let mss = u64::from(sample.mss);
        let target_rate = self.ring.get(0).target_rate;
        let interval = self.ring.get_mut(0);
        let utility_new = self.config.utility.compute(interval, target_rate, mss, false);
        interval.set_utility(utility_new);

        let throughput = utility::throughput(interval, mss);
        publisher.on_delivery_rate_sampled(Some(utility_new), throughput);

        let rate_before = self.rate;
        let last_rate_before = self.last_rate;

        let grad = GradientState::gradient(utility_new, self.prev_utility, rate_before, last_rate_before);
        let step = self.gradient.step(grad, rate_before, last_rate_before);

        let srtt = i64::from(sample.srtt_us_or_default());
        let mss_i = i64::from(sample.mss);
        let packet_floor = if srtt > 0 { 2_000_000 * mss_i / srtt } else { 0 };

        let raw_new_rate = rate_before as i64 + step;
        let decision = Decision::of(raw_new_rate.max(0) as u64, rate_before);
        let new_rate = raw_new_rate.max(packet_floor).max(0) as u64;

        self.last_rate = rate_before;
        self.rate = new_rate;
        self.prev_utility = utility_new;

        if decision != self.last_decision && self.config.use_probing_after_moving {
            self.last_decision = decision;
            publisher.on_mode_changed(self.mode, Mode::Probing);
            self.mode = Mode::Probing;
            self.enter_probing(rng);
        } else {
            self.last_decision = decision;
            self.enter_moving();
        }

        publisher.on_decision(decision, new_rate);
        self.start_interval(sample, pacer, publisher);
    }

    /// Grows the rate by 50% while utility keeps improving; otherwise
    /// reverts to the last rate that did improve and hands off to probing.
    fn decide_slow_start<P: Pacer, Pub: Publisher>(
        &mut self,
        sample: &Sample,
        rng: &mut dyn random::Generator,
        pacer: &mut P,
        publisher: &mut Pub,
    ) {
        let mss = u64::from(sample.mss);
        let target_rate = self.ring.get(0).target_rate;
        let interval = self.ring.get_mut(0);
        let utility = self.config.utility.compute(interval, target_rate, mss, true);
        interval.set_utility(utility);

        let throughput = utility::throughput(interval, mss);
        publisher.on_delivery_rate_sampled(Some(utility), throughput);

        if utility > self.prev_utility {
            self.last_rate = self.rate;
            self.rate += self.rate / 2;
            self.prev_utility = utility;
            self.ring.lay_out_moving(self.rate);
            self.wait = false;
        } else {
            core::mem::swap(&mut self.rate, &mut self.last_rate);
            publisher.on_slow_start_exited(self.rate);
            publisher.on_mode_changed(Mode::SlowStart, Mode::Probing);
            self.mode = Mode::Probing;
            self.enter_probing(rng);
        }

        self.start_interval(sample, pacer, publisher);
    }

    /// Lays out a fresh probing round at the current `rate` and clears
    /// `wait` so sending can resume immediately.
    fn enter_probing(&mut self, rng: &mut dyn random::Generator) {
        self.ring
            .lay_out_probing(self.rate, self.config.probing_epsilon_permille, rng);
        self.wait = false;
    }

    /// Lays out the next single moving interval at the current `rate` and
    /// clears `wait`.
    fn enter_moving(&mut self) {
        self.ring.lay_out_moving(self.rate);
        self.wait = false;
    }

    /// Phase 1: (re)programs the pacer if the send cursor is ready for a
    /// new interval, then reprograms the congestion window to match.
    fn start_interval<P: Pacer, Pub: Publisher>(&mut self, sample: &Sample, pacer: &mut P, publisher: &mut Pub) {
        let mut rate = self.rate;

        if !self.wait {
            let idx = self.ring.send_index();
            let target_rate = self.ring.get(idx).target_rate;
            let interval = self.ring.get_mut(idx);
            interval.packets_ended = Counter::new(0);
            interval.lost = Counter::new(0);
            interval.delivered = Counter::new(0);
            interval.packets_sent_base = sample.data_segs_out.max(1);
            interval.send_start_ts = sample.now;
            rate = target_rate;
        }

        let paced = clamp_rate(rate, self.config.min_rate, sample.max_pacing_rate);
        pacer.set_pacing_rate(paced);
        self.paced_rate = paced;
        publisher.on_pacing_rate_updated(paced);

        let cwnd = compute_cwnd(paced, sample.srtt_us_or_default(), sample.mss, sample.snd_cwnd_clamp);
        pacer.set_cwnd(cwnd);
    }
}

/// Clamps a candidate pacing rate to the configured minimum and the host's
/// ceiling. A `max_pacing_rate` of `0` means the host places no ceiling.
#[inline]
fn clamp_rate(rate: u64, min_rate: u64, max_pacing_rate: u64) -> u64 {
    let rate = rate.max(min_rate);
    if max_pacing_rate == 0 {
        rate
    } else {
        rate.min(max_pacing_rate)
    }
}

/// `cwnd = 2 * rate * srtt / mss`, floored at 4 packets and capped at the
/// host's `snd_cwnd_clamp` (in that order, matching the source).
#[inline]
fn compute_cwnd(rate: u64, srtt_us: u32, mss: u32, clamp: u32) -> u32 {
    let mss = u128::from(mss.max(1));
    let cwnd = 2u128
        .saturating_mul(u128::from(rate))
        .saturating_mul(u128::from(srtt_us))
        / mss
        / 1_000_000;
    let cwnd = cwnd.min(u128::from(u32::MAX)) as u32;
    core::cmp::min(core::cmp::max(4, cwnd), clamp)
}


#[cfg(test)]
mod fuzz_target;
