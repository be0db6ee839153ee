// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    event::NoopPublisher,
    pcc::{
        config::Config,
        controller::Controller,
        interval::INTERVALS,
        pacer::testing::RecordingPacer,
        sample::{HostState, Sample},
    },
    random::testing::Generator as TestGenerator,
    time::Timestamp,
};
use bolero::{check, generator::*};

#[derive(Debug, TypeGenerator)]
enum Operation {
    /// Advance the clock and deliver one ack-equivalent sample.
    Sample {
        #[generator(1..=2000)]
        elapsed_ms: u16,
        #[generator(0..=4000)]
        delivered_delta: u16,
        #[generator(0..=500)]
        lost_delta: u16,
        #[generator(1..=2000)]
        srtt_ms: u16,
    },
    /// Flip the host's loss-recovery state.
    EnterLossRecovery,
    ExitLossRecovery,
}

struct Model {
    controller: Controller,
    pacer: RecordingPacer,
    publisher: NoopPublisher,
    rng: TestGenerator,
    now_us: u64,
    data_segs_out: u32,
    delivered: u32,
    lost: u32,
    in_loss_recovery: bool,
}

impl Model {
    fn new(config: Config, seed: u8) -> Self {
        let mut rng = TestGenerator {
            seed,
            ..TestGenerator::default()
        };
        let controller = Controller::new(config, &mut rng).expect("generated config is always valid");
        Self {
            controller,
            pacer: RecordingPacer::default(),
            publisher: NoopPublisher,
            rng,
            now_us: 1,
            data_segs_out: 0,
            delivered: 0,
            lost: 0,
            in_loss_recovery: false,
        }
    }

    fn sample(&self, srtt_us: u32) -> Sample {
        Sample {
            now: Timestamp::from_micros(self.now_us),
            srtt_us,
            mss: 1460,
            data_segs_out: self.data_segs_out,
            delivered: self.delivered,
            lost: self.lost,
            in_flight: 10,
            max_pacing_rate: 1_000_000_000,
            snd_cwnd_clamp: 100_000,
        }
    }

    fn apply(&mut self, operation: &Operation) {
        match *operation {
            Operation::Sample {
                elapsed_ms,
                delivered_delta,
                lost_delta,
                srtt_ms,
            } => {
                self.now_us += u64::from(elapsed_ms.max(1)) * 1_000;
                self.delivered = self.delivered.wrapping_add(u32::from(delivered_delta));
                self.lost = self.lost.wrapping_add(u32::from(lost_delta));
                self.data_segs_out = self
                    .data_segs_out
                    .wrapping_add(u32::from(delivered_delta) + u32::from(lost_delta));

                let sample = self.sample(u32::from(srtt_ms) * 1_000);
                self.controller
                    .on_sample(&sample, &mut self.rng, &mut self.pacer, &mut self.publisher);
            }
            Operation::EnterLossRecovery => {
                if !self.in_loss_recovery {
                    self.in_loss_recovery = true;
                    let sample = self.sample(10_000);
                    self.controller.on_state_change(
                        HostState::LossRecovery,
                        &sample,
                        &mut self.rng,
                        &mut self.pacer,
                        &mut self.publisher,
                    );
                }
            }
            Operation::ExitLossRecovery => {
                if self.in_loss_recovery {
                    self.in_loss_recovery = false;
                    let sample = self.sample(10_000);
                    self.controller.on_state_change(
                        HostState::Other,
                        &sample,
                        &mut self.rng,
                        &mut self.pacer,
                        &mut self.publisher,
                    );
                }
            }
        }
    }

    fn invariants(&self) {
        let min_rate = self.controller.config().min_rate;

        // Invariant 1 (§8): the programmed rate never drops below min_rate.
        assert!(self.controller.rate() >= min_rate);
        if self.pacer.pacing_rate_updates > 0 {
            assert!(self.pacer.pacing_rate >= min_rate);
        }

        // Invariant 4 (§8): cwnd is always at least 4 packets and never
        // above the host's ceiling.
        if self.pacer.cwnd_updates > 0 {
            assert!(self.pacer.cwnd >= 4);
            assert!(self.pacer.cwnd <= 100_000);
        }

        // The ring cursors never run past their fixed storage.
        assert!(self.controller.send_index() < INTERVALS);
        assert!(self.controller.recv_index() < INTERVALS);
    }
}

#[cfg_attr(miri, ignore)]
#[test]
fn controller_fuzz_allegro() {
    check!()
        .with_generator((gen::<u8>(), gen::<Vec<Operation>>()))
        .for_each(|(seed, operations)| {
            let mut model = Model::new(Config::allegro(), *seed);
            for operation in operations.iter() {
                model.apply(operation);
                model.invariants();
            }
        });
}

#[cfg_attr(miri, ignore)]
#[test]
fn controller_fuzz_vivace() {
    check!()
        .with_generator((gen::<u8>(), gen::<Vec<Operation>>()))
        .for_each(|(seed, operations)| {
            let mut model = Model::new(Config::vivace(), *seed);
            for operation in operations.iter() {
                model.apply(operation);
                model.invariants();
            }
        });
}
