// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::time::Timestamp;

/// One host-supplied measurement, delivered on every transport-level ack
/// (or ack-equivalent) event.
///
/// `Sample` is the only way the core learns anything about the network: it
/// never reads a socket, a timer, or any other host state directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "generator", derive(bolero_generator::TypeGenerator))]
pub struct Sample {
    /// The host's monotonic clock, in microseconds.
    pub now: Timestamp,
    /// Smoothed round-trip time, in microseconds. `0` is treated as 1ms.
    pub srtt_us: u32,
    /// Maximum segment size, in bytes.
    pub mss: u32,
    /// Cumulative count of data segments the host has transmitted.
    pub data_segs_out: u32,
    /// Cumulative count of segments the host considers delivered.
    pub delivered: u32,
    /// Cumulative count of segments the host considers lost.
    pub lost: u32,
    /// Current count of segments believed to be in flight.
    pub in_flight: u32,
    /// The host's ceiling on the pacing rate, in bytes/s. `0` means unbounded.
    pub max_pacing_rate: u64,
    /// The host's ceiling on the congestion window, in packets.
    pub snd_cwnd_clamp: u32,
}

impl Sample {
    /// The smoothed RTT, with the host's `0` (uninitialized) reading
    /// substituted by a 1ms floor.
    #[inline]
    pub fn srtt_us_or_default(&self) -> u32 {
        if self.srtt_us == 0 {
            1_000
        } else {
            self.srtt_us
        }
    }
}

/// The host's coarse connection state, as relevant to the congestion
/// controller.
///
/// The host may have many more internal states; the core only distinguishes
/// whether loss recovery is in progress, so every other state collapses to
/// [`HostState::Other`]. This mirrors the source's use of a single numeric
/// constant (`4`) for "loss recovery" compared for equality against an
/// otherwise-opaque host state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "generator", derive(bolero_generator::TypeGenerator))]
pub enum HostState {
    /// The host is in some state other than loss recovery.
    Other,
    /// The host has entered loss recovery.
    LossRecovery,
}

impl HostState {
    /// Constructs a `HostState` from the host's numeric state code, where
    /// `4` denotes loss recovery.
    #[inline]
    pub fn from_code(code: u32) -> Self {
        if code == 4 {
            HostState::LossRecovery
        } else {
            HostState::Other
        }
    }
}
