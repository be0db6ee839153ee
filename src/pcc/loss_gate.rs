// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Suspension of measurement while the host reports loss recovery, and the
//! counter reconciliation performed on resume (§4.8).

/// Computes the updated `spare` reconciliation offset on exit from loss
/// recovery.
///
/// The host's `delivered`/`lost`/`in_flight` counters may have moved in ways
/// not attributable to packets sent under our own pacing schedule while
/// recovery was in progress (e.g. retransmissions the host accounts for
/// separately). `spare` absorbs that drift so that `packets_counted =
/// delivered + lost - spare` stays meaningful once measurement resumes.
#[inline]
pub fn reconcile_spare_on_recovery_exit(
    delivered: u32,
    lost: u32,
    in_flight: u32,
    data_segs_out: u32,
    spare: i64,
) -> i64 {
    let spare_delta = i64::from(delivered) + i64::from(lost) + i64::from(in_flight)
        - i64::from(data_segs_out)
        - spare;
    spare + spare_delta
}
