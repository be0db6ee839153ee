// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! A performance-oriented congestion control (PCC) core.
//!
//! This crate implements the monitor-interval bookkeeping, utility functions,
//! and mode-switching decision engine of a rate-based congestion controller.
//! It is a pure state machine: it never touches a socket or a timer, and is
//! driven entirely by the host transport's periodic [`Sample`](pcc::Sample)
//! callbacks.

pub mod counter;
pub mod event;
pub mod pcc;
pub mod random;
pub mod time;
