// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! A rate-based congestion control core.
//!
//! [`Controller`] is a pure state machine: the host drives it with
//! [`Sample`]s and [`sample::HostState`] transitions, and the controller
//! drives the host back through [`pacer::Pacer`]. See the module-level docs
//! on `controller` for the decision loop itself.

pub mod config;
pub mod controller;
pub mod decider;
pub mod error;
pub mod interval;
pub mod loss_gate;
pub mod pacer;
pub mod sample;
pub mod utility;

pub use config::Config;
pub use controller::Controller;
pub use error::Error;
pub use pacer::Pacer;
pub use sample::{HostState, Sample};
