// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::pcc::{
    interval::DEFAULT_PROBING_EPSILON_PERMILLE,
    utility::{UtilityKind, SCALE},
    Error,
};

/// The initial pacing rate a new `Controller` starts at: 512 KiB/s.
pub const DEFAULT_INITIAL_RATE: u64 = 512 * 1024;

/// The minimum pacing rate a `Controller` will ever request (§8, invariant 1).
pub const MIN_RATE: u64 = 1024;

/// Construction-time configuration for a [`Controller`](crate::pcc::Controller).
///
/// Every field here is fixed for the lifetime of the controller: §1 / §6
/// explicitly rule out selecting the utility function (or any other option)
/// at runtime through a configuration channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "generator", derive(bolero_generator::TypeGenerator))]
pub struct Config {
    /// Which utility function to use: `Allegro` (loss-only) or `Vivace`
    /// (loss + latency).
    pub utility: UtilityKind,
    /// On a gradient direction reversal in `Moving` mode, whether to
    /// re-enter `Probing` (`true`, the typical choice) or stay in `Moving`
    /// with a freshly laid out interval (`false`).
    pub use_probing_after_moving: bool,
    /// The probing perturbation, in thousandths of the base rate (design
    /// default `50`, i.e. ±5%).
    pub probing_epsilon_permille: u32,
    /// The pacing rate a new controller starts at (design default 512 KiB/s).
    pub initial_rate: u64,
    /// The minimum pacing rate the controller will ever request.
    pub min_rate: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            utility: UtilityKind::Vivace,
            use_probing_after_moving: true,
            probing_epsilon_permille: DEFAULT_PROBING_EPSILON_PERMILLE,
            initial_rate: DEFAULT_INITIAL_RATE,
            min_rate: MIN_RATE,
        }
    }
}

impl Config {
    /// Constructs a `Config` using the Allegro (loss-only) utility function
    /// and otherwise-default parameters.
    pub fn allegro() -> Self {
        Self {
            utility: UtilityKind::Allegro,
            ..Default::default()
        }
    }

    /// Constructs a `Config` using the Vivace (loss + latency) utility
    /// function and otherwise-default parameters.
    pub fn vivace() -> Self {
        Self {
            utility: UtilityKind::Vivace,
            ..Default::default()
        }
    }

    /// Validates this configuration, returning [`Error::InvalidConfig`] if
    /// it is not usable.
    pub fn validate(&self) -> Result<(), Error> {
        if self.probing_epsilon_permille == 0 || i64::from(self.probing_epsilon_permille) >= SCALE {
            return Err(Error::InvalidConfig {
                reason: "probing_epsilon_permille must be in 1..1000",
            });
        }
        if self.min_rate == 0 {
            return Err(Error::InvalidConfig {
                reason: "min_rate must be nonzero",
            });
        }
        if self.min_rate > self.initial_rate {
            return Err(Error::InvalidConfig {
                reason: "min_rate must not exceed initial_rate",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_epsilon_is_invalid() {
        let config = Config {
            probing_epsilon_permille: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn min_rate_above_initial_rate_is_invalid() {
        let config = Config {
            min_rate: 2_000_000,
            initial_rate: 1_000_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
