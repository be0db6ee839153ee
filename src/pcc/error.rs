// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use core::fmt;

/// The only failure modes a [`Controller`](crate::pcc::Controller) can
/// encounter.
///
/// Per §7, there is no "zombie" controller state to poll: a `Controller`
/// value is never observable unless it is fully valid, so every other
/// callback (`on_sample`, `on_state_change`) is infallible once construction
/// succeeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The supplied [`Config`](crate::pcc::Config) failed validation before
    /// any allocation was attempted.
    InvalidConfig { reason: &'static str },
    /// Allocating the controller's state failed.
    AllocationFailed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfig { reason } => write!(f, "invalid PCC controller config: {reason}"),
            Error::AllocationFailed => write!(f, "failed to allocate PCC controller state"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_human_readable() {
        assert_eq!(
            Error::InvalidConfig { reason: "bad" }.to_string(),
            "invalid PCC controller config: bad"
        );
        assert_eq!(
            Error::AllocationFailed.to_string(),
            "failed to allocate PCC controller state"
        );
    }
}
