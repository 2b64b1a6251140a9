//! Fix acquisition policy
//!
//! Decides, from time spent acquiring and the satellites in the latest fix,
//! whether to keep waiting, upload, or give up on this cycle.

use crate::config::timing::{ACQUISITION_TIMEOUT_MS, GOOD_FIX_SATELLITES};

/// Outcome of one policy evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    KeepWaiting,
    ProceedToUpload,
    /// Timed out without any fix
    AbandonToSleep,
}

/// Timeout and quality thresholds for acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionPolicy {
    timeout_ms: u64,
    good_fix_satellites: u8,
}

impl AcquisitionPolicy {
    pub const fn new(timeout_ms: u64, good_fix_satellites: u8) -> Self {
        Self {
            timeout_ms,
            good_fix_satellites,
        }
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    pub fn good_fix_satellites(&self) -> u8 {
        self.good_fix_satellites
    }

    /// Decide what to do after `elapsed_ms` with `satellites` in the latest fix
    pub fn decide(&self, elapsed_ms: u64, satellites: u8) -> Decision {
        if elapsed_ms >= self.timeout_ms {
            // Any fix beats none once time is up
            if satellites != 0 {
                Decision::ProceedToUpload
            } else {
                Decision::AbandonToSleep
            }
        } else if satellites >= self.good_fix_satellites {
            Decision::ProceedToUpload
        } else {
            Decision::KeepWaiting
        }
    }
}

impl Default for AcquisitionPolicy {
    fn default() -> Self {
        Self::new(ACQUISITION_TIMEOUT_MS, GOOD_FIX_SATELLITES)
    }
}
