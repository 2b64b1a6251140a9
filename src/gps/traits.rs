//! GNSS receiver trait for abstraction and testability
//!
//! The tracker only needs to know whether a new fix arrived, read it, and
//! move the receiver in and out of its low-power state.

use crate::frame::TelemetrySample;
use core::future::Future;

/// Errors that can occur while driving the GNSS receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpsError {
    /// UART write failed
    WriteFailed,
}

/// Abstract GNSS receiver interface
///
/// Polling is non-blocking: `poll_available` returns immediately.
pub trait GpsReceiver {
    /// Check whether a new fix has arrived since the last poll
    fn poll_available(&mut self) -> bool;

    /// The most recent fix
    fn current_fix(&self) -> TelemetrySample;

    /// Put the receiver into its low-power backup mode
    fn standby(&mut self) -> impl Future<Output = Result<(), GpsError>>;

    /// Bring the receiver back from backup mode
    fn wake(&mut self) -> impl Future<Output = Result<(), GpsError>>;
}
