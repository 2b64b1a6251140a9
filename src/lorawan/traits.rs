//! LoRaWAN modem trait for abstraction and testability
//!
//! The modem runs the LoRaWAN MAC itself; the firmware only asks it to join,
//! hands it packets and collects downlink bytes. Packets are built the
//! stream way: `begin_packet`, one or more `write`s, then `end_packet`.

use crate::lorawan::credentials::JoinCredentials;
use core::future::Future;

/// Errors that can occur during modem operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemError {
    /// No response within the allowed time
    Timeout,
    /// Network did not accept the join request
    JoinRejected,
    /// Operation needs a joined session
    NotJoined,
    /// Modem rejected or failed the transmission
    TransmitFailed,
    /// Modem answered a configuration or join command with `+ERR`
    CommandRejected,
    /// Packet does not fit the staging buffer
    PayloadTooLarge,
    /// `write`/`end_packet` without `begin_packet`
    NoPacketOpen,
    /// UART communication error
    UartError,
}

/// Abstract LoRaWAN modem interface
pub trait LoraWanModem {
    /// Run the OTAA join exchange
    fn join_otaa(
        &mut self,
        credentials: &JoinCredentials,
    ) -> impl Future<Output = Result<(), ModemError>>;

    /// Open a packet on an application port
    fn begin_packet(&mut self, port: u8) -> Result<(), ModemError>;

    /// Append bytes to the open packet, returning the count accepted
    fn write(&mut self, data: &[u8]) -> Result<usize, ModemError>;

    /// Send the open packet
    ///
    /// Returns the number of bytes handed to the network; zero means
    /// nothing was sent.
    fn end_packet(&mut self, confirmed: bool) -> impl Future<Output = Result<usize, ModemError>>;

    /// Check whether downlink bytes are waiting (non-blocking)
    fn available(&mut self) -> bool;

    /// Take the next downlink byte
    fn read(&mut self) -> Option<u8>;
}
