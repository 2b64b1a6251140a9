//! Telemetry session over a LoRaWAN modem
//!
//! Owns the one-time OTAA join and carries uplink frames and downlink bytes.
//! Nothing is retried here: the tracker's cycle period is the retry interval.

use crate::config::lorawan::{MAX_DOWNLINK_LEN, UPLINK_PORT};
use crate::frame::TelemetryFrame;
use crate::lorawan::credentials::JoinCredentials;
use crate::lorawan::traits::{LoraWanModem, ModemError};
use heapless::Vec;

/// Downlink bytes drained after an uplink
pub type Downlink = Vec<u8, MAX_DOWNLINK_LEN>;

/// Network session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotJoined,
    /// Never left once entered
    Joined,
}

/// Errors surfaced by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// Join exchange failed; the next cycle tries again
    JoinFailed(ModemError),
    /// Uplink attempted before joining
    NotJoined,
    /// Modem failed or sent nothing
    UplinkFailed(ModemError),
}

/// LoRaWAN telemetry session
pub struct TelemetrySession<M: LoraWanModem> {
    modem: M,
    credentials: JoinCredentials,
    state: SessionState,
}

impl<M: LoraWanModem> TelemetrySession<M> {
    /// Create a new session; nothing is sent until the first join
    pub fn new(modem: M, credentials: JoinCredentials) -> Self {
        Self {
            modem,
            credentials,
            state: SessionState::NotJoined,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_joined(&self) -> bool {
        self.state == SessionState::Joined
    }

    pub fn modem(&self) -> &M {
        &self.modem
    }

    /// Join the network unless already joined
    pub async fn ensure_joined(&mut self) -> Result<(), SessionError> {
        if self.is_joined() {
            return Ok(());
        }

        log::info!("LoRaWAN: Joining (OTAA)...");
        match self.modem.join_otaa(&self.credentials).await {
            Ok(()) => {
                self.state = SessionState::Joined;
                log::info!("LoRaWAN: Joined");
                Ok(())
            }
            Err(e) => {
                log::warn!("LoRaWAN: Join failed ({:?}), will retry next cycle", e);
                Err(SessionError::JoinFailed(e))
            }
        }
    }

    /// Send a frame unconfirmed on the telemetry port
    ///
    /// Returns the number of bytes the modem sent.
    pub async fn uplink(&mut self, frame: &TelemetryFrame) -> Result<usize, SessionError> {
        if !self.is_joined() {
            return Err(SessionError::NotJoined);
        }

        let payload = frame.as_bytes();
        self.modem
            .begin_packet(UPLINK_PORT)
            .map_err(SessionError::UplinkFailed)?;
        let written = self
            .modem
            .write(payload)
            .map_err(SessionError::UplinkFailed)?;
        if written != payload.len() {
            return Err(SessionError::UplinkFailed(ModemError::PayloadTooLarge));
        }

        match self.modem.end_packet(false).await {
            Ok(0) => Err(SessionError::UplinkFailed(ModemError::TransmitFailed)),
            Ok(sent) => Ok(sent),
            Err(e) => Err(SessionError::UplinkFailed(e)),
        }
    }

    /// Read every pending downlink byte
    ///
    /// An empty result is normal. Bytes beyond `MAX_DOWNLINK_LEN` are
    /// consumed and dropped.
    pub fn drain_downlink(&mut self) -> Downlink {
        let mut downlink = Downlink::new();
        let mut dropped = 0usize;

        while self.modem.available() {
            let Some(byte) = self.modem.read() else {
                break;
            };
            if downlink.push(byte).is_err() {
                dropped += 1;
            }
        }

        if dropped > 0 {
            log::warn!("LoRaWAN: Downlink truncated, {} bytes dropped", dropped);
        }
        downlink
    }
}
