//! AT-command LoRaWAN modem driver
//!
//! Drives a modem that runs the LoRaWAN stack internally and exposes it as
//! AT commands over UART (see [`crate::lorawan::at`]). Uplinks are staged
//! locally, then sent with a single `AT+UTX`/`AT+CTX`; after the modem
//! accepts the packet the driver keeps listening through the class A
//! receive windows and queues any downlink bytes.

use crate::config::lorawan::{
    COMMAND_TIMEOUT_MS, JOIN_TIMEOUT_MS, MAX_DOWNLINK_LEN, MAX_UPLINK_LEN, RX_WINDOW_MS,
};
use crate::lorawan::at::{self, AtResponse};
use crate::lorawan::credentials::JoinCredentials;
use crate::lorawan::traits::{LoraWanModem, ModemError};
use embassy_time::{with_deadline, with_timeout, Duration, Instant};
use embedded_io_async::{Read, Write};
use heapless::{Deque, String, Vec};

/// Longest response line kept
const MAX_LINE_LEN: usize = 96;

/// AT-command LoRaWAN modem
pub struct AtModem<U: Read + Write> {
    uart: U,
    /// Packet being staged: (port, payload)
    packet: Option<(u8, Vec<u8, MAX_UPLINK_LEN>)>,
    /// Port last configured on the modem
    port: Option<u8>,
    /// Downlink bytes not yet read
    downlink: Deque<u8, MAX_DOWNLINK_LEN>,
}

impl<U: Read + Write> AtModem<U> {
    /// Create a new modem driver over a UART
    pub fn new(uart: U) -> Self {
        Self {
            uart,
            packet: None,
            port: None,
            downlink: Deque::new(),
        }
    }

    /// Select the EU868 band and OTAA activation, and report module identity
    pub async fn init(&mut self) -> Result<(), ModemError> {
        self.command(&at::set_band(at::BAND_EU868), COMMAND_TIMEOUT_MS)
            .await?;
        self.command(&at::set_mode(at::MODE_OTAA), COMMAND_TIMEOUT_MS)
            .await?;

        if let Ok(Some(version)) = self.command(&at::query_version(), COMMAND_TIMEOUT_MS).await {
            log::info!("Modem: Version {}", version.as_str());
        }
        if let Ok(Some(eui)) = self.command(&at::query_device_eui(), COMMAND_TIMEOUT_MS).await {
            log::info!("Modem: Device EUI {}", eui.as_str());
        }
        Ok(())
    }

    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), ModemError> {
        self.uart
            .write_all(bytes)
            .await
            .map_err(|_| ModemError::UartError)
    }

    /// Send a command and wait for `+OK`/`+ERR`, returning any `+OK=` value
    async fn command(
        &mut self,
        line: &str,
        timeout_ms: u64,
    ) -> Result<Option<String<MAX_LINE_LEN>>, ModemError> {
        self.write_all(line.as_bytes()).await?;
        self.await_ok(timeout_ms).await
    }

    /// Wait for the final response to the last command
    async fn await_ok(&mut self, timeout_ms: u64) -> Result<Option<String<MAX_LINE_LEN>>, ModemError> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);

        loop {
            let line = with_deadline(deadline, self.next_line())
                .await
                .map_err(|_| ModemError::Timeout)??;

            let response = at::parse_response(&line);
            if let AtResponse::Error(code) = response {
                log::warn!("Modem: Command failed ({})", code.unwrap_or("-"));
            }
            match response.final_reply() {
                Some(reply) => {
                    return reply.map(|value| {
                        value.map(|v| {
                            let mut out = String::new();
                            let _ = out.push_str(v);
                            out
                        })
                    });
                }
                None => {
                    if let AtResponse::Recv { len, .. } = response {
                        self.receive_payload(len).await?;
                    }
                }
            }
        }
    }

    /// Read one line, dropping `\r` and truncating overlong lines
    async fn next_line(&mut self) -> Result<String<MAX_LINE_LEN>, ModemError> {
        let mut line: String<MAX_LINE_LEN> = String::new();
        let mut byte = [0u8; 1];

        loop {
            let n = self
                .uart
                .read(&mut byte)
                .await
                .map_err(|_| ModemError::UartError)?;
            if n == 0 {
                continue;
            }
            match byte[0] {
                b'\n' => return Ok(line),
                b'\r' => {}
                b => {
                    let _ = line.push(b as char);
                }
            }
        }
    }

    /// Read the raw downlink bytes that follow a `+RECV` line
    async fn receive_payload(&mut self, len: usize) -> Result<(), ModemError> {
        // Blank separator line
        let _ = with_timeout(Duration::from_millis(COMMAND_TIMEOUT_MS), self.next_line())
            .await
            .map_err(|_| ModemError::Timeout)??;

        let mut remaining = len;
        let mut chunk = [0u8; 16];
        while remaining > 0 {
            let take = remaining.min(chunk.len());
            with_timeout(
                Duration::from_millis(COMMAND_TIMEOUT_MS),
                self.uart.read_exact(&mut chunk[..take]),
            )
            .await
            .map_err(|_| ModemError::Timeout)?
            .map_err(|_| ModemError::UartError)?;

            for &b in &chunk[..take] {
                if self.downlink.push_back(b).is_err() {
                    log::warn!("Modem: Downlink buffer full");
                    break;
                }
            }
            remaining -= take;
        }
        log::debug!("Modem: {} downlink bytes queued", len);
        Ok(())
    }

    /// Listen through the receive windows for a downlink
    async fn listen_rx_windows(&mut self) -> Result<(), ModemError> {
        let deadline = Instant::now() + Duration::from_millis(RX_WINDOW_MS);

        loop {
            let line = match with_deadline(deadline, self.next_line()).await {
                Ok(line) => line?,
                // Windows closed, no downlink is normal
                Err(_) => return Ok(()),
            };
            if let AtResponse::Recv { port, len } = at::parse_response(&line) {
                log::debug!("Modem: Downlink on port {}", port);
                return self.receive_payload(len).await;
            }
        }
    }
}

impl<U: Read + Write> LoraWanModem for AtModem<U> {
    async fn join_otaa(&mut self, credentials: &JoinCredentials) -> Result<(), ModemError> {
        self.command(&at::set_app_eui(credentials.app_eui()), COMMAND_TIMEOUT_MS)
            .await?;
        self.command(&at::set_app_key(credentials.app_key()), COMMAND_TIMEOUT_MS)
            .await?;
        self.command(&at::join(), COMMAND_TIMEOUT_MS).await?;

        // The join result arrives as an event once the exchange completes
        let deadline = Instant::now() + Duration::from_millis(JOIN_TIMEOUT_MS);
        loop {
            let line = with_deadline(deadline, self.next_line())
                .await
                .map_err(|_| ModemError::Timeout)??;
            let response = at::parse_response(&line);
            if response.is_join_accepted() {
                return Ok(());
            }
            if response.is_join_failed() {
                return Err(ModemError::JoinRejected);
            }
        }
    }

    fn begin_packet(&mut self, port: u8) -> Result<(), ModemError> {
        self.packet = Some((port, Vec::new()));
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, ModemError> {
        let (_, payload) = self.packet.as_mut().ok_or(ModemError::NoPacketOpen)?;
        payload
            .extend_from_slice(data)
            .map_err(|_| ModemError::PayloadTooLarge)?;
        Ok(data.len())
    }

    async fn end_packet(&mut self, confirmed: bool) -> Result<usize, ModemError> {
        let (port, payload) = self.packet.take().ok_or(ModemError::NoPacketOpen)?;

        if self.port != Some(port) {
            self.command(&at::set_port(port), COMMAND_TIMEOUT_MS).await?;
            self.port = Some(port);
        }

        self.write_all(at::send(payload.len(), confirmed).as_bytes())
            .await?;
        self.write_all(&payload).await?;
        self.await_ok(COMMAND_TIMEOUT_MS)
            .await
            .map_err(at::send_error)?;

        if let Err(e) = self.listen_rx_windows().await {
            log::warn!("Modem: Downlink receive failed ({:?})", e);
        }
        Ok(payload.len())
    }

    fn available(&mut self) -> bool {
        !self.downlink.is_empty()
    }

    fn read(&mut self) -> Option<u8> {
        self.downlink.pop_front()
    }
}
