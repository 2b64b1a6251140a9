//! u-blox GNSS receiver over UART
//!
//! The receiver streams NMEA continuously. A reader task owns the RX half,
//! parses GGA sentences and publishes each fix through [`FIX_SIGNAL`];
//! [`UbloxGps`] owns the TX half for power management and implements
//! [`GpsReceiver`] on top of the signal.

use crate::frame::TelemetrySample;
use crate::gps::nmea::{parse_gga, NmeaError, SentenceAccumulator};
use crate::gps::traits::{GpsError, GpsReceiver};
use crate::gps::ubx;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use embedded_io_async::{Read, Write};

/// Latest fix published by the reader task
pub static FIX_SIGNAL: Signal<CriticalSectionRawMutex, TelemetrySample> = Signal::new();

/// GNSS receiver handle used by the tracker
pub struct UbloxGps<Tx: Write> {
    tx: Tx,
    current: TelemetrySample,
}

impl<Tx: Write> UbloxGps<Tx> {
    /// Create a new receiver handle over the UART TX half
    pub fn new(tx: Tx) -> Self {
        Self {
            tx,
            current: TelemetrySample::default(),
        }
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<(), GpsError> {
        self.tx
            .write_all(bytes)
            .await
            .map_err(|_| GpsError::WriteFailed)?;
        self.tx.flush().await.map_err(|_| GpsError::WriteFailed)
    }
}

impl<Tx: Write> GpsReceiver for UbloxGps<Tx> {
    fn poll_available(&mut self) -> bool {
        match FIX_SIGNAL.try_take() {
            Some(fix) => {
                self.current = fix;
                true
            }
            None => false,
        }
    }

    fn current_fix(&self) -> TelemetrySample {
        self.current
    }

    async fn standby(&mut self) -> Result<(), GpsError> {
        let request = ubx::backup_request();
        self.send(&request).await?;
        FIX_SIGNAL.reset();
        Ok(())
    }

    async fn wake(&mut self) -> Result<(), GpsError> {
        self.send(&ubx::WAKE_SEQUENCE).await?;
        // Give the receiver time to restart before sentences are trusted
        Timer::after(Duration::from_millis(100)).await;
        FIX_SIGNAL.reset();
        Ok(())
    }
}

/// Read NMEA from the receiver forever, publishing every valid fix
pub async fn gps_reader<Rx: Read>(mut rx: Rx) {
    let mut accumulator = SentenceAccumulator::new();
    let mut buf = [0u8; 64];

    loop {
        match rx.read(&mut buf).await {
            Ok(0) => continue,
            Ok(n) => {
                for &byte in &buf[..n] {
                    let Some(sentence) = accumulator.push(byte) else {
                        continue;
                    };
                    match parse_gga(&sentence) {
                        Ok(fix) => {
                            log::debug!(
                                "GPS: {} sats at {}, {} ({} m)",
                                fix.satellites,
                                fix.latitude,
                                fix.longitude,
                                fix.altitude
                            );
                            FIX_SIGNAL.signal(fix);
                        }
                        Err(NmeaError::NotGga) | Err(NmeaError::NoFix) => {}
                        Err(e) => log::debug!("GPS: dropped sentence ({:?})", e),
                    }
                }
            }
            Err(_) => {
                // UART error, resync on the next sentence
                accumulator.reset();
                Timer::after(Duration::from_millis(10)).await;
            }
        }
    }
}
