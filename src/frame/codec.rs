//! Telemetry frame codec
//!
//! # Frame Format
//!
//! Every uplink is exactly 15 bytes, multi-byte fields little-endian:
//! ```text
//! [sats: u8][lat: f32][lon: f32][alt: i16][status: u8][soc: u8][temp: i8][cycles: u8]
//! ```
//!
//! | Offset | Size | Field                                              |
//! |--------|------|----------------------------------------------------|
//! | 0      | 1    | Satellites in use                                  |
//! | 1      | 4    | Latitude, degrees (IEEE-754)                       |
//! | 5      | 4    | Longitude, degrees (IEEE-754)                      |
//! | 9      | 2    | Altitude, meters                                   |
//! | 11     | 1    | Status: `(availability << 1) \| GPS_INIT`          |
//! | 12     | 1    | Battery state of charge, percent                   |
//! | 13     | 1    | Temperature, degrees C                             |
//! | 14     | 1    | Charge cycles, low byte                            |
//!
//! The charge-cycle counter is a `u16` on the device but only its low byte
//! fits in the frame.

use crate::config::frame::{FRAME_LEN, STATUS_GPS_INIT};
use crate::config::status_defaults;

/// One position reading from the GNSS receiver
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetrySample {
    /// Latitude in degrees, north positive
    pub latitude: f32,
    /// Longitude in degrees, east positive
    pub longitude: f32,
    /// Altitude above mean sea level in meters
    pub altitude: i16,
    /// Satellites used in the fix
    pub satellites: u8,
}

/// Device status scalars carried alongside each fix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStatus {
    /// Availability counter (7 bits survive in the frame)
    pub availability_counter: u8,
    /// Battery state of charge in percent
    pub state_of_charge: u8,
    /// Board temperature in degrees C
    pub temperature: i8,
    /// Battery charge cycle count
    pub charge_cycles: u16,
}

impl Default for DeviceStatus {
    fn default() -> Self {
        Self {
            availability_counter: status_defaults::AVAILABILITY_COUNTER,
            state_of_charge: status_defaults::STATE_OF_CHARGE_PCT,
            temperature: status_defaults::TEMPERATURE_C,
            charge_cycles: status_defaults::CHARGE_CYCLES,
        }
    }
}

/// Field offsets within the frame
mod offset {
    pub const SATELLITES: usize = 0;
    pub const LATITUDE: usize = 1;
    pub const LONGITUDE: usize = 5;
    pub const ALTITUDE: usize = 9;
    pub const STATUS: usize = 11;
    pub const STATE_OF_CHARGE: usize = 12;
    pub const TEMPERATURE: usize = 13;
    pub const CHARGE_CYCLES: usize = 14;
}

/// An encoded 15-byte uplink frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryFrame {
    bytes: [u8; FRAME_LEN],
}

impl TelemetryFrame {
    /// Raw frame bytes as sent over the air
    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.bytes
    }

    pub fn satellites(&self) -> u8 {
        self.bytes[offset::SATELLITES]
    }

    pub fn latitude(&self) -> f32 {
        f32::from_le_bytes(self.field(offset::LATITUDE))
    }

    pub fn longitude(&self) -> f32 {
        f32::from_le_bytes(self.field(offset::LONGITUDE))
    }

    pub fn altitude(&self) -> i16 {
        i16::from_le_bytes(self.field(offset::ALTITUDE))
    }

    pub fn status(&self) -> u8 {
        self.bytes[offset::STATUS]
    }

    fn field<const N: usize>(&self, start: usize) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[start..start + N]);
        out
    }
}

impl AsRef<[u8]> for TelemetryFrame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Encoder for telemetry frames
pub struct FrameCodec;

impl FrameCodec {
    /// Create a new frame codec
    pub fn new() -> Self {
        Self
    }

    /// Encode a sample and device status into a frame
    pub fn encode(&self, sample: &TelemetrySample, status: &DeviceStatus) -> TelemetryFrame {
        let mut bytes = [0u8; FRAME_LEN];

        bytes[offset::SATELLITES] = sample.satellites;
        bytes[offset::LATITUDE..offset::LONGITUDE].copy_from_slice(&sample.latitude.to_le_bytes());
        bytes[offset::LONGITUDE..offset::ALTITUDE].copy_from_slice(&sample.longitude.to_le_bytes());
        bytes[offset::ALTITUDE..offset::STATUS].copy_from_slice(&sample.altitude.to_le_bytes());
        bytes[offset::STATUS] = Self::status_byte(status.availability_counter);
        bytes[offset::STATE_OF_CHARGE] = status.state_of_charge;
        bytes[offset::TEMPERATURE] = status.temperature as u8;
        bytes[offset::CHARGE_CYCLES] = status.charge_cycles.to_le_bytes()[0];

        TelemetryFrame { bytes }
    }

    /// Status byte: availability counter in bits 1-7, GPS-initialised flag in bit 0
    pub fn status_byte(availability_counter: u8) -> u8 {
        (availability_counter << 1) | STATUS_GPS_INIT
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vienna() -> TelemetrySample {
        TelemetrySample {
            latitude: 48.2081,
            longitude: 16.3713,
            altitude: 171,
            satellites: 7,
        }
    }

    #[test]
    fn test_frame_length() {
        let frame = FrameCodec::new().encode(&vienna(), &DeviceStatus::default());
        assert_eq!(frame.as_bytes().len(), 15);
        assert_eq!(frame.as_ref().len(), FRAME_LEN);
    }

    #[test]
    fn test_encode_deterministic() {
        let codec = FrameCodec::new();
        let status = DeviceStatus::default();

        let first = codec.encode(&vienna(), &status);
        let second = codec.encode(&vienna(), &status);
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn test_position_fields_readable() {
        let frame = FrameCodec::new().encode(&vienna(), &DeviceStatus::default());
        let bytes = frame.as_bytes();

        assert_eq!(bytes[0], 7);
        let lat = f32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        let lon = f32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);
        let alt = i16::from_le_bytes([bytes[9], bytes[10]]);
        assert!((lat - 48.2081).abs() < 1e-5);
        assert!((lon - 16.3713).abs() < 1e-5);
        assert_eq!(alt, 171);

        assert_eq!(frame.satellites(), 7);
        assert_eq!(frame.latitude(), 48.2081f32);
        assert_eq!(frame.longitude(), 16.3713f32);
        assert_eq!(frame.altitude(), 171);
    }

    #[test]
    fn test_status_byte() {
        assert_eq!(FrameCodec::status_byte(0), 0x01);
        assert_eq!(FrameCodec::status_byte(3), 0x07);
        // Top bit of the counter is shifted out
        assert_eq!(FrameCodec::status_byte(0x81), 0x03);

        let status = DeviceStatus {
            availability_counter: 3,
            ..DeviceStatus::default()
        };
        let frame = FrameCodec::new().encode(&vienna(), &status);
        assert_eq!(frame.status(), 0x07);
    }

    #[test]
    fn test_default_status_bytes() {
        let frame = FrameCodec::new().encode(&vienna(), &DeviceStatus::default());
        let bytes = frame.as_bytes();

        assert_eq!(bytes[11], 0x01);
        assert_eq!(bytes[12], 97);
        assert_eq!(bytes[13], 12);
        assert_eq!(bytes[14], 106);
    }

    #[test]
    fn test_negative_values() {
        let sample = TelemetrySample {
            latitude: -33.8688,
            longitude: -70.6693,
            altitude: -12,
            satellites: 4,
        };
        let status = DeviceStatus {
            temperature: -5,
            charge_cycles: 0x0203,
            ..DeviceStatus::default()
        };
        let frame = FrameCodec::new().encode(&sample, &status);
        let bytes = frame.as_bytes();

        assert_eq!(frame.latitude(), -33.8688f32);
        assert_eq!(frame.longitude(), -70.6693f32);
        assert_eq!(frame.altitude(), -12);
        assert_eq!(bytes[13] as i8, -5);
        // Only the low byte of the cycle counter is carried
        assert_eq!(bytes[14], 0x03);
    }
}
