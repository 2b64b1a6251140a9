//! NMEA 0183 sentence framing and GGA parsing
//!
//! Only the GGA (fix data) sentence is needed: it carries position,
//! fix quality, satellites in use and altitude.
//!
//! ```text
//! $GPGGA,hhmmss.ss,ddmm.mmmm,N,dddmm.mmmm,E,q,ss,hdop,alt,M,geoid,M,,*hh
//! ```

use crate::frame::TelemetrySample;
use heapless::Vec;

/// Longest sentence accepted (NMEA allows 82 characters)
pub const MAX_SENTENCE_LEN: usize = 96;

const SENTENCE_START: u8 = b'$';
const SENTENCE_END: u8 = b'\n';

/// GGA field indices (after the address field)
mod field {
    pub const LATITUDE: usize = 2;
    pub const NORTH_SOUTH: usize = 3;
    pub const LONGITUDE: usize = 4;
    pub const EAST_WEST: usize = 5;
    pub const QUALITY: usize = 6;
    pub const SATELLITES: usize = 7;
    pub const ALTITUDE: usize = 9;
}

/// Reasons a sentence did not yield a fix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NmeaError {
    /// Not a GGA sentence
    NotGga,
    /// Missing or mismatching `*hh` checksum
    BadChecksum,
    /// A required field could not be parsed
    Malformed,
    /// Receiver reports no fix (quality 0)
    NoFix,
}

/// Accumulates UART bytes and extracts complete NMEA sentences.
///
/// A `$` always starts a new sentence, discarding any partial one.
/// Sentences end at `\n`; a trailing `\r` is dropped.
pub struct SentenceAccumulator {
    buffer: Vec<u8, MAX_SENTENCE_LEN>,
    in_sentence: bool,
}

impl SentenceAccumulator {
    /// Create a new empty accumulator.
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            in_sentence: false,
        }
    }

    /// Push a byte into the accumulator.
    ///
    /// Returns `Some(sentence)` (starting with `$`) when a sentence completes.
    pub fn push(&mut self, byte: u8) -> Option<Vec<u8, MAX_SENTENCE_LEN>> {
        match byte {
            SENTENCE_START => {
                self.buffer.clear();
                let _ = self.buffer.push(byte);
                self.in_sentence = true;
                None
            }
            SENTENCE_END => {
                if !self.in_sentence {
                    return None;
                }
                self.in_sentence = false;
                if self.buffer.last() == Some(&b'\r') {
                    self.buffer.pop();
                }
                Some(core::mem::replace(&mut self.buffer, Vec::new()))
            }
            _ if self.in_sentence => {
                if self.buffer.push(byte).is_err() {
                    // Overlong sentence, drop it and wait for the next `$`
                    self.reset();
                }
                None
            }
            _ => None,
        }
    }

    /// Discard any partial sentence.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.in_sentence = false;
    }

    /// Returns true if no sentence is in progress.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for SentenceAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a GGA sentence into a fix
pub fn parse_gga(sentence: &[u8]) -> Result<TelemetrySample, NmeaError> {
    let text = core::str::from_utf8(sentence).map_err(|_| NmeaError::Malformed)?;
    let text = text.strip_prefix('$').unwrap_or(text);

    let (body, checksum) = text.split_once('*').ok_or(NmeaError::BadChecksum)?;
    let expected = u8::from_str_radix(checksum.trim_end(), 16).map_err(|_| NmeaError::BadChecksum)?;
    if checksum_of(body) != expected {
        return Err(NmeaError::BadChecksum);
    }

    let mut fields: Vec<&str, 20> = Vec::new();
    for f in body.split(',') {
        fields.push(f).map_err(|_| NmeaError::Malformed)?;
    }

    // Any talker: GP, GN, GL, GA...
    let address = fields.first().copied().unwrap_or("");
    if address.len() != 5 || !address.ends_with("GGA") {
        return Err(NmeaError::NotGga);
    }
    if fields.len() <= field::ALTITUDE {
        return Err(NmeaError::Malformed);
    }

    let quality = fields[field::QUALITY];
    if quality.is_empty() || quality == "0" {
        return Err(NmeaError::NoFix);
    }

    let latitude = parse_coordinate(fields[field::LATITUDE], fields[field::NORTH_SOUTH], 'S')?;
    let longitude = parse_coordinate(fields[field::LONGITUDE], fields[field::EAST_WEST], 'W')?;

    let satellites = match fields[field::SATELLITES] {
        "" => 0,
        s => s.parse::<u8>().map_err(|_| NmeaError::Malformed)?,
    };

    let altitude = match fields[field::ALTITUDE] {
        "" => 0,
        s => s.parse::<f32>().map_err(|_| NmeaError::Malformed)? as i16,
    };

    Ok(TelemetrySample {
        latitude,
        longitude,
        altitude,
        satellites,
    })
}

/// XOR of every byte between `$` and `*`
pub fn checksum_of(body: &str) -> u8 {
    body.bytes().fold(0, |acc, b| acc ^ b)
}

/// Convert `(d)ddmm.mmmm` plus hemisphere into signed degrees
fn parse_coordinate(value: &str, hemisphere: &str, negative: char) -> Result<f32, NmeaError> {
    // Split below is by byte index
    if !value.is_ascii() {
        return Err(NmeaError::Malformed);
    }
    let dot = value.find('.').unwrap_or(value.len());
    if dot < 3 {
        return Err(NmeaError::Malformed);
    }
    let (degrees, minutes) = value.split_at(dot - 2);

    let degrees = degrees.parse::<f64>().map_err(|_| NmeaError::Malformed)?;
    let minutes = minutes.parse::<f64>().map_err(|_| NmeaError::Malformed)?;
    let magnitude = degrees + minutes / 60.0;

    let signed = match hemisphere.chars().next() {
        Some(c) if c == negative => -magnitude,
        Some(_) => magnitude,
        None => return Err(NmeaError::Malformed),
    };
    Ok(signed as f32)
}
