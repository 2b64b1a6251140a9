//! u-blox UBX frame builder
//!
//! Frame format:
//! ```text
//! [0xB5][0x62][class: u8][id: u8][length: u16 LE][payload][ck_a: u8][ck_b: u8]
//! ```
//!
//! The checksum is the 8-bit Fletcher algorithm over class, id, length and
//! payload.

use heapless::Vec;

/// Largest UBX frame this firmware builds
pub const MAX_UBX_FRAME: usize = 32;

const SYNC_1: u8 = 0xB5;
const SYNC_2: u8 = 0x62;

/// Message classes and ids
mod msg {
    pub const CLASS_RXM: u8 = 0x02;
    pub const ID_PMREQ: u8 = 0x41;
}

/// RXM-PMREQ flag: enter backup mode
const PMREQ_FLAG_BACKUP: u32 = 0x0000_0002;

/// Wake-up preamble: any UART activity brings the receiver out of backup
pub const WAKE_SEQUENCE: [u8; 8] = [0xFF; 8];

/// Build a UBX frame
pub fn build_frame(class: u8, id: u8, payload: &[u8]) -> Vec<u8, MAX_UBX_FRAME> {
    let mut frame: Vec<u8, MAX_UBX_FRAME> = Vec::new();

    let _ = frame.push(SYNC_1);
    let _ = frame.push(SYNC_2);
    let _ = frame.push(class);
    let _ = frame.push(id);
    let _ = frame.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    let _ = frame.extend_from_slice(payload);

    let (ck_a, ck_b) = fletcher8(&frame[2..]);
    let _ = frame.push(ck_a);
    let _ = frame.push(ck_b);

    frame
}

/// Request indefinite backup mode (wake on UART activity)
pub fn backup_request() -> Vec<u8, MAX_UBX_FRAME> {
    let duration_ms: u32 = 0;
    let mut payload = [0u8; 8];
    payload[..4].copy_from_slice(&duration_ms.to_le_bytes());
    payload[4..].copy_from_slice(&PMREQ_FLAG_BACKUP.to_le_bytes());
    build_frame(msg::CLASS_RXM, msg::ID_PMREQ, &payload)
}

/// 8-bit Fletcher checksum
pub fn fletcher8(data: &[u8]) -> (u8, u8) {
    data.iter().fold((0u8, 0u8), |(a, b), &byte| {
        let a = a.wrapping_add(byte);
        (a, b.wrapping_add(a))
    })
}
