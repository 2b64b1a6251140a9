//! OTAA join credentials
//!
//! Supplied at build time as hex strings (`LORAWAN_APP_EUI`,
//! `LORAWAN_APP_KEY`) and parsed once at startup.

/// Application EUI length in bytes
pub const APP_EUI_LEN: usize = 8;

/// Application key length in bytes
pub const APP_KEY_LEN: usize = 16;

/// Errors from parsing hex credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsError {
    /// Application EUI is not 16 hex digits
    InvalidEuiLength,
    /// Application key is not 32 hex digits
    InvalidKeyLength,
    /// A character is not a hex digit
    InvalidHexDigit,
}

/// Application EUI and key for the OTAA join
#[derive(Clone, PartialEq, Eq)]
pub struct JoinCredentials {
    app_eui: [u8; APP_EUI_LEN],
    app_key: [u8; APP_KEY_LEN],
}

impl JoinCredentials {
    pub fn new(app_eui: [u8; APP_EUI_LEN], app_key: [u8; APP_KEY_LEN]) -> Self {
        Self { app_eui, app_key }
    }

    /// Parse credentials from hex strings (either case, no separators)
    pub fn from_hex(app_eui: &str, app_key: &str) -> Result<Self, CredentialsError> {
        let mut eui = [0u8; APP_EUI_LEN];
        let mut key = [0u8; APP_KEY_LEN];

        decode_hex(app_eui.trim(), &mut eui, CredentialsError::InvalidEuiLength)?;
        decode_hex(app_key.trim(), &mut key, CredentialsError::InvalidKeyLength)?;

        Ok(Self::new(eui, key))
    }

    pub fn app_eui(&self) -> &[u8; APP_EUI_LEN] {
        &self.app_eui
    }

    pub fn app_key(&self) -> &[u8; APP_KEY_LEN] {
        &self.app_key
    }
}

// Keep the key out of logs
impl core::fmt::Debug for JoinCredentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JoinCredentials")
            .field("app_eui", &self.app_eui)
            .field("app_key", &"<redacted>")
            .finish()
    }
}

/// Decode hex digits into `out`, which must be exactly filled
///
/// A length mismatch is reported as `length_error`.
fn decode_hex(
    hex: &str,
    out: &mut [u8],
    length_error: CredentialsError,
) -> Result<(), CredentialsError> {
    let digits = hex.as_bytes();
    if digits.len() != out.len() * 2 {
        return Err(length_error);
    }

    for (byte, pair) in out.iter_mut().zip(digits.chunks_exact(2)) {
        *byte = (nibble(pair[0])? << 4) | nibble(pair[1])?;
    }
    Ok(())
}

fn nibble(digit: u8) -> Result<u8, CredentialsError> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        _ => Err(CredentialsError::InvalidHexDigit),
    }
}
