//! AT command set of the LoRaWAN modem
//!
//! Commands are ASCII lines terminated by `\r`. The modem answers each one
//! with `+OK` (optionally `+OK=<value>`) or `+ERR[=<code>]`, and reports
//! asynchronous events on their own lines:
//!
//! | Line               | Meaning                                   |
//! |--------------------|-------------------------------------------|
//! | `+EVENT=1,1`       | Join accepted                             |
//! | `+EVENT=1,0`       | Join failed                               |
//! | `+RECV=<port>,<n>` | Downlink; `n` raw bytes follow a blank line |

use crate::lorawan::traits::ModemError;
use core::fmt::Write;
use heapless::String;

/// Longest command line built
pub const MAX_COMMAND_LEN: usize = 64;

/// Command terminator
pub const TERMINATOR: &str = "\r";

/// Band index for EU 863-870 MHz
pub const BAND_EU868: u8 = 5;

/// Activation mode index for OTAA
pub const MODE_OTAA: u8 = 1;

/// Event kind for join results
pub const EVENT_JOIN: u8 = 1;

/// A parsed response line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtResponse<'a> {
    /// `+OK` or `+OK=<value>`
    Ok(Option<&'a str>),
    /// `+ERR` or `+ERR=<code>`
    Error(Option<&'a str>),
    /// `+EVENT=<kind>,<status>`
    Event { kind: u8, status: u8 },
    /// `+RECV=<port>,<len>`
    Recv { port: u8, len: usize },
    /// Anything else (echo, banners, blank lines)
    Other(&'a str),
}

impl<'a> AtResponse<'a> {
    /// Final reply to a command, `None` for lines that do not end it
    pub fn final_reply(&self) -> Option<Result<Option<&'a str>, ModemError>> {
        match *self {
            AtResponse::Ok(value) => Some(Ok(value)),
            AtResponse::Error(_) => Some(Err(ModemError::CommandRejected)),
            _ => None,
        }
    }

    /// Join accepted event
    pub fn is_join_accepted(&self) -> bool {
        matches!(self, AtResponse::Event { kind: EVENT_JOIN, status: 1 })
    }

    /// Join failed event
    pub fn is_join_failed(&self) -> bool {
        matches!(self, AtResponse::Event { kind: EVENT_JOIN, status: 0 })
    }
}

/// Parse one response line (without line terminator)
pub fn parse_response(line: &str) -> AtResponse<'_> {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix("+OK") {
        return AtResponse::Ok(rest.strip_prefix('='));
    }
    if let Some(rest) = line.strip_prefix("+ERR") {
        return AtResponse::Error(rest.strip_prefix('='));
    }
    if let Some(rest) = line.strip_prefix("+EVENT=") {
        if let Some((kind, status)) = parse_pair(rest) {
            if let (Ok(kind), Ok(status)) = (kind.parse(), status.parse()) {
                return AtResponse::Event { kind, status };
            }
        }
    }
    if let Some(rest) = line.strip_prefix("+RECV=") {
        if let Some((port, len)) = parse_pair(rest) {
            if let (Ok(port), Ok(len)) = (port.parse(), len.parse()) {
                return AtResponse::Recv { port, len };
            }
        }
    }

    AtResponse::Other(line)
}

fn parse_pair(s: &str) -> Option<(&str, &str)> {
    let (a, b) = s.split_once(',')?;
    Some((a.trim(), b.trim()))
}

/// Build a command line from format arguments
fn command(args: core::fmt::Arguments) -> String<MAX_COMMAND_LEN> {
    let mut line: String<MAX_COMMAND_LEN> = String::new();
    let _ = line.write_fmt(args);
    let _ = line.push_str(TERMINATOR);
    line
}

/// Build a command carrying a hex-encoded byte string
fn hex_command(prefix: &str, bytes: &[u8]) -> String<MAX_COMMAND_LEN> {
    let mut line: String<MAX_COMMAND_LEN> = String::new();
    let _ = line.push_str(prefix);
    for byte in bytes {
        let _ = write!(line, "{:02X}", byte);
    }
    let _ = line.push_str(TERMINATOR);
    line
}

pub fn set_band(band: u8) -> String<MAX_COMMAND_LEN> {
    command(format_args!("AT+BAND={}", band))
}

pub fn set_mode(mode: u8) -> String<MAX_COMMAND_LEN> {
    command(format_args!("AT+MODE={}", mode))
}

pub fn set_app_eui(app_eui: &[u8]) -> String<MAX_COMMAND_LEN> {
    hex_command("AT+APPEUI=", app_eui)
}

pub fn set_app_key(app_key: &[u8]) -> String<MAX_COMMAND_LEN> {
    hex_command("AT+AK=", app_key)
}

pub fn join() -> String<MAX_COMMAND_LEN> {
    command(format_args!("AT+JOIN"))
}

pub fn set_port(port: u8) -> String<MAX_COMMAND_LEN> {
    command(format_args!("AT+PORT={}", port))
}

/// Error for a failed send: a rejected `AT+UTX`/`AT+CTX` is a failed transmission
pub fn send_error(error: ModemError) -> ModemError {
    match error {
        ModemError::CommandRejected => ModemError::TransmitFailed,
        other => other,
    }
}

/// Announce a payload of `len` bytes; the raw bytes follow the command
pub fn send(len: usize, confirmed: bool) -> String<MAX_COMMAND_LEN> {
    if confirmed {
        command(format_args!("AT+CTX {}", len))
    } else {
        command(format_args!("AT+UTX {}", len))
    }
}

pub fn query_device_eui() -> String<MAX_COMMAND_LEN> {
    command(format_args!("AT+DEV?"))
}

pub fn query_version() -> String<MAX_COMMAND_LEN> {
    command(format_args!("AT+VER?"))
}
