#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod frame;
pub mod gps;
pub mod lorawan;
pub mod tracker;

// Log backend writes to the USB serial port, only available with embedded feature
#[cfg(feature = "embedded")]
pub mod debug;
