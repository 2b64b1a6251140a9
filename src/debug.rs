//! Debug logging via USB Serial JTAG.
//!
//! Backs the `log` facade: each record is formatted into a fixed line buffer
//! and queued for the writer task. Output is non-blocking and lines are
//! dropped if the queue is full or the host is not reading.

use core::fmt::Write;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use esp_hal::usb_serial_jtag::UsbSerialJtagTx;
use esp_hal::Async;
use heapless::String;
use log::{Level, Log, Metadata, Record};

use crate::config::logging::{MAX_LEVEL, MAX_LINE_LEN, QUEUE_DEPTH};

/// A formatted log line
pub type LogLine = String<MAX_LINE_LEN>;

/// Lines waiting for the writer task
static LOG_CHANNEL: Channel<CriticalSectionRawMutex, LogLine, QUEUE_DEPTH> = Channel::new();

static LOGGER: DebugLogger = DebugLogger;

/// `log` backend queueing lines for [`debug_writer_task`]
pub struct DebugLogger;

impl Log for DebugLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= MAX_LEVEL
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut line = LogLine::new();
        // Truncated lines are still worth sending
        let _ = write!(line, "[{}] {}", level_tag(record.level()), record.args());
        let _ = LOG_CHANNEL.try_send(line);
    }

    fn flush(&self) {}
}

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Error => "E",
        Level::Warn => "W",
        Level::Info => "I",
        Level::Debug => "D",
        Level::Trace => "T",
    }
}

/// Install the logger.
///
/// Must be called once during startup, before the first log record.
pub fn init() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(MAX_LEVEL);
    }
}

/// Debug writer task that sends queued lines to the USB serial port.
///
/// This task should be spawned and will continuously drain the log queue.
pub async fn debug_writer_task(mut usb_tx: UsbSerialJtagTx<'static, Async>) {
    loop {
        let line = LOG_CHANNEL.receive().await;

        // Ignore errors, the port might not be connected
        let _ = embedded_io_async::Write::write_all(&mut usb_tx, line.as_bytes()).await;
        let _ = embedded_io_async::Write::write_all(&mut usb_tx, b"\r\n").await;
    }
}
