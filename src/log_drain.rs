//! Log output.
//!
//! Drains [`LOG_STREAM`](crate::logging::LOG_STREAM) to a byte sink from
//! the loop thread. On the device stdout is the UART0 console.
//!
//! Format: `[timestamp_us] LEVEL: target: message\n`

use std::io::{self, Write};

use crate::logging::{LogEntry, LogStream};

/// Dropped-message report cadence.
pub const DROPPED_REPORT_INTERVAL_US: i64 = 10_000_000;

/// Format log entry into `buf`. Returns the byte count.
pub fn format_log_entry(entry: &LogEntry, buf: &mut [u8]) -> usize {
    crate::logging::format_to_buffer(
        buf,
        format_args!(
            "[{:10}] {}: {}\n",
            entry.timestamp_us,
            entry.level.as_str(),
            entry.message()
        ),
    )
}

/// Consumer side of a [`LogStream`].
pub struct LogDrain {
    stream: &'static LogStream,
    last_dropped_report: i64,
}

impl LogDrain {
    pub fn new(stream: &'static LogStream) -> Self {
        Self {
            stream,
            last_dropped_report: 0,
        }
    }

    /// Write all pending entries to `out`, then the drop report if due.
    ///
    /// Returns the number of entries written.
    pub fn pump<W: Write>(&mut self, out: &mut W, now_us: i64) -> io::Result<usize> {
        let written = drain_to(self.stream, out)?;

        if now_us - self.last_dropped_report > DROPPED_REPORT_INTERVAL_US {
            let dropped = self.stream.dropped();
            if dropped > 0 {
                writeln!(out, "[WARN] Dropped log messages: {}", dropped)?;
                self.stream.reset_dropped();
            }
            self.last_dropped_report = now_us;
        }

        out.flush()?;
        Ok(written)
    }
}

/// Write every committed entry of `stream` to `out`.
pub fn drain_to<const N: usize, W: Write>(stream: &LogStream<N>, out: &mut W) -> io::Result<usize> {
    let mut format_buf = [0u8; 256];
    let mut written = 0;

    while let Some(entry) = stream.drain() {
        let len = format_log_entry(&entry, &mut format_buf);
        out.write_all(&format_buf[..len])?;
        written += 1;
    }
    Ok(written)
}
