//! Non-blocking logging for GeigerCounter.
//!
//! # Architecture
//!
//! ```text
//! log::info!() etc.        LogStream             Loop drain
//! ──────────────           ─────────             ──────────
//!
//! RingLogger::log() ─────▶ [L0][L1][L2] ──────▶ stdout / UART
//! fixed-size format         lock-free            between windows
//! never blocks              ring buffer
//! ```
//!
//! # Rules
//!
//! - The pulse ISR never logs, not even through this ring.
//! - Producers never block: a full ring drops the message and counts it.
//! - Exactly one consumer drains (see [`crate::log_drain`]).

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Maximum message length.
pub const MAX_MSG_LEN: usize = 160;

/// Log buffer size (number of entries).
pub const LOG_BUFFER_SIZE: usize = 64;

/// A single log entry.
#[derive(Clone, Copy)]
#[repr(C)]
pub struct LogEntry {
    /// Timestamp in microseconds since boot.
    pub timestamp_us: i64,
    pub level: Level,
    /// Message length.
    pub len: u8,
    /// Message bytes (not null-terminated).
    pub msg: [u8; MAX_MSG_LEN],
}

impl LogEntry {
    pub const EMPTY: Self = Self {
        timestamp_us: 0,
        level: Level::Info,
        len: 0,
        msg: [0; MAX_MSG_LEN],
    };

    /// Message text (lossy on broken UTF-8 from truncation).
    pub fn message(&self) -> &str {
        let bytes = &self.msg[..self.len as usize];
        match core::str::from_utf8(bytes) {
            Ok(s) => s,
            // Truncation may split a multi-byte char
            Err(e) => core::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or(""),
        }
    }
}

impl Default for LogEntry {
    fn default() -> Self {
        Self::EMPTY
    }
}

struct Slot {
    ready: AtomicBool,
    entry: UnsafeCell<LogEntry>,
}

#[allow(clippy::declare_interior_mutable_const)]
const EMPTY_SLOT: Slot = Slot {
    ready: AtomicBool::new(false),
    entry: UnsafeCell::new(LogEntry::EMPTY),
};

/// Bounded multi-producer, single-consumer log ring.
///
/// - Producers reserve a slot with a CAS on `write_idx`, fill it, then
///   publish it through the slot's `ready` flag.
/// - Push never blocks (drops message if full).
/// - The consumer only reads slots whose `ready` flag is set.
pub struct LogStream<const N: usize = LOG_BUFFER_SIZE> {
    slots: [Slot; N],
    write_idx: AtomicU32,
    read_idx: AtomicU32,
    dropped: AtomicU32,
}

// SAFETY: Each slot is written by exactly one producer (unique CAS
// reservation) and read by the single consumer only after `ready`.
unsafe impl<const N: usize> Sync for LogStream<N> {}
unsafe impl<const N: usize> Send for LogStream<N> {}

impl<const N: usize> LogStream<N> {
    const MASK: usize = N - 1;

    /// Create a new empty log stream.
    pub const fn new() -> Self {
        assert!(N.is_power_of_two(), "Log buffer size must be power of 2");

        Self {
            slots: [EMPTY_SLOT; N],
            write_idx: AtomicU32::new(0),
            read_idx: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
        }
    }

    /// Push a log entry (never blocks).
    ///
    /// Returns `true` if message was queued, `false` if dropped (ring full).
    pub fn push(&self, timestamp_us: i64, level: Level, msg: &[u8]) -> bool {
        let mut write = self.write_idx.load(Ordering::Relaxed);
        loop {
            let read = self.read_idx.load(Ordering::Acquire);
            if write.wrapping_sub(read) >= N as u32 {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            }
            match self.write_idx.compare_exchange_weak(
                write,
                write.wrapping_add(1),
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(current) => write = current,
            }
        }

        let slot = &self.slots[(write as usize) & Self::MASK];

        // SAFETY: The CAS above handed this index to us alone, and the
        // consumer does not touch the slot until `ready` is set.
        unsafe {
            let entry = &mut *slot.entry.get();
            entry.timestamp_us = timestamp_us;
            entry.level = level;
            entry.len = msg.len().min(MAX_MSG_LEN) as u8;
            entry.msg[..entry.len as usize].copy_from_slice(&msg[..entry.len as usize]);
        }
        slot.ready.store(true, Ordering::Release);
        true
    }

    /// Drain next log entry (single consumer).
    ///
    /// Returns `None` if no committed entry is available.
    pub fn drain(&self) -> Option<LogEntry> {
        let read = self.read_idx.load(Ordering::Relaxed);
        let write = self.write_idx.load(Ordering::Acquire);

        if read == write {
            return None;
        }

        let slot = &self.slots[(read as usize) & Self::MASK];
        if !slot.ready.load(Ordering::Acquire) {
            // Reserved but still being written
            return None;
        }

        // SAFETY: `ready` proves the producer finished writing.
        let entry = unsafe { *slot.entry.get() };
        slot.ready.store(false, Ordering::Relaxed);

        self.read_idx.store(read.wrapping_add(1), Ordering::Release);
        Some(entry)
    }

    /// Get count of dropped messages.
    #[inline]
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Reset dropped counter (e.g., after reporting).
    #[inline]
    pub fn reset_dropped(&self) {
        self.dropped.store(0, Ordering::Relaxed);
    }

    #[inline]
    pub fn has_entries(&self) -> bool {
        self.pending() != 0
    }

    /// Entries reserved but not yet drained.
    #[inline]
    pub fn pending(&self) -> u32 {
        let read = self.read_idx.load(Ordering::Relaxed);
        let write = self.write_idx.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }
}

impl<const N: usize> Default for LogStream<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a message into a buffer, truncating at its end.
///
/// Returns the number of bytes written.
#[inline]
pub fn format_to_buffer(buf: &mut [u8], args: core::fmt::Arguments<'_>) -> usize {
    use core::fmt::Write;

    struct BufWriter<'a> {
        buf: &'a mut [u8],
        pos: usize,
    }

    impl<'a> Write for BufWriter<'a> {
        fn write_str(&mut self, s: &str) -> core::fmt::Result {
            let bytes = s.as_bytes();
            let remaining = self.buf.len() - self.pos;
            let to_write = bytes.len().min(remaining);
            self.buf[self.pos..self.pos + to_write].copy_from_slice(&bytes[..to_write]);
            self.pos += to_write;
            Ok(())
        }
    }

    let mut writer = BufWriter { buf, pos: 0 };
    let _ = core::fmt::write(&mut writer, args);
    writer.pos
}

/// Microseconds since the first call.
pub fn uptime_us() -> i64 {
    static ORIGIN: OnceLock<Instant> = OnceLock::new();
    ORIGIN.get_or_init(Instant::now).elapsed().as_micros() as i64
}

/// `log` backend that formats into a [`LogStream`].
pub struct RingLogger {
    stream: &'static LogStream,
    clock: fn() -> i64,
}

impl RingLogger {
    pub const fn new(stream: &'static LogStream, clock: fn() -> i64) -> Self {
        Self { stream, clock }
    }

    pub fn stream(&self) -> &'static LogStream {
        self.stream
    }
}

impl Log for RingLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut buf = [0u8; MAX_MSG_LEN];
        let len = format_to_buffer(&mut buf, format_args!("{}: {}", record.target(), record.args()));
        self.stream.push((self.clock)(), record.level(), &buf[..len]);
    }

    fn flush(&self) {}
}

/// Device-wide log ring.
pub static LOG_STREAM: LogStream = LogStream::new();

/// Device-wide logger writing into [`LOG_STREAM`].
pub static LOGGER: RingLogger = RingLogger::new(&LOG_STREAM, uptime_us);

/// Install [`LOGGER`] as the `log` backend.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
