//! Leveled diagnostic output for early boot.
//!
//! The boot crates never write to a device themselves. They format a
//! message and hand it to whatever sink the platform registered with
//! [`set_log_fn`] (early serial, a framebuffer console, a test recorder).
//! Until a sink is registered every message is dropped.
//!
//! Messages are emitted through [`kerr!`], [`kwarn!`], [`kinfo!`] and
//! [`kdebug!`], which all funnel into [`klog!`].

use core::fmt;
use core::sync::atomic::{AtomicPtr, AtomicU8, Ordering};

/// Severity of a log message. Lower values are more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    /// Something failed; the boot continues on a fallback path.
    Error = 0,
    /// Unusual firmware data that is still legal.
    Warn = 1,
    /// High-level progress.
    Info = 2,
    /// Per-entry detail.
    Debug = 3,
}

impl LogLevel {
    /// Fixed-width tag for aligned console output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN ",
            Self::Info => "INFO ",
            Self::Debug => "DEBUG",
        }
    }

    const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Error,
            1 => Self::Warn,
            2 => Self::Info,
            _ => Self::Debug,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name().trim_end())
    }
}

/// Signature of the platform log sink.
pub type LogFn = fn(LogLevel, fmt::Arguments<'_>);

fn discard(_level: LogLevel, _args: fmt::Arguments<'_>) {}

static LOG_FN: AtomicPtr<()> = AtomicPtr::new(discard as *mut ());
static MAX_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Debug as u8);

/// Installs the platform log sink.
///
/// # Safety
///
/// `f` must be callable from any boot context, including before interrupts
/// and paging are fully set up. The sink may be replaced later (early
/// serial first, the full console afterwards).
pub unsafe fn set_log_fn(f: LogFn) {
    LOG_FN.store(f as *mut (), Ordering::Release);
}

/// Drops every message less severe than `level`.
pub fn set_max_level(level: LogLevel) {
    MAX_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Returns the least severe level that is still forwarded to the sink.
#[must_use]
pub fn max_level() -> LogLevel {
    LogLevel::from_raw(MAX_LEVEL.load(Ordering::Relaxed))
}

#[inline]
fn sink() -> LogFn {
    let ptr = LOG_FN.load(Ordering::Acquire);
    // SAFETY: LOG_FN only ever holds `discard` or a pointer stored by
    // `set_log_fn`, both of which are valid `LogFn`s.
    unsafe { core::mem::transmute::<*mut (), LogFn>(ptr) }
}

/// Backend of [`klog!`]. Not public API.
#[doc(hidden)]
pub fn _log(level: LogLevel, args: fmt::Arguments<'_>) {
    if level <= max_level() {
        sink()(level, args);
    }
}

/// Logs a message at an explicit level.
#[macro_export]
macro_rules! klog {
    ($level:expr, $($arg:tt)*) => {
        $crate::log::_log($level, format_args!($($arg)*))
    };
}

/// Logs an error-level message.
#[macro_export]
macro_rules! kerr {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Error, $($arg)*) };
}

/// Logs a warning-level message.
#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Warn, $($arg)*) };
}

/// Logs an info-level message.
#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Info, $($arg)*) };
}

/// Logs a debug-level message.
#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => { $crate::klog!($crate::log::LogLevel::Debug, $($arg)*) };
}
