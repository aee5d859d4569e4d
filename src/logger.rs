//! Leveled logging for the scheduler core.
//!
//! Messages go through [`log`], which filters against a global maximum level
//! and hands the formatted line to the installed [`LogSink`]. [`init`]
//! installs the COM1 sink; a hosting kernel may replace it with its own
//! console through [`set_sink`].

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use spin::Mutex;
use uart_16550::SerialPort;

static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::INFO.priority());
static SINK: Mutex<Option<LogSink>> = Mutex::new(None);
static COM1: Mutex<Option<SerialPort>> = Mutex::new(None);

const COM1_BASE: u16 = 0x3F8;

/// Destination for formatted log lines.
pub type LogSink = fn(LogLevel, fmt::Arguments<'_>);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    FATAL,
    ERROR,
    WARN,
    INFO,
    DEBUG,
    TRACE,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            LogLevel::FATAL => "FATAL",
            LogLevel::ERROR => "ERROR",
            LogLevel::WARN => "WARN",
            LogLevel::INFO => "INFO",
            LogLevel::DEBUG => "DEBUG",
            LogLevel::TRACE => "TRACE",
        }
    }

    fn serial_color(self) -> &'static str {
        match self {
            LogLevel::FATAL => "\x1b[1;37;41m",
            LogLevel::ERROR => "\x1b[1;31m",
            LogLevel::WARN => "\x1b[33m",
            LogLevel::INFO => "\x1b[32m",
            LogLevel::DEBUG => "\x1b[36m",
            LogLevel::TRACE => "\x1b[90m",
        }
    }

    pub const fn priority(self) -> u8 {
        match self {
            LogLevel::FATAL => 0,
            LogLevel::ERROR => 1,
            LogLevel::WARN => 2,
            LogLevel::INFO => 3,
            LogLevel::DEBUG => 4,
            LogLevel::TRACE => 5,
        }
    }

    pub fn from_priority(value: u8) -> Self {
        match value {
            0 => LogLevel::FATAL,
            1 => LogLevel::ERROR,
            2 => LogLevel::WARN,
            3 => LogLevel::INFO,
            4 => LogLevel::DEBUG,
            _ => LogLevel::TRACE,
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("fatal") {
            Some(LogLevel::FATAL)
        } else if value.eq_ignore_ascii_case("error") {
            Some(LogLevel::ERROR)
        } else if value.eq_ignore_ascii_case("warn") || value.eq_ignore_ascii_case("warning") {
            Some(LogLevel::WARN)
        } else if value.eq_ignore_ascii_case("info") {
            Some(LogLevel::INFO)
        } else if value.eq_ignore_ascii_case("debug") {
            Some(LogLevel::DEBUG)
        } else if value.eq_ignore_ascii_case("trace") {
            Some(LogLevel::TRACE)
        } else {
            None
        }
    }
}

/// Installs the COM1 sink. Only valid on bare metal where port I/O is allowed.
pub fn init() {
    if LOGGER_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return;
    }

    {
        let mut port = unsafe { SerialPort::new(COM1_BASE) };
        port.init();
        *COM1.lock() = Some(port);
    }
    set_sink(Some(emit_serial_line));
}

pub fn set_sink(sink: Option<LogSink>) {
    *SINK.lock() = sink;
}

pub fn log(level: LogLevel, args: fmt::Arguments<'_>) {
    if !is_enabled(level) {
        return;
    }

    // Copy the sink out so a sink that logs does not deadlock.
    let sink = *SINK.lock();
    if let Some(sink) = sink {
        sink(level, args);
    }
}

pub fn is_enabled(level: LogLevel) -> bool {
    level.priority() <= LOG_LEVEL.load(Ordering::Relaxed)
}

pub fn set_max_level(level: LogLevel) {
    LOG_LEVEL.store(level.priority(), Ordering::Relaxed);
}

pub fn max_level() -> LogLevel {
    LogLevel::from_priority(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Finds a `log=` or `loglevel=` token. `loglevel` also takes a digit.
pub fn parse_level_directive(cmdline: &str) -> Option<LogLevel> {
    for token in cmdline.split_whitespace() {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        if key.eq_ignore_ascii_case("log") {
            if let Some(level) = LogLevel::from_str(value) {
                return Some(level);
            }
        } else if key.eq_ignore_ascii_case("loglevel") {
            if let Some(level) = LogLevel::from_str(value) {
                return Some(level);
            }
            if let Ok(digit) = value.parse::<u8>() {
                return Some(LogLevel::from_priority(digit));
            }
        }
    }
    None
}

fn emit_serial_line(level: LogLevel, args: fmt::Arguments<'_>) {
    use core::fmt::Write;

    let mut guard = COM1.lock();
    if let Some(port) = guard.as_mut() {
        let _ = write!(
            port,
            "{color}[{level:<5}] sched: {message}\x1b[0m\n",
            color = level.serial_color(),
            level = LevelDisplay(level),
            message = args,
        );
    }
}

pub struct LevelDisplay(pub LogLevel);

impl fmt::Display for LevelDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.0.as_str())
    }
}
