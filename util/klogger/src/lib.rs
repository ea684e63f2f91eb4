// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! A `log` backend that writes `[time target:line] message` lines to stderr.
//!
//! Lines are serialized through a spin lock so records from concurrent
//! threads never interleave. With the `color` feature each message is tinted
//! by level.

extern crate log;

use core::{
    fmt::{self, Write},
    str::FromStr,
};
use std::io::Write as _;

use log::{Level, LevelFilter, Log, Metadata, Record};
pub use log::{debug, error, info, trace, warn};
use spin::Mutex;

#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => {
        let _ = $crate::print_fmt(format_args!($($arg)*));
    }
}

#[macro_export]
macro_rules! kprintln {
    () => { $crate::kprint!("\n") };
    ($($arg:tt)*) => {
        let _ = $crate::print_fmt(format_args!("{}\n", format_args!($($arg)*)));
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "color")] {
        macro_rules! color_fmt {
            ($color_code:expr, $($arg:tt)*) => {
                format_args!("\u{1B}[{}m{}\u{1B}[m", $color_code as u8, format_args!($($arg)*))
            };
        }
    } else {
        macro_rules! color_fmt {
            ($color_code:expr, $($arg:tt)*) => {
                format_args!($($arg)*)
            };
        }
    }
}

#[repr(u8)]
#[allow(dead_code)]
enum AnsiColor {
    Red         = 31,
    Green       = 32,
    Yellow      = 33,
    Cyan        = 36,
    White       = 37,
    BrightBlack = 90,
}

impl From<Level> for AnsiColor {
    fn from(level: Level) -> Self {
        match level {
            Level::Error => AnsiColor::Red,
            Level::Warn => AnsiColor::Yellow,
            Level::Info => AnsiColor::Green,
            Level::Debug => AnsiColor::Cyan,
            Level::Trace => AnsiColor::BrightBlack,
        }
    }
}

struct KernelLogger;

impl Write for KernelLogger {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        std::io::stderr()
            .lock()
            .write_all(s.as_bytes())
            .map_err(|_| fmt::Error)
    }
}

impl Log for KernelLogger {
    #[inline]
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = record.line().unwrap_or(0);
        let path = record.target();

        let _ = print_fmt(color_fmt!(
            AnsiColor::White,
            "[{time} {path}:{line}] {args}\n",
            time = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.6f"),
            path = path,
            line = line,
            args = color_fmt!(AnsiColor::from(record.level()), "{}", record.args()),
        ));
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOCK: Mutex<()> = Mutex::new(());

/// Writes preformatted output under the logger's lock.
pub fn print_fmt(args: fmt::Arguments) -> fmt::Result {
    let _guard = LOCK.lock();
    KernelLogger.write_fmt(args)
}

/// Installs the logger with a `Warn` ceiling.
///
/// Returns `false` if some logger was already installed; the level is left
/// alone in that case.
pub fn init_klogger() -> bool {
    if log::set_logger(&KernelLogger).is_err() {
        return false;
    }
    log::set_max_level(LevelFilter::Warn);
    true
}

/// Sets the ceiling from a level name; unknown names turn logging off.
pub fn set_log_level(level: &str) {
    log::set_max_level(parse_level(level));
}

/// Installs the logger and takes the level from environment variable `var`,
/// falling back to `Warn` when it is unset.
pub fn init_from_env(var: &str) -> bool {
    let installed = init_klogger();
    if let Ok(level) = std::env::var(var) {
        set_log_level(&level);
    }
    installed
}

fn parse_level(level: &str) -> LevelFilter {
    LevelFilter::from_str(level.trim())
        .ok()
        .unwrap_or(LevelFilter::Off)
}
