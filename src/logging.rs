// this_file: src/logging.rs
//! Logger setup and operation timing

use env_logger::Builder;
use log::{Level, LevelFilter};
use std::io::Write;
use std::time::Instant;

#[cfg(debug_assertions)]
pub fn default_level() -> &'static str {
    "debug"
}

#[cfg(not(debug_assertions))]
pub fn default_level() -> &'static str {
    "info"
}

/// Map a level name to a filter. Unknown names yield `None`.
pub fn parse_level(level: &str) -> Option<LevelFilter> {
    match level.to_lowercase().as_str() {
        "trace" => Some(LevelFilter::Trace),
        "debug" => Some(LevelFilter::Debug),
        "info" => Some(LevelFilter::Info),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "error" => Some(LevelFilter::Error),
        "off" => Some(LevelFilter::Off),
        _ => None,
    }
}

/// Install the process-wide logger writing to stderr.
///
/// `RUST_LOG` directives, when set, refine the base level. Calling this twice
/// is harmless; the second logger is discarded.
pub fn init_logging(level: &str, quiet: bool, timestamps: bool) {
    let level_filter = if quiet {
        LevelFilter::Error
    } else {
        parse_level(level).unwrap_or_else(|| {
            eprintln!("Invalid log level '{}', using 'info'", level);
            LevelFilter::Info
        })
    };

    let mut builder = Builder::new();
    builder.filter_level(level_filter);
    builder.format(move |buf, record| {
        let color = match record.level() {
            Level::Error => "\x1b[31m",
            Level::Warn => "\x1b[33m",
            Level::Info => "\x1b[32m",
            Level::Debug => "\x1b[34m",
            Level::Trace => "\x1b[35m",
        };
        let reset = "\x1b[0m";
        if timestamps {
            write!(buf, "{} ", buf.timestamp_millis())?;
        }
        writeln!(
            buf,
            "{}{:5}{} [{}] {}",
            color,
            record.level(),
            reset,
            record.target(),
            record.args()
        )
    });

    if let Ok(rust_log) = std::env::var("RUST_LOG") {
        builder.parse_filters(&rust_log);
    }

    // Tests and embedders may have installed a logger already.
    let _ = builder.try_init();
}

/// Logs how long a named operation took when dropped.
pub struct Timer {
    name: String,
    start: Instant,
}

impl Timer {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        log::trace!("Starting: {}", name);
        Self {
            name,
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    pub fn log_elapsed(&self, level: Level) {
        log::log!(level, "{} completed in {:.3}ms", self.name, self.elapsed_ms());
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.log_elapsed(Level::Debug);
    }
}
