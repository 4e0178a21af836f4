//! Shared helpers for the demo programs

use std::io::Write;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

struct StderrLogger {
    start: Instant,
}

impl Log for StderrLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let elapsed = self.start.elapsed();
        let _ = writeln!(
            std::io::stderr(),
            "[{:>4}.{:06}] {:<5} {}: {}",
            elapsed.as_secs(),
            elapsed.subsec_micros(),
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// Install a stderr logger at `level`
///
/// Only the first call installs; later calls just change the level.
pub fn init_logging(level: LevelFilter) {
    let logger = Box::new(StderrLogger {
        start: Instant::now(),
    });
    let _ = log::set_boxed_logger(logger);
    log::set_max_level(level);
}

/// Map `-v` repetitions onto a level filter
pub fn verbosity(count: u8) -> LevelFilter {
    match count {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}
