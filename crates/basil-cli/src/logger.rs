//! Minimal stderr logger for the `log` facade
//!
//! Level comes from `-v` flags, or from `BASIL_LOG` (`off`, `error`, `warn`,
//! `info`, `debug`, `trace`) when no flag is given. Default is `warn`.

use log::{LevelFilter, Log, Metadata, Record};

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!(
                "[{:<5} {}] {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn level_for(verbose: u8, env: Option<&str>) -> LevelFilter {
    match verbose {
        0 => env
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(LevelFilter::Warn),
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

pub fn init(verbose: u8) {
    let env = std::env::var("BASIL_LOG").ok();
    let level = level_for(verbose, env.as_deref());
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_selection() {
        assert_eq!(level_for(0, None), LevelFilter::Warn);
        assert_eq!(level_for(0, Some("debug")), LevelFilter::Debug);
        assert_eq!(level_for(0, Some("OFF")), LevelFilter::Off);
        assert_eq!(level_for(0, Some("loud")), LevelFilter::Warn);
        assert_eq!(level_for(1, Some("error")), LevelFilter::Info);
        assert_eq!(level_for(5, None), LevelFilter::Trace);
    }
}
