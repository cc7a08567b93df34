use env_logger::{Builder, Env};
use log::{info, Level, LevelFilter};
use std::io::Write;

pub(crate) const RESET: &str = "\x1B[0m";

// Dependencies that are chatty at info level.
const NOISY_MODULES: [&str; 4] = ["rdkafka", "diesel", "actix_server", "actix_http"];

pub(crate) fn level_colour(level: Level) -> &'static str {
    match level {
        Level::Error => "\x1B[1;31m",
        Level::Warn => "\x1B[1;33m",
        Level::Info => "\x1B[1;32m",
        Level::Debug => "\x1B[1;36m",
        Level::Trace => "\x1B[1;35m",
    }
}

// Coloured logger; `info` unless RUST_LOG says otherwise.
pub fn setup_logger() {
    let overridden = std::env::var("RUST_LOG").is_ok();
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));

    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{}] {}{}{} [{}:{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            level_colour(record.level()),
            record.level(),
            RESET,
            record.file().unwrap_or("unknown"),
            record.line().unwrap_or(0),
            record.args()
        )
    });

    if !overridden {
        for module in NOISY_MODULES {
            builder.filter_module(module, LevelFilter::Warn);
        }
    }

    // A second init (tests) keeps the first logger.
    if builder.try_init().is_ok() {
        info!("Logger initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_and_warnings_get_distinct_colours() {
        assert_ne!(level_colour(Level::Error), level_colour(Level::Warn));
        assert_ne!(level_colour(Level::Warn), level_colour(Level::Info));
    }

    #[test]
    fn repeated_setup_is_harmless() {
        setup_logger();
        setup_logger();
    }
}
