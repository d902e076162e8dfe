use std::env;
use std::str::FromStr;
use std::sync::Mutex;

use slog::{Drain, Fuse, Level, LevelFilter};
use slog_async::Async;
use slog_json::Json;

pub use slog::{debug, error, info, o, trace, warn, Logger};

/// The variable holding the minimum level to emit, e.g. `debug`.
pub const LEVEL_VARIABLE: &str = "BACKEND_LOG_LEVEL";

const DEFAULT_LEVEL: Level = Level::Info;

/// Builds the root logger: JSON lines on stderr, written from a
/// background thread, tagged with the build metadata.
pub fn initialize_logger() -> Logger {
    let level = env::var(LEVEL_VARIABLE)
        .ok()
        .and_then(|l| Level::from_str(l.trim()).ok())
        .unwrap_or(DEFAULT_LEVEL);

    let drain = Mutex::new(Json::default(std::io::stderr())).map(Fuse);

    #[cfg(feature = "env_logging")]
    let drain = slog_envlogger::new(drain);

    let drain = LevelFilter::new(drain, level).fuse();
    let drain = Async::new(drain).build().fuse();

    Logger::root(
        drain,
        o!(
            "version" => info::VERSION,
            "revision" => info::REVISION,
            "build_timestamp" => info::BUILD_TIMESTAMP
        ),
    )
}

/// A logger that drops everything. Used by tests and tools that must
/// stay quiet.
pub fn discard() -> Logger {
    Logger::root(slog::Discard, o!())
}
