use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

pub fn level_for(verbose: bool, quiet: bool) -> LevelFilter {
    match (verbose, quiet) {
        (true, _) => LevelFilter::Debug,
        (false, true) => LevelFilter::Warn,
        (false, false) => LevelFilter::Info,
    }
}

/// Logs to stderr with local-time RFC 3339 timestamps, so stdout carries only
/// the report.
pub fn init_logging(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    let mut builder = ConfigBuilder::new();
    // Falls back to UTC when the local offset cannot be determined.
    let builder = match builder.set_time_offset_to_local() {
        Ok(b) | Err(b) => b,
    };
    let config = builder
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .build();
    TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for() {
        assert_eq!(level_for(false, false), LevelFilter::Info);
        assert_eq!(level_for(true, false), LevelFilter::Debug);
        assert_eq!(level_for(false, true), LevelFilter::Warn);
    }
}
