use crate::errors::DbError;
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::file::FileAppender;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::Path;

const APP_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const RETENTION: u32 = 7;

fn logging_err(e: impl std::fmt::Display) -> DbError {
    DbError::Logging(e.to_string())
}

/// Build the log4rs config: a rolling `bookstore.log` for the root logger, and a
/// non-additive `plp_bookstore::report` logger writing plain report lines to stdout and
/// `report.log`.
///
/// # Errors
/// `Logging` when the directory or an appender cannot be created.
pub fn build_config(dir: &Path, level: LevelFilter) -> Result<Config, DbError> {
    std::fs::create_dir_all(dir).map_err(logging_err)?;
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", dir.join("bookstore.{}.log").display()), RETENTION)
        .map_err(logging_err)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    let app = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(APP_PATTERN)))
        .build(dir.join("bookstore.log"), Box::new(policy))
        .map_err(logging_err)?;
    let report_console = ConsoleAppender::builder()
        .target(Target::Stdout)
        .encoder(Box::new(PatternEncoder::new("{m}{n}")))
        .build();
    let report_file = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S)} {m}{n}")))
        .build(dir.join("report.log"))
        .map_err(logging_err)?;

    Config::builder()
        .appender(Appender::builder().build("app", Box::new(app)))
        .appender(Appender::builder().build("report_console", Box::new(report_console)))
        .appender(Appender::builder().build("report_file", Box::new(report_file)))
        .logger(
            Logger::builder()
                .appender("report_console")
                .appender("report_file")
                .additive(false)
                .build(crate::report::REPORT_TARGET, LevelFilter::Info),
        )
        .build(Root::builder().appender("app").build(level))
        .map_err(logging_err)
}

/// Install the built-in logging setup for the process.
///
/// # Errors
/// `Logging` when the config cannot be built or a logger is already installed.
pub fn configure_logging(dir: &Path, level: LevelFilter) -> Result<(), DbError> {
    let config = build_config(dir, level)?;
    log4rs::init_config(config).map_err(logging_err)?;
    log::debug!("logging to {} at {level}", dir.display());
    Ok(())
}

/// Install logging from a log4rs YAML file instead.
///
/// # Errors
/// `Logging` when the file cannot be loaded or a logger is already installed.
pub fn init_path(path: &Path) -> Result<(), DbError> {
    log4rs::init_file(path, log4rs::config::Deserializers::default()).map_err(logging_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builds_in_a_fresh_directory() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let cfg = build_config(&logs, LevelFilter::Debug).unwrap();
        assert_eq!(cfg.root().level(), LevelFilter::Debug);
        assert!(cfg.loggers().iter().any(|l| l.name() == crate::report::REPORT_TARGET));
        assert!(logs.is_dir());
    }
}
