//! Logger.
//!
//! A `log` backend printing timestamped, colored lines. Logs go to stderr so that they never mix
//! with the compiled output written to stdout.

use chrono::{Datelike, Local, Timelike};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
  fn enabled(&self, metadata: &Metadata) -> bool {
    metadata.level() <= log::max_level()
  }

  fn log(&self, record: &Record) {
    if !self.enabled(record.metadata()) {
      return;
    }

    let color = match record.level() {
      Level::Error => 31,
      Level::Warn => 33,
      Level::Info => 34,
      Level::Debug | Level::Trace => 90
    };

    eprintln!("\x1b[90m{} \x1b[{}m> {}\x1b[0m", now(), color, record.args());
  }

  fn flush(&self) {}
}

pub fn now() -> String {
  let t = Local::now();

  format!("{month:0>2}/{day:0>2}/{year} {hour:0>2}:{min:0>2}:{secs:0>2}:{nsecs:0>9}",
          month = t.month(),
          day = t.day(),
          year = t.year(),
          hour = t.hour(),
          min = t.minute(),
          secs = t.second(),
          nsecs = t.nanosecond())
}

/// Install the logger, showing messages up to `level`.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
  log::set_logger(&LOGGER).map(|()| log::set_max_level(level))
}
