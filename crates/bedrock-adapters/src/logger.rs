//! Loggers forwarding to `tracing`.

use bedrock_core::{LogEntry, LogLevel, Logger, VoidResult};
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::{debug, error, info, trace, warn};

/// [`Logger`] that emits every accepted record as a `tracing` event.
///
/// The level set here is applied before `tracing`'s own filter, so a record
/// must pass both to be written. Records carry the logger name in the
/// `logger` field; `Critical` maps to an `ERROR` event with
/// `critical = true`.
#[derive(Debug)]
pub struct TracingLogger {
    name: String,
    level: AtomicU8,
}

impl TracingLogger {
    #[must_use]
    pub fn new(name: impl Into<String>, level: LogLevel) -> Self {
        Self {
            name: name.into(),
            level: AtomicU8::new(level as u8),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn emit(&self, level: LogLevel, message: &str, location: Option<(&str, u32, &str)>) {
        let logger = self.name.as_str();
        let (file, line, function) = location.unwrap_or(("", 0, ""));
        let located = location.is_some();

        match level {
            LogLevel::Trace => {
                trace!(logger, located, file, line, function, "{message}");
            }
            LogLevel::Debug => {
                debug!(logger, located, file, line, function, "{message}");
            }
            LogLevel::Info => {
                info!(logger, located, file, line, function, "{message}");
            }
            LogLevel::Warning => {
                warn!(logger, located, file, line, function, "{message}");
            }
            LogLevel::Error => {
                error!(logger, located, file, line, function, "{message}");
            }
            LogLevel::Critical => {
                error!(logger, critical = true, located, file, line, function, "{message}");
            }
            LogLevel::Off => {}
        }
    }
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new("bedrock", LogLevel::Info)
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) -> VoidResult {
        if self.is_enabled(level) {
            self.emit(level, message, None);
        }
        Ok(())
    }

    fn log_entry(&self, entry: &LogEntry) -> VoidResult {
        if self.is_enabled(entry.level) {
            let location = entry
                .location
                .as_ref()
                .map(|loc| (loc.file.as_str(), loc.line, loc.function.as_str()));
            self.emit(entry.level, &entry.message, location);
        }
        Ok(())
    }

    fn is_enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::Off && level >= self.level()
    }

    fn set_level(&self, level: LogLevel) -> VoidResult {
        self.level.store(level as u8, Ordering::Release);
        Ok(())
    }

    fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.level.load(Ordering::Acquire))
    }

    fn flush(&self) -> VoidResult {
        // fmt subscribers write synchronously
        Ok(())
    }
}

/// [`Logger`] that discards everything. Used when logging is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _level: LogLevel, _message: &str) -> VoidResult {
        Ok(())
    }

    fn log_entry(&self, _entry: &LogEntry) -> VoidResult {
        Ok(())
    }

    fn is_enabled(&self, _level: LogLevel) -> bool {
        false
    }

    fn set_level(&self, _level: LogLevel) -> VoidResult {
        Ok(())
    }

    fn level(&self) -> LogLevel {
        LogLevel::Off
    }

    fn flush(&self) -> VoidResult {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io;
    use std::sync::Arc;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture(f: impl FnOnce()) -> String {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(captured.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        captured.contents()
    }

    #[test]
    fn test_records_below_level_are_dropped() {
        let logger = TracingLogger::new("orders", LogLevel::Warning);
        let output = capture(|| {
            logger.log(LogLevel::Info, "quiet").unwrap();
            logger.log(LogLevel::Error, "loud").unwrap();
        });

        assert!(!output.contains("quiet"));
        assert!(output.contains("loud"));
        assert!(output.contains("logger=\"orders\""));
    }

    #[test]
    fn test_critical_is_flagged() {
        let logger = TracingLogger::default();
        let output = capture(|| logger.log(LogLevel::Critical, "disk full").unwrap());
        assert!(output.contains("ERROR"));
        assert!(output.contains("critical=true"));
    }

    #[test]
    fn test_log_entry_carries_location() {
        let logger = TracingLogger::new("db", LogLevel::Trace);
        let entry = LogEntry::new(LogLevel::Debug, "connected").with_location("db.rs", 42, "connect");
        let output = capture(|| logger.log_entry(&entry).unwrap());

        assert!(output.contains("connected"));
        assert!(output.contains("line=42"));
        assert!(output.contains("function=\"connect\""));
    }

    #[test]
    fn test_set_level() {
        let logger = TracingLogger::default();
        assert!(logger.is_enabled(LogLevel::Info));
        assert!(!logger.is_enabled(LogLevel::Debug));

        logger.set_level(LogLevel::Off).unwrap();
        assert_eq!(logger.level(), LogLevel::Off);
        assert!(!logger.is_enabled(LogLevel::Critical));
        assert!(!logger.is_enabled(LogLevel::Off));
        logger.flush().unwrap();
    }

    #[test]
    fn test_null_logger_accepts_everything() {
        let logger: Arc<dyn Logger> = Arc::new(NullLogger);
        logger.log(LogLevel::Critical, "ignored").unwrap();
        assert!(!logger.is_enabled(LogLevel::Critical));
        assert_eq!(logger.level(), LogLevel::Off);
    }
}
