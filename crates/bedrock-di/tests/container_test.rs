//! Integration tests for wiring capability implementations through the
//! service container.

use bedrock_core::codes::common;
use bedrock_core::{Interface, LogEntry, LogLevel, Logger, Result, VoidResult};
use bedrock_di::{ServiceContainer, ServiceLifetime};
use parking_lot::Mutex;
use shaku::{module, Component};
use std::sync::Arc;
use std::thread;

/// In-memory logger used as a test double.
#[derive(Default)]
struct RecordingLogger {
    lines: Mutex<Vec<String>>,
    level: Mutex<Option<LogLevel>>,
}

impl Logger for RecordingLogger {
    fn log(&self, level: LogLevel, message: &str) -> VoidResult {
        self.lines.lock().push(format!("{level} {message}"));
        Ok(())
    }

    fn log_entry(&self, entry: &LogEntry) -> VoidResult {
        self.log(entry.level, &entry.message)
    }

    fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.level()
    }

    fn set_level(&self, level: LogLevel) -> VoidResult {
        *self.level.lock() = Some(level);
        Ok(())
    }

    fn level(&self) -> LogLevel {
        self.level.lock().unwrap_or(LogLevel::Info)
    }

    fn flush(&self) -> VoidResult {
        Ok(())
    }
}

trait OrderService: Interface {
    fn place(&self, item: &str) -> Result<u32>;
}

struct LoggingOrderService {
    logger: Arc<dyn Logger>,
}

impl OrderService for LoggingOrderService {
    fn place(&self, item: &str) -> Result<u32> {
        self.logger.log(LogLevel::Info, &format!("order placed: {item}"))?;
        Ok(1)
    }
}

trait Clock: Interface {
    fn now(&self) -> u64;
}

#[derive(Component)]
#[shaku(interface = Clock)]
struct FixedClock {
    #[shaku(default = 1_700_000_000)]
    epoch: u64,
}

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.epoch
    }
}

module! {
    ClockModule {
        components = [FixedClock],
        providers = [],
    }
}

#[test]
fn test_consumer_wired_through_capability_interface() {
    let container = ServiceContainer::new();
    let recorder = Arc::new(RecordingLogger::default());
    container.register_instance::<dyn Logger>(recorder.clone()).unwrap();
    container
        .register_singleton::<dyn OrderService, _>(|c| {
            Ok(Arc::new(LoggingOrderService {
                logger: c.resolve::<dyn Logger>()?,
            }))
        })
        .unwrap();

    let orders = container.resolve::<dyn OrderService>().unwrap();
    assert_eq!(orders.place("widget").unwrap(), 1);
    assert_eq!(recorder.lines.lock().as_slice(), ["INFO order placed: widget"]);
}

#[test]
fn test_missing_dependency_surfaces_from_factory() {
    let container = ServiceContainer::new();
    container
        .register_singleton::<dyn OrderService, _>(|c| {
            Ok(Arc::new(LoggingOrderService {
                logger: c.resolve::<dyn Logger>()?,
            }))
        })
        .unwrap();

    let err = container.resolve::<dyn OrderService>().err().unwrap();
    assert_eq!(err.code(), common::SERVICE_NOT_REGISTERED);
    assert!(err.message().contains("Logger"));
}

#[test]
fn test_shaku_module_components_are_published() {
    let module = ClockModule::builder().build();
    let container = ServiceContainer::new();
    container.register_module_component::<dyn Clock, _>(&module).unwrap();

    let clock = container.resolve::<dyn Clock>().unwrap();
    assert_eq!(clock.now(), 1_700_000_000);
    let descriptors = container.registered_services();
    assert_eq!(descriptors[0].lifetime, ServiceLifetime::Instance);
}

#[test]
fn test_resolution_from_many_threads_during_registration() {
    let container = Arc::new(ServiceContainer::new());
    container
        .register_singleton::<dyn Logger, _>(|_| Ok(Arc::new(RecordingLogger::default())))
        .unwrap();

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let container = Arc::clone(&container);
            thread::spawn(move || {
                for _ in 0..200 {
                    let logger = container.resolve::<dyn Logger>().unwrap();
                    logger.log(LogLevel::Debug, "tick").unwrap();
                }
            })
        })
        .collect();

    for i in 0..50 {
        container
            .register_named_instance::<dyn Logger>(&format!("extra-{i}"), Arc::new(RecordingLogger::default()))
            .unwrap();
    }

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(container.len(), 51);
}

#[test]
fn test_clear_after_shutdown_style_freeze() {
    let container = ServiceContainer::new();
    container
        .register_singleton::<dyn Logger, _>(|_| Ok(Arc::new(RecordingLogger::default())))
        .unwrap();
    let logger = container.resolve::<dyn Logger>().unwrap();
    container.freeze();
    container.clear();

    assert!(container.try_resolve::<dyn Logger>().is_none());
    assert!(logger.log(LogLevel::Info, "still usable").is_ok());
    assert_eq!(
        container
            .register_instance::<dyn Logger>(Arc::new(RecordingLogger::default()))
            .unwrap_err()
            .code(),
        common::REGISTRY_FROZEN
    );
}
