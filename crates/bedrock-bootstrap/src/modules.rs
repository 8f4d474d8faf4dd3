//! Built-in modules wiring the bundled adapters.

use bedrock_adapters::{ExecutorConfig, InMemoryMonitor, TokioExecutor, TracingLogger, DEFAULT_MAX_SAMPLES};
use bedrock_config::Capability;
use bedrock_core::{Executor, LogLevel, Logger, Monitor, ResultExt, VoidResult};
use std::sync::Arc;
use tracing::debug;

use crate::module::{BootstrapContext, ServiceModule, Tier};

/// Registers a [`TracingLogger`] as `dyn Logger`; flushes it at shutdown.
#[derive(Debug, Clone)]
pub struct LoggingModule {
    level: LogLevel,
}

impl LoggingModule {
    #[must_use]
    pub const fn new(level: LogLevel) -> Self {
        Self { level }
    }
}

impl Default for LoggingModule {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}

impl ServiceModule for LoggingModule {
    fn name(&self) -> &str {
        "logging"
    }

    fn tier(&self) -> Tier {
        Tier::Service
    }

    fn capability(&self) -> Option<Capability> {
        Some(Capability::Logging)
    }

    fn register(&self, context: &mut BootstrapContext<'_>) -> VoidResult {
        let logger = Arc::new(TracingLogger::new(
            context.options().telemetry.service_name.clone(),
            self.level,
        ));
        context.services().register_instance::<dyn Logger>(logger.clone())?;
        context.add_shutdown_hook("logging.flush", move |_| {
            let _ = logger.flush().log_err("flushing logger at shutdown");
        })
    }
}

/// Registers an [`InMemoryMonitor`] as `dyn Monitor`.
#[derive(Debug, Clone)]
pub struct MonitoringModule {
    max_samples: usize,
}

impl MonitoringModule {
    #[must_use]
    pub const fn with_capacity(max_samples: usize) -> Self {
        Self { max_samples }
    }
}

impl Default for MonitoringModule {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_SAMPLES)
    }
}

impl ServiceModule for MonitoringModule {
    fn name(&self) -> &str {
        "monitoring"
    }

    fn tier(&self) -> Tier {
        Tier::Service
    }

    fn capability(&self) -> Option<Capability> {
        Some(Capability::Monitoring)
    }

    fn register(&self, context: &mut BootstrapContext<'_>) -> VoidResult {
        let source = context.options().telemetry.service_name.clone();
        let max_samples = self.max_samples;
        context
            .services()
            .register_singleton::<dyn Monitor, _>(move |_| {
                Ok(Arc::new(InMemoryMonitor::with_capacity(source.clone(), max_samples)) as Arc<dyn Monitor>)
            })
    }
}

/// Starts a [`TokioExecutor`] registered as `dyn Executor`; stops it at
/// shutdown, letting started tasks finish.
#[derive(Debug, Clone, Default)]
pub struct ExecutorModule {
    config: ExecutorConfig,
}

impl ExecutorModule {
    #[must_use]
    pub const fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }
}

impl ServiceModule for ExecutorModule {
    fn name(&self) -> &str {
        "executor"
    }

    fn tier(&self) -> Tier {
        Tier::Core
    }

    fn register(&self, context: &mut BootstrapContext<'_>) -> VoidResult {
        let executor = Arc::new(TokioExecutor::new(self.config.clone())?);
        let limit = self.config.shutdown_timeout();
        context.services().register_instance::<dyn Executor>(executor.clone())?;
        context.add_shutdown_hook("executor.shutdown", move |remaining| {
            debug!(
                pending = executor.pending_tasks(),
                remaining_ms = remaining.as_millis(),
                "Stopping executor"
            );
            executor.shutdown_within(remaining.min(limit));
        })
    }
}
