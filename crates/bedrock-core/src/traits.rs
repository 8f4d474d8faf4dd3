//! Capability interfaces shared across the ecosystem.
//!
//! Each trait is the contract a concrete module (thread pool, logger,
//! metric collector, database driver) implements so that other modules can
//! consume it through the service container without a compile-time
//! dependency on the implementation. All of them are `shaku::Interface`,
//! which means `Any + Send + Sync`; consumers hold `Arc<dyn Trait>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shaku::Interface;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::mpsc;
use std::time::Duration;

use crate::codes::common;
use crate::{ErrorInfo, Result, VoidResult};

// ============================================================================
// Executor
// ============================================================================

/// Unit of work accepted by an [`Executor`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Creates a connected completer/handle pair for one submitted task.
#[must_use]
pub fn task_channel() -> (TaskCompleter, TaskHandle) {
    let (sender, receiver) = mpsc::sync_channel(1);
    (TaskCompleter { sender }, TaskHandle { receiver })
}

/// Executor side of a submitted task.
///
/// Dropping it without calling [`complete`](Self::complete) reports the task
/// as cancelled to the waiting handle.
#[derive(Debug)]
pub struct TaskCompleter {
    sender: mpsc::SyncSender<VoidResult>,
}

impl TaskCompleter {
    /// Publishes the task outcome. A handle that was already dropped is ignored.
    pub fn complete(self, outcome: VoidResult) {
        let _ = self.sender.send(outcome);
    }
}

/// Caller side of a submitted task.
#[derive(Debug)]
pub struct TaskHandle {
    receiver: mpsc::Receiver<VoidResult>,
}

impl TaskHandle {
    /// Blocks until the task has finished.
    ///
    /// # Errors
    ///
    /// The task's own outcome (`INTERNAL_ERROR` if it panicked), or
    /// `CANCELLED` if the executor dropped the task.
    pub fn wait(self) -> VoidResult {
        self.receiver.recv().unwrap_or_else(|_| Err(cancelled()))
    }

    /// Blocks for at most `timeout`.
    ///
    /// # Errors
    ///
    /// `TIMEOUT` if the task is still running when the timeout expires,
    /// otherwise as [`wait`](Self::wait).
    pub fn wait_timeout(self, timeout: Duration) -> VoidResult {
        match self.receiver.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(ErrorInfo::timeout(
                format!("task did not finish within {timeout:?}"),
                "executor",
            )),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(cancelled()),
        }
    }
}

fn cancelled() -> ErrorInfo {
    ErrorInfo::new(common::CANCELLED, "task was dropped before completion", "executor")
}

/// Runs tasks on worker threads.
///
/// Implementations are safe for concurrent use from any thread.
pub trait Executor: Interface {
    /// Queues `task` for execution.
    ///
    /// # Errors
    ///
    /// Fails if the executor is shut down or its queue is full.
    fn submit(&self, task: Task) -> Result<TaskHandle>;

    /// Queues `task` to run after `delay`.
    ///
    /// # Errors
    ///
    /// Same as [`submit`](Self::submit).
    fn submit_delayed(&self, task: Task, delay: Duration) -> Result<TaskHandle>;

    /// Number of worker threads.
    fn worker_count(&self) -> usize;

    /// Whether the executor still accepts tasks.
    fn is_running(&self) -> bool;

    /// Tasks submitted but not yet finished.
    fn pending_tasks(&self) -> usize;

    /// Stops the executor. With `wait_for_completion` the call blocks until
    /// queued tasks have finished.
    fn shutdown(&self, wait_for_completion: bool);
}

// ============================================================================
// Logger
// ============================================================================

/// Severity of a log record, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warning = 3,
    Error = 4,
    Critical = 5,
    Off = 6,
}

impl LogLevel {
    /// All levels in ascending order.
    pub const ALL: [LogLevel; 7] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Critical,
        LogLevel::Off,
    ];

    /// Upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
            Self::Off => "OFF",
        }
    }

    /// Inverse of `self as u8`. Out-of-range values clamp to `Off`.
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Trace,
            1 => Self::Debug,
            2 => Self::Info,
            3 => Self::Warning,
            4 => Self::Error,
            5 => Self::Critical,
            _ => Self::Off,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ErrorInfo;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Self::Trace),
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARNING" | "WARN" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            "CRITICAL" | "FATAL" => Ok(Self::Critical),
            "OFF" => Ok(Self::Off),
            _ => Err(ErrorInfo::invalid_argument(format!("unknown log level '{s}'"), "logger")),
        }
    }
}

/// Where a log record was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub function: String,
}

/// A structured log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub location: Option<SourceLocation>,
}

impl LogEntry {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
            location: None,
        }
    }

    /// Attaches a source location.
    #[must_use]
    pub fn with_location(mut self, file: impl Into<String>, line: u32, function: impl Into<String>) -> Self {
        self.location = Some(SourceLocation {
            file: file.into(),
            line,
            function: function.into(),
        });
        self
    }
}

/// Log sink.
///
/// Implementations are safe for concurrent use; records from different
/// threads may interleave but are never torn.
pub trait Logger: Interface {
    /// Logs `message` at `level`.
    ///
    /// # Errors
    ///
    /// Fails if the underlying writer cannot accept the record.
    fn log(&self, level: LogLevel, message: &str) -> VoidResult;

    /// Logs a structured entry.
    ///
    /// # Errors
    ///
    /// Fails if the underlying writer cannot accept the record.
    fn log_entry(&self, entry: &LogEntry) -> VoidResult;

    /// Whether records at `level` would be emitted.
    fn is_enabled(&self, level: LogLevel) -> bool;

    /// Changes the minimum level.
    ///
    /// # Errors
    ///
    /// Fails if the implementation does not support changing levels.
    fn set_level(&self, level: LogLevel) -> VoidResult;

    /// Current minimum level.
    fn level(&self) -> LogLevel;

    /// Flushes buffered records.
    ///
    /// # Errors
    ///
    /// Fails if the writer cannot be flushed.
    fn flush(&self) -> VoidResult;
}

// ============================================================================
// Monitor
// ============================================================================

/// Kind of metric being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    #[default]
    Gauge,
    Counter,
    Histogram,
    Summary,
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gauge => "gauge",
            Self::Counter => "counter",
            Self::Histogram => "histogram",
            Self::Summary => "summary",
        })
    }
}

impl FromStr for MetricType {
    type Err = ErrorInfo;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gauge" => Ok(Self::Gauge),
            "counter" => Ok(Self::Counter),
            "histogram" => Ok(Self::Histogram),
            "summary" => Ok(Self::Summary),
            _ => Err(ErrorInfo::new(
                crate::codes::monitoring::INVALID_METRIC_TYPE,
                format!("unknown metric type '{s}'"),
                "monitoring",
            )),
        }
    }
}

/// A single recorded metric sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub name: String,
    pub value: f64,
    pub metric_type: MetricType,
    pub timestamp: DateTime<Utc>,
    pub tags: BTreeMap<String, String>,
}

impl MetricValue {
    /// Creates a gauge sample stamped with the current time.
    #[must_use]
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            metric_type: MetricType::Gauge,
            timestamp: Utc::now(),
            tags: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_type(mut self, metric_type: MetricType) -> Self {
        self.metric_type = metric_type;
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Point-in-time copy of every recorded metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub metrics: Vec<MetricValue>,
    pub captured_at: DateTime<Utc>,
    pub source_id: String,
}

impl MetricsSnapshot {
    #[must_use]
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            metrics: Vec::new(),
            captured_at: Utc::now(),
            source_id: source_id.into(),
        }
    }

    pub fn add_metric(&mut self, metric: MetricValue) {
        self.metrics.push(metric);
    }

    /// Latest sample recorded under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.metrics.iter().rev().find(|metric| metric.name == name)
    }
}

/// Coarse health of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    #[default]
    Unknown,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
            Self::Unknown => "unknown",
        })
    }
}

/// Outcome of a health check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub message: String,
    pub checked_at: DateTime<Utc>,
    pub check_duration: Duration,
    pub metadata: BTreeMap<String, String>,
}

impl HealthCheckResult {
    #[must_use]
    pub fn new(status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            checked_at: Utc::now(),
            check_duration: Duration::ZERO,
            metadata: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn healthy(message: impl Into<String>) -> Self {
        Self::new(HealthStatus::Healthy, message)
    }

    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    /// Healthy or degraded.
    #[must_use]
    pub fn is_operational(&self) -> bool {
        matches!(self.status, HealthStatus::Healthy | HealthStatus::Degraded)
    }
}

/// Metric collector and health reporter.
///
/// Implementations are safe for concurrent use.
pub trait Monitor: Interface {
    /// Records a gauge sample.
    ///
    /// # Errors
    ///
    /// Fails if the metric store is full or unavailable.
    fn record_metric(&self, name: &str, value: f64) -> VoidResult;

    /// Records a sample with tags.
    ///
    /// # Errors
    ///
    /// Fails if the metric store is full or unavailable.
    fn record_metric_with_tags(&self, name: &str, value: f64, tags: &BTreeMap<String, String>) -> VoidResult;

    /// Copies every recorded metric.
    ///
    /// # Errors
    ///
    /// Fails if metrics cannot be collected.
    fn metrics(&self) -> Result<MetricsSnapshot>;

    /// Runs the health check.
    ///
    /// # Errors
    ///
    /// Fails if the check itself cannot run.
    fn check_health(&self) -> Result<HealthCheckResult>;

    /// Drops all recorded metrics.
    ///
    /// # Errors
    ///
    /// Fails if the store cannot be reset.
    fn reset(&self) -> VoidResult;
}

// ============================================================================
// Database
// ============================================================================

/// A single column value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DatabaseValue {
    #[default]
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
    Bool(bool),
}

impl DatabaseValue {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for DatabaseValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// One result row, keyed by column name.
pub type DatabaseRow = BTreeMap<String, DatabaseValue>;

/// Rows returned by a query.
pub type QueryResult = Vec<DatabaseRow>;

/// Database connection.
///
/// Connection, query and command methods are safe to call concurrently.
/// Transactions are single-writer: `begin_transaction`, the statements in
/// the transaction, and the closing `commit`/`rollback` must come from one
/// caller at a time. Interleaving transactions from several threads on one
/// connection is undefined at the driver level.
pub trait Database: Interface {
    /// Opens a connection.
    ///
    /// # Errors
    ///
    /// `CONNECTION_FAILED` or `INVALID_CONNECTION_STRING`.
    fn connect(&self, connection_string: &str) -> VoidResult;

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Fails if the driver cannot close cleanly.
    fn disconnect(&self) -> VoidResult;

    /// Whether a connection is open.
    fn is_connected(&self) -> bool;

    /// Runs a statement that returns rows.
    ///
    /// # Errors
    ///
    /// `QUERY_FAILED` and friends.
    fn execute_query(&self, query: &str) -> Result<QueryResult>;

    /// Runs a statement and returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// `QUERY_FAILED` and friends.
    fn execute_command(&self, command: &str) -> Result<u64>;

    /// Starts a transaction.
    ///
    /// # Errors
    ///
    /// `TRANSACTION_FAILED` if one is already active.
    fn begin_transaction(&self) -> VoidResult;

    /// Commits the active transaction.
    ///
    /// # Errors
    ///
    /// `NO_ACTIVE_TRANSACTION` if none is active.
    fn commit(&self) -> VoidResult;

    /// Rolls back the active transaction.
    ///
    /// # Errors
    ///
    /// `NO_ACTIVE_TRANSACTION` if none is active.
    fn rollback(&self) -> VoidResult;
}
