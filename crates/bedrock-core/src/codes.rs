//! Built-in error code ranges and well-known codes.
//!
//! Every module of the ecosystem owns a contiguous block of negative codes.
//! Blocks are handed out in tier order and are never reused:
//!
//! | Module       | Range          |
//! |--------------|----------------|
//! | `common`     | `-99..=-1`     |
//! | `thread`     | `-199..=-100`  |
//! | `logger`     | `-299..=-200`  |
//! | `monitoring` | `-399..=-300`  |
//! | `storage`    | `-499..=-400`  |
//! | `network`    | `-599..=-500`  |
//!
//! Code `0` means success and never appears inside an [`ErrorInfo`](crate::ErrorInfo).
//! The `common` codes may be issued by any module.
//!
//! The table is checked at compile time: overlapping ranges, duplicate module
//! names, or a named constant outside its module's range fail the build.

use serde::Serialize;

/// Message returned for codes that have no registered description.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";

/// Message returned for code `0`.
pub const SUCCESS_MESSAGE: &str = "Success";

/// A contiguous, inclusive block of error codes owned by one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CodeRange {
    module: &'static str,
    min: i32,
    max: i32,
}

impl CodeRange {
    /// Creates a range. Usable in `const` context, where a malformed range
    /// is a compile error.
    ///
    /// # Panics
    ///
    /// Panics if `min > max` or if the range reaches `0` or positive codes.
    #[must_use]
    pub const fn new(module: &'static str, min: i32, max: i32) -> Self {
        assert!(min <= max, "error code range is inverted");
        assert!(max < 0, "error code ranges must be strictly negative");
        Self { module, min, max }
    }

    /// Name of the owning module.
    #[must_use]
    pub const fn module(&self) -> &'static str {
        self.module
    }

    /// Lowest code in the range.
    #[must_use]
    pub const fn min(&self) -> i32 {
        self.min
    }

    /// Highest code in the range.
    #[must_use]
    pub const fn max(&self) -> i32 {
        self.max
    }

    /// Returns true if `code` belongs to this range.
    #[must_use]
    pub const fn contains(&self, code: i32) -> bool {
        code >= self.min && code <= self.max
    }

    /// Returns true if the two ranges share at least one code.
    #[must_use]
    pub const fn overlaps(&self, other: &CodeRange) -> bool {
        self.min <= other.max && other.min <= self.max
    }

    /// Checks `code` against the range and returns it unchanged.
    ///
    /// Used to declare code constants; a constant outside its module's range
    /// does not compile.
    ///
    /// # Panics
    ///
    /// Panics (or fails const evaluation) if `code` is outside the range.
    #[must_use]
    pub const fn code(&self, code: i32) -> i32 {
        assert!(self.contains(code), "error code is outside the module's range");
        code
    }
}

pub const COMMON: CodeRange = CodeRange::new("common", -99, -1);
pub const THREAD: CodeRange = CodeRange::new("thread", -199, -100);
pub const LOGGER: CodeRange = CodeRange::new("logger", -299, -200);
pub const MONITORING: CodeRange = CodeRange::new("monitoring", -399, -300);
pub const STORAGE: CodeRange = CodeRange::new("storage", -499, -400);
pub const NETWORK: CodeRange = CodeRange::new("network", -599, -500);

/// The built-in ranges, in ecosystem (tier) order.
pub const ECOSYSTEM_RANGES: [CodeRange; 6] = [COMMON, THREAD, LOGGER, MONITORING, STORAGE, NETWORK];

const fn str_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

/// Returns true if no two ranges overlap and no module name repeats.
#[must_use]
pub const fn ranges_are_disjoint(ranges: &[CodeRange]) -> bool {
    let mut i = 0;
    while i < ranges.len() {
        let mut j = i + 1;
        while j < ranges.len() {
            if ranges[i].overlaps(&ranges[j]) || str_eq(ranges[i].module, ranges[j].module) {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    true
}

const _: () = assert!(
    ranges_are_disjoint(&ECOSYSTEM_RANGES),
    "built-in error code ranges overlap"
);

/// Codes shared by every module (`-99..=-1`).
pub mod common {
    use super::COMMON;

    pub const SUCCESS: i32 = 0;
    pub const INVALID_ARGUMENT: i32 = COMMON.code(-1);
    pub const NOT_FOUND: i32 = COMMON.code(-2);
    pub const PERMISSION_DENIED: i32 = COMMON.code(-3);
    pub const TIMEOUT: i32 = COMMON.code(-4);
    pub const CANCELLED: i32 = COMMON.code(-5);
    pub const NOT_INITIALIZED: i32 = COMMON.code(-6);
    pub const ALREADY_EXISTS: i32 = COMMON.code(-7);
    pub const OUT_OF_MEMORY: i32 = COMMON.code(-8);
    pub const IO_ERROR: i32 = COMMON.code(-9);
    pub const NETWORK_ERROR: i32 = COMMON.code(-10);
    pub const REGISTRY_FROZEN: i32 = COMMON.code(-11);
    pub const INVALID_STATE: i32 = COMMON.code(-12);

    // Service container
    pub const SERVICE_NOT_REGISTERED: i32 = COMMON.code(-20);
    pub const CIRCULAR_DEPENDENCY: i32 = COMMON.code(-21);
    pub const FACTORY_ERROR: i32 = COMMON.code(-22);
    pub const TYPE_MISMATCH: i32 = COMMON.code(-23);

    // Resilience
    pub const CIRCUIT_OPEN: i32 = COMMON.code(-30);

    pub const INTERNAL_ERROR: i32 = COMMON.code(-99);
}

/// Execution (thread pool / executor) codes.
pub mod thread {
    use super::THREAD;

    pub const POOL_FULL: i32 = THREAD.code(-100);
    pub const POOL_SHUTDOWN: i32 = THREAD.code(-101);
    pub const POOL_NOT_STARTED: i32 = THREAD.code(-102);
    pub const INVALID_POOL_SIZE: i32 = THREAD.code(-103);
    pub const WORKER_FAILED: i32 = THREAD.code(-120);
    pub const WORKER_NOT_FOUND: i32 = THREAD.code(-121);
    pub const JOB_REJECTED: i32 = THREAD.code(-140);
    pub const JOB_TIMEOUT: i32 = THREAD.code(-141);
    pub const JOB_CANCELLED: i32 = THREAD.code(-142);
    pub const QUEUE_FULL: i32 = THREAD.code(-160);
    pub const QUEUE_STOPPED: i32 = THREAD.code(-162);
}

/// Logging codes.
pub mod logger {
    use super::LOGGER;

    pub const FILE_OPEN_FAILED: i32 = LOGGER.code(-200);
    pub const FILE_WRITE_FAILED: i32 = LOGGER.code(-201);
    pub const FILE_ROTATION_FAILED: i32 = LOGGER.code(-203);
    pub const WRITER_NOT_INITIALIZED: i32 = LOGGER.code(-220);
    pub const WRITER_STOPPED: i32 = LOGGER.code(-221);
    pub const INVALID_FORMAT: i32 = LOGGER.code(-240);
    pub const FILTER_REJECTED: i32 = LOGGER.code(-261);
}

/// Monitoring codes.
pub mod monitoring {
    use super::MONITORING;

    pub const METRIC_NOT_FOUND: i32 = MONITORING.code(-300);
    pub const INVALID_METRIC_TYPE: i32 = MONITORING.code(-301);
    pub const METRIC_COLLECTION_FAILED: i32 = MONITORING.code(-302);
    pub const STORAGE_FULL: i32 = MONITORING.code(-320);
    pub const EVENT_PUBLISH_FAILED: i32 = MONITORING.code(-340);
    pub const HEALTH_CHECK_FAILED: i32 = MONITORING.code(-360);
}

/// Storage (database / container) codes.
pub mod storage {
    use super::STORAGE;

    pub const CONNECTION_FAILED: i32 = STORAGE.code(-400);
    pub const CONNECTION_LOST: i32 = STORAGE.code(-401);
    pub const CONNECTION_TIMEOUT: i32 = STORAGE.code(-402);
    pub const INVALID_CONNECTION_STRING: i32 = STORAGE.code(-403);
    pub const POOL_EXHAUSTED: i32 = STORAGE.code(-420);
    pub const QUERY_FAILED: i32 = STORAGE.code(-440);
    pub const QUERY_SYNTAX_ERROR: i32 = STORAGE.code(-441);
    pub const TRANSACTION_FAILED: i32 = STORAGE.code(-460);
    pub const TRANSACTION_ROLLED_BACK: i32 = STORAGE.code(-461);
    pub const NO_ACTIVE_TRANSACTION: i32 = STORAGE.code(-462);
    pub const SERIALIZATION_FAILED: i32 = STORAGE.code(-480);
    pub const KEY_NOT_FOUND: i32 = STORAGE.code(-481);
}

/// Networking codes.
pub mod network {
    use super::NETWORK;

    pub const CONNECTION_FAILED: i32 = NETWORK.code(-500);
    pub const CONNECTION_REFUSED: i32 = NETWORK.code(-501);
    pub const CONNECTION_TIMEOUT: i32 = NETWORK.code(-502);
    pub const CONNECTION_CLOSED: i32 = NETWORK.code(-503);
    pub const SESSION_NOT_FOUND: i32 = NETWORK.code(-520);
    pub const SESSION_EXPIRED: i32 = NETWORK.code(-521);
    pub const SEND_FAILED: i32 = NETWORK.code(-540);
    pub const RECEIVE_FAILED: i32 = NETWORK.code(-541);
    pub const MESSAGE_TOO_LARGE: i32 = NETWORK.code(-542);
    pub const SERVER_NOT_STARTED: i32 = NETWORK.code(-560);
    pub const SERVER_ALREADY_RUNNING: i32 = NETWORK.code(-561);
    pub const BIND_FAILED: i32 = NETWORK.code(-562);
}

/// Returns the built-in description for `code`, if there is one.
#[must_use]
pub const fn builtin_message(code: i32) -> Option<&'static str> {
    let message = match code {
        common::SUCCESS => SUCCESS_MESSAGE,
        common::INVALID_ARGUMENT => "Invalid argument",
        common::NOT_FOUND => "Not found",
        common::PERMISSION_DENIED => "Permission denied",
        common::TIMEOUT => "Timeout",
        common::CANCELLED => "Cancelled",
        common::NOT_INITIALIZED => "Not initialized",
        common::ALREADY_EXISTS => "Already exists",
        common::OUT_OF_MEMORY => "Out of memory",
        common::IO_ERROR => "I/O error",
        common::NETWORK_ERROR => "Network error",
        common::REGISTRY_FROZEN => "Registry is frozen",
        common::INVALID_STATE => "Invalid state",
        common::SERVICE_NOT_REGISTERED => "Service not registered",
        common::CIRCULAR_DEPENDENCY => "Circular dependency detected",
        common::FACTORY_ERROR => "Service factory failed",
        common::TYPE_MISMATCH => "Registered service has an unexpected type",
        common::CIRCUIT_OPEN => "Circuit breaker is open",
        common::INTERNAL_ERROR => "Internal error",

        thread::POOL_FULL => "Thread pool full",
        thread::POOL_SHUTDOWN => "Thread pool shutdown",
        thread::POOL_NOT_STARTED => "Thread pool not started",
        thread::JOB_REJECTED => "Job rejected",
        thread::JOB_TIMEOUT => "Job timeout",
        thread::JOB_CANCELLED => "Job cancelled",

        logger::FILE_OPEN_FAILED => "Failed to open log file",
        logger::FILE_WRITE_FAILED => "Failed to write to log file",
        logger::FILE_ROTATION_FAILED => "Log file rotation failed",
        logger::WRITER_STOPPED => "Log writer stopped",

        monitoring::METRIC_NOT_FOUND => "Metric not found",
        monitoring::INVALID_METRIC_TYPE => "Invalid metric type",
        monitoring::STORAGE_FULL => "Metric storage full",
        monitoring::HEALTH_CHECK_FAILED => "Health check failed",

        storage::CONNECTION_FAILED => "Database connection failed",
        storage::POOL_EXHAUSTED => "Connection pool exhausted",
        storage::QUERY_FAILED => "Database query failed",
        storage::TRANSACTION_FAILED => "Transaction failed",
        storage::NO_ACTIVE_TRANSACTION => "No active transaction",

        network::CONNECTION_FAILED => "Network connection failed",
        network::SEND_FAILED => "Network send failed",
        network::RECEIVE_FAILED => "Network receive failed",
        network::SERVER_NOT_STARTED => "Server not started",

        _ => return None,
    };
    Some(message)
}

/// Looks up the built-in range owned by `module`.
#[must_use]
pub fn range_for_module(module: &str) -> Option<&'static CodeRange> {
    ECOSYSTEM_RANGES.iter().find(|range| range.module == module)
}

/// Looks up the built-in range containing `code`.
#[must_use]
pub fn range_for_code(code: i32) -> Option<&'static CodeRange> {
    ECOSYSTEM_RANGES.iter().find(|range| range.contains(code))
}

/// Returns true if `module` may issue `code` under the built-in table: the
/// code is in the module's own range or in the shared `common` range.
#[must_use]
pub fn is_permitted(module: &str, code: i32) -> bool {
    COMMON.contains(code) || range_for_module(module).is_some_and(|range| range.contains(code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_ranges_are_disjoint() {
        assert!(ranges_are_disjoint(&ECOSYSTEM_RANGES));
        for (i, a) in ECOSYSTEM_RANGES.iter().enumerate() {
            for b in ECOSYSTEM_RANGES.iter().skip(i + 1) {
                assert!(!a.overlaps(b), "{} overlaps {}", a.module(), b.module());
            }
        }
    }

    #[test]
    fn test_overlap_detection() {
        let thread = CodeRange::new("thread", -199, -100);
        let logger = CodeRange::new("logger", -150, -120);
        assert!(thread.overlaps(&logger));
        assert!(!ranges_are_disjoint(&[thread, logger]));
        assert!(!ranges_are_disjoint(&[thread, CodeRange::new("thread", -299, -200)]));
    }

    #[test]
    fn test_ranges_follow_tier_order() {
        let modules: Vec<_> = ECOSYSTEM_RANGES.iter().map(CodeRange::module).collect();
        assert_eq!(modules, ["common", "thread", "logger", "monitoring", "storage", "network"]);
        for pair in ECOSYSTEM_RANGES.windows(2) {
            assert!(pair[0].min() > pair[1].max());
        }
    }

    #[test]
    fn test_code_constants_live_in_their_ranges() {
        assert!(COMMON.contains(common::INTERNAL_ERROR));
        assert!(THREAD.contains(thread::QUEUE_STOPPED));
        assert!(LOGGER.contains(logger::FILTER_REJECTED));
        assert!(MONITORING.contains(monitoring::HEALTH_CHECK_FAILED));
        assert!(STORAGE.contains(storage::KEY_NOT_FOUND));
        assert!(NETWORK.contains(network::BIND_FAILED));
    }

    #[test]
    #[should_panic(expected = "outside the module's range")]
    fn test_code_outside_range_panics_at_runtime() {
        let _ = THREAD.code(-200);
    }

    #[test]
    #[should_panic(expected = "strictly negative")]
    fn test_range_touching_zero_panics() {
        let _ = CodeRange::new("bad", -10, 0);
    }

    #[test]
    fn test_builtin_messages() {
        assert_eq!(builtin_message(0), Some("Success"));
        assert_eq!(builtin_message(common::NOT_FOUND), Some("Not found"));
        assert_eq!(builtin_message(storage::QUERY_FAILED), Some("Database query failed"));
        assert_eq!(builtin_message(-98), None);
        assert_eq!(builtin_message(-10_000), None);
    }

    #[test]
    fn test_lookup_helpers() {
        assert_eq!(range_for_module("logger"), Some(&LOGGER));
        assert_eq!(range_for_module("unknown"), None);
        assert_eq!(range_for_code(-250).map(CodeRange::module), Some("logger"));
        assert_eq!(range_for_code(-1000), None);
    }

    #[test]
    fn test_common_codes_are_permitted_everywhere() {
        assert!(is_permitted("thread", common::TIMEOUT));
        assert!(is_permitted("my_app", common::INTERNAL_ERROR));
        assert!(is_permitted("thread", thread::POOL_FULL));
        assert!(!is_permitted("logger", thread::POOL_FULL));
        assert!(!is_permitted("my_app", network::SEND_FAILED));
        assert!(!is_permitted("common", 0));
    }
}
