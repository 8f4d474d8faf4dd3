//! Lifecycle events published by the bootstrapper and by modules.

use bedrock_core::{ErrorInfo, MetricType};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// A module finished initializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleStarted {
    pub module_name: String,
    pub timestamp: DateTime<Utc>,
}

impl ModuleStarted {
    #[must_use]
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A module has been stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleStopped {
    pub module_name: String,
    pub timestamp: DateTime<Utc>,
}

impl ModuleStopped {
    #[must_use]
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            timestamp: Utc::now(),
        }
    }
}

/// An error worth broadcasting, such as a failed shutdown hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorOccurred {
    pub error: ErrorInfo,
    pub timestamp: DateTime<Utc>,
}

impl ErrorOccurred {
    #[must_use]
    pub fn new(error: ErrorInfo) -> Self {
        Self {
            error,
            timestamp: Utc::now(),
        }
    }

    /// Module that issued the error.
    #[must_use]
    pub fn module_name(&self) -> &str {
        self.error.module()
    }
}

/// A metric sample, for subscribers that forward metrics elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecorded {
    pub name: String,
    pub value: f64,
    pub unit: Option<String>,
    pub metric_type: MetricType,
    pub tags: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl MetricRecorded {
    #[must_use]
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            unit: None,
            metric_type: MetricType::Gauge,
            tags: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    #[must_use]
    pub fn with_type(mut self, metric_type: MetricType) -> Self {
        self.metric_type = metric_type;
        self
    }

    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}
