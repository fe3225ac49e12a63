// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared across the sandbox.
//!
//! Every failure that crosses a component boundary is captured as an
//! [`ErrorInfo`] carrying one of the closed set of [`ErrorKind`]s. Tool
//! handlers never raise; they serialize the captured info into a structured
//! status object.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Closed set of error kinds recognised across the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Filesystem or path access denied (includes workspace escapes)
    Permission,
    /// Referenced file does not exist
    FileNotFound,
    /// Operation exceeded its deadline
    Timeout,
    /// Executable missing from the sandbox
    CommandNotFound,
    /// Plan invalid or bad tool argument
    Validation,
    /// Code authored by an executed task failed to parse
    Syntax,
    /// Malformed value in task input or output
    Value,
    /// Task raised at runtime
    Runtime,
    /// Command or path disallowed by policy
    Security,
    /// Caller exceeded a request budget
    RateLimited,
    /// A hard resource limit was breached
    ResourceExhausted,
    /// Retry budget exhausted
    MaxRetriesExceeded,
    /// Unexpected internal failure
    Internal,
}

impl ErrorKind {
    /// Map an I/O error onto the taxonomy.
    pub fn from_io(err: &std::io::Error) -> Self {
        use std::io::ErrorKind as Io;
        match err.kind() {
            Io::NotFound => ErrorKind::FileNotFound,
            Io::PermissionDenied => ErrorKind::Permission,
            Io::TimedOut => ErrorKind::Timeout,
            _ => ErrorKind::Runtime,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Permission => "permission",
            ErrorKind::FileNotFound => "file_not_found",
            ErrorKind::Timeout => "timeout",
            ErrorKind::CommandNotFound => "command_not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::Syntax => "syntax",
            ErrorKind::Value => "value",
            ErrorKind::Runtime => "runtime",
            ErrorKind::Security => "security",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::ResourceExhausted => "resource_exhausted",
            ErrorKind::MaxRetriesExceeded => "max_retries_exceeded",
            ErrorKind::Internal => "internal",
        };
        write!(f, "{}", s)
    }
}

/// A captured failure with structured context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    /// Structured context (task id, workspace path, recent activity counts)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
    pub at_epoch_ms: u64,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>, at_epoch_ms: u64) -> Self {
        Self {
            kind,
            message: message.into(),
            stack_trace: None,
            context: BTreeMap::new(),
            at_epoch_ms,
        }
    }

    /// Capture an I/O error, classifying it onto the taxonomy.
    pub fn from_io(err: &std::io::Error, at_epoch_ms: u64) -> Self {
        Self::new(ErrorKind::from_io(err), err.to_string(), at_epoch_ms)
    }

    /// Attach a context entry, returning self for chaining.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.stack_trace = Some(trace.into());
        self
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ErrorInfo {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
