//! Error reports and the exception payload layout.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt::Write;

use chronicle_storage::StorageError;

/// Line separating each inner cause in an exception payload.
pub const CAUSE_SEPARATOR: &str = "=========================================";

/// Line separating the actor section from the rest of an exception payload.
pub const ACTOR_SEPARATOR: &str = "-----------------------------";

/// One link of a cause chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCause {
    /// Short type label of the cause.
    pub kind: String,
    /// The cause's message.
    pub message: String,
}

/// A captured error: top-level kind, message and trace, plus its causes from
/// outermost to innermost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    kind: String,
    message: String,
    trace: Option<String>,
    causes: Vec<ErrorCause>,
    connectivity_failure: bool,
}

impl ErrorReport {
    /// Build a report by hand.
    #[must_use]
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            trace: None,
            causes: Vec::new(),
            connectivity_failure: false,
        }
    }

    /// Capture a typed error and its `source()` chain.
    #[must_use]
    pub fn capture<E: Error + 'static>(error: &E) -> Self {
        let mut report = Self::new(short_type_name::<E>(), error.to_string());
        report.connectivity_failure = is_connectivity_failure(error);
        report.extend_causes(error.source());
        report
    }

    /// Capture an error known only as a trait object.
    #[must_use]
    pub fn from_dyn(error: &(dyn Error + 'static)) -> Self {
        let mut report = Self::new(dyn_label(error), error.to_string());
        report.connectivity_failure = is_connectivity_failure(error);
        report.extend_causes(error.source());
        report
    }

    /// Capture an [`anyhow::Error`], including its backtrace when one was
    /// recorded.
    #[must_use]
    pub fn from_anyhow(error: &anyhow::Error) -> Self {
        let root: &(dyn Error + 'static) = error.as_ref();
        let mut report = Self::from_dyn(root);
        let backtrace = error.backtrace();
        if backtrace.status() == BacktraceStatus::Captured {
            report.trace = Some(backtrace.to_string());
        }
        report
    }

    /// Attach a trace captured at the call site (honours `RUST_BACKTRACE`).
    #[must_use]
    pub fn with_captured_trace(mut self) -> Self {
        let backtrace = Backtrace::capture();
        if backtrace.status() == BacktraceStatus::Captured {
            self.trace = Some(backtrace.to_string());
        }
        self
    }

    /// Attach an explicit trace.
    #[must_use]
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Append an inner cause.
    #[must_use]
    pub fn with_cause(mut self, kind: impl Into<String>, message: impl Into<String>) -> Self {
        self.causes.push(ErrorCause {
            kind: kind.into(),
            message: message.into(),
        });
        self
    }

    /// Wrap this report under a new outer message. The current report becomes
    /// the first cause.
    #[must_use]
    pub fn wrap(self, kind: impl Into<String>, message: impl Into<String>) -> Self {
        let mut outer = Self::new(kind, message);
        outer.connectivity_failure = self.connectivity_failure;
        outer.causes.push(ErrorCause {
            kind: self.kind,
            message: self.message,
        });
        outer.causes.extend(self.causes);
        outer
    }

    /// Short type label.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Top-level message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Top-level trace, if any.
    #[must_use]
    pub fn trace(&self) -> Option<&str> {
        self.trace.as_deref()
    }

    /// Inner causes, outermost first.
    #[must_use]
    pub fn causes(&self) -> &[ErrorCause] {
        &self.causes
    }

    /// Whether the chain contains a storage connectivity failure.
    #[must_use]
    pub fn is_connectivity_failure(&self) -> bool {
        self.connectivity_failure
    }

    /// Every kind label in the chain, outermost first.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.kind.as_str()).chain(self.causes.iter().map(|c| c.kind.as_str()))
    }

    fn extend_causes(&mut self, mut source: Option<&(dyn Error + 'static)>) {
        while let Some(cause) = source {
            self.connectivity_failure |= is_connectivity_failure(cause);
            self.causes.push(ErrorCause {
                kind: dyn_label(cause),
                message: cause.to_string(),
            });
            source = cause.source();
        }
    }

    /// Render the exception payload body (without the actor section).
    pub(crate) fn render(&self, description: Option<&str>) -> String {
        let mut out = String::new();
        if let Some(description) = description.filter(|d| !d.trim().is_empty()) {
            let _ = writeln!(out, "{description}");
        }
        let _ = writeln!(out, "{}", self.message);
        if let Some(trace) = &self.trace {
            let _ = writeln!(out, "{trace}");
        }
        for cause in &self.causes {
            let _ = writeln!(out, "{CAUSE_SEPARATOR}");
            let _ = writeln!(out, "Inner ({}): {}", cause.kind, cause.message);
        }
        out
    }
}

fn is_connectivity_failure(error: &(dyn Error + 'static)) -> bool {
    matches!(
        error.downcast_ref::<StorageError>(),
        Some(StorageError::Connection(_))
    )
}

/// Last path segment of `E`'s type name, generics stripped.
fn short_type_name<E: ?Sized>() -> String {
    let full = std::any::type_name::<E>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_owned()
}

/// Type label for a trait object. Well-known error types are recognised by
/// downcast; anything else falls back to [`debug_label`], which names the
/// variant rather than the type for enum errors.
fn dyn_label(error: &(dyn Error + 'static)) -> String {
    macro_rules! known {
        ($($ty:ty => $label:literal),+ $(,)?) => {
            $(
                if error.is::<$ty>() {
                    return $label.to_owned();
                }
            )+
        };
    }
    known! {
        std::io::Error => "io::Error",
        StorageError => "StorageError",
        serde_json::Error => "serde_json::Error",
        std::num::ParseIntError => "ParseIntError",
        std::num::ParseFloatError => "ParseFloatError",
        std::str::Utf8Error => "Utf8Error",
        std::string::FromUtf8Error => "FromUtf8Error",
        std::fmt::Error => "fmt::Error",
        chrono::ParseError => "chrono::ParseError",
        uuid::Error => "uuid::Error",
    }
    debug_label(error)
}

/// Best-effort type label for a trait object: the leading identifier of its
/// `Debug` output (`Os { .. }` becomes `Os`, `ParseIntError { .. }` stays
/// `ParseIntError`).
fn debug_label(error: &dyn Error) -> String {
    let debug = format!("{error:?}");
    let label: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
        .collect();
    if label.is_empty() {
        "Error".to_owned()
    } else {
        label.rsplit("::").next().unwrap_or(&label).to_owned()
    }
}
