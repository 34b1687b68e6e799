//! Exceptions and stack frames as handed over by the execution engine.
//!
//! The engine snapshots a raised exception, its cause/context chain and the
//! frames its traceback passed through. Ownership of the chain is strict
//! (`Box` links), so a chain is always finite and acyclic.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Text used when an exception's own string conversion failed.
pub const FAILED_STR_MESSAGE: &str = "<exception str() failed>";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaisedException {
    /// Runtime type name, e.g. `ZeroDivisionError`.
    pub type_name: String,
    /// `str()` of the exception; `None` when that conversion raised.
    #[serde(default)]
    pub message: Option<String>,
    /// Explicit chaining cause set by `raise X from Y`.
    #[serde(default)]
    pub cause: Option<Box<Self>>,
    /// Implicit chaining context set when raising during exception handling.
    #[serde(default)]
    pub context: Option<Box<Self>>,
    /// Whether implicit context should be suppressed in tracebacks.
    #[serde(default)]
    pub suppress_context: bool,
    /// Frames from the point of catch (outermost) to the point of raise
    /// (innermost). Empty for an exception that was never raised.
    #[serde(default)]
    pub traceback: Vec<RawFrame>,
}

impl RaisedException {
    #[must_use]
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: Some(message.into()),
            cause: None,
            context: None,
            suppress_context: false,
            traceback: Vec::new(),
        }
    }

    /// An exception whose `str()` failed.
    #[must_use]
    pub fn without_message(type_name: impl Into<String>) -> Self {
        Self {
            message: None,
            ..Self::new(type_name, "")
        }
    }

    /// Sets the explicit cause. Like `raise ... from`, this also suppresses
    /// the implicit context.
    #[must_use]
    pub fn with_cause(mut self, cause: Self) -> Self {
        self.cause = Some(Box::new(cause));
        self.suppress_context = true;
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: Self) -> Self {
        self.context = Some(Box::new(context));
        self
    }

    #[must_use]
    pub fn suppressing_context(mut self) -> Self {
        self.suppress_context = true;
        self
    }

    #[must_use]
    pub fn with_frame(mut self, frame: RawFrame) -> Self {
        self.traceback.push(frame);
        self
    }

    #[must_use]
    pub fn with_traceback(mut self, frames: impl IntoIterator<Item = RawFrame>) -> Self {
        self.traceback.extend(frames);
        self
    }

    /// Best-effort string form of the exception.
    #[must_use]
    pub fn message_text(&self) -> &str {
        self.message.as_deref().unwrap_or(FAILED_STR_MESSAGE)
    }

    /// The context link that should be reported, if any.
    #[must_use]
    pub fn reported_context(&self) -> Option<&Self> {
        if self.suppress_context {
            None
        } else {
            self.context.as_deref()
        }
    }
}

/// Identity of a code object: every frame running the same function shares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CodeId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeInfo {
    pub id: CodeId,
    /// Bare name, `<module>` for module-level code.
    pub name: String,
    /// Qualified name (`Outer.method.<locals>.inner`) when it could be
    /// determined statically.
    #[serde(default)]
    pub qualname: Option<String>,
    /// Line of the `def` (or 1 for a module).
    #[serde(default = "first_line")]
    pub first_lineno: u32,
}

fn first_line() -> u32 {
    1
}

impl CodeInfo {
    #[must_use]
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: CodeId(id),
            name: name.into(),
            qualname: None,
            first_lineno: 1,
        }
    }

    /// Module-level code of a program.
    #[must_use]
    pub fn module(id: u64) -> Self {
        Self::new(id, "<module>")
    }

    #[must_use]
    pub fn with_qualname(mut self, qualname: impl Into<String>) -> Self {
        self.qualname = Some(qualname.into());
        self
    }

    #[must_use]
    pub fn with_first_lineno(mut self, lineno: u32) -> Self {
        self.first_lineno = lineno;
        self
    }

    /// The qualified name, falling back to the bare name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.qualname.as_deref().unwrap_or(&self.name)
    }
}

/// A position in source: 1-based line, 0-based character column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CodeLoc {
    pub line: u32,
    pub column: u32,
}

impl CodeLoc {
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Half-open source span of the expression being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRange {
    pub start: CodeLoc,
    pub end: CodeLoc,
}

impl CodeRange {
    #[must_use]
    pub const fn new(start: CodeLoc, end: CodeLoc) -> Self {
        Self { start, end }
    }

    /// Character columns this span covers on `line`, if any; `None` as the
    /// end means "to the end of the line".
    #[must_use]
    pub fn columns_on(&self, line: u32) -> Option<(u32, Option<u32>)> {
        if line < self.start.line || line > self.end.line {
            return None;
        }
        let start = if line == self.start.line { self.start.column } else { 0 };
        let end = (line == self.end.line).then_some(self.end.column);
        Some((start, end))
    }
}

/// First and last line of the statement being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementSpan {
    pub first: u32,
    pub last: u32,
}

/// One activation record captured from the traceback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFrame {
    pub filename: String,
    pub code: CodeInfo,
    /// Current line (1-based).
    pub lineno: u32,
    #[serde(default)]
    pub statement: Option<StatementSpan>,
    #[serde(default)]
    pub executing: Option<CodeRange>,
    /// Local scope; names are unique by construction.
    #[serde(default)]
    pub locals: IndexMap<String, Value>,
}

impl RawFrame {
    #[must_use]
    pub fn new(filename: impl Into<String>, code: CodeInfo, lineno: u32) -> Self {
        Self {
            filename: filename.into(),
            code,
            lineno,
            statement: None,
            executing: None,
            locals: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn with_local(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.locals.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_statement(mut self, first: u32, last: u32) -> Self {
        self.statement = Some(StatementSpan { first, last });
        self
    }

    #[must_use]
    pub fn with_executing(mut self, range: CodeRange) -> Self {
        self.executing = Some(range);
        self
    }

    /// Lines of the executing statement, always containing `lineno`.
    #[must_use]
    pub fn statement_lines(&self) -> (u32, u32) {
        match self.statement {
            Some(span) => (span.first.min(self.lineno), span.last.max(self.lineno)),
            None => (self.lineno, self.lineno),
        }
    }

    /// Key under which recurring frames are counted.
    #[must_use]
    pub fn key(&self) -> (CodeId, u32) {
        (self.code.id, self.lineno)
    }
}
