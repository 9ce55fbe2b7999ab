use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{runtime::Runtime, value::Value};

/// A position in a source file, 1-based.
///
/// Line 0 / column 0 means "no location" (e.g. a synthetic frame that only
/// carries a function name).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeLoc {
    pub line: u32,
    pub column: u32,
}

impl CodeLoc {
    pub(crate) fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Returns true when this location points at actual source text.
    #[must_use]
    pub fn is_known(&self) -> bool {
        self.line > 0 && self.column > 0
    }
}

/// One entry of a runtime backtrace.
///
/// Frames are accumulated while an error unwinds: the failing expression
/// records its line/column, and each function boundary the error crosses
/// names the most recent unnamed frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Function name, or `""` while the frame is location-only.
    pub name: String,
    pub line: u32,
    pub column: u32,
}

/// A syntax or declaration error produced while compiling a module.
///
/// `line`/`column` point at the token where the parser stalled, or at the
/// tree node that failed the declaration pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }

    pub(crate) fn at(message: impl Into<String>, loc: CodeLoc) -> Self {
        Self::new(message, loc.line, loc.column)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at line {} column {}", self.message, self.line, self.column)
    }
}

impl std::error::Error for ParseError {}

/// A linking or runtime failure reported to the host.
///
/// `message` is either the engine's own diagnostic ("not a function", ...)
/// or the string form of a user-thrown value that was never caught.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exception {
    pub message: String,
    pub backtrace: Vec<StackFrame>,
}

impl Exception {
    pub(crate) fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            backtrace: Vec::new(),
        }
    }

    /// Returns the first backtrace frame with a real source location.
    #[must_use]
    pub fn where_(&self) -> Option<&StackFrame> {
        self.backtrace.iter().find(|f| f.line > 0 && f.column > 0)
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        for frame in &self.backtrace {
            write!(f, "\n  at ")?;
            if frame.name.is_empty() {
                write!(f, "line {} column {}", frame.line, frame.column)?;
            } else if frame.line > 0 {
                write!(f, "{} (line {} column {})", frame.name, frame.line, frame.column)?;
            } else {
                write!(f, "{}", frame.name)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for Exception {}

/// Result type alias for evaluation, statement execution and native
/// method bodies.
pub type RunResult<T> = Result<T, RunError>;

/// What a [`RunError`] carries: either an engine diagnostic or a value the
/// script threw with `throw`.
#[derive(Debug, Clone)]
pub enum Thrown {
    Message(String),
    Value(Value),
}

/// An in-flight runtime error.
///
/// Created at the failing expression and propagated outward through `?`;
/// the backtrace grows as it unwinds. A `catch` clause converts the error
/// back into a [`Value`]; anything uncaught becomes a public [`Exception`].
/// Host bindings construct these with [`RunError::msg`] and
/// [`RunError::throw`].
#[derive(Debug, Clone)]
pub struct RunError {
    pub thrown: Thrown,
    pub(crate) backtrace: SmallVec<[StackFrame; 8]>,
}

impl RunError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            thrown: Thrown::Message(message.into()),
            backtrace: SmallVec::new(),
        }
    }

    pub fn throw(value: Value) -> Self {
        Self {
            thrown: Thrown::Value(value),
            backtrace: SmallVec::new(),
        }
    }

    /// Records the source location of the failing tree node.
    #[must_use]
    pub fn at(mut self, loc: CodeLoc) -> Self {
        self.backtrace.push(StackFrame {
            name: String::new(),
            line: loc.line,
            column: loc.column,
        });
        self
    }

    /// Names the most recent location-only frame, called when the error
    /// crosses a function boundary on its way out.
    #[must_use]
    pub fn in_function(mut self, name: &str) -> Self {
        match self.backtrace.last_mut() {
            Some(frame) if frame.name.is_empty() => frame.name = name.to_owned(),
            _ => self.backtrace.push(StackFrame {
                name: name.to_owned(),
                line: 0,
                column: 0,
            }),
        }
        self
    }

    /// The value a `catch` clause binds: the thrown value itself, or the
    /// diagnostic message as a string.
    pub fn to_value(&self, rt: &Runtime) -> Value {
        match &self.thrown {
            Thrown::Message(m) => Value::String(rt.intern(m)),
            Thrown::Value(v) => v.clone(),
        }
    }

    pub fn into_exception(self, rt: &Runtime) -> Exception {
        let message = match &self.thrown {
            Thrown::Message(m) => m.clone(),
            Thrown::Value(v) => rt.str(v.to_string_value(rt)).to_string(),
        };
        Exception {
            message,
            backtrace: self.backtrace.into_vec(),
        }
    }
}
