//! Interpreter error types.
//!
//! Every failure inside the reader, evaluator or a primitive is a
//! [`LispError`]: a kind, a human-readable message and the source position
//! the machine was at when the error was raised. Errors propagate with `?`
//! up to the driver boundary (`eval_input`), which reports them and resumes
//! at the next top-level form; the two fatal kinds terminate the process
//! there instead.

use thiserror::Error;

use tarn_gc::GcError;

/// Classification of interpreter failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorKind {
    /// A special form or primitive call has the wrong shape.
    #[error("malformed form")]
    MalformedForm,
    /// An argument has the wrong tag.
    #[error("type error")]
    TypeError,
    /// Parameter and argument lists do not match up.
    #[error("arity mismatch")]
    ArityMismatch,
    /// A symbol has no binding in any enclosing frame.
    #[error("unbound symbol")]
    UnboundSymbol,
    /// The operator position of an application holds a non-callable value.
    #[error("not callable")]
    NotCallable,
    #[error("division by zero")]
    DivisionByZero,
    /// End of input inside a list, string or dotted pair.
    #[error("unclosed input")]
    UnclosedInput,
    /// A token the reader cannot accept.
    #[error("malformed token")]
    MalformedToken,
    /// The heap cannot satisfy an allocation even after collecting.
    #[error("memory exhausted")]
    MemoryExhausted,
    /// An interpreter invariant was violated.
    #[error("internal bug")]
    InternalBug,
}

impl ErrorKind {
    /// Fatal kinds terminate the process at the driver boundary instead of
    /// resuming at the next top-level form.
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::MemoryExhausted | ErrorKind::InternalBug)
    }
}

/// Current position in the input being processed, used for diagnostics.
#[derive(Debug, Clone)]
pub struct SourcePos {
    pub file: String,
    pub line: u32,
}

impl SourcePos {
    pub fn new(file: impl Into<String>) -> SourcePos {
        SourcePos {
            file: file.into(),
            line: 1,
        }
    }
}

/// An interpreter error with its source position.
#[derive(Debug, Error)]
#[error("{file}[{line}]: {kind}: {message}")]
pub struct LispError {
    pub kind: ErrorKind,
    pub message: String,
    pub file: String,
    pub line: u32,
}

impl LispError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, pos: &SourcePos) -> LispError {
        LispError {
            kind,
            message: message.into(),
            file: pos.file.clone(),
            line: pos.line,
        }
    }

    /// Wraps an allocator failure. Exhaustion keeps its own kind so the
    /// driver can tell it apart from ordinary evaluation errors.
    pub fn from_gc(err: GcError, pos: &SourcePos) -> LispError {
        let kind = match err {
            GcError::MemoryExhausted { .. } => ErrorKind::MemoryExhausted,
            _ => ErrorKind::InternalBug,
        };
        LispError::new(kind, err.to_string(), pos)
    }
}
