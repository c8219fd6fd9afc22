//! # tarn-core - Interpreter Runtime
//!
//! The Tarn Lisp runtime on top of [`tarn_gc`]: the S-expression reader,
//! lexically scoped environments, the evaluator with its primitives and
//! special forms, the printer, and the driver API that ties them to a byte
//! source.
//!
//! ## Data flow
//!
//! ```text
//! byte source ──► Reader ──► object graph in the heap ──► eval ──► printer
//! ```
//!
//! Allocation happens throughout the reader and evaluator, and every
//! allocation site is a potential collection point; both components keep
//! their working references in root frames (`letroot!`) so the collector
//! can relocate everything they hold.
//!
//! ## Entry points
//!
//! [`Machine::new`] builds an interpreter with constants and primitives
//! installed. [`Machine::eval_input`] drives a [`ByteSource`] to EOF,
//! printing each top-level value; errors are reported and the loop resumes
//! at the next form. [`Machine::process_file`] does the same for a file
//! with its own recovery boundary, which is also what the `load` primitive
//! uses.

pub mod env;
pub mod error;
pub mod eval;
pub mod machine;
pub mod print;
mod prims;
pub mod reader;
pub mod source;

pub use error::{ErrorKind, LispError, SourcePos};
pub use machine::Machine;
pub use print::print_to_string;
pub use reader::Reader;
pub use source::{ByteSource, MemSource};

// Re-exported so drivers only need one dependency.
pub use tarn_gc::{GcConfig, GcError, GcStats, Heap, Ref, Tag, DEFAULT_SEMISPACE_SIZE};
