//! # tarn-gc - Semispace Copying Collector
//!
//! Memory management for the Tarn interpreter: a fixed-size two-semispace
//! heap with bump allocation and a Cheney-style copying collector.
//!
//! ## Overview
//!
//! - **Tagged objects**: every runtime value is an [`Obj`] with a fixed
//!   header (tag + size) and a tag-specific payload ([`object`]).
//! - **Bump allocation**: the active semispace is filled front to back;
//!   exhaustion triggers a collection ([`Heap::alloc`]).
//! - **Copying collection**: live objects are evacuated breadth-first into
//!   the idle space using the copied region itself as the work queue, with
//!   forwarding tombstones preserving identity and cycles ([`Heap::collect`]).
//! - **Precise roots**: callers pin their working references in stack-linked
//!   root frames that the collector rewrites in place ([`letroot!`]).
//!
//! ```text
//! ┌────────────────────┐  swap on collect  ┌────────────────────┐
//! │    active space    │ <───────────────> │     idle space     │
//! │ [obj][obj][obj]──► │                   │  (target of copy)  │
//! └────────────────────┘                   └────────────────────┘
//!           ▲
//!     root frames on the native call stack, linked through RootHead
//! ```
//!
//! ## Rooting discipline
//!
//! Any reference held across a call that may allocate must live in a root
//! slot; a bare `Ref` local dangles as soon as a collection runs. The
//! `always_gc` flag of [`GcConfig`] forces a collection before every
//! allocation, which turns violations of this rule into immediate,
//! reproducible failures.

pub mod config;
pub mod error;
pub mod heap;
pub mod object;
pub mod roots;
pub mod space;

pub use config::{GcConfig, DEFAULT_SEMISPACE_SIZE, MIN_SEMISPACE_SIZE};
pub use error::GcError;
pub use heap::{GcStats, Heap};
pub use object::{Obj, Ref, Sentinels, Tag};
pub use roots::{FrameGuard, RootFrame, RootHead};
