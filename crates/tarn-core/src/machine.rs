//! The interpreter machine and driver API.
//!
//! A [`Machine`] bundles every process-wide singleton of the runtime: the
//! heap, the interned symbol table, the global environment, the sentinel
//! objects, the primitive registry, the gensym counter and the current
//! source position. The symbol table and global environment are registered
//! as static roots so the collector forwards them ahead of the frame chain.
//!
//! The driver surface is three calls: construction installs the constants
//! and primitives, [`Machine::eval_input`] drives one byte source to EOF
//! printing every top-level value, and [`Machine::process_file`] slurps a
//! file and feeds it through the same loop with its own recovery boundary.

use std::cell::Cell;
use std::io::{self, Write};
use std::path::Path;
use std::ptr;

use indexmap::IndexMap;
use tarn_gc::letroot;
use tarn_gc::object::{car, cdr, env_vars, set_env_vars, tag_of, text_bytes, Sentinels};
use tarn_gc::{GcConfig, GcError, Heap, Ref, Tag};

use crate::error::{ErrorKind, LispError, SourcePos};
use crate::eval::eval;
use crate::print::print_to_string;
use crate::prims::{self, PrimFn};
use crate::reader::Reader;
use crate::source::{ByteSource, MemSource};

/// One interpreter instance. Single-threaded by construction: it hands out
/// raw heap references and is neither `Send` nor `Sync`.
pub struct Machine {
    pub heap: Heap,
    sentinels: Box<Sentinels>,
    /// Interned symbols, chained through cells. Static GC root.
    symbols: Box<Cell<Ref>>,
    /// The root environment frame. Static GC root.
    genv: Box<Cell<Ref>>,
    prims: IndexMap<&'static str, PrimFn>,
    gensym_counter: u64,
    pub(crate) pos: SourcePos,
    out: Box<dyn Write>,
}

impl Machine {
    /// Creates a machine printing to stdout, with constants and primitives
    /// installed.
    pub fn new(config: GcConfig) -> Result<Machine, LispError> {
        Machine::with_output(config, Box::new(io::stdout()))
    }

    /// Like [`Machine::new`] but printing to the given sink.
    pub fn with_output(config: GcConfig, out: Box<dyn Write>) -> Result<Machine, LispError> {
        let startup = SourcePos::new("<startup>");
        let heap = Heap::new(config).map_err(|e| LispError::from_gc(e, &startup))?;
        let sentinels = Sentinels::boxed();
        let symbols = Box::new(Cell::new(sentinels.nil()));
        let genv = Box::new(Cell::new(ptr::null_mut()));
        let mut machine = Machine {
            heap,
            sentinels,
            symbols,
            genv,
            prims: IndexMap::new(),
            gensym_counter: 0,
            pos: startup,
            out,
        };
        // The boxes are owned by the machine and never replaced, so their
        // addresses are stable for the heap's lifetime.
        unsafe {
            machine.heap.add_static_root(&*machine.symbols);
            machine.heap.add_static_root(&*machine.genv);
        }
        let nil = Cell::new(machine.nil());
        let env = machine
            .heap
            .env_frame(&nil, &nil)
            .map_err(|e| machine.oom(e))?;
        machine.genv.set(env);
        machine.define_constant("t", machine.t())?;
        prims::install(&mut machine)?;
        log::debug!("machine initialized with {} primitives", machine.prims.len());
        Ok(machine)
    }

    pub fn nil(&self) -> Ref {
        self.sentinels.nil()
    }

    pub fn t(&self) -> Ref {
        self.sentinels.t()
    }

    pub(crate) fn dot(&self) -> Ref {
        self.sentinels.dot()
    }

    pub(crate) fn cparen(&self) -> Ref {
        self.sentinels.cparen()
    }

    /// The root environment frame.
    pub fn global_env(&self) -> Ref {
        self.genv.get()
    }

    pub(crate) fn out(&mut self) -> &mut dyn Write {
        &mut *self.out
    }

    /// Builds an error at the machine's current source position.
    pub(crate) fn error(&self, kind: ErrorKind, message: impl Into<String>) -> LispError {
        LispError::new(kind, message, &self.pos)
    }

    /// Wraps an allocator failure at the current source position.
    pub(crate) fn oom(&self, err: GcError) -> LispError {
        LispError::from_gc(err, &self.pos)
    }

    /// Returns the interned symbol for `name`, allocating and prepending it
    /// to the symbol table on first sight. Two calls with equal names always
    /// return the identical object.
    pub fn intern(&mut self, name: &str) -> Result<Ref, LispError> {
        let mut p = self.symbols.get();
        while tag_of(p) == Tag::Cell {
            let sym = car(p);
            if text_bytes(sym) == name.as_bytes() {
                return Ok(sym);
            }
            p = cdr(p);
        }
        letroot!(self.heap => sym = ptr::null_mut());
        let s = self
            .heap
            .text(Tag::Symbol, name.as_bytes())
            .map_err(|e| self.oom(e))?;
        sym.set(s);
        let cell = self
            .heap
            .cons(sym, &self.symbols)
            .map_err(|e| self.oom(e))?;
        self.symbols.set(cell);
        Ok(sym.get())
    }

    /// A fresh uninterned symbol name `G__N`.
    pub(crate) fn next_gensym(&mut self) -> String {
        let name = format!("G__{}", self.gensym_counter);
        self.gensym_counter += 1;
        name
    }

    /// Prepends `(sym . val)` to the variables of the frame in `env`,
    /// shadowing any outer binding of the same symbol.
    pub fn add_variable(
        &mut self,
        env: &Cell<Ref>,
        sym: &Cell<Ref>,
        val: &Cell<Ref>,
    ) -> Result<(), LispError> {
        letroot!(self.heap => pair = ptr::null_mut(), vars = ptr::null_mut());
        let binding = self.heap.cons(sym, val).map_err(|e| self.oom(e))?;
        pair.set(binding);
        vars.set(env_vars(env.get()));
        let list = self.heap.cons(pair, vars).map_err(|e| self.oom(e))?;
        set_env_vars(env.get(), list);
        Ok(())
    }

    fn define_constant(&mut self, name: &str, value: Ref) -> Result<(), LispError> {
        letroot!(self.heap => env = self.genv.get(), sym = ptr::null_mut(), val = value);
        let s = self.intern(name)?;
        sym.set(s);
        self.add_variable(env, sym, val)
    }

    pub(crate) fn define_primitive(
        &mut self,
        name: &'static str,
        func: PrimFn,
    ) -> Result<(), LispError> {
        debug_assert!(
            !self.prims.contains_key(name),
            "primitive {name} registered twice"
        );
        let index = self.prims.len() as u32;
        self.prims.insert(name, func);
        letroot!(self.heap => env = self.genv.get(), sym = ptr::null_mut(), prim = ptr::null_mut());
        let s = self.intern(name)?;
        sym.set(s);
        let p = self.heap.primitive(index).map_err(|e| self.oom(e))?;
        prim.set(p);
        self.add_variable(env, sym, prim)
    }

    pub(crate) fn prim_fn(&self, index: u32) -> Option<PrimFn> {
        self.prims.get_index(index as usize).map(|(_, f)| *f)
    }

    /// Drives `src` to EOF. Every top-level value is printed followed by a
    /// newline; an error is reported to stderr and the loop resumes at the
    /// next top-level read. Returns 0 if every form succeeded, 1 otherwise.
    /// Fatal errors (exhausted memory, internal bugs) terminate the process.
    pub fn eval_input(&mut self, src: &mut dyn ByteSource) -> i32 {
        let saved = self.pos.clone();
        self.pos = SourcePos::new(src.name());
        let mut status = 0;
        loop {
            match self.rep_once(src) {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => {
                    eprintln!("{err}");
                    if err.kind.is_fatal() {
                        std::process::exit(1);
                    }
                    status = 1;
                }
            }
        }
        self.pos = saved;
        status
    }

    /// Slurps `path` and evaluates its contents with a recovery boundary of
    /// its own. I/O failures are reported without raising.
    pub fn process_file(&mut self, path: &Path) -> i32 {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(err) => {
                eprintln!("cannot read {}: {err}", path.display());
                return 1;
            }
        };
        let mut src = MemSource::new(path.display().to_string(), data);
        self.eval_input(&mut src)
    }

    /// Reads, evaluates and prints one top-level form. `Ok(false)` means
    /// end of input.
    fn rep_once(&mut self, src: &mut dyn ByteSource) -> Result<bool, LispError> {
        letroot!(self.heap => env = self.genv.get(), expr = ptr::null_mut());
        let obj = {
            let mut reader = Reader::new(self, src);
            reader.read_expr()?
        };
        let Some(obj) = obj else {
            return Ok(false);
        };
        expr.set(obj);
        self.pos.line = src.line();
        let value = eval(self, env, expr)?;
        let text = print_to_string(value);
        let _ = writeln!(self.out, "{text}");
        Ok(true)
    }
}
