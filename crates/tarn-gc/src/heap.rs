//! Heap, bump allocator and Cheney copying collector.
//!
//! The heap owns two fixed-size semispaces. Allocation bumps an offset
//! through the active space; when a request does not fit, the collector
//! evacuates every live object into the idle space, rewrites all roots and
//! internal references, and the spaces swap roles.
//!
//! Collection is the classic two-finger scheme: objects reachable from the
//! root set are copied first, and the copied prefix of the new space then
//! serves as the work queue. A `scan` pointer chases the allocation pointer,
//! forwarding the reference fields of each object it passes; when the two
//! meet, everything live has been relocated. Copying leaves a `Moved`
//! tombstone carrying the forwarding pointer in the old location, which
//! makes the copy idempotent and lets shared and cyclic structure survive
//! with identity intact.

use std::cell::Cell;
use std::mem;
use std::ptr;

use crate::config::GcConfig;
use crate::error::GcError;
use crate::object::{Closure, EnvFrame, Pair, Ref, Tag, Text, ALIGN, HEADER_SIZE};
use crate::roots::{RawFrame, RootHead};
use crate::space::Space;

/// Running totals kept across collections.
#[derive(Debug, Clone, Copy, Default)]
pub struct GcStats {
    /// Number of completed collection cycles.
    pub collections: u64,
    /// Total bytes copied into to-spaces over all cycles.
    pub bytes_copied: u64,
    /// Bytes live after the most recent cycle.
    pub live_bytes: usize,
}

/// The managed heap.
pub struct Heap {
    config: GcConfig,
    active: Space,
    idle: Space,
    used: usize,
    roots: Box<RootHead>,
    statics: Vec<*const Cell<Ref>>,
    gc_running: bool,
    stats: GcStats,
}

impl Heap {
    pub fn new(config: GcConfig) -> Result<Heap, GcError> {
        config.validate()?;
        let active = Space::new(config.semispace_size)?;
        let idle = Space::new(config.semispace_size)?;
        Ok(Heap {
            config,
            active,
            idle,
            used: 0,
            roots: Box::new(RootHead::new()),
            statics: Vec::new(),
            gc_running: false,
            stats: GcStats::default(),
        })
    }

    /// Address of the root-chain head, stable for the heap's lifetime.
    /// [`letroot!`](crate::letroot) links frames through this.
    pub fn roots_ptr(&self) -> *const RootHead {
        &*self.roots
    }

    /// Registers a long-lived root cell that is forwarded on every
    /// collection, ahead of the frame chain.
    ///
    /// # Safety
    ///
    /// `cell` must stay valid (pinned) for the rest of the heap's lifetime.
    pub unsafe fn add_static_root(&mut self, cell: *const Cell<Ref>) {
        self.statics.push(cell);
    }

    /// Bytes allocated in the active space.
    pub fn used(&self) -> usize {
        self.used
    }

    pub fn stats(&self) -> GcStats {
        self.stats
    }

    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    /// Whether `r` points into the active space.
    pub fn contains(&self, r: Ref) -> bool {
        self.active.contains(r as *const u8)
    }

    /// Allocates a zero-initialized object with the header populated.
    ///
    /// `payload` is the byte size of the tag-specific part; it is padded so
    /// a forwarding pointer always fits and the total size is aligned. May
    /// trigger a collection, which invalidates every reference not held in
    /// a root slot.
    pub fn alloc(&mut self, tag: Tag, payload: usize) -> Result<Ref, GcError> {
        assert!(!self.gc_running, "allocation during a collection");
        let payload = payload.max(mem::size_of::<Ref>());
        let size = align_up(HEADER_SIZE + payload);

        // In always-gc mode every allocation moves the heap, which turns a
        // missing root into an immediately visible failure.
        if self.config.always_gc {
            self.collect();
        } else if self.used + size > self.active.size() {
            self.collect();
        }
        if self.used + size > self.active.size() {
            return Err(GcError::MemoryExhausted {
                requested: size,
                available: self.active.size() - self.used,
            });
        }

        let obj = unsafe { self.active.start().add(self.used) } as Ref;
        unsafe {
            ptr::write_bytes(obj as *mut u8, 0, size);
            ptr::addr_of_mut!((*obj).tag).write(tag);
            ptr::addr_of_mut!((*obj).size).write(size);
        }
        self.used += size;
        Ok(obj)
    }

    /// Allocates a cell. The operands are read from their root slots after
    /// the allocation so a collection in between cannot stale them.
    pub fn cons(&mut self, car: &Cell<Ref>, cdr: &Cell<Ref>) -> Result<Ref, GcError> {
        let obj = self.alloc(Tag::Cell, mem::size_of::<Pair>())?;
        unsafe {
            (*obj).body.cell = Pair {
                car: car.get(),
                cdr: cdr.get(),
            };
        }
        Ok(obj)
    }

    pub fn int(&mut self, value: i64) -> Result<Ref, GcError> {
        let obj = self.alloc(Tag::Int, mem::size_of::<i64>())?;
        unsafe {
            (*obj).body.int = value;
        }
        Ok(obj)
    }

    /// Allocates a symbol or string with the given byte content.
    pub fn text(&mut self, tag: Tag, bytes: &[u8]) -> Result<Ref, GcError> {
        debug_assert!(matches!(tag, Tag::Symbol | Tag::Str));
        let obj = self.alloc(tag, mem::size_of::<Text>() + bytes.len())?;
        unsafe {
            (*obj).body.text.len = bytes.len();
            let dst = (obj as *mut u8).add(HEADER_SIZE + mem::size_of::<Text>());
            ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
        }
        Ok(obj)
    }

    /// Allocates a function or macro object.
    pub fn closure(
        &mut self,
        tag: Tag,
        params: &Cell<Ref>,
        body: &Cell<Ref>,
        env: &Cell<Ref>,
    ) -> Result<Ref, GcError> {
        debug_assert!(matches!(tag, Tag::Function | Tag::Macro));
        let obj = self.alloc(tag, mem::size_of::<Closure>())?;
        unsafe {
            (*obj).body.closure = Closure {
                params: params.get(),
                body: body.get(),
                env: env.get(),
            };
        }
        Ok(obj)
    }

    pub fn env_frame(&mut self, vars: &Cell<Ref>, up: &Cell<Ref>) -> Result<Ref, GcError> {
        let obj = self.alloc(Tag::Env, mem::size_of::<EnvFrame>())?;
        unsafe {
            (*obj).body.env = EnvFrame {
                vars: vars.get(),
                up: up.get(),
            };
        }
        Ok(obj)
    }

    pub fn primitive(&mut self, index: u32) -> Result<Ref, GcError> {
        let obj = self.alloc(Tag::Primitive, mem::size_of::<u32>())?;
        unsafe {
            (*obj).body.prim = index;
        }
        Ok(obj)
    }

    /// Evacuates every live object into the idle space and swaps spaces.
    pub fn collect(&mut self) {
        assert!(!self.gc_running, "collector re-entered");
        self.gc_running = true;
        let prev_used = self.used;
        mem::swap(&mut self.active, &mut self.idle);
        self.used = 0;

        // Forward the registered persistent roots, then every slot of every
        // frame on the root chain.
        for i in 0..self.statics.len() {
            let cell = self.statics[i];
            unsafe {
                let v = self.forward((*cell).get());
                (*cell).set(v);
            }
        }
        let mut frame = self.roots.head.get();
        while !frame.is_null() {
            unsafe {
                let len = (*frame).len;
                let slots = RawFrame::slots(frame);
                for i in 0..len {
                    let slot = &*slots.add(i);
                    let v = self.forward(slot.get());
                    slot.set(v);
                }
                frame = (*frame).prev.get();
            }
        }

        // Two-finger scan: the copied prefix of the new space is the work
        // queue, and `used` advances as forward() copies more objects.
        let mut scan = self.active.start();
        loop {
            let limit = unsafe { self.active.start().add(self.used) };
            if scan >= limit {
                break;
            }
            let obj = scan as Ref;
            unsafe {
                self.forward_fields(obj);
                scan = scan.add((*obj).size);
            }
        }

        self.idle.discard();
        self.stats.collections += 1;
        self.stats.bytes_copied += self.used as u64;
        self.stats.live_bytes = self.used;
        if self.config.verbose {
            log::info!(
                "gc cycle {}: {} bytes live, {} reclaimed",
                self.stats.collections,
                self.used,
                prev_used.saturating_sub(self.used)
            );
        } else {
            log::debug!(
                "gc cycle {}: {} bytes live, {} reclaimed",
                self.stats.collections,
                self.used,
                prev_used.saturating_sub(self.used)
            );
        }
        self.gc_running = false;
    }

    /// Relocates one reference. Null and references outside the evacuated
    /// space (sentinels) pass through unchanged; a tombstone yields the
    /// existing copy; anything else is copied byte for byte and replaced
    /// with a tombstone.
    fn forward(&mut self, obj: Ref) -> Ref {
        if obj.is_null() || !self.idle.contains(obj as *const u8) {
            return obj;
        }
        unsafe {
            if (*obj).tag == Tag::Moved {
                return (*obj).body.moved;
            }
            let size = (*obj).size;
            let dest = self.active.start().add(self.used) as Ref;
            ptr::copy_nonoverlapping(obj as *const u8, dest as *mut u8, size);
            self.used += size;
            (*obj).tag = Tag::Moved;
            (*obj).body.moved = dest;
            dest
        }
    }

    /// Forwards the reference fields of an already-copied object according
    /// to its tag.
    ///
    /// # Safety
    ///
    /// `obj` must point at a valid object in the active space.
    unsafe fn forward_fields(&mut self, obj: Ref) {
        match (*obj).tag {
            Tag::Int | Tag::Symbol | Tag::Str | Tag::Primitive => {}
            Tag::Cell => {
                let v = self.forward((*obj).body.cell.car);
                (*obj).body.cell.car = v;
                let v = self.forward((*obj).body.cell.cdr);
                (*obj).body.cell.cdr = v;
            }
            Tag::Function | Tag::Macro => {
                let v = self.forward((*obj).body.closure.params);
                (*obj).body.closure.params = v;
                let v = self.forward((*obj).body.closure.body);
                (*obj).body.closure.body = v;
                let v = self.forward((*obj).body.closure.env);
                (*obj).body.closure.env = v;
            }
            Tag::Env => {
                let v = self.forward((*obj).body.env.vars);
                (*obj).body.env.vars = v;
                let v = self.forward((*obj).body.env.up);
                (*obj).body.env.up = v;
            }
            Tag::Moved => {
                unreachable!("forwarding tombstone encountered during scan")
            }
            Tag::True | Tag::Nil | Tag::Dot | Tag::CloseParen => {
                unreachable!("sentinel object inside the managed heap")
            }
        }
    }
}

#[inline]
fn align_up(n: usize) -> usize {
    (n + ALIGN - 1) & !(ALIGN - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::letroot;
    use crate::object::{car, cdr, int_value, tag_of, text_bytes, Obj};

    fn small_heap() -> Heap {
        Heap::new(GcConfig {
            semispace_size: 16 * 1024,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn alloc_is_aligned_and_zeroed() {
        let mut heap = small_heap();
        let a = heap.int(7).unwrap();
        let b = heap.int(8).unwrap();
        assert_eq!(a as usize % ALIGN, 0);
        assert_eq!(b as usize % ALIGN, 0);
        assert!(unsafe { (*a).size } >= HEADER_SIZE + mem::size_of::<Ref>());
        assert_eq!(int_value(a), 7);
        assert_eq!(int_value(b), 8);
    }

    #[test]
    fn rooted_objects_survive_collection() {
        let mut heap = small_heap();
        letroot!(heap => a = ptr::null_mut(), b = ptr::null_mut(), pair = ptr::null_mut());
        a.set(heap.int(1).unwrap());
        b.set(heap.int(2).unwrap());
        let cell = heap.cons(a, b).unwrap();
        pair.set(cell);

        heap.collect();

        let cell = pair.get();
        assert!(heap.contains(cell));
        assert_eq!(tag_of(cell), Tag::Cell);
        assert_eq!(int_value(car(cell)), 1);
        assert_eq!(int_value(cdr(cell)), 2);
        // The slots were rewritten to the relocated copies.
        assert_eq!(car(cell), a.get());
        assert_eq!(cdr(cell), b.get());
    }

    #[test]
    fn garbage_is_reclaimed() {
        let mut heap = small_heap();
        for i in 0..64 {
            heap.int(i).unwrap();
        }
        let before = heap.used();
        heap.collect();
        assert_eq!(heap.used(), 0);
        assert!(before > 0);
    }

    #[test]
    fn identity_is_preserved_across_collection() {
        let mut heap = small_heap();
        letroot!(heap => x = ptr::null_mut(), y = ptr::null_mut());
        let obj = heap.int(99).unwrap();
        x.set(obj);
        y.set(obj);
        heap.collect();
        assert_eq!(x.get(), y.get());
        assert_eq!(int_value(x.get()), 99);
    }

    #[test]
    fn sentinels_pass_through_unchanged() {
        use crate::object::Sentinels;
        let mut heap = small_heap();
        let sentinels = Sentinels::boxed();
        letroot!(heap => s = sentinels.nil(), t = sentinels.t());
        heap.collect();
        assert_eq!(s.get(), sentinels.nil());
        assert_eq!(t.get(), sentinels.t());
    }

    #[test]
    fn shared_structure_stays_shared() {
        let mut heap = small_heap();
        letroot!(heap => leaf = ptr::null_mut(), left = ptr::null_mut(), right = ptr::null_mut());
        leaf.set(heap.int(5).unwrap());
        left.set(heap.cons(leaf, leaf).unwrap());
        right.set(heap.cons(leaf, leaf).unwrap());
        heap.collect();
        // Both cells still point at the one relocated leaf.
        assert_eq!(car(left.get()), car(right.get()));
        assert_eq!(car(left.get()), cdr(left.get()));
        assert_eq!(int_value(car(left.get())), 5);
    }

    #[test]
    fn cyclic_structure_survives() {
        let mut heap = small_heap();
        letroot!(heap => knot = ptr::null_mut(), nil = ptr::null_mut());
        let cell = heap.cons(nil, nil).unwrap();
        knot.set(cell);
        set_cycle(knot.get());
        heap.collect();
        let cell = knot.get();
        assert_eq!(car(cell), cell);
        assert_eq!(cdr(cell), cell);

        fn set_cycle(cell: Ref) {
            crate::object::set_car(cell, cell);
            crate::object::set_cdr(cell, cell);
        }
    }

    #[test]
    fn text_payload_is_copied_verbatim() {
        let mut heap = small_heap();
        letroot!(heap => s = ptr::null_mut());
        s.set(heap.text(Tag::Symbol, b"lambda").unwrap());
        heap.collect();
        assert_eq!(text_bytes(s.get()), b"lambda");
    }

    #[test]
    fn static_roots_are_forwarded() {
        let mut heap = small_heap();
        let table = Box::new(Cell::new(ptr::null_mut::<Obj>()));
        unsafe { heap.add_static_root(&*table) };
        table.set(heap.int(13).unwrap());
        heap.collect();
        assert!(heap.contains(table.get()));
        assert_eq!(int_value(table.get()), 13);
    }

    #[test]
    fn always_gc_moves_on_every_allocation() {
        let mut heap = Heap::new(GcConfig {
            semispace_size: 16 * 1024,
            always_gc: true,
            ..Default::default()
        })
        .unwrap();
        letroot!(heap => a = ptr::null_mut());
        a.set(heap.int(1).unwrap());
        let first = a.get();
        let _ = heap.int(2).unwrap();
        // The rooted object was relocated by the collection the second
        // allocation forced.
        assert_ne!(a.get(), first);
        assert_eq!(int_value(a.get()), 1);
    }

    #[test]
    fn exhaustion_reports_memory_exhausted() {
        let mut heap = Heap::new(GcConfig {
            semispace_size: 4096,
            ..Default::default()
        })
        .unwrap();
        letroot!(heap => head = ptr::null_mut(), item = ptr::null_mut());
        let err = loop {
            match heap.int(0) {
                Ok(obj) => {
                    item.set(obj);
                    match heap.cons(item, head) {
                        Ok(cell) => head.set(cell),
                        Err(e) => break e,
                    }
                }
                Err(e) => break e,
            }
        };
        assert!(matches!(err, GcError::MemoryExhausted { .. }));
    }

    #[test]
    fn stats_count_cycles() {
        let mut heap = small_heap();
        assert_eq!(heap.stats().collections, 0);
        heap.collect();
        heap.collect();
        assert_eq!(heap.stats().collections, 2);
    }
}
