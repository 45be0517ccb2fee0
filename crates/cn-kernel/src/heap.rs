// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Dynamic memory manager
//!
//! Best-fit allocator over up to [`NHEAPS`] independent arenas. Heap 0
//! backs the process-wide allocation entry points ([`SystemHeap`]); heap 1
//! backs the modem's transmit shared memory.
//!
//! # Arena layout
//!
//! Every region of an arena, used or free, is prefixed by an 8-byte node
//! header:
//!
//! ```text
//! +--------------------------+-------------+-------------+------------------
//! | size (bits 0..31) | USED | prev (u16)  | next (u16)  | payload (size B)
//! +--------------------------+-------------+-------------+------------------
//! ```
//!
//! `prev`/`next` are offsets from the arena base in 4-byte words, with
//! `0xFFFF` meaning "none". The nodes form an address-ordered doubly linked
//! list covering the whole arena. The size never includes the header itself.
//!
//! Allocation picks the smallest free node with room for the request plus a
//! header (the highest-addressed one on ties), shrinks it in place and
//! carves the allocated node off its tail.
//! Freeing merges with the next node and then with the previous node when
//! either is free, so two free nodes are never adjacent after a free.
//!
//! All list mutation, including the used flag, happens with the heap lock
//! held.

use core::alloc::{GlobalAlloc, Layout};
use core::fmt;
use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use cn_common::constants::{HEAP_ALIGNMENT, NHEAPS};
use cn_common::log::LogSink;
use cn_common::{log_print, Error, Result};
use heapless::Vec;

use crate::port::Kernel;
use crate::sync::BoundedMutex;

/// Bytes of metadata in front of every block
pub const HEADER_SIZE: usize = 8;

const USED: u32 = 1 << 31;
const NIL: u16 = u16::MAX;

/// Blocks listed by [`HeapSet::report`]
pub const REPORT_MAX_BLOCKS: usize = 64;

/// Largest arena the 16-bit word links can address
pub const MAX_ARENA_SIZE: usize = NIL as usize * HEAP_ALIGNMENT;

/// Round a request up to the allocation granularity (minimum one word)
#[must_use]
pub const fn align_size(size: usize) -> usize {
    let size = if size == 0 { 1 } else { size };
    (size + HEAP_ALIGNMENT - 1) & !(HEAP_ALIGNMENT - 1)
}

/// Statically allocated, word-aligned backing memory for one heap
#[repr(C, align(4))]
pub struct HeapRegion<const N: usize>(pub [u8; N]);

impl<const N: usize> HeapRegion<N> {
    /// Zero-filled region
    #[must_use]
    pub const fn new() -> Self {
        Self([0; N])
    }
}

impl<const N: usize> Default for HeapRegion<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Index of one of the heaps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapId(u8);

impl HeapId {
    /// General application heap, behind [`SystemHeap`]
    pub const APP: Self = Self(0);
    /// Modem transmit shared memory
    pub const MODEM_TX: Self = Self(1);

    /// Heap `index`, if it exists
    #[must_use]
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < NHEAPS {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Numeric index
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for HeapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One node of the block list, as seen by diagnostics and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Byte offset of the header from the arena base
    pub offset: usize,
    /// Payload bytes
    pub size: usize,
    /// Whether the block is allocated
    pub used: bool,
    /// Offset of the previous node
    pub prev: Option<usize>,
    /// Offset of the next node
    pub next: Option<usize>,
}

/// Heap usage summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapStats {
    /// Arena size in bytes, headers included
    pub total: usize,
    /// Payload bytes in used blocks
    pub used: usize,
    /// Payload bytes in free blocks
    pub free: usize,
    /// Largest free payload
    pub largest_free: usize,
    /// Number of nodes
    pub nodes: usize,
    /// High-water mark of `used`
    pub max_used: usize,
}

impl HeapStats {
    /// High-water mark as a rounded integer percentage of the arena
    #[must_use]
    pub const fn max_used_percent(&self) -> usize {
        if self.total == 0 {
            0
        } else {
            (self.max_used * 1000 / self.total + 5) / 10
        }
    }
}

// ============================================================================
// Arena
// ============================================================================

/// Block list over one contiguous region
///
/// The arena does no locking of its own; [`HeapSet`] serializes access.
pub struct Arena {
    base: NonNull<u8>,
    len: usize,
    max_used: usize,
}

// SAFETY: the arena exclusively owns its region (it was handed a
// `&'static mut [u8]`), so moving it to another task moves that ownership.
unsafe impl Send for Arena {}

impl Arena {
    /// Install a single free node spanning `region`
    ///
    /// The region is trimmed to a word-aligned start and a whole number of
    /// words.
    ///
    /// # Errors
    /// - [`Error::DmmNullPointer`] if the region cannot hold more than one header
    /// - [`Error::DmmRegionTooLarge`] if the region exceeds [`MAX_ARENA_SIZE`]
    pub fn new(region: &'static mut [u8]) -> Result<Self> {
        let start = region.as_mut_ptr();
        let pad = start.align_offset(HEAP_ALIGNMENT);
        if pad >= region.len() {
            return Err(Error::DmmNullPointer);
        }
        let len = (region.len() - pad) & !(HEAP_ALIGNMENT - 1);
        if len <= HEADER_SIZE {
            return Err(Error::DmmNullPointer);
        }
        if len > MAX_ARENA_SIZE {
            return Err(Error::DmmRegionTooLarge);
        }

        // `pad < region.len()` keeps the pointer inside the region.
        let base = NonNull::new(start.wrapping_add(pad)).ok_or(Error::DmmNullPointer)?;
        let mut arena = Self { base, len, max_used: 0 };
        arena.store(
            0,
            Node {
                size: len - HEADER_SIZE,
                used: false,
                prev: None,
                next: None,
            },
        );
        Ok(arena)
    }

    /// Arena size in bytes, headers included
    #[must_use]
    pub const fn total(&self) -> usize {
        self.len
    }

    /// High-water mark of allocated payload bytes
    #[must_use]
    pub const fn max_used(&self) -> usize {
        self.max_used
    }

    /// Allocate `size` bytes (rounded up to the alignment)
    ///
    /// Returns `None` when no free node can hold the request plus a header.
    pub fn alloc(&mut self, size: usize) -> Option<NonNull<u8>> {
        if size > self.len {
            return None;
        }
        let size = align_size(size);
        let need = size.checked_add(HEADER_SIZE)?;

        let mut best: Option<(usize, Node)> = None;
        for (off, node) in self.nodes() {
            let fits = !node.used && node.size >= need;
            // ties go to the last candidate in address order
            if fits && best.map_or(true, |(_, b)| node.size <= b.size) {
                best = Some((off, node));
            }
        }
        let (best_off, mut best) = best?;

        best.size -= need;
        let new_off = best_off + HEADER_SIZE + best.size;
        let carved = Node {
            size,
            used: true,
            prev: Some(best_off),
            next: best.next,
        };
        if let Some(next_off) = best.next {
            let mut next = self.load(next_off);
            next.prev = Some(new_off);
            self.store(next_off, next);
        }
        best.next = Some(new_off);
        self.store(best_off, best);
        self.store(new_off, carved);

        let used: usize = self.nodes().filter(|(_, n)| n.used).map(|(_, n)| n.size).sum();
        self.max_used = self.max_used.max(used);

        Some(self.payload(new_off))
    }

    /// Release the block whose payload starts at `ptr`
    ///
    /// # Errors
    /// [`Error::DmmBadPointer`] if `ptr` is not the payload of a used node
    /// of this arena. The list is left untouched in that case.
    pub fn free(&mut self, ptr: NonNull<u8>) -> Result<()> {
        let off = self.offset_of(ptr).ok_or(Error::DmmBadPointer)?;
        let mut cur = match self.nodes().find(|(o, _)| *o == off) {
            Some((_, node)) if node.used => node,
            _ => return Err(Error::DmmBadPointer),
        };
        cur.used = false;

        // absorb the next node
        if let Some(next_off) = cur.next {
            let next = self.load(next_off);
            if !next.used {
                cur.size += next.size + HEADER_SIZE;
                cur.next = next.next;
                self.relink_prev(next.next, off);
            }
        }
        self.store(off, cur);

        // fold into the previous node
        if let Some(prev_off) = cur.prev {
            let mut prev = self.load(prev_off);
            if !prev.used {
                prev.size += cur.size + HEADER_SIZE;
                prev.next = cur.next;
                self.relink_prev(cur.next, prev_off);
                self.store(prev_off, prev);
            }
        }
        Ok(())
    }

    /// Snapshot of the block list in address order
    pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
        self.nodes().map(|(offset, n)| BlockInfo {
            offset,
            size: n.size,
            used: n.used,
            prev: n.prev,
            next: n.next,
        })
    }

    /// Usage summary
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        let mut s = HeapStats {
            total: self.len,
            max_used: self.max_used,
            ..HeapStats::default()
        };
        for (_, n) in self.nodes() {
            s.nodes += 1;
            if n.used {
                s.used += n.size;
            } else {
                s.free += n.size;
                s.largest_free = s.largest_free.max(n.size);
            }
        }
        s
    }

    /// Whether `ptr` lies inside this arena
    #[must_use]
    pub fn contains(&self, ptr: *const u8) -> bool {
        let base = self.base.as_ptr() as usize;
        let p = ptr as usize;
        p >= base && p < base + self.len
    }

    /// Address of a node header, for diagnostics
    fn address(&self, off: usize) -> usize {
        self.base.as_ptr() as usize + off
    }

    fn payload(&self, off: usize) -> NonNull<u8> {
        // SAFETY: `off + HEADER_SIZE` is inside the arena for every node
        // offset, and the base is non-null.
        unsafe { NonNull::new_unchecked(self.base.as_ptr().add(off + HEADER_SIZE)) }
    }

    fn offset_of(&self, ptr: NonNull<u8>) -> Option<usize> {
        let p = ptr.as_ptr() as usize;
        let base = self.base.as_ptr() as usize;
        let off = p.checked_sub(base)?.checked_sub(HEADER_SIZE)?;
        (off % HEAP_ALIGNMENT == 0 && off + HEADER_SIZE <= self.len).then_some(off)
    }

    fn relink_prev(&mut self, node: Option<usize>, prev: usize) {
        if let Some(off) = node {
            let mut n = self.load(off);
            n.prev = Some(prev);
            self.store(off, n);
        }
    }

    fn nodes(&self) -> Nodes<'_> {
        Nodes {
            arena: self,
            cursor: Some(0),
        }
    }

    fn load(&self, off: usize) -> Node {
        debug_assert!(off % HEAP_ALIGNMENT == 0 && off + HEADER_SIZE <= self.len);
        // SAFETY: node offsets are word aligned and leave room for a header
        // inside the arena; the base is word aligned, so the header words
        // are aligned and in bounds.
        let (tag, prev, next) = unsafe {
            let p = self.base.as_ptr().add(off);
            (
                ptr::read(p.cast::<u32>()),
                ptr::read(p.add(4).cast::<u16>()),
                ptr::read(p.add(6).cast::<u16>()),
            )
        };
        Node {
            size: (tag & !USED) as usize,
            used: tag & USED != 0,
            prev: from_link(prev),
            next: from_link(next),
        }
    }

    fn store(&mut self, off: usize, node: Node) {
        debug_assert!(off % HEAP_ALIGNMENT == 0 && off + HEADER_SIZE <= self.len);
        // Sizes are bounded by MAX_ARENA_SIZE, far below the USED bit.
        #[allow(clippy::cast_possible_truncation)]
        let tag = node.size as u32 | if node.used { USED } else { 0 };
        // SAFETY: as in `load`; `&mut self` gives exclusive access to the
        // arena memory.
        unsafe {
            let p = self.base.as_ptr().add(off);
            ptr::write(p.cast::<u32>(), tag);
            ptr::write(p.add(4).cast::<u16>(), to_link(node.prev));
            ptr::write(p.add(6).cast::<u16>(), to_link(node.next));
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Node {
    size: usize,
    used: bool,
    prev: Option<usize>,
    next: Option<usize>,
}

#[allow(clippy::cast_possible_truncation)]
fn to_link(off: Option<usize>) -> u16 {
    off.map_or(NIL, |o| (o / HEAP_ALIGNMENT) as u16)
}

fn from_link(link: u16) -> Option<usize> {
    (link != NIL).then(|| usize::from(link) * HEAP_ALIGNMENT)
}

struct Nodes<'a> {
    arena: &'a Arena,
    cursor: Option<usize>,
}

impl Iterator for Nodes<'_> {
    type Item = (usize, Node);

    fn next(&mut self) -> Option<Self::Item> {
        let off = self.cursor?;
        let node = self.arena.load(off);
        self.cursor = node.next;
        Some((off, node))
    }
}

// ============================================================================
// Heap set
// ============================================================================

/// The firmware's heaps, each behind its own bounded lock
pub struct HeapSet<'k> {
    kernel: &'k dyn Kernel,
    heaps: [BoundedMutex<Option<Arena>>; NHEAPS],
    max_used: [AtomicUsize; NHEAPS],
    lock_timeout_ms: u32,
}

impl<'k> HeapSet<'k> {
    /// Create a set with no heap initialized
    #[must_use]
    pub const fn new(kernel: &'k dyn Kernel, lock_timeout_ms: u32) -> Self {
        const EMPTY: BoundedMutex<Option<Arena>> = BoundedMutex::new(None);
        const ZERO: AtomicUsize = AtomicUsize::new(0);
        Self {
            kernel,
            heaps: [EMPTY; NHEAPS],
            max_used: [ZERO; NHEAPS],
            lock_timeout_ms,
        }
    }

    /// Install `region` as heap `id`
    ///
    /// # Errors
    /// - [`Error::DmmAlreadyInit`] if the heap already has a region
    /// - [`Error::LockTimeout`] if the heap lock was not obtained
    /// - any error of [`Arena::new`]
    pub fn init(&self, id: HeapId, region: &'static mut [u8]) -> Result<()> {
        let mut slot = self.lock(id).ok_or(Error::LockTimeout)?;
        if slot.is_some() {
            return Err(Error::DmmAlreadyInit);
        }
        *slot = Some(Arena::new(region)?);
        Ok(())
    }

    /// Allocate `size` bytes from heap `id`
    ///
    /// Returns `None` if the heap is not initialized, has no fitting block,
    /// or its lock was not obtained in time.
    pub fn alloc(&self, id: HeapId, size: usize) -> Option<NonNull<u8>> {
        let mut slot = self.lock(id)?;
        let arena = slot.as_mut()?;
        let ptr = arena.alloc(size)?;
        self.max_used[id.index()].fetch_max(arena.max_used(), Ordering::AcqRel);
        Some(ptr)
    }

    /// Release a block previously returned by [`HeapSet::alloc`] on heap `id`
    ///
    /// A null pointer is ignored. The whole operation runs under the heap
    /// lock; if the lock cannot be taken the block stays allocated.
    ///
    /// # Errors
    /// - [`Error::LockTimeout`] if the heap lock was not obtained
    /// - [`Error::DmmNotInit`] if the heap has no region
    /// - [`Error::DmmBadPointer`] if `ptr` is not a live block of the heap
    pub fn free(&self, id: HeapId, ptr: *mut u8) -> Result<()> {
        let Some(ptr) = NonNull::new(ptr) else {
            return Ok(());
        };
        let mut slot = self.lock(id).ok_or(Error::LockTimeout)?;
        slot.as_mut().ok_or(Error::DmmNotInit)?.free(ptr)
    }

    /// Allocate an owned buffer of `len` bytes that frees itself on drop
    pub fn alloc_buffer(&self, id: HeapId, len: usize) -> Option<HeapBuffer<'_>> {
        let ptr = self.alloc(id, len)?;
        Some(HeapBuffer {
            heaps: self,
            id,
            ptr,
            len,
        })
    }

    /// Cumulative high-water mark of heap `id` in bytes
    #[must_use]
    pub fn max_size(&self, id: HeapId) -> usize {
        self.max_used[id.index()].load(Ordering::Acquire)
    }

    /// Usage summary of heap `id`, if initialized and lockable
    pub fn stats(&self, id: HeapId) -> Option<HeapStats> {
        self.lock(id)?.as_ref().map(Arena::stats)
    }

    /// Print the block list and utilization of heap `id`
    ///
    /// The list is copied under the heap lock and printed after it is
    /// released, so a slow sink never stalls allocation. At most
    /// [`REPORT_MAX_BLOCKS`] blocks are listed.
    ///
    /// # Errors
    /// - [`Error::LockTimeout`] if the heap lock was not obtained
    /// - [`Error::DmmNotInit`] if the heap has no region
    pub fn report(&self, id: HeapId, sink: &dyn LogSink) -> Result<()> {
        let mut blocks: Vec<BlockInfo, REPORT_MAX_BLOCKS> = Vec::new();
        let (base, stats) = {
            let slot = self.lock(id).ok_or(Error::LockTimeout)?;
            let arena = slot.as_ref().ok_or(Error::DmmNotInit)?;
            for b in arena.blocks() {
                if blocks.push(b).is_err() {
                    break;
                }
            }
            (arena.address(0), arena.stats())
        };
        let address = |off: Option<usize>| off.map_or(0, |o| base + o);

        log_print!(sink, "Heap: {id}\r\n");
        for b in &blocks {
            log_print!(
                sink,
                "Block Size:{:6}, Head: 0x{:08x}, Prev: 0x{:08x}, Next: 0x{:08x}, Free: {}\r\n",
                b.size,
                base + b.offset,
                address(b.prev),
                address(b.next),
                if b.used { "No" } else { "Yes" }
            );
        }
        if stats.nodes > blocks.len() {
            log_print!(sink, "... {} more blocks\r\n", stats.nodes - blocks.len());
        }
        log_print!(
            sink,
            "Maximum memory used: {}, {}% usage\r\n",
            stats.max_used,
            stats.max_used_percent()
        );
        Ok(())
    }

    /// Heap `id` containing `ptr`, if any
    pub fn owner_of(&self, ptr: *const u8) -> Option<HeapId> {
        (0..NHEAPS).find_map(|i| {
            let id = HeapId(u8::try_from(i).ok()?);
            let slot = self.lock(id)?;
            slot.as_ref().filter(|a| a.contains(ptr)).map(|_| id)
        })
    }

    fn lock(&self, id: HeapId) -> Option<crate::sync::BoundedGuard<'_, Option<Arena>>> {
        self.heaps
            .get(id.index())?
            .lock_within(self.kernel, self.lock_timeout_ms)
    }
}

/// Owned allocation from a [`HeapSet`], released on drop
pub struct HeapBuffer<'a> {
    heaps: &'a HeapSet<'a>,
    id: HeapId,
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: the buffer exclusively owns its allocation and the heap set it
// returns to is `Sync`.
unsafe impl Send for HeapBuffer<'_> {}

impl HeapBuffer<'_> {
    /// Heap the buffer came from
    #[must_use]
    pub const fn heap(&self) -> HeapId {
        self.id
    }

    /// Requested length
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer has zero length
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Raw payload address
    #[must_use]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Buffer contents
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the block holds at least `len` initialized bytes (arena
        // memory starts initialized) and is owned exclusively by `self`.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Mutable buffer contents
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as in `as_slice`; `&mut self` makes the borrow unique.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for HeapBuffer<'_> {
    fn drop(&mut self) {
        // A lock timeout leaks the block rather than corrupting the list.
        let _ = self.heaps.free(self.id, self.ptr.as_ptr());
    }
}

// ============================================================================
// Global allocator shim
// ============================================================================

/// `GlobalAlloc` over heap 0 of an attached [`HeapSet`]
///
/// Until [`SystemHeap::attach`] is called every allocation fails.
///
/// ```rust,ignore
/// #[global_allocator]
/// static ALLOCATOR: SystemHeap = SystemHeap::new();
///
/// ALLOCATOR.attach(&ctx.heaps);
/// ```
pub struct SystemHeap {
    heaps: AtomicPtr<HeapSet<'static>>,
}

impl SystemHeap {
    /// Detached allocator
    #[must_use]
    pub const fn new() -> Self {
        Self {
            heaps: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Route allocations to heap 0 of `heaps`
    pub fn attach(&self, heaps: &'static HeapSet<'static>) {
        let raw = (heaps as *const HeapSet<'static>).cast_mut();
        self.heaps.store(raw, Ordering::Release);
    }

    fn heaps(&self) -> Option<&'static HeapSet<'static>> {
        // SAFETY: the pointer is either null or came from a `&'static`.
        unsafe { self.heaps.load(Ordering::Acquire).as_ref() }
    }
}

impl Default for SystemHeap {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: blocks are word aligned and never overlap; larger alignments are
// refused with null as the trait permits.
unsafe impl GlobalAlloc for SystemHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > HEAP_ALIGNMENT {
            return ptr::null_mut();
        }
        self.heaps()
            .and_then(|h| h.alloc(HeapId::APP, layout.size()))
            .map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        if let Some(h) = self.heaps() {
            let _ = h.free(HeapId::APP, ptr);
        }
    }
}
