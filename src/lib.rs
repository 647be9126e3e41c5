//! # brkalloc - A First-Fit Program Break Allocator
//!
//! This crate provides a small dynamic memory allocator built directly on top
//! of a linear, growable address space: the **program break**. It offers two
//! primitives, [`Heap::allocate`] and [`Heap::release`], and does not rely on
//! any other allocator for its own bookkeeping.
//!
//! ## Overview
//!
//! Every block carries its metadata inline, right before the bytes handed to
//! the caller. Headers link to their neighbours in both directions, so the
//! heap is a doubly linked list living inside the memory it manages:
//!
//! ```text
//!   Heap Layout:
//!
//!   heap start                                                     break
//!   ▼                                                                  ▼
//!   ┌────────┬────────┬────────┬──────────────┬────────┬───────────────┐
//!   │ Header │ A      │ Header │ B (free)     │ Header │ C             │
//!   └────────┴────────┴────────┴──────────────┴────────┴───────────────┘
//!       │  ▲              │  ▲                    │
//!       │  └──── prev ────┘  └─────── prev ───────┘
//!       └────── next ────▶└───────── next ───────▶
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   brkalloc
//!   ├── align      - ALIGNMENT and the align! macro
//!   ├── block      - Inline block header, BlockInfo
//!   ├── brk        - ProgramBreak trait, Sbrk and FixedBreak
//!   ├── error      - AllocError, ReleaseError, Release
//!   └── heap       - Heap, the allocator itself
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brkalloc::{FixedBreak, Heap};
//!
//! let mut heap = Heap::new(FixedBreak::new(4096).unwrap());
//!
//! let ptr = heap.allocate(8).unwrap().cast::<u64>();
//!
//! unsafe {
//!     ptr.write(42);
//!     assert_eq!(ptr.read(), 42);
//! }
//!
//! heap.release(ptr.as_ptr().cast());
//! assert!(heap.is_empty());
//! ```
//!
//! ## How It Works
//!
//! Allocation scans the blocks from the heap start and takes the **first**
//! free block big enough for the request. If that block has room left for
//! another header plus one aligned unit, the rest is split off as a new free
//! block:
//!
//! ```text
//!   Splitting:
//!
//!   before  ┌────────┬─────────────────────────────────────┐
//!           │ Header │ free, 128 bytes                     │
//!           └────────┴─────────────────────────────────────┘
//!   after   ┌────────┬──────────┬────────┬─────────────────┐
//!           │ Header │ used, 16 │ Header │ free, 80 bytes  │
//!           └────────┴──────────┴────────┴─────────────────┘
//! ```
//!
//! When no free block fits, the break is raised by one header plus the
//! rounded size and the new block becomes the tail.
//!
//! Releasing a block in the middle of the heap only marks it free. Free
//! neighbours are **never** merged in place. Releasing the tail instead
//! lowers the break, and takes along every free block directly before it:
//!
//! ```text
//!   Tail Reclamation:
//!
//!   ┌─────┬─────────┬─────────┬─────┐            ┌─────┐
//!   │  A  │ B(free) │ C(free) │  D  │  free(D)   │  A  │
//!   └─────┴─────────┴─────────┴─────┘  ───────▶  └─────┘
//!                                   ▲                  ▲
//!                                 break              break
//! ```
//!
//! Once every block is gone the heap forgets its start, and the next
//! allocation captures the break again as if it were the first one.
//!
//! ## Errors
//!
//! [`Heap::allocate`] fails only when the break cannot be raised, and then
//! leaves the heap untouched. [`Heap::release`] never fails: null pointers,
//! pointers this heap never returned and double releases are ignored.
//! [`Heap::try_release`] reports them as [`ReleaseError`] instead.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: No synchronization primitives
//! - **One heap per break**: [`Sbrk`] assumes nobody else moves the break
//! - **Permanent fragmentation**: Free blocks below the tail are only reused,
//!   never merged

pub mod align;
mod block;
mod brk;
mod error;
mod heap;

pub use align::ALIGNMENT;
pub use block::{BlockInfo, HEADER_SIZE, MIN_SPLIT_SIZE};
pub use brk::{FixedBreak, ProgramBreak, Sbrk};
pub use error::{AllocError, AllocResult, BreakError, Release, ReleaseError};
pub use heap::Heap;
