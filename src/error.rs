use thiserror::Error;

/// Failures of the address-space adjustment primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BreakError {
  #[error("program break cannot grow by {requested} bytes")]
  Exhausted { requested: usize },
  #[error("program break cannot move by {delta} bytes below its base")]
  Underflow { delta: isize },
}

/// Why [`crate::Heap::allocate`] could not hand out a block. The heap is left
/// exactly as it was before the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
  #[error("out of memory while allocating {requested} bytes")]
  OutOfMemory {
    requested: usize,
    #[source]
    source: BreakError,
  },
  #[error("allocation of {requested} bytes overflows the address space")]
  SizeOverflow { requested: usize },
}

/// Why [`crate::Heap::try_release`] ignored a pointer. [`crate::Heap::release`]
/// swallows all of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReleaseError {
  #[error("null pointer")]
  Null,
  #[error("{address:#x} was not allocated by this heap")]
  InvalidPointer { address: usize },
  #[error("{address:#x} is already free")]
  DoubleFree { address: usize },
}

/// What a successful release did to the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
  /// The block stays in place, marked free for reuse.
  Marked,
  /// The tail block and the free blocks right before it were handed back to
  /// the operating environment.
  Reclaimed { bytes: usize, blocks: usize },
}

pub type AllocResult<T> = Result<T, AllocError>;
