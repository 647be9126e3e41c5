use std::{
  alloc::{self, Layout},
  ptr::NonNull,
};

use libc::{c_void, intptr_t, sbrk};

use crate::{ALIGNMENT, error::BreakError};

/// The only boundary between [`crate::Heap`] and the operating environment:
/// move the end of a linear memory region by a signed number of bytes.
///
/// # Safety
///
/// After `adjust(delta)` succeeds with `delta > 0` and returns `old`, the
/// bytes `[old, old + delta)` must be readable, writable and untouched by
/// anybody else until they are given back with a negative adjustment.
/// Successive growths must be contiguous: each returned `old` equals the
/// previous break plus the previous delta.
pub unsafe trait ProgramBreak {
  /// Moves the break by `delta` bytes and returns the break before the move.
  /// `adjust(0)` only queries the current break.
  fn adjust(
    &mut self,
    delta: isize,
  ) -> Result<NonNull<u8>, BreakError>;

  /// Current break.
  fn current(&mut self) -> Result<NonNull<u8>, BreakError> {
    self.adjust(0)
  }
}

/// The process program break, driven through `sbrk(2)`.
pub struct Sbrk {
  _private: (),
}

impl Sbrk {
  /// # Safety
  ///
  /// Nothing else in the process may move the program break while the
  /// returned value is in use. In particular the system `malloc` must not be
  /// using `brk` for its own arena, and only one [`crate::Heap`] may own an
  /// `Sbrk` at a time.
  pub unsafe fn new() -> Self {
    Self { _private: () }
  }
}

unsafe impl ProgramBreak for Sbrk {
  fn adjust(
    &mut self,
    delta: isize,
  ) -> Result<NonNull<u8>, BreakError> {
    let previous = unsafe { sbrk(delta as intptr_t) };

    if previous == usize::MAX as *mut c_void {
      return Err(if delta < 0 {
        BreakError::Underflow { delta }
      } else {
        BreakError::Exhausted {
          requested: delta.unsigned_abs(),
        }
      });
    }

    NonNull::new(previous.cast()).ok_or(BreakError::Exhausted {
      requested: delta.unsigned_abs(),
    })
  }
}

/// A break over a fixed-size buffer owned by this value. Useful wherever the
/// real program break is off limits, tests in particular.
///
/// ```text
///   base                      base + top              base + capacity
///   ┌─────────────────────────┬──────────────────────────┐
///   │   handed out            │    available             │
///   └─────────────────────────┴──────────────────────────┘
///                             ▲ break
/// ```
pub struct FixedBreak {
  base: NonNull<u8>,
  layout: Layout,
  top: usize,
}

impl FixedBreak {
  /// Reserves `capacity` bytes, aligned to [`ALIGNMENT`]. Returns `None` if
  /// the backing buffer itself cannot be allocated.
  pub fn new(capacity: usize) -> Option<Self> {
    let layout = Layout::from_size_align(capacity.max(1), ALIGNMENT).ok()?;
    let base = NonNull::new(unsafe { alloc::alloc_zeroed(layout) })?;

    Some(Self {
      base,
      layout,
      top: 0,
    })
  }

  pub fn capacity(&self) -> usize {
    self.layout.size()
  }

  /// Bytes currently below the break.
  pub fn used(&self) -> usize {
    self.top
  }

  pub fn base(&self) -> NonNull<u8> {
    self.base
  }
}

unsafe impl ProgramBreak for FixedBreak {
  fn adjust(
    &mut self,
    delta: isize,
  ) -> Result<NonNull<u8>, BreakError> {
    let previous = unsafe { self.base.add(self.top) };

    let top = if delta >= 0 {
      self
        .top
        .checked_add(delta.unsigned_abs())
        .filter(|top| *top <= self.capacity())
        .ok_or(BreakError::Exhausted {
          requested: delta.unsigned_abs(),
        })?
    } else {
      self
        .top
        .checked_sub(delta.unsigned_abs())
        .ok_or(BreakError::Underflow { delta })?
    };

    self.top = top;

    Ok(previous)
  }
}

impl Drop for FixedBreak {
  fn drop(&mut self) {
    unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) }
  }
}
