use std::{mem, ptr::NonNull};

use crate::align;

/// Size of a header once padded so the payload after it stays aligned.
pub const HEADER_SIZE: usize = align!(mem::size_of::<Header>());

/// Smallest remainder worth splitting off a free block: one header plus one
/// aligned unit of payload.
pub const MIN_SPLIT_SIZE: usize = HEADER_SIZE + align!(1);

/// Metadata written at the start of every block, directly in heap memory.
///
/// ```text
///   ┌──────────────────────┬──────────────────────────────┬────────────
///   │  Header              │  Payload (payload_size)      │  Header ...
///   │  payload_size        │                              │
///   │  is_free             │                              │
///   │  prev ───────────────┼──────── previous header      │
///   │  next ───────────────┼──────────────────────────────┼──▶
///   └──────────────────────┴──────────────────────────────┴────────────
///   ▲                      ▲
///   header address         payload address (returned to the caller)
/// ```
#[repr(C)]
pub(crate) struct Header {
  pub payload_size: usize,
  pub is_free: bool,
  pub prev: Option<NonNull<Header>>,
  pub next: Option<NonNull<Header>>,
}

impl Header {
  pub fn new(
    payload_size: usize,
    is_free: bool,
    prev: Option<NonNull<Header>>,
    next: Option<NonNull<Header>>,
  ) -> Self {
    Self {
      payload_size,
      is_free,
      prev,
      next,
    }
  }

  /// Header plus payload.
  #[inline]
  pub fn span(&self) -> usize {
    HEADER_SIZE + self.payload_size
  }

  /// Address right after the header.
  #[inline]
  pub fn payload_of(header: NonNull<Header>) -> NonNull<u8> {
    unsafe { header.cast::<u8>().add(HEADER_SIZE) }
  }

  /// Candidate header address for a payload pointer. Only an address
  /// computation: the result must be matched against the block list before
  /// it is dereferenced.
  #[inline]
  pub fn candidate_for(payload: *mut u8) -> usize {
    (payload as usize).wrapping_sub(HEADER_SIZE)
  }

  /// Address where the block physically following `header` would start.
  ///
  /// # Safety
  ///
  /// `header` must point to an initialized header inside the heap region.
  #[inline]
  pub unsafe fn end_of(header: NonNull<Header>) -> NonNull<u8> {
    unsafe {
      let span = header.as_ref().span();
      header.cast::<u8>().add(span)
    }
  }
}

/// Read-only snapshot of a block, as seen by [`crate::Heap::blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  /// Payload address, the same value [`crate::Heap::allocate`] returned.
  pub address: NonNull<u8>,
  /// Payload capacity in bytes, always a multiple of [`crate::ALIGNMENT`].
  pub payload_size: usize,
  pub is_free: bool,
}

impl BlockInfo {
  /// Header plus payload.
  pub fn span(&self) -> usize {
    HEADER_SIZE + self.payload_size
  }
}
