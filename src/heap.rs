use std::{marker::PhantomData, ptr::NonNull};

use log::{debug, trace, warn};

use crate::{
  ALIGNMENT, align,
  align::align_up,
  block::{BlockInfo, HEADER_SIZE, Header, MIN_SPLIT_SIZE},
  brk::{ProgramBreak, Sbrk},
  error::{AllocError, AllocResult, Release, ReleaseError},
};

/// Largest request that still fits, once rounded and prefixed with a header,
/// in a single positive break adjustment.
const MAX_REQUEST: usize = isize::MAX as usize - HEADER_SIZE - ALIGNMENT;

/// First-fit allocator over a [`ProgramBreak`].
///
/// Blocks are laid out back to back from the start of the heap up to the
/// break, each one starting with a [`Header`] that links it to its neighbours
/// in address order. Free blocks in the middle of the heap stay where they
/// are until a later allocation reuses them; only a free run touching the
/// break is given back, by lowering the break.
pub struct Heap<B: ProgramBreak> {
  brk: B,
  /// Break captured by the first allocation. Reset to `None` when the last
  /// block is reclaimed so the next allocation captures it again.
  start: Option<NonNull<Header>>,
  /// Number of blocks reachable from `start`.
  len: usize,
}

impl Heap<Sbrk> {
  /// Heap over the real process break.
  ///
  /// # Safety
  ///
  /// See [`Sbrk::new`].
  pub unsafe fn with_sbrk() -> Self {
    Self::new(unsafe { Sbrk::new() })
  }
}

impl<B: ProgramBreak> Heap<B> {
  pub fn new(brk: B) -> Self {
    Self {
      brk,
      start: None,
      len: 0,
    }
  }

  /// Returns a pointer to at least `size` writable bytes, aligned to
  /// [`ALIGNMENT`]. A request of 0 bytes still gets one aligned unit.
  ///
  /// The first free block that can hold the request is reused, and split if
  /// what remains is big enough to be a block of its own. Otherwise the
  /// break is raised by exactly one header plus the rounded size. If the
  /// break cannot be raised nothing in the heap changes.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> AllocResult<NonNull<u8>> {
    if size > MAX_REQUEST {
      return Err(AllocError::SizeOverflow { requested: size });
    }

    let need = align!(size.max(1));
    let start = self.capture_start(size)?;

    let mut last = None;
    let mut current = (self.len > 0).then_some(start);

    while let Some(header) = current {
      unsafe {
        if (*header.as_ptr()).is_free && (*header.as_ptr()).payload_size >= need {
          trace!(
            "first fit for {need} bytes at {header:?} ({} bytes)",
            (*header.as_ptr()).payload_size
          );
          self.take(header, need);

          return Ok(Header::payload_of(header));
        }

        last = Some(header);
        current = (*header.as_ptr()).next;
      }
    }

    self.grow(size, need, last)
  }

  /// Releases the block whose payload starts at `address`, ignoring null,
  /// foreign and already released pointers.
  pub fn release(
    &mut self,
    address: *mut u8,
  ) {
    if let Err(error) = self.try_release(address) {
      debug!("release ignored: {error}");
    }
  }

  /// Same as [`Heap::release`] but reports what happened.
  ///
  /// A block that is not the last one is only marked free. Releasing the
  /// last block lowers the break past it and past every free block directly
  /// before it, so the tail of the heap never ends in free space left behind
  /// by a release.
  pub fn try_release(
    &mut self,
    address: *mut u8,
  ) -> Result<Release, ReleaseError> {
    if address.is_null() {
      return Err(ReleaseError::Null);
    }

    let candidate = Header::candidate_for(address);

    let Some(mut header) = self.headers().find(|header| header.as_ptr() as usize == candidate)
    else {
      return Err(ReleaseError::InvalidPointer {
        address: address as usize,
      });
    };

    unsafe {
      if header.as_ref().is_free {
        return Err(ReleaseError::DoubleFree {
          address: address as usize,
        });
      }

      if header.as_ref().next.is_some() {
        header.as_mut().is_free = true;
        trace!("marked {header:?} free");

        return Ok(Release::Marked);
      }

      Ok(self.reclaim(header))
    }
  }

  /// Whether a heap start is currently captured.
  pub fn is_initialized(&self) -> bool {
    self.start.is_some()
  }

  /// Address of the first header, once captured.
  pub fn heap_start(&self) -> Option<NonNull<u8>> {
    self.start.map(NonNull::cast)
  }

  /// Number of blocks, free or not.
  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// Bytes between the heap start and the break, headers included.
  pub fn heap_size(&self) -> usize {
    self.blocks().map(|block| block.span()).sum()
  }

  /// Every block in address order.
  pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
    self.headers().map(|header| unsafe {
      let block = header.as_ref();
      BlockInfo {
        address: Header::payload_of(header),
        payload_size: block.payload_size,
        is_free: block.is_free,
      }
    })
  }

  pub fn program_break(&self) -> &B {
    &self.brk
  }

  fn headers(&self) -> Headers<'_> {
    Headers {
      current: if self.len > 0 { self.start } else { None },
      marker: PhantomData,
    }
  }

  fn capture_start(
    &mut self,
    requested: usize,
  ) -> AllocResult<NonNull<Header>> {
    if let Some(start) = self.start {
      return Ok(start);
    }

    let out_of_memory = |source| AllocError::OutOfMemory { requested, source };

    let brk = self.brk.current().map_err(out_of_memory)?;
    let address = brk.as_ptr() as usize;
    let padding = align_up(address, ALIGNMENT) - address;

    if padding > 0 {
      self.brk.adjust(padding as isize).map_err(out_of_memory)?;
    }

    let start = unsafe { brk.add(padding) }.cast::<Header>();
    debug!("heap starts at {start:?} (skipped {padding} bytes to align)");

    self.start = Some(start);

    Ok(start)
  }

  /// Marks a free block as used, splitting off the unused remainder when it
  /// can hold a header and at least one aligned unit.
  ///
  /// # Safety
  ///
  /// `header` must be a free block of this heap with at least `need` bytes.
  unsafe fn take(
    &mut self,
    mut header: NonNull<Header>,
    need: usize,
  ) {
    unsafe {
      let block = header.as_mut();
      block.is_free = false;

      let remainder = block.payload_size - need;
      if remainder < MIN_SPLIT_SIZE {
        return;
      }

      let split = header.cast::<u8>().add(HEADER_SIZE + need).cast::<Header>();
      split.write(Header::new(
        remainder - HEADER_SIZE,
        true,
        Some(header),
        block.next,
      ));

      if let Some(mut next) = block.next {
        next.as_mut().prev = Some(split);
      }

      block.payload_size = need;
      block.next = Some(split);
      self.len += 1;

      trace!(
        "split {header:?}: kept {need} bytes, {} bytes free at {split:?}",
        remainder - HEADER_SIZE
      );
    }
  }

  /// Appends a new block after `last` by raising the break.
  fn grow(
    &mut self,
    requested: usize,
    need: usize,
    last: Option<NonNull<Header>>,
  ) -> AllocResult<NonNull<u8>> {
    let total = need + HEADER_SIZE;

    let previous = self
      .brk
      .adjust(total as isize)
      .map_err(|source| AllocError::OutOfMemory { requested, source })?;

    let header = previous.cast::<Header>();

    debug_assert_eq!(
      Some(header.cast::<u8>()),
      match last {
        Some(last) => Some(unsafe { Header::end_of(last) }),
        None => self.start.map(NonNull::cast),
      },
      "program break moved behind the heap's back"
    );

    unsafe {
      header.write(Header::new(need, false, last, None));

      if let Some(mut last) = last {
        last.as_mut().next = Some(header);
      }
    }

    self.len += 1;
    debug!("grew heap by {total} bytes, new block at {header:?}");

    Ok(Header::payload_of(header))
  }

  /// Lowers the break past `tail` and every free block right before it.
  ///
  /// # Safety
  ///
  /// `tail` must be the last, occupied block of this heap.
  unsafe fn reclaim(
    &mut self,
    tail: NonNull<Header>,
  ) -> Release {
    unsafe {
      let mut bytes = tail.as_ref().span();
      let mut blocks = 1;
      let mut current = tail.as_ref().prev;

      while let Some(mut prev) = current {
        if !prev.as_ref().is_free {
          break;
        }

        bytes += prev.as_ref().span();
        blocks += 1;
        prev.as_mut().next = None;
        current = prev.as_ref().prev;
      }

      match current {
        Some(mut survivor) => survivor.as_mut().next = None,
        None => self.start = None,
      }

      self.len -= blocks;

      if let Err(error) = self.brk.adjust(-(bytes as isize)) {
        warn!("could not lower the break by {bytes} bytes: {error}");
      }

      debug!(
        "reclaimed {bytes} bytes in {blocks} blocks{}",
        if self.start.is_none() { ", heap is empty" } else { "" }
      );

      Release::Reclaimed { bytes, blocks }
    }
  }
}

struct Headers<'a> {
  current: Option<NonNull<Header>>,
  marker: PhantomData<&'a Header>,
}

impl Iterator for Headers<'_> {
  type Item = NonNull<Header>;

  fn next(&mut self) -> Option<Self::Item> {
    let header = self.current?;
    self.current = unsafe { header.as_ref().next };
    Some(header)
  }
}
