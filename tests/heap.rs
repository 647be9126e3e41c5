//! Behaviour of the allocator through its public API, on a fixed-size break.

use std::ptr::{self, NonNull};

use brkalloc::{
  ALIGNMENT, AllocError, FixedBreak, align, HEADER_SIZE, Heap, MIN_SPLIT_SIZE, Release, ReleaseError,
};

fn heap(capacity: usize) -> Heap<FixedBreak> {
  Heap::new(FixedBreak::new(capacity).unwrap())
}

fn capacities(heap: &Heap<FixedBreak>) -> Vec<(usize, bool)> {
  heap
    .blocks()
    .map(|block| (block.payload_size, block.is_free))
    .collect()
}

#[test]
fn test_allocations_are_aligned_and_disjoint() {
  let mut heap = heap(1 << 16);
  let sizes = [0, 1, 7, 8, 15, 16, 17, 100, 255, 1000];

  let mut live: Vec<(NonNull<u8>, usize)> = Vec::new();

  for (i, &size) in sizes.iter().enumerate() {
    let address = heap.allocate(size).unwrap();
    assert_eq!(address.as_ptr() as usize % ALIGNMENT, 0);

    unsafe { ptr::write_bytes(address.as_ptr(), i as u8, size) };
    live.push((address, size));
  }

  for (i, (address, size)) in live.iter().enumerate() {
    for offset in 0..*size {
      assert_eq!(unsafe { address.as_ptr().add(offset).read() }, i as u8);
    }
  }

  let mut ranges: Vec<_> = live
    .iter()
    .map(|(address, size)| {
      let start = address.as_ptr() as usize;
      (start, start + (*size).max(1))
    })
    .collect();
  ranges.sort();
  for pair in ranges.windows(2) {
    assert!(pair[0].1 <= pair[1].0);
  }
}

#[test]
fn test_blocks_are_contiguous_up_to_the_break() {
  let mut heap = heap(1 << 16);

  for size in [3, 64, 9, 200] {
    heap.allocate(size).unwrap();
  }

  let base = heap.program_break().base().as_ptr() as usize;
  let mut expected = base + HEADER_SIZE;
  for block in heap.blocks() {
    assert_eq!(block.address.as_ptr() as usize, expected);
    expected += block.payload_size + HEADER_SIZE;
  }

  assert_eq!(heap.heap_size(), heap.program_break().used());
  assert_eq!(expected - HEADER_SIZE - base, heap.heap_size());
}

#[test]
fn test_first_fit_picks_earliest_block() {
  let mut heap = heap(1 << 16);

  let small = heap.allocate(ALIGNMENT).unwrap();
  let large = heap.allocate(3 * ALIGNMENT).unwrap();
  let medium = heap.allocate(2 * ALIGNMENT).unwrap();
  heap.allocate(1).unwrap();

  heap.release(small.as_ptr());
  heap.release(large.as_ptr());
  heap.release(medium.as_ptr());

  let address = heap.allocate(2 * ALIGNMENT - 1).unwrap();

  assert_eq!(address, large);
  assert_eq!(
    capacities(&heap),
    vec![
      (ALIGNMENT, true),
      (3 * ALIGNMENT, false),
      (2 * ALIGNMENT, true),
      (ALIGNMENT, false),
    ]
  );
}

#[test]
fn test_split_threshold() {
  // One unit short of a splittable remainder: the block is kept whole.
  let mut heap = heap(1 << 16);
  let block = heap.allocate(MIN_SPLIT_SIZE).unwrap();
  heap.allocate(1).unwrap();
  heap.release(block.as_ptr());

  assert_eq!(heap.allocate(ALIGNMENT).unwrap(), block);
  assert_eq!(
    capacities(&heap),
    vec![(MIN_SPLIT_SIZE, false), (ALIGNMENT, false)]
  );

  // Exactly a splittable remainder: two blocks.
  let mut heap = self::heap(1 << 16);
  let block = heap.allocate(ALIGNMENT + MIN_SPLIT_SIZE).unwrap();
  heap.allocate(1).unwrap();
  heap.release(block.as_ptr());

  assert_eq!(heap.allocate(ALIGNMENT).unwrap(), block);
  assert_eq!(
    capacities(&heap),
    vec![
      (ALIGNMENT, false),
      (MIN_SPLIT_SIZE - HEADER_SIZE, true),
      (ALIGNMENT, false),
    ]
  );
}

#[test]
fn test_split_remainder_is_reusable() {
  let mut heap = heap(1 << 16);

  let block = heap.allocate(10 * ALIGNMENT).unwrap();
  let guard = heap.allocate(1).unwrap();
  heap.release(block.as_ptr());

  let first = heap.allocate(ALIGNMENT).unwrap();
  let second = heap.allocate(ALIGNMENT).unwrap();

  assert_eq!(first, block);
  assert_eq!(
    second.as_ptr() as usize,
    first.as_ptr() as usize + ALIGNMENT + HEADER_SIZE
  );
  assert!(second < guard);
  assert_eq!(heap.len(), 4);
}

#[test]
fn test_double_release_is_a_noop() {
  let mut heap = heap(1 << 16);

  let a = heap.allocate(32).unwrap();
  let b = heap.allocate(32).unwrap();

  heap.release(a.as_ptr());
  let before = capacities(&heap);

  heap.release(a.as_ptr());
  assert_eq!(capacities(&heap), before);
  assert_eq!(
    heap.try_release(a.as_ptr()),
    Err(ReleaseError::DoubleFree {
      address: a.as_ptr() as usize
    })
  );

  assert_eq!(heap.allocate(32).unwrap(), a);
  assert_ne!(heap.allocate(32).unwrap(), b);
}

#[test]
fn test_invalid_pointers_are_ignored() {
  let mut heap = heap(1 << 16);

  let a = heap.allocate(64).unwrap();
  let b = heap.allocate(64).unwrap();
  let before = capacities(&heap);
  let used = heap.program_break().used();

  let mut on_stack = [0u8; 64];
  let foreign = [
    ptr::null_mut(),
    a.as_ptr().wrapping_add(1),
    b.as_ptr().wrapping_sub(1),
    b.as_ptr().wrapping_add(HEADER_SIZE),
    on_stack.as_mut_ptr(),
    usize::MAX as *mut u8,
  ];

  for address in foreign {
    heap.release(address);
  }

  assert_eq!(capacities(&heap), before);
  assert_eq!(heap.program_break().used(), used);

  let c = heap.allocate(64).unwrap();
  assert!(c > b);
  assert_eq!(heap.try_release(ptr::null_mut()), Err(ReleaseError::Null));
}

#[test]
fn test_tail_reclamation() {
  let mut heap = heap(1 << 16);

  let a = heap.allocate(64).unwrap();
  let b = heap.allocate(48).unwrap();
  let c = heap.allocate(32).unwrap();
  let after_a = HEADER_SIZE + 64;

  assert_eq!(
    heap.try_release(c.as_ptr()),
    Ok(Release::Reclaimed {
      bytes: HEADER_SIZE + 32,
      blocks: 1
    })
  );
  assert_eq!(
    heap.try_release(b.as_ptr()),
    Ok(Release::Reclaimed {
      bytes: HEADER_SIZE + 48,
      blocks: 1
    })
  );
  assert_eq!(heap.program_break().used(), after_a);

  let again = heap.allocate(32).unwrap();

  assert_eq!(heap.program_break().used(), after_a + HEADER_SIZE + 32);
  assert_eq!(again, b);
  assert_eq!(capacities(&heap), vec![(64, false), (32, false)]);
  heap.release(a.as_ptr());
  assert_eq!(capacities(&heap), vec![(64, true), (32, false)]);
}

#[test]
fn test_tail_reclamation_takes_free_run() {
  let mut heap = heap(1 << 16);

  let a = heap.allocate(16).unwrap();
  let b = heap.allocate(16).unwrap();
  let c = heap.allocate(16).unwrap();
  let d = heap.allocate(16).unwrap();

  heap.release(b.as_ptr());
  heap.release(c.as_ptr());
  assert_eq!(heap.len(), 4);

  assert_eq!(
    heap.try_release(d.as_ptr()),
    Ok(Release::Reclaimed {
      bytes: 3 * (HEADER_SIZE + 16),
      blocks: 3
    })
  );
  assert_eq!(heap.len(), 1);
  assert_eq!(heap.blocks().next().unwrap().address, a);
  assert_eq!(heap.program_break().used(), HEADER_SIZE + 16);
}

#[test]
fn test_full_reclamation_resets_state() {
  let mut heap = heap(1 << 16);

  let blocks: Vec<_> = (1..=5).map(|i| heap.allocate(i * 10).unwrap()).collect();
  assert!(heap.is_initialized());

  for block in blocks.iter().rev() {
    heap.release(block.as_ptr());
  }

  assert!(heap.is_empty());
  assert!(!heap.is_initialized());
  assert_eq!(heap.heap_start(), None);
  assert_eq!(heap.program_break().used(), 0);

  let first = heap.allocate(10).unwrap();
  assert_eq!(first, blocks[0]);
  assert_eq!(heap.heap_start(), Some(heap.program_break().base()));
}

#[test]
fn test_release_head_to_tail_empties_heap() {
  let mut heap = heap(1 << 16);

  let blocks: Vec<_> = (0..4).map(|_| heap.allocate(24).unwrap()).collect();

  for block in &blocks[..3] {
    assert_eq!(heap.try_release(block.as_ptr()), Ok(Release::Marked));
  }

  assert_eq!(
    heap.try_release(blocks[3].as_ptr()),
    Ok(Release::Reclaimed {
      bytes: 4 * (HEADER_SIZE + align!(24)),
      blocks: 4
    })
  );
  assert!(!heap.is_initialized());
  assert_eq!(heap.program_break().used(), 0);
}

#[test]
fn test_out_of_memory_then_recover() {
  let mut heap = heap(512);

  let a = heap.allocate(128).unwrap();
  let before = capacities(&heap);

  assert!(matches!(
    heap.allocate(512),
    Err(AllocError::OutOfMemory { requested: 512, .. })
  ));
  assert_eq!(capacities(&heap), before);

  heap.release(a.as_ptr());
  assert!(heap.is_empty());

  let b = heap.allocate(512 - HEADER_SIZE).unwrap();
  assert_eq!(b, a);
  assert_eq!(heap.program_break().used(), 512);
}

#[test]
fn test_first_call_failure_keeps_heap_empty() {
  let mut heap = heap(64);

  assert!(heap.allocate(1024).is_err());
  assert!(heap.is_empty());
  assert_eq!(heap.program_break().used(), 0);

  assert!(heap.allocate(16).is_ok());
  assert_eq!(heap.len(), 1);
}
