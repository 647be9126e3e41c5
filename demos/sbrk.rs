use std::io::Read;

use brkalloc::{Heap, Release, Sbrk};
use libc::sbrk;

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap` or
/// `gdb` while the program break moves.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn print_blocks(heap: &Heap<Sbrk>) {
  for block in heap.blocks() {
    println!(
      "    {:?}  {:>6} bytes  {}",
      block.address,
      block.payload_size,
      if block.is_free { "free" } else { "used" }
    );
  }
}

fn main() {
  // Touch stdout and stdin before the heap captures the break, so their
  // buffers are not allocated on top of our blocks later.
  print_program_break("start");
  block_until_enter_pressed();

  // The system malloc may still use brk for its own arena. This demo keeps
  // its own allocations out of the way between steps, which is good enough
  // to watch the break move.
  let mut heap = unsafe { Heap::with_sbrk() };

  // --------------------------------------------------------------------
  // 1) Three allocations grow the break one block at a time.
  // --------------------------------------------------------------------
  let a = heap.allocate(4).expect("allocate a");
  let b = heap.allocate(100).expect("allocate b");
  let c = heap.allocate(32).expect("allocate c");

  unsafe {
    a.cast::<u32>().write(0xDEADBEEF);
    std::ptr::write_bytes(b.as_ptr(), 0xAB, 100);
  }

  println!("\n[1] a = {a:?}, b = {b:?}, c = {c:?}");
  print_blocks(&heap);
  print_program_break("after a, b, c");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Releasing b only marks it free: c is still live above it.
  // --------------------------------------------------------------------
  heap.release(b.as_ptr());
  println!("\n[2] Released b");
  print_blocks(&heap);
  print_program_break("after free(b)");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) A small request reuses b and splits what is left of it.
  // --------------------------------------------------------------------
  let d = heap.allocate(8).expect("allocate d");
  println!("\n[3] d = {d:?} (reused b: {})", d == b);
  print_blocks(&heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Releasing the tail gives memory back to the OS.
  // --------------------------------------------------------------------
  heap.release(d.as_ptr());
  match heap.try_release(c.as_ptr()) {
    Ok(Release::Reclaimed { bytes, blocks }) => {
      println!("\n[4] Released c, {bytes} bytes in {blocks} blocks returned")
    },
    other => println!("\n[4] Released c: {other:?}"),
  }
  print_blocks(&heap);
  print_program_break("after free(c)");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) Invalid and double releases are ignored.
  // --------------------------------------------------------------------
  println!("\n[5] free(c) again: {:?}", heap.try_release(c.as_ptr()));
  println!("[5] free(a + 1):   {:?}", heap.try_release(a.as_ptr().wrapping_add(1)));

  heap.release(a.as_ptr());
  println!(
    "[5] Released a, heap is empty: {}, start forgotten: {}",
    heap.is_empty(),
    !heap.is_initialized()
  );
  print_program_break("end");
}
