use std::mem;

/// Strictest alignment of any fundamental type, i.e. `alignof(max_align_t)`.
/// Every header and every payload handed out by [`crate::Heap`] starts at a
/// multiple of this value.
pub const ALIGNMENT: usize = mem::align_of::<libc::max_align_t>();

/// Rounds the given size up to the next multiple of [`ALIGNMENT`].
///
/// # Examples
///
/// ```rust
/// use brkalloc::{ALIGNMENT, align};
///
/// assert_eq!(align!(0), 0);
/// assert_eq!(align!(1), ALIGNMENT);
/// assert_eq!(align!(ALIGNMENT), ALIGNMENT);
/// assert_eq!(align!(ALIGNMENT + 1), 2 * ALIGNMENT);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align::align_up($value, $crate::ALIGNMENT)
  };
}

/// Rounds `value` up to a multiple of `align`, which must be a power of two.
#[inline]
pub const fn align_up(
  value: usize,
  align: usize,
) -> usize {
  debug_assert!(align.is_power_of_two());
  (value + align - 1) & !(align - 1)
}
