//! Alignment arithmetic and raw memory primitives
//!
//! - Alignment helpers shared by every allocator
//! - Slice-level copy / set / zero / compare
//! - Allocator-backed duplication and formatting

use core::cmp::Ordering;
use core::fmt;
use core::ptr::{self, NonNull};

use crate::allocator::Allocator;

/// Aligns a value up to the nearest multiple of alignment.
///
/// An alignment of `0` means "no rounding".
///
/// # Examples
/// ```
/// use sl_memory::utils::align_up;
///
/// assert_eq!(align_up(7, 8), 8);
/// assert_eq!(align_up(8, 8), 8);
/// assert_eq!(align_up(9, 8), 16);
/// assert_eq!(align_up(9, 0), 9);
/// ```
#[inline(always)]
pub const fn align_up(value: usize, alignment: usize) -> usize {
    if alignment == 0 {
        return value;
    }
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Overflow-checked [`align_up`]. `None` for overflow or a non power of two.
#[inline]
pub const fn checked_align_up(value: usize, alignment: usize) -> Option<usize> {
    if alignment == 0 {
        return Some(value);
    }
    if !alignment.is_power_of_two() {
        return None;
    }
    match value.checked_add(alignment - 1) {
        Some(v) => Some(v & !(alignment - 1)),
        None => None,
    }
}

/// Checks if a value is aligned to the given alignment
#[inline(always)]
pub const fn is_aligned(value: usize, alignment: usize) -> bool {
    alignment == 0 || value & (alignment - 1) == 0
}

/// Bytes needed to move `addr` up to the next multiple of `alignment`
///
/// # Examples
/// ```
/// use sl_memory::utils::padding_for;
///
/// assert_eq!(padding_for(7, 8), 1);
/// assert_eq!(padding_for(8, 8), 0);
/// assert_eq!(padding_for(9, 0), 0);
/// ```
#[inline(always)]
pub const fn padding_for(addr: usize, alignment: usize) -> usize {
    if alignment == 0 {
        return 0;
    }
    addr.wrapping_neg() & (alignment - 1)
}

/// Checks whether `x` is a power of two (zero is not)
#[inline(always)]
pub const fn is_power_of_two(x: usize) -> bool {
    x.is_power_of_two()
}

/// Rounds up to the next power of two; `0` maps to `1`.
///
/// Saturates at the largest power of two representable in `usize`.
#[inline]
pub const fn next_power_of_two(x: usize) -> usize {
    match x.checked_next_power_of_two() {
        Some(p) => p,
        None => 1 << (usize::BITS - 1),
    }
}

// ============================================================================
// Slice primitives
// ============================================================================

/// Copies `min(dest.len(), src.len())` bytes and returns how many were copied.
pub fn memory_copy(dest: &mut [u8], src: &[u8]) -> usize {
    let n = dest.len().min(src.len());
    dest[..n].copy_from_slice(&src[..n]);
    n
}

/// Fills `dest` with `byte`
#[inline]
pub fn memory_set(dest: &mut [u8], byte: u8) {
    dest.fill(byte);
}

/// Fills `dest` with zeroes
#[inline]
pub fn memory_zero(dest: &mut [u8]) {
    dest.fill(0);
}

/// Compares two byte ranges.
///
/// The first differing byte decides. When one range is a prefix of the
/// other, the shorter one orders first.
pub fn memory_compare(a: &[u8], b: &[u8]) -> Ordering {
    let n = a.len().min(b.len());
    match a[..n].cmp(&b[..n]) {
        Ordering::Equal => a.len().cmp(&b.len()),
        other => other,
    }
}

/// Byte-wise equality
#[inline]
pub fn memory_equals(a: &[u8], b: &[u8]) -> bool {
    a == b
}

// ============================================================================
// Raw primitives
// ============================================================================

/// Copies `len` bytes from `src` to `dst`. The ranges may overlap.
///
/// # Safety
///
/// `src` must be valid for reads and `dst` valid for writes of `len` bytes.
#[inline]
pub unsafe fn copy_raw(dst: NonNull<u8>, src: NonNull<u8>, len: usize) {
    // SAFETY: validity of both ranges is the caller's contract; `copy` tolerates overlap.
    unsafe { ptr::copy(src.as_ptr(), dst.as_ptr(), len) }
}

// ============================================================================
// Allocator-backed helpers
// ============================================================================

/// Copies `src` into memory taken from `allocator` and appends a NUL byte.
///
/// Returns `None` when the allocator cannot provide `src.len() + 1` bytes.
pub fn memory_duplicate(allocator: &dyn Allocator, src: &[u8]) -> Option<NonNull<u8>> {
    let len = src.len().checked_add(1)?;
    let dst = allocator.allocate_aligned(len, 0)?;
    // SAFETY: `dst` was just allocated with room for `len` bytes and does not
    // overlap `src`, which is borrowed for the duration of the call.
    unsafe {
        ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr(), src.len());
        dst.as_ptr().add(src.len()).write(0);
    }
    Some(dst)
}

/// Formats `args` into memory taken from `allocator`.
///
/// The arguments are rendered twice: once to measure, once into the
/// allocation, so no intermediate heap string is built. The string borrows
/// the allocator; reclaiming its storage is `unsafe` on the allocator side.
pub fn memory_format<'a>(
    allocator: &'a dyn Allocator,
    args: fmt::Arguments<'_>,
) -> Option<&'a str> {
    let mut counter = CountingWriter(0);
    fmt::write(&mut counter, args).ok()?;
    let len = counter.0;

    let dst = allocator.allocate_aligned(len, 0)?;
    // SAFETY: `dst` points to `len` freshly allocated bytes owned by `allocator`.
    let buf = unsafe { core::slice::from_raw_parts_mut(dst.as_ptr(), len) };
    let mut writer = SliceWriter { buf, pos: 0 };
    fmt::write(&mut writer, args).ok()?;
    let written = writer.pos;
    // SAFETY: the first `written` bytes at `dst` were initialized by the writer.
    // They stay valid for `'a`: only an `unsafe` rewind, reset or cleanup can
    // reclaim them, and that contract forbids live borrowers.
    let bytes: &'a [u8] = unsafe { core::slice::from_raw_parts(dst.as_ptr(), written) };

    // The writer only ever receives `&str` fragments, so the bytes are UTF-8.
    core::str::from_utf8(bytes).ok()
}

struct CountingWriter(usize);

impl fmt::Write for CountingWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0 += s.len();
        Ok(())
    }
}

struct SliceWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl fmt::Write for SliceWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.pos.checked_add(s.len()).ok_or(fmt::Error)?;
        let dst = self.buf.get_mut(self.pos..end).ok_or(fmt::Error)?;
        dst.copy_from_slice(s.as_bytes());
        self.pos = end;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::LinearAllocator;
    use rstest::rstest;

    #[rstest]
    #[case(0, 8, 0)]
    #[case(1, 8, 8)]
    #[case(8, 8, 8)]
    #[case(13, 16, 16)]
    #[case(13, 0, 13)]
    #[case(13, 1, 13)]
    fn test_align_up(#[case] value: usize, #[case] alignment: usize, #[case] expected: usize) {
        assert_eq!(align_up(value, alignment), expected);
        assert_eq!(checked_align_up(value, alignment), Some(expected));
    }

    #[test]
    fn test_checked_align_up_rejects_overflow_and_odd_alignment() {
        assert_eq!(checked_align_up(usize::MAX, 8), None);
        assert_eq!(checked_align_up(10, 3), None);
    }

    #[test]
    fn test_next_power_of_two() {
        assert_eq!(next_power_of_two(0), 1);
        assert_eq!(next_power_of_two(5), 8);
        assert_eq!(next_power_of_two(8), 8);
        assert_eq!(next_power_of_two(usize::MAX), 1 << (usize::BITS - 1));
    }

    #[test]
    fn test_memory_copy_uses_smaller_size() {
        let mut dest = [0u8; 3];
        assert_eq!(memory_copy(&mut dest, b"hello"), 3);
        assert_eq!(&dest, b"hel");

        let mut dest = [9u8; 6];
        assert_eq!(memory_copy(&mut dest, b"hi"), 2);
        assert_eq!(&dest, b"hi\x09\x09\x09\x09");
    }

    #[test]
    fn test_memory_set_and_zero() {
        let mut buf = [1u8; 4];
        memory_set(&mut buf, 0xAB);
        assert_eq!(buf, [0xAB; 4]);
        memory_zero(&mut buf);
        assert_eq!(buf, [0; 4]);
    }

    #[test]
    fn test_memory_compare() {
        assert_eq!(memory_compare(b"abc", b"abc"), Ordering::Equal);
        assert_eq!(memory_compare(b"abc", b"abd"), Ordering::Less);
        assert_eq!(memory_compare(b"ab", b"abc"), Ordering::Less);
        assert_eq!(memory_compare(b"b", b"abc"), Ordering::Greater);
        assert!(memory_equals(b"", b""));
        assert!(!memory_equals(b"a", b"b"));
    }

    #[test]
    fn test_memory_duplicate_terminates() {
        let linear = LinearAllocator::new(64);
        let ptr = memory_duplicate(&linear, b"arena").expect("room for 6 bytes");
        // SAFETY: memory_duplicate wrote 6 bytes at `ptr`.
        let copy = unsafe { core::slice::from_raw_parts(ptr.as_ptr(), 6) };
        assert_eq!(copy, b"arena\0");
        assert_eq!(linear.cursor(), 6);
    }

    #[test]
    fn test_memory_format() {
        let linear = LinearAllocator::new(64);
        let s = memory_format(&linear, format_args!("{}-{:03}", "region", 7));
        assert_eq!(s, Some("region-007"));
    }

    #[test]
    fn test_memory_format_exhausted() {
        let linear = LinearAllocator::new(16);
        assert!(linear.allocate(12).is_some());
        let s = memory_format(&linear, format_args!("far too long"));
        assert_eq!(s, None);
    }
}
