//! Byte ring between the application and the serial mover
//!
//! `N` must be a power of two. One slot is always left unused so that
//! `head == tail` means empty: a ring of `N` bytes holds at most `N - 1`.
//! `head` moves only on push, `tail` only on pop.

/// Fixed-capacity single-producer/single-consumer byte ring
pub struct RingBuffer<const N: usize> {
    storage: [u8; N],
    head: usize,
    tail: usize,
}

impl<const N: usize> RingBuffer<N> {
    const SIZE_OK: () = assert!(N.is_power_of_two() && N >= 2, "ring size must be a power of two");
    const MASK: usize = N - 1;

    /// Create an empty ring
    #[must_use]
    pub const fn new() -> Self {
        let () = Self::SIZE_OK;
        Self {
            storage: [0; N],
            head: 0,
            tail: 0,
        }
    }

    /// Bytes waiting to be consumed
    #[inline(always)]
    #[must_use]
    pub const fn available(&self) -> usize {
        self.head.wrapping_sub(self.tail) & Self::MASK
    }

    /// Bytes that can still be pushed
    #[inline(always)]
    #[must_use]
    pub const fn free(&self) -> usize {
        (N - 1) - self.available()
    }

    /// Whether nothing is waiting
    #[inline(always)]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Append one byte; `false` if full
    pub fn push(&mut self, byte: u8) -> bool {
        if self.free() == 0 {
            return false;
        }
        self.storage[self.head] = byte;
        self.head = (self.head + 1) & Self::MASK;
        true
    }

    /// Append as much of `data` as fits, returning the count taken
    pub fn push_slice(&mut self, data: &[u8]) -> usize {
        let mut taken = 0;
        for &byte in data {
            if !self.push(byte) {
                break;
            }
            taken += 1;
        }
        taken
    }

    /// Remove one byte
    pub fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.storage[self.tail];
        self.tail = (self.tail + 1) & Self::MASK;
        Some(byte)
    }

    /// Move up to `out.len()` bytes into `out`, returning the count
    pub fn pop_into(&mut self, out: &mut [u8]) -> usize {
        let mut moved = 0;
        for slot in out.iter_mut() {
            match self.pop() {
                Some(byte) => *slot = byte,
                None => break,
            }
            moved += 1;
        }
        moved
    }

    /// Longest run readable from `tail` without wrapping
    ///
    /// This is what one DMA burst can drain.
    #[must_use]
    pub fn contiguous(&self) -> &[u8] {
        let end = if self.head >= self.tail { self.head } else { N };
        &self.storage[self.tail..end]
    }

    /// Consume `n` bytes after they were drained externally
    pub fn advance_tail(&mut self, n: usize) {
        let n = n.min(self.available());
        self.tail = (self.tail + n) & Self::MASK;
    }

    /// Drop everything waiting
    pub fn clear(&mut self) {
        self.tail = self.head;
    }

    /// Raw storage, ignoring head and tail
    ///
    /// Used when a circular DMA channel owns the storage.
    #[inline(always)]
    pub fn storage(&self) -> &[u8; N] {
        &self.storage
    }

    /// Address of the storage for a DMA channel
    #[inline(always)]
    pub fn storage_ptr(&mut self) -> *mut u8 {
        self.storage.as_mut_ptr()
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_slot_stays_free() {
        let mut ring = RingBuffer::<4>::new();
        assert_eq!(ring.free(), 3);
        assert!(ring.push(1));
        assert!(ring.push(2));
        assert!(ring.push(3));
        assert!(!ring.push(4));
        assert_eq!(ring.available(), 3);
        assert_eq!(ring.free(), 0);
    }

    #[test]
    fn bytes_come_out_in_order_across_wrap() {
        let mut ring = RingBuffer::<8>::new();
        assert_eq!(ring.push_slice(&[0; 6]), 6);
        let mut sink = [0u8; 6];
        assert_eq!(ring.pop_into(&mut sink), 6);

        assert_eq!(ring.push_slice(&[1, 2, 3, 4, 5]), 5);
        let mut out = [0u8; 8];
        assert_eq!(ring.pop_into(&mut out), 5);
        assert_eq!(&out[..5], &[1, 2, 3, 4, 5]);
        assert!(ring.is_empty());
    }

    #[test]
    fn contiguous_run_stops_at_end_of_storage() {
        let mut ring = RingBuffer::<8>::new();
        ring.push_slice(&[0; 6]);
        ring.advance_tail(6);
        ring.push_slice(&[10, 11, 12, 13]);

        assert_eq!(ring.contiguous(), &[10, 11]);
        ring.advance_tail(2);
        assert_eq!(ring.contiguous(), &[12, 13]);
        ring.advance_tail(2);
        assert!(ring.contiguous().is_empty());
    }

    #[test]
    fn advance_tail_never_passes_head() {
        let mut ring = RingBuffer::<4>::new();
        ring.push(9);
        ring.advance_tail(3);
        assert!(ring.is_empty());
        assert_eq!(ring.available(), 0);
        assert_eq!(ring.free(), 3);
    }
}
