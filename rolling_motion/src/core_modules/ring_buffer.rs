// THEORY:
// The ring remembers which frames are currently inside the averaging window, so
// that the frame falling out of the window can be subtracted from the rolling
// sums. It stores frame handles only; pixel data is never copied.
//
// Capacity is a const generic equal to the averaging window, so a ring can never
// be built with a size that disagrees with the sums it feeds.

/// A fixed-capacity FIFO of `N` slots.
#[derive(Debug)]
pub struct RingBuffer<T, const N: usize> {
    slots: [Option<T>; N],
    head: usize,
    len: usize,
}

impl<T, const N: usize> RingBuffer<T, N> {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            head: 0,
            len: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// The oldest entry, the next one `pop` would return.
    pub fn peek(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.slots[self.head].as_ref()
    }

    /// Appends `item`, handing it back if the ring is already full.
    pub fn push(&mut self, item: T) -> Result<(), T> {
        if self.is_full() {
            return Err(item);
        }
        let tail = (self.head + self.len) % N;
        self.slots[tail] = Some(item);
        self.len += 1;
        Ok(())
    }

    /// Removes and returns the oldest entry.
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let item = self.slots[self.head].take();
        self.head = (self.head + 1) % N;
        self.len -= 1;
        item
    }
}

impl<T, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_to_capacity_then_refuses() {
        let mut ring = RingBuffer::<u32, 3>::new();
        assert!(ring.is_empty());
        for i in 0..3 {
            ring.push(i).expect("ring has room");
        }
        assert!(ring.is_full());
        assert_eq!(ring.push(99), Err(99));
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.peek(), Some(&0));
    }

    #[test]
    fn pop_then_push_keeps_fifo_order_across_wraparound() {
        let mut ring = RingBuffer::<u32, 4>::new();
        for i in 0..4 {
            ring.push(i).expect("ring has room");
        }
        let mut displaced = Vec::new();
        for i in 4..11 {
            displaced.push(ring.pop().expect("ring is full"));
            ring.push(i).expect("a slot was just freed");
        }
        assert_eq!(displaced, vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(ring.peek(), Some(&7));

        let drained: Vec<u32> = std::iter::from_fn(|| ring.pop()).collect();
        assert_eq!(drained, vec![7, 8, 9, 10]);
        assert_eq!(ring.pop(), None);
        assert_eq!(ring.peek(), None);
    }
}
