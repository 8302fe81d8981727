/// Fixed-capacity history that overwrites its oldest entry when full
///
/// Storage is allocated once in [`new`](Self::new); `push` never allocates,
/// so the buffer is safe to use on the audio callback thread.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Box<[T]>,
    head: usize,
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Buffer holding at most `capacity` values (at least one)
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![T::default(); capacity.max(1)].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    /// Append a value, evicting the oldest one when full
    pub fn push(&mut self, value: T) {
        let capacity = self.slots.len();
        let tail = (self.head + self.len) % capacity;
        self.slots[tail] = value;
        if self.len == capacity {
            self.head = (self.head + 1) % capacity;
        } else {
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    /// Values from oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = T> + ExactSizeIterator + '_ {
        let capacity = self.slots.len();
        (0..self.len).map(move |i| self.slots[(self.head + i) % capacity])
    }

    /// Most recently pushed value
    pub fn last(&self) -> Option<T> {
        self.iter().next_back()
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fills_then_overwrites_oldest() {
        let mut ring = RingBuffer::new(3);
        assert!(ring.is_empty());
        assert_eq!(ring.last(), None);

        ring.push(1);
        ring.push(2);
        assert_eq!(ring.to_vec(), vec![1, 2]);
        assert!(!ring.is_full());

        ring.push(3);
        ring.push(4);
        ring.push(5);
        assert_eq!(ring.len(), 3);
        assert!(ring.is_full());
        assert_eq!(ring.to_vec(), vec![3, 4, 5]);
        assert_eq!(ring.last(), Some(5));
    }

    #[test]
    fn test_len_never_exceeds_capacity() {
        let mut ring = RingBuffer::new(30);
        for i in 0..1000 {
            ring.push(i as f32);
            assert!(ring.len() <= ring.capacity());
        }
        assert_eq!(ring.iter().next(), Some(970.0));
        assert_eq!(ring.iter().rev().next(), Some(999.0));
    }

    #[test]
    fn test_clear_and_zero_capacity() {
        let mut ring = RingBuffer::new(0);
        assert_eq!(ring.capacity(), 1);
        ring.push(7u64);
        ring.push(8u64);
        assert_eq!(ring.to_vec(), vec![8]);

        ring.clear();
        assert!(ring.is_empty());
        ring.push(9);
        assert_eq!(ring.to_vec(), vec![9]);
    }
}
