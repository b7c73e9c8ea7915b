//! Double-buffered resource pairs.
//!
//! Each tick reads one slot and writes the other. Roles only change through
//! [`PingPong::swap`], which the engine calls after a pass has been fully
//! recorded, so a pass can never read and write the same resource.

/// A pair of resources alternating between "current" (read) and "next" (write).
#[derive(Debug, Clone)]
pub struct PingPong<T> {
    slots: [T; 2],
    /// Which slot is currently the read slot (false = 0, true = 1)
    current_is_b: bool,
}

impl<T> PingPong<T> {
    /// Create a pair where `a` starts as the current slot.
    pub fn new(a: T, b: T) -> Self {
        Self {
            slots: [a, b],
            current_is_b: false,
        }
    }

    /// Build both slots with the same constructor.
    pub fn from_fn(mut f: impl FnMut(usize) -> T) -> Self {
        let a = f(0);
        let b = f(1);
        Self::new(a, b)
    }

    /// Index of the current (read) slot.
    #[inline]
    pub fn current_index(&self) -> usize {
        self.current_is_b as usize
    }

    /// Index of the next (write) slot.
    #[inline]
    pub fn next_index(&self) -> usize {
        1 - self.current_index()
    }

    /// The slot read during this tick.
    pub fn current(&self) -> &T {
        &self.slots[self.current_index()]
    }

    /// The read slot, for overwriting between ticks.
    pub fn current_mut(&mut self) -> &mut T {
        &mut self.slots[self.current_index()]
    }

    /// The slot written during this tick.
    pub fn next(&self) -> &T {
        &self.slots[self.next_index()]
    }

    /// Borrow the read slot shared and the write slot exclusively.
    pub fn split_mut(&mut self) -> (&T, &mut T) {
        let [a, b] = &mut self.slots;
        if self.current_is_b {
            (b, a)
        } else {
            (a, b)
        }
    }

    /// Slot by absolute index, independent of the current roles.
    pub fn slot(&self, index: usize) -> &T {
        &self.slots[index]
    }

    /// Exchange roles: what was just written becomes next tick's input.
    pub fn swap(&mut self) {
        self.current_is_b = !self.current_is_b;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_start_at_a() {
        let pair = PingPong::new("a", "b");
        assert_eq!(*pair.current(), "a");
        assert_eq!(*pair.next(), "b");
        assert_eq!(pair.current_index(), 0);
        assert_eq!(pair.next_index(), 1);
    }

    #[test]
    fn test_swap_exchanges_roles() {
        let mut pair = PingPong::new(1, 2);
        pair.swap();
        assert_eq!(*pair.current(), 2);
        assert_eq!(*pair.next(), 1);
        pair.swap();
        assert_eq!(*pair.current(), 1);
    }

    #[test]
    fn test_split_mut_writes_next_only() {
        let mut pair = PingPong::new(vec![0u8; 4], vec![0u8; 4]);
        {
            let (read, write) = pair.split_mut();
            write.copy_from_slice(&[9, 9, 9, 9]);
            assert_eq!(read, &vec![0u8; 4]);
        }
        assert_eq!(pair.next(), &vec![9u8; 4]);
        pair.swap();
        assert_eq!(pair.current(), &vec![9u8; 4]);
    }
}
