//
// Copyright (c) 2025 Nathan Fiedler
//

//! Single-level blocked array in the style of the hashed array tree described
//! by Edward Sitarski in **HATs: Hashed array trees**, Dr. Dobb's Journal,
//! 1996.
//!
//! The array keeps one directory of `B` blocks with `B` slots each and tracks
//! `B` so that it stays within a factor of four of `√N`. When the directory is
//! exhausted, or becomes too sparse, the elements are migrated into a new
//! geometry with `B` doubled or halved.

use crate::directory::{self, Directory};
use crate::error::{Error, Result};
use log::{debug, trace};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Resizable array with `O(√N)` wasted space.
pub struct HashedArrayTree<T> {
    // holds the B blocks of B slots
    blocks: Directory<T>,
    /// the shape parameter
    b: usize,
    /// number of elements in the array
    len: usize,
    /// number of slots in the allocated blocks
    capacity: usize,
}

impl<T> HashedArrayTree<T> {
    /// Smallest value of the shape parameter.
    pub const MIN_B: usize = 1;

    // sqrt(N) <= B <= 4*sqrt(N) ==> N <= B^2 <= 16*N
    const DENOMINATOR: usize = 16;

    /// Return an empty array with zero capacity.
    pub fn new() -> Self {
        Self::with_shape(Self::MIN_B)
    }

    fn with_shape(b: usize) -> Self {
        Self {
            blocks: Directory::new(b, b),
            b,
            len: 0,
            capacity: 0,
        }
    }

    /// Appends an element to the back of the array.
    ///
    /// # Panics
    ///
    /// Aborts through the allocation error handler if a block cannot be
    /// allocated.
    ///
    /// # Time complexity
    ///
    /// Amortized constant time.
    pub fn push_back(&mut self, value: T) {
        if let Err((err, _)) = self.try_push_back(value) {
            directory::fatal(err);
        }
    }

    /// Appends an element to the back of the array, returning an error if the
    /// directory or the next block could not be allocated. The array remains
    /// usable after an error, and the element is handed back along with the
    /// error.
    ///
    /// # Time complexity
    ///
    /// Amortized constant time.
    pub fn try_push_back(&mut self, value: T) -> std::result::Result<(), (Error, T)> {
        if self.len == self.potential_capacity() {
            if let Err(err) = self.reshape(self.b * 2) {
                return Err((err, value));
            }
        }
        if self.len == self.capacity {
            if let Err(err) = self.grow() {
                return Err((err, value));
            }
        }
        let (block, slot) = self.blocks.locate(self.len);
        unsafe {
            self.blocks.slot_ptr(block, slot).write(value);
        }
        self.len += 1;
        Ok(())
    }

    /// Appends an element if there is sufficient spare capacity, otherwise an
    /// error is returned with the element.
    ///
    /// # Time complexity
    ///
    /// Constant time.
    pub fn push_within_capacity(&mut self, value: T) -> std::result::Result<(), T> {
        if self.capacity <= self.len {
            Err(value)
        } else {
            self.push_back(value);
            Ok(())
        }
    }

    /// Removes the last element from the array and returns it, or `None` if
    /// it is empty.
    ///
    /// # Time complexity
    ///
    /// Amortized constant time.
    pub fn pop_back(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        let (block, slot) = self.blocks.locate(self.len);
        let value = unsafe { self.blocks.slot_ptr(block, slot).read() };
        if self.b > Self::MIN_B && Self::DENOMINATOR * self.len < self.potential_capacity() {
            if let Err(err) = self.reshape(self.b / 2) {
                directory::fatal(err);
            }
        }
        if self.len + 2 * self.b <= self.capacity {
            self.shrink();
        }
        Some(value)
    }

    /// Removes and returns the last element if the predicate returns true, or
    /// `None` if the predicate returns false or the array is empty (the
    /// predicate will not be called in that case).
    ///
    /// # Time complexity
    ///
    /// Amortized constant time.
    pub fn pop_if(&mut self, predicate: impl FnOnce(&mut T) -> bool) -> Option<T> {
        if self.len == 0 {
            None
        } else if let Some(last) = self.get_mut(self.len - 1) {
            if predicate(last) { self.pop_back() } else { None }
        } else {
            None
        }
    }

    /// Return the number of elements in the array.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the array has a length of 0.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of slots in the allocated blocks.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of slots addressable with the current shape,
    /// allocated or not.
    pub fn potential_capacity(&self) -> usize {
        self.b * self.b
    }

    /// Returns the current shape parameter, which is both the number of
    /// blocks in the directory and the length of each block.
    pub fn shape(&self) -> usize {
        self.b
    }

    /// Retrieve a reference to the element at the given offset.
    ///
    /// # Time complexity
    ///
    /// Constant time.
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            None
        } else {
            Some(unsafe { self.get_unchecked(index) })
        }
    }

    /// Returns a mutable reference to an element.
    ///
    /// # Time complexity
    ///
    /// Constant time.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.len {
            None
        } else {
            Some(unsafe { self.get_unchecked_mut(index) })
        }
    }

    /// Retrieve a reference to the element at the given offset, or an
    /// `OutOfRange` error if the offset is not less than the length.
    pub fn at(&self, index: usize) -> Result<&T> {
        let len = self.len;
        self.get(index).ok_or(Error::OutOfRange { index, len })
    }

    /// Mutable version of `at()`.
    pub fn at_mut(&mut self, index: usize) -> Result<&mut T> {
        let len = self.len;
        self.get_mut(index).ok_or(Error::OutOfRange { index, len })
    }

    /// Returns a reference to an element without bounds checking.
    ///
    /// # Safety
    ///
    /// `index` must be less than `len()`.
    pub unsafe fn get_unchecked(&self, index: usize) -> &T {
        debug_assert!(index < self.len, "unchecked index {index} >= len {}", self.len);
        let (block, slot) = self.blocks.locate(index);
        unsafe { &*self.blocks.slot_ptr(block, slot) }
    }

    /// Returns a mutable reference to an element without bounds checking.
    ///
    /// # Safety
    ///
    /// `index` must be less than `len()`.
    pub unsafe fn get_unchecked_mut(&mut self, index: usize) -> &mut T {
        debug_assert!(index < self.len, "unchecked index {index} >= len {}", self.len);
        let (block, slot) = self.blocks.locate(index);
        unsafe { &mut *self.blocks.slot_ptr(block, slot) }
    }

    /// Clears the array, removing and dropping all values and deallocating
    /// all blocks, returning the shape to its minimum.
    ///
    /// # Time complexity
    ///
    /// O(n) if elements are droppable, otherwise O(√n)
    pub fn clear(&mut self) {
        let len = self.len;
        // forget the values before dropping them in case a drop panics
        self.len = 0;
        unsafe {
            directory::drop_elements(std::slice::from_mut(&mut self.blocks), len);
        }
        self.blocks = Directory::new(Self::MIN_B, Self::MIN_B);
        self.b = Self::MIN_B;
        self.capacity = 0;
    }

    /// Migrate every element into a directory of `next` blocks of `next`
    /// slots, releasing old blocks as soon as they are drained.
    fn reshape(&mut self, next: usize) -> Result<()> {
        let mut store = Directory::try_new(next, next)?;
        let capacity = directory::migrate(
            std::slice::from_mut(&mut self.blocks),
            std::slice::from_mut(&mut store),
            self.len,
        );
        debug!(
            "reshape: shape {} -> {}, len {}, capacity {} -> {}",
            self.b, next, self.len, self.capacity, capacity
        );
        // dropping the old directory releases the undrained tail block
        self.blocks = store;
        self.b = next;
        self.capacity = capacity;
        Ok(())
    }

    /// Allocate the block just past the last allocated block.
    fn grow(&mut self) -> Result<()> {
        self.blocks.allocate(self.capacity / self.b)?;
        self.capacity += self.b;
        trace!("grow: capacity {}", self.capacity);
        Ok(())
    }

    /// Release the last allocated block.
    fn shrink(&mut self) {
        self.blocks.release(self.capacity / self.b - 1);
        self.capacity -= self.b;
        trace!("shrink: capacity {}", self.capacity);
    }
}

impl<T> Default for HashedArrayTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for HashedArrayTree<T> {
    fn clone(&self) -> Self {
        // replay the elements into an array that already has the same shape
        let mut copy = Self::with_shape(self.b);
        for index in 0..self.len {
            copy.push_back(self[index].clone());
        }
        copy
    }
}

impl<T> fmt::Display for HashedArrayTree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HashedArrayTree(len: {}, capacity: {}, potential: {}, B: {})",
            self.len,
            self.capacity,
            self.potential_capacity(),
            self.b
        )
    }
}

impl<T> Drop for HashedArrayTree<T> {
    fn drop(&mut self) {
        unsafe {
            directory::drop_elements(std::slice::from_mut(&mut self.blocks), self.len);
        }
    }
}

impl<T> Index<usize> for HashedArrayTree<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        let Some(item) = self.get(index) else {
            panic!("index out of bounds: {}", index);
        };
        item
    }
}

impl<T> IndexMut<usize> for HashedArrayTree<T> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        let Some(item) = self.get_mut(index) else {
            panic!("index out of bounds: {}", index);
        };
        item
    }
}

impl<A> FromIterator<A> for HashedArrayTree<A> {
    fn from_iter<T: IntoIterator<Item = A>>(iter: T) -> Self {
        let mut arr: HashedArrayTree<A> = HashedArrayTree::new();
        arr.extend(iter);
        arr
    }
}

impl<A> Extend<A> for HashedArrayTree<A> {
    fn extend<T: IntoIterator<Item = A>>(&mut self, iter: T) {
        for value in iter {
            self.push_back(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_empty_array() {
        let sut: HashedArrayTree<u64> = HashedArrayTree::new();
        assert_eq!(sut.len(), 0);
        assert!(sut.is_empty());
        assert_eq!(sut.capacity(), 0);
        assert_eq!(sut.potential_capacity(), 1);
        assert_eq!(sut.shape(), 1);
        assert!(sut.get(0).is_none());
    }

    #[test]
    fn test_basic_expansion_and_access() {
        let mut sut: HashedArrayTree<u64> = HashedArrayTree::new();
        for value in 0..63 {
            sut.push_back(value);
        }
        assert_eq!(sut.len(), 63);
        assert!(!sut.is_empty());
        assert_eq!(sut.get(0), Some(&0));
        assert_eq!(sut.get(1), Some(&1));
        assert_eq!(sut.get(7), Some(&7));
        assert_eq!(sut.get(15), Some(&15));
        assert_eq!(sut.get(62), Some(&62));
        assert!(sut.get(63).is_none());
        assert!(sut.get(101).is_none());
    }

    #[test]
    fn test_shape_doubles_at_potential_capacity() {
        let mut sut: HashedArrayTree<u32> = HashedArrayTree::new();
        sut.push_back(0);
        assert_eq!((sut.shape(), sut.capacity()), (1, 1));
        // 1 == 1^2 so the second push reshapes to B=2
        sut.push_back(1);
        assert_eq!((sut.shape(), sut.capacity()), (2, 2));
        sut.push_back(2);
        assert_eq!((sut.shape(), sut.capacity()), (2, 4));
        sut.push_back(3);
        assert_eq!((sut.shape(), sut.capacity()), (2, 4));
        // 4 == 2^2 so the fifth push reshapes to B=4 and then grows
        sut.push_back(4);
        assert_eq!((sut.shape(), sut.capacity()), (4, 8));
        assert_eq!(sut.potential_capacity(), 16);
        for value in 5..17 {
            sut.push_back(value);
        }
        assert_eq!(sut.shape(), 8);
        assert_eq!(sut.potential_capacity(), 64);
        // 16 elements migrated into two blocks of 8, then one more
        assert_eq!(sut.capacity(), 24);
        for idx in 0..17 {
            assert_eq!(sut[idx], idx as u32);
        }
    }

    #[test]
    fn test_shape_halves_when_sparse() {
        let mut sut: HashedArrayTree<u32> = HashedArrayTree::new();
        for value in 0..17 {
            sut.push_back(value);
        }
        assert_eq!(sut.shape(), 8);
        // 16 * 4 >= 64, 16 * 3 < 64
        for _ in 0..13 {
            sut.pop_back();
        }
        assert_eq!(sut.len(), 4);
        assert_eq!(sut.shape(), 8);
        assert_eq!(sut.pop_back(), Some(3));
        assert_eq!(sut.shape(), 4);
        assert_eq!(sut.capacity(), 4);
        for idx in 0..3 {
            assert_eq!(sut[idx], idx as u32);
        }
    }

    #[test]
    fn test_shrink_keeps_one_spare_block() {
        let mut sut: HashedArrayTree<u32> = HashedArrayTree::new();
        for value in 0..64 {
            sut.push_back(value);
        }
        assert_eq!(sut.shape(), 8);
        assert_eq!(sut.capacity(), 64);
        // popping into the second to last block leaves the last one in place
        for _ in 0..9 {
            sut.pop_back();
        }
        assert_eq!(sut.capacity(), 64);
        // 48 + 16 <= 64 releases the last block
        for _ in 0..7 {
            sut.pop_back();
        }
        assert_eq!(sut.len(), 48);
        assert_eq!(sut.capacity(), 56);
    }

    #[test]
    fn test_push_pop_restores_capacity() {
        let mut sut: HashedArrayTree<usize> = HashedArrayTree::new();
        for value in 0..100 {
            let len = sut.len();
            let capacity = sut.capacity();
            sut.push_back(usize::MAX);
            assert_eq!(sut.pop_back(), Some(usize::MAX));
            assert_eq!(sut.len(), len);
            if len < capacity {
                assert_eq!(sut.capacity(), capacity, "after {len} elements");
            } else {
                // the block allocated by the push is kept as slack
                assert!(sut.capacity() >= capacity);
            }
            sut.push_back(value);
        }
        for idx in 0..100 {
            assert_eq!(sut[idx], idx);
        }
    }

    #[test]
    fn test_push_get_several_strings() {
        let inputs = [
            "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
        ];
        let mut sut: HashedArrayTree<String> = HashedArrayTree::new();
        for item in inputs {
            sut.push_back(item.to_owned());
        }
        assert_eq!(sut.len(), 9);
        for (idx, item) in inputs.iter().enumerate() {
            let maybe = sut.get(idx);
            assert!(maybe.is_some(), "{idx} is none");
            let actual = maybe.unwrap();
            assert_eq!(item, actual);
        }
        assert!(sut.get(10).is_none());
        assert_eq!(sut[3], "four");
    }

    #[test]
    fn test_at_out_of_range() {
        let mut sut: HashedArrayTree<i32> = HashedArrayTree::new();
        assert_eq!(sut.at(0), Err(Error::OutOfRange { index: 0, len: 0 }));
        sut.push_back(10);
        sut.push_back(20);
        assert_eq!(sut.at(0), Ok(&10));
        assert_eq!(sut.at(1), Ok(&20));
        assert_eq!(sut.at(2), Err(Error::OutOfRange { index: 2, len: 2 }));
        assert_eq!(sut.at(3), Err(Error::OutOfRange { index: 3, len: 2 }));
        *sut.at_mut(1).unwrap() = 21;
        assert_eq!(sut[1], 21);
        assert!(sut.at_mut(2).is_err());
    }

    #[test]
    fn test_get_mut_index_mut() {
        let mut sut: HashedArrayTree<String> = HashedArrayTree::new();
        sut.push_back(String::from("first"));
        sut.push_back(String::from("second"));
        sut.push_back(String::from("third"));
        if let Some(value) = sut.get_mut(1) {
            value.push_str(" place");
        } else {
            panic!("get_mut() returned None")
        }
        assert_eq!(sut[1], "second place");
        sut[2] = "third planet".into();
        assert_eq!(sut[2], "third planet");
    }

    #[test]
    #[should_panic(expected = "index out of bounds:")]
    fn test_index_out_of_bounds() {
        let mut sut: HashedArrayTree<i32> = HashedArrayTree::new();
        sut.push_back(10);
        sut.push_back(20);
        let _ = sut[2];
    }

    #[test]
    #[should_panic(expected = "index out of bounds:")]
    fn test_index_mut_out_of_bounds() {
        let mut sut: HashedArrayTree<i32> = HashedArrayTree::new();
        sut.push_back(10);
        sut.push_back(20);
        sut[2] = 30;
    }

    #[test]
    fn test_push_within_capacity() {
        let mut sut: HashedArrayTree<u32> = HashedArrayTree::new();
        assert_eq!(sut.push_within_capacity(101), Err(101));
        sut.push_back(1);
        sut.push_back(2);
        sut.push_back(3);
        // B=2 with two blocks allocated
        assert_eq!(sut.push_within_capacity(4), Ok(()));
        assert_eq!(sut.push_within_capacity(5), Err(5));
        assert_eq!(sut.len(), 4);
    }

    #[test]
    fn test_pop_if() {
        let mut sut: HashedArrayTree<u32> = HashedArrayTree::new();
        assert!(sut.pop_if(|_| panic!("should not be called")).is_none());
        for value in 0..10 {
            sut.push_back(value);
        }
        assert!(sut.pop_if(|_| false).is_none());
        let maybe = sut.pop_if(|v| *v == 9);
        assert_eq!(maybe.unwrap(), 9);
        assert!(sut.pop_if(|v| *v == 9).is_none());
    }

    #[test]
    fn test_push_then_pop_all_in_reverse() {
        let mut sut: HashedArrayTree<usize> = HashedArrayTree::new();
        assert!(sut.pop_back().is_none());
        for value in 0..10_000 {
            sut.push_back(value);
        }
        assert_eq!(sut.len(), 10_000);
        for expected in (0..10_000).rev() {
            assert_eq!(sut.pop_back(), Some(expected));
        }
        assert_eq!(sut.len(), 0);
        assert_eq!(sut.capacity(), 0);
        assert!(sut.pop_back().is_none());
    }

    #[test]
    fn test_clear_and_reuse_ints() {
        let mut sut: HashedArrayTree<i32> = HashedArrayTree::new();
        for value in 0..512 {
            sut.push_back(value);
        }
        assert_eq!(sut.len(), 512);
        sut.clear();
        assert_eq!(sut.len(), 0);
        assert_eq!(sut.capacity(), 0);
        assert_eq!(sut.shape(), HashedArrayTree::<i32>::MIN_B);
        for value in 0..512 {
            sut.push_back(value);
        }
        for idx in 0..512 {
            let maybe = sut.get(idx);
            assert!(maybe.is_some(), "{idx} is none");
            let actual = maybe.unwrap();
            assert_eq!(idx, *actual as usize);
        }
    }

    #[test]
    fn test_clear_and_reuse_strings() {
        let mut sut: HashedArrayTree<String> = HashedArrayTree::new();
        for _ in 0..512 {
            let value = ulid::Ulid::new().to_string();
            sut.push_back(value);
        }
        assert_eq!(sut.len(), 512);
        sut.clear();
        assert_eq!(sut.len(), 0);
        for _ in 0..512 {
            let value = ulid::Ulid::new().to_string();
            sut.push_back(value);
        }
        assert_eq!(sut.len(), 512);
        // implicitly drop()
    }

    #[test]
    fn test_every_value_dropped_once() {
        struct Counted(Rc<Cell<usize>>);
        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }
        let drops = Rc::new(Cell::new(0));
        let mut sut: HashedArrayTree<Counted> = HashedArrayTree::new();
        for _ in 0..300 {
            sut.push_back(Counted(drops.clone()));
        }
        // popping across several reshapes
        for _ in 0..250 {
            sut.pop_back();
        }
        assert_eq!(drops.get(), 250);
        sut.clear();
        assert_eq!(drops.get(), 300);
        for _ in 0..40 {
            sut.push_back(Counted(drops.clone()));
        }
        drop(sut);
        assert_eq!(drops.get(), 340);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original: HashedArrayTree<String> = HashedArrayTree::new();
        for value in 0..50 {
            original.push_back(value.to_string());
        }
        let mut copy = original.clone();
        assert_eq!(copy.len(), 50);
        assert_eq!(copy.shape(), original.shape());
        assert_eq!(copy.capacity(), original.capacity());
        copy[10] = String::from("changed");
        copy.pop_back();
        copy.push_back(String::from("x"));
        copy.push_back(String::from("y"));
        assert_eq!(original.len(), 50);
        assert_eq!(original[10], "10");
        assert_eq!(original[49], "49");
        assert_eq!(copy[10], "changed");
        assert_eq!(copy[50], "y");
    }

    #[test]
    fn test_array_fromiterator() {
        let sut: HashedArrayTree<i32> = (0..10_000).collect();
        assert_eq!(sut.len(), 10_000);
        for idx in 0..10_000i32 {
            assert_eq!(sut[idx as usize], idx);
        }
    }

    #[test]
    fn test_push_get_thousands_structs() {
        struct MyData {
            a: u64,
            b: i32,
        }
        let mut sut: HashedArrayTree<MyData> = HashedArrayTree::new();
        for value in 0..88_888i32 {
            sut.push_back(MyData {
                a: value as u64,
                b: value,
            });
        }
        assert_eq!(sut.len(), 88_888);
        for idx in 0..88_888i32 {
            let maybe = sut.get(idx as usize);
            assert!(maybe.is_some(), "{idx} is none");
            let actual = maybe.unwrap();
            assert_eq!(idx as u64, actual.a);
            assert_eq!(idx, actual.b);
        }
    }

    #[test]
    fn test_zero_sized_values() {
        let mut sut: HashedArrayTree<()> = HashedArrayTree::new();
        for _ in 0..1000 {
            sut.push_back(());
        }
        assert_eq!(sut.len(), 1000);
        assert_eq!(sut.get(999), Some(&()));
        while sut.pop_back().is_some() {}
        assert_eq!(sut.capacity(), 0);
    }

    #[test]
    fn test_try_push_back_returns_value_on_failure() {
        let mut sut: HashedArrayTree<[u64; 1024]> = HashedArrayTree::new();
        // a block this large can never be allocated
        sut.blocks = Directory::new(1, 1 << 49);
        let mut value = [0u64; 1024];
        value[0] = 42;
        match sut.try_push_back(value) {
            Err((Error::ResourceExhaustion(layout), returned)) => {
                assert_eq!(layout.size(), 1 << 62);
                assert_eq!(returned[0], 42);
            }
            other => panic!("expected resource exhaustion, got {:?}", other.map_err(|e| e.0)),
        }
        assert_eq!(sut.len(), 0);
        assert_eq!(sut.capacity(), 0);

        // the array is still usable afterward
        sut.blocks = Directory::new(1, 1);
        assert!(sut.try_push_back(value).is_ok());
        assert_eq!(sut.len(), 1);
        assert_eq!(sut[0][0], 42);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "unchecked index")]
    fn test_get_unchecked_past_len() {
        let sut: HashedArrayTree<u32> = (0..3).collect();
        let _ = unsafe { sut.get_unchecked(3) };
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "unchecked index")]
    fn test_get_unchecked_mut_past_len() {
        let mut sut: HashedArrayTree<u32> = (0..4).collect();
        // slot 3 is allocated but no longer holds a value
        sut.pop_back();
        let _ = unsafe { sut.get_unchecked_mut(3) };
    }

    #[test]
    fn test_display() {
        let sut: HashedArrayTree<u8> = (0..5).collect();
        assert_eq!(
            sut.to_string(),
            "HashedArrayTree(len: 5, capacity: 8, potential: 16, B: 4)"
        );
    }
}
