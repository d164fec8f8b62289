//
// Copyright (c) 2025 Nathan Fiedler
//

//! Two-level blocked array in the spirit of **Optimal resizable arrays** by
//! Robert E. Tarjan and Uri Zwick, published in 2023.
//!
//! * https://doi.org/10.1137/1.9781611977585.ch26
//!
//! The array is split into a large region of `B` blocks with `B²` slots each,
//! followed by a small region of `2B` blocks with `B` slots each. The shape
//! parameter `B` is kept within a factor of four of `∛N`, which bounds the
//! wasted space to `O(N^(2/3))` while never allocating a block larger than
//! `B²` slots.
//!
//! Restructuring is done in one batch when `B` changes, so appends and
//! removals are amortized (not worst-case) constant time.

use crate::directory::{self, Directory};
use crate::error::{Error, Result};
use log::{debug, trace};
use std::fmt;
use std::ops::{Index, IndexMut};

const LARGE: usize = 0;
const SMALL: usize = 1;

/// Resizable array with `O(N^(2/3))` wasted space.
pub struct TarjanZwickArray<T> {
    // large directory followed by small directory, in address order
    regions: [Directory<T>; 2],
    /// the shape parameter
    b: usize,
    /// number of elements in the array
    len: usize,
    /// number of slots in the allocated blocks of both regions
    capacity: usize,
}

impl<T> TarjanZwickArray<T> {
    /// Smallest value of the shape parameter.
    pub const MIN_B: usize = 1;

    // N^(1/3) <= B <= 4*N^(1/3) ==> N <= B^3 <= 64*N
    const DENOMINATOR: usize = 64;

    /// Return an empty array with zero capacity.
    pub fn new() -> Self {
        Self::with_shape(Self::MIN_B)
    }

    fn with_shape(b: usize) -> Self {
        Self {
            regions: [Directory::new(b, b * b), Directory::new(2 * b, b)],
            b,
            len: 0,
            capacity: 0,
        }
    }

    /// Number of slots in the large region, allocated or not.
    #[inline]
    fn large_span(&self) -> usize {
        self.b * self.b * self.b
    }

    /// Compute the region, block, and slot for the element at `index`.
    #[inline]
    fn locate(&self, index: usize) -> (usize, usize, usize) {
        let large_span = self.large_span();
        if index < large_span {
            let block_len = self.b * self.b;
            (LARGE, index / block_len, index % block_len)
        } else {
            let offset = index - large_span;
            (SMALL, offset / self.b, offset % self.b)
        }
    }

    #[inline]
    unsafe fn slot_ptr(&self, index: usize) -> *mut T {
        let (region, block, slot) = self.locate(index);
        unsafe { self.regions[region].slot_ptr(block, slot) }
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
    /// directories or the next block could not be allocated. The array
    /// remains usable after an error, and the element is handed back along
    /// with the error.
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
        unsafe {
            self.slot_ptr(self.len).write(value);
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
        let value = unsafe { self.slot_ptr(self.len).read() };
        if self.b > Self::MIN_B && Self::DENOMINATOR * self.len < self.large_span() {
            if let Err(err) = self.reshape(self.b / 2) {
                directory::fatal(err);
            }
        }
        if self.should_shrink() {
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
    /// which is `B³ + 2B²`.
    pub fn potential_capacity(&self) -> usize {
        self.large_span() + 2 * self.b * self.b
    }

    /// Returns the current shape parameter.
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
        unsafe { &*self.slot_ptr(index) }
    }

    /// Returns a mutable reference to an element without bounds checking.
    ///
    /// # Safety
    ///
    /// `index` must be less than `len()`.
    pub unsafe fn get_unchecked_mut(&mut self, index: usize) -> &mut T {
        debug_assert!(index < self.len, "unchecked index {index} >= len {}", self.len);
        unsafe { &mut *self.slot_ptr(index) }
    }

    /// Clears the array, removing and dropping all values and deallocating
    /// all blocks, returning the shape to its minimum.
    pub fn clear(&mut self) {
        let len = self.len;
        self.len = 0;
        unsafe {
            directory::drop_elements(&mut self.regions, len);
        }
        let b = Self::MIN_B;
        self.regions = [Directory::new(b, b * b), Directory::new(2 * b, b)];
        self.b = b;
        self.capacity = 0;
    }

    /// Migrate every element into the geometry for shape `next`, running one
    /// index across the large and then the small region so that old blocks
    /// of either region are released as soon as they are drained.
    fn reshape(&mut self, next: usize) -> Result<()> {
        let mut store = [
            Directory::try_new(next, next * next)?,
            Directory::try_new(2 * next, next)?,
        ];
        let capacity = directory::migrate(&mut self.regions, &mut store, self.len);
        debug!(
            "reshape: shape {} -> {}, len {}, capacity {} -> {}",
            self.b, next, self.len, self.capacity, capacity
        );
        self.regions = store;
        self.b = next;
        self.capacity = capacity;
        Ok(())
    }

    fn grow(&mut self) -> Result<()> {
        let large_span = self.large_span();
        if self.len < large_span {
            let block_len = self.b * self.b;
            self.regions[LARGE].allocate(self.len / block_len)?;
            self.capacity += block_len;
        } else {
            self.regions[SMALL].allocate((self.len - large_span) / self.b)?;
            self.capacity += self.b;
        }
        trace!("grow: capacity {}", self.capacity);
        Ok(())
    }

    /// Returns true if the last allocated block is no longer needed, keeping
    /// one spare block's worth of slots to avoid thrashing. Which block is
    /// last depends on whether the tail sits in the large region, on the
    /// boundary, or in the small region.
    fn should_shrink(&self) -> bool {
        let large_span = self.large_span();
        let large_len = self.b * self.b;
        let slack = if self.capacity <= large_span {
            2 * large_len
        } else if self.capacity <= large_span + self.b {
            large_len + self.b
        } else {
            2 * self.b
        };
        self.len + slack <= self.capacity
    }

    fn shrink(&mut self) {
        let large_span = self.large_span();
        if self.capacity <= large_span {
            let block_len = self.b * self.b;
            self.regions[LARGE].release(self.capacity / block_len - 1);
            self.capacity -= block_len;
        } else {
            self.regions[SMALL].release((self.capacity - large_span) / self.b - 1);
            self.capacity -= self.b;
        }
        trace!("shrink: capacity {}", self.capacity);
    }
}

impl<T> Default for TarjanZwickArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for TarjanZwickArray<T> {
    fn clone(&self) -> Self {
        let mut copy = Self::with_shape(self.b);
        for index in 0..self.len {
            copy.push_back(self[index].clone());
        }
        copy
    }
}

impl<T> fmt::Display for TarjanZwickArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TarjanZwickArray(len: {}, capacity: {}, potential: {}, B: {})",
            self.len,
            self.capacity,
            self.potential_capacity(),
            self.b
        )
    }
}

impl<T> Drop for TarjanZwickArray<T> {
    fn drop(&mut self) {
        unsafe {
            directory::drop_elements(&mut self.regions, self.len);
        }
    }
}

impl<T> Index<usize> for TarjanZwickArray<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        let Some(item) = self.get(index) else {
            panic!("index out of bounds: {}", index);
        };
        item
    }
}

impl<T> IndexMut<usize> for TarjanZwickArray<T> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        let Some(item) = self.get_mut(index) else {
            panic!("index out of bounds: {}", index);
        };
        item
    }
}

impl<A> FromIterator<A> for TarjanZwickArray<A> {
    fn from_iter<T: IntoIterator<Item = A>>(iter: T) -> Self {
        let mut arr: TarjanZwickArray<A> = TarjanZwickArray::new();
        arr.extend(iter);
        arr
    }
}

impl<A> Extend<A> for TarjanZwickArray<A> {
    fn extend<T: IntoIterator<Item = A>>(&mut self, iter: T) {
        for value in iter {
            self.push_back(value)
        }
    }
}
