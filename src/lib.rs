//
// Copyright (c) 2025 Nathan Fiedler
//

//! Resizable arrays that bound their wasted space (allocated capacity minus
//! length) to a sublinear function of the number of elements.
//!
//! * [`HashedArrayTree`] keeps `B` blocks of `B` slots with `B` near `√N`,
//!   wasting `O(√N)` slots.
//! * [`TarjanZwickArray`] keeps `B` large blocks of `B²` slots followed by
//!   `2B` small blocks of `B` slots with `B` near `∛N`, wasting `O(N^(2/3))`
//!   slots while never allocating a block larger than `B²`.
//!
//! Both grow and shrink one block at a time at the end of the array, and
//! migrate all elements to a new block geometry whenever the shape parameter
//! `B` doubles or halves.
//!
//! # Memory Usage
//!
//! Compared to `Vec`, which may have as many unused slots as it has
//! elements, these arrays keep only a few blocks worth of slack. Restructuring
//! releases old blocks as soon as they have been drained, so the peak memory
//! during a reshape is the old and new geometries overlapping rather than two
//! complete copies of the data.
//!
//! # Performance
//!
//! Appending and removing are amortized constant time. Restructuring happens
//! in one batch when the shape changes, so a single operation may take time
//! linear in the length of the array. Lookups involve a division and a
//! modulus, and are slower than `Vec`.
//!
//! # Safety
//!
//! Because this data structure is allocating memory, copying bytes using
//! pointers, and de-allocating memory as needed, there are many `unsafe` blocks
//! throughout the code.

mod directory;
mod error;
mod hat;
mod tarjan_zwick;

pub use error::{Error, Result};
pub use hat::HashedArrayTree;
pub use tarjan_zwick::TarjanZwickArray;

/// Operations shared by the resizable arrays, so that the same code can drive
/// any of them (or a `Vec` as the reference baseline).
pub trait GrowableSequence<T> {
    /// Return the number of elements in the sequence.
    fn len(&self) -> usize;

    /// Returns the number of slots that are currently allocated.
    fn capacity(&self) -> usize;

    /// Returns the number of slots addressable without restructuring.
    fn potential_capacity(&self) -> usize;

    /// Appends an element to the back of the sequence.
    fn push_back(&mut self, value: T);

    /// Removes the last element and returns it, or `None` if empty.
    fn pop_back(&mut self) -> Option<T>;

    /// Retrieve a reference to the element at the given offset.
    fn get(&self, index: usize) -> Option<&T>;

    /// Returns a mutable reference to an element.
    fn get_mut(&mut self, index: usize) -> Option<&mut T>;

    /// Returns true if the sequence has a length of 0.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bounds-checked access that reports the offending index.
    fn at(&self, index: usize) -> Result<&T> {
        let len = self.len();
        self.get(index).ok_or(Error::OutOfRange { index, len })
    }

    /// Mutable version of `at()`.
    fn at_mut(&mut self, index: usize) -> Result<&mut T> {
        let len = self.len();
        self.get_mut(index).ok_or(Error::OutOfRange { index, len })
    }

    /// Like `pop_back()` but treats an empty sequence as an error.
    fn try_pop_back(&mut self) -> Result<T> {
        self.pop_back()
            .ok_or(Error::PreconditionViolation("pop_back on an empty sequence"))
    }

    /// Allocated slots that do not hold an element.
    fn wasted(&self) -> usize {
        self.capacity() - self.len()
    }
}

impl<T> GrowableSequence<T> for HashedArrayTree<T> {
    fn len(&self) -> usize {
        HashedArrayTree::len(self)
    }

    fn capacity(&self) -> usize {
        HashedArrayTree::capacity(self)
    }

    fn potential_capacity(&self) -> usize {
        HashedArrayTree::potential_capacity(self)
    }

    fn push_back(&mut self, value: T) {
        HashedArrayTree::push_back(self, value)
    }

    fn pop_back(&mut self) -> Option<T> {
        HashedArrayTree::pop_back(self)
    }

    fn get(&self, index: usize) -> Option<&T> {
        HashedArrayTree::get(self, index)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        HashedArrayTree::get_mut(self, index)
    }
}

impl<T> GrowableSequence<T> for TarjanZwickArray<T> {
    fn len(&self) -> usize {
        TarjanZwickArray::len(self)
    }

    fn capacity(&self) -> usize {
        TarjanZwickArray::capacity(self)
    }

    fn potential_capacity(&self) -> usize {
        TarjanZwickArray::potential_capacity(self)
    }

    fn push_back(&mut self, value: T) {
        TarjanZwickArray::push_back(self, value)
    }

    fn pop_back(&mut self) -> Option<T> {
        TarjanZwickArray::pop_back(self)
    }

    fn get(&self, index: usize) -> Option<&T> {
        TarjanZwickArray::get(self, index)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        TarjanZwickArray::get_mut(self, index)
    }
}

// A doubling array with no sublinear waste guarantee, used for comparison.
impl<T> GrowableSequence<T> for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn capacity(&self) -> usize {
        Vec::capacity(self)
    }

    fn potential_capacity(&self) -> usize {
        Vec::capacity(self)
    }

    fn push_back(&mut self, value: T) {
        self.push(value)
    }

    fn pop_back(&mut self) -> Option<T> {
        self.pop()
    }

    fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.as_mut_slice().get_mut(index)
    }
}
