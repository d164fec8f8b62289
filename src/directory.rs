//
// Copyright (c) 2025 Nathan Fiedler
//

//! Block directories: tables of lazily allocated, fixed-size blocks.
//!
//! A directory owns every block it references but knows nothing about which
//! slots hold live values; the sequences built on top of it are responsible
//! for dropping elements before the blocks go away.

use crate::error::{Error, Result};
use std::alloc::{Layout, alloc, dealloc, handle_alloc_error};
use std::ptr::{self, NonNull};

/// Layout of a block holding `len` values of `T`.
fn block_layout<T>(len: usize) -> Layout {
    Layout::array::<T>(len).expect("capacity overflow")
}

/// Indirection table mapping a block index to an optionally allocated block
/// of `block_len` slots.
pub(crate) struct Directory<T> {
    // holds pointers to the allocated blocks, None if absent
    blocks: Vec<Option<NonNull<T>>>,
    /// number of slots in every block of this directory
    block_len: usize,
}

impl<T> Directory<T> {
    /// Return a directory with room for `num_blocks` blocks, none allocated.
    pub fn new(num_blocks: usize, block_len: usize) -> Self {
        Self {
            blocks: vec![None; num_blocks],
            block_len,
        }
    }

    /// Like `new()` but reports allocation failure of the table itself.
    pub fn try_new(num_blocks: usize, block_len: usize) -> Result<Self> {
        let mut blocks: Vec<Option<NonNull<T>>> = Vec::new();
        if blocks.try_reserve_exact(num_blocks).is_err() {
            let layout =
                Layout::array::<Option<NonNull<T>>>(num_blocks).expect("capacity overflow");
            return Err(Error::ResourceExhaustion(layout));
        }
        blocks.resize(num_blocks, None);
        Ok(Self { blocks, block_len })
    }

    /// Number of slots in each block.
    #[inline]
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Number of block entries in the table.
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Total number of slots addressable through this directory.
    #[inline]
    pub fn span(&self) -> usize {
        self.blocks.len() * self.block_len
    }

    /// Returns true if the block at the given index is allocated.
    pub fn is_present(&self, block: usize) -> bool {
        self.blocks[block].is_some()
    }

    /// Compute the block and slot (0-based) for the given offset.
    #[inline]
    pub fn locate(&self, offset: usize) -> (usize, usize) {
        (offset / self.block_len, offset % self.block_len)
    }

    /// Allocate the block at the given index, leaving its slots
    /// uninitialized.
    pub fn allocate(&mut self, block: usize) -> Result<()> {
        debug_assert!(!self.is_present(block), "block {block} already allocated");
        let layout = block_layout::<T>(self.block_len);
        let ptr = if layout.size() == 0 {
            // zero-sized types never touch the allocator
            NonNull::dangling()
        } else {
            let raw = unsafe { alloc(layout) }.cast::<T>();
            NonNull::new(raw).ok_or(Error::ResourceExhaustion(layout))?
        };
        self.blocks[block] = Some(ptr);
        Ok(())
    }

    /// Deallocate the block at the given index, if present. Values still in
    /// the block are not dropped.
    pub fn release(&mut self, block: usize) {
        if let Some(ptr) = self.blocks[block].take() {
            let layout = block_layout::<T>(self.block_len);
            if layout.size() != 0 {
                unsafe {
                    dealloc(ptr.as_ptr().cast::<u8>(), layout);
                }
            }
        }
    }

    /// Return a pointer to the given slot.
    ///
    /// # Safety
    ///
    /// The block must be allocated and `slot` must be less than the block
    /// length.
    #[inline]
    pub unsafe fn slot_ptr(&self, block: usize, slot: usize) -> *mut T {
        debug_assert!(self.is_present(block), "block {block} not allocated");
        debug_assert!(slot < self.block_len);
        unsafe { self.blocks[block].unwrap_unchecked().as_ptr().add(slot) }
    }
}

impl<T> Drop for Directory<T> {
    fn drop(&mut self) {
        for block in 0..self.blocks.len() {
            self.release(block);
        }
    }
}

// The directory exclusively owns its blocks, the same as a Vec would.
unsafe impl<T: Send> Send for Directory<T> {}
unsafe impl<T: Sync> Sync for Directory<T> {}

/// Find the directory, block, and slot of `pos` when `regions` are read as a
/// single address space, one directory after another.
fn seek<T>(regions: &[Directory<T>], mut pos: usize) -> (usize, usize, usize) {
    for (region, directory) in regions.iter().enumerate() {
        let span = directory.span();
        if pos < span {
            let (block, slot) = directory.locate(pos);
            return (region, block, slot);
        }
        pos -= span;
    }
    panic!("overflow, position out of bounds")
}

/// Move the first `len` values held in `from` into `to`, both read in
/// address order across all of their directories, and return the capacity
/// allocated in `to`.
///
/// Destination blocks are allocated as the walk reaches them and each source
/// block is released as soon as its last slot has been moved out, so at most
/// one source block and one destination block are partially used at a time.
/// Source blocks that were never drained (the partial tail) are left for the
/// caller to drop along with the old directories.
///
/// Failing to allocate a destination block is fatal since the source has
/// already been partially consumed.
pub(crate) fn migrate<T>(
    from: &mut [Directory<T>],
    to: &mut [Directory<T>],
    len: usize,
) -> usize {
    let mut capacity = 0;
    let mut moved = 0;
    while moved < len {
        let (src_region, src_block, src_slot) = seek(from, moved);
        let (dst_region, dst_block, dst_slot) = seek(to, moved);
        let src_len = from[src_region].block_len();
        let dst = &mut to[dst_region];
        if dst_slot == 0 {
            if let Err(err) = dst.allocate(dst_block) {
                fatal(err);
            }
            capacity += dst.block_len();
        }
        let run = (src_len - src_slot)
            .min(dst.block_len() - dst_slot)
            .min(len - moved);
        unsafe {
            ptr::copy_nonoverlapping(
                from[src_region].slot_ptr(src_block, src_slot),
                dst.slot_ptr(dst_block, dst_slot),
                run,
            );
        }
        moved += run;
        if src_slot + run == src_len {
            from[src_region].release(src_block);
        }
    }
    capacity
}

/// Drop the first `len` values stored across `regions` in address order.
///
/// # Safety
///
/// The first `len` slots must hold initialized values, and those values must
/// not be read again afterwards.
pub(crate) unsafe fn drop_elements<T>(regions: &mut [Directory<T>], len: usize) {
    if !std::mem::needs_drop::<T>() {
        return;
    }
    let mut remaining = len;
    for directory in regions.iter_mut() {
        let mut block = 0;
        while remaining > 0 && block < directory.num_blocks() {
            let count = remaining.min(directory.block_len());
            unsafe {
                ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
                    directory.slot_ptr(block, 0),
                    count,
                ));
            }
            remaining -= count;
            block += 1;
        }
    }
}

/// Hand an unrecoverable error to the global allocation error handler.
pub(crate) fn fatal(err: Error) -> ! {
    match err {
        Error::ResourceExhaustion(layout) => handle_alloc_error(layout),
        other => panic!("{}", other),
    }
}
