//! Block allocation bitmap.
//!
//! CP/M keeps no free list on disk. The bitmap is rebuilt from the
//! directory at mount and after every delete; in between, allocation only
//! ever sets bits.

use crate::dir::Directory;
use crate::error::{CpmError, CpmResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocVector {
    words: Vec<u64>,
    blocks: usize,
    dir_blocks: usize,
}

impl AllocVector {
    /// A bitmap with only the directory blocks in use.
    pub fn new(blocks: usize, dir_blocks: usize) -> Self {
        let mut alv = AllocVector {
            words: vec![0; blocks.div_ceil(64)],
            blocks,
            dir_blocks,
        };
        alv.reset();
        alv
    }

    /// Build the bitmap for `dir`.
    pub fn from_directory(blocks: usize, dir_blocks: usize, dir: &Directory) -> Self {
        let mut alv = Self::new(blocks, dir_blocks);
        alv.rebuild(dir);
        alv
    }

    fn reset(&mut self) {
        self.words.fill(0);
        for block in 0..self.dir_blocks.min(self.blocks) {
            self.mark(block);
        }
    }

    /// Recompute every bit from the live extents of `dir`.
    ///
    /// Pointers past the end of the volume are ignored.
    pub fn rebuild(&mut self, dir: &Directory) {
        self.reset();
        for (index, extent) in dir.extents() {
            for block in extent.blocks.iter().filter(|&b| b != 0) {
                if block < self.blocks {
                    self.mark(block);
                } else {
                    log::warn!("entry {index}: block {block} beyond end of volume ignored");
                }
            }
            log::trace!(
                "entry {index}: extent {} blocks {:?}",
                extent.extent,
                extent.blocks.iter().collect::<Vec<_>>()
            );
        }
    }

    pub fn is_used(&self, block: usize) -> bool {
        block < self.blocks && self.words[block / 64] & (1 << (block % 64)) != 0
    }

    pub fn mark(&mut self, block: usize) {
        self.words[block / 64] |= 1 << (block % 64);
    }

    /// Claim the lowest free block.
    pub fn allocate(&mut self) -> CpmResult<usize> {
        for (w, word) in self.words.iter_mut().enumerate() {
            if *word == u64::MAX {
                continue;
            }
            let bit = word.trailing_ones() as usize;
            let block = w * 64 + bit;
            if block >= self.blocks {
                break;
            }
            *word |= 1 << bit;
            log::debug!("allocated block {block}");
            return Ok(block);
        }
        Err(CpmError::DeviceFull)
    }

    pub fn used(&self) -> usize {
        (0..self.blocks).filter(|&b| self.is_used(b)).count()
    }

    pub fn free(&self) -> usize {
        self.blocks - self.used()
    }

    pub fn blocks(&self) -> usize {
        self.blocks
    }

    pub fn dir_blocks(&self) -> usize {
        self.dir_blocks
    }
}
