//! Fixed-cell block arenas.
//!
//! Each arena owns a chain of equally sized blocks of `Option<T>` cells.
//! Handles are dense `u32` indices (`block * cells_per_block + slot`), so
//! lookup is two array index operations. Freed cells go on a free list and
//! are reused before any new block is grown; a full collection releases
//! blocks that went completely empty, except the initial one.

use crate::core::config::ArenaOpts;

pub struct Arena<T> {
    blocks: Vec<Block<T>>,
    free: Vec<u32>,
    cells_per_block: u32,
    max_blocks: usize,
    live: usize,
}

struct Block<T> {
    cells: Vec<Option<T>>,
    used: u32,
}

impl<T> Block<T> {
    fn new(cells_per_block: u32) -> Self {
        let mut cells = Vec::with_capacity(cells_per_block as usize);
        cells.resize_with(cells_per_block as usize, || None);
        Self { cells, used: 0 }
    }
}

impl<T> Arena<T> {
    pub fn new(opts: &ArenaOpts) -> Self {
        let mut arena = Self {
            blocks: Vec::new(),
            free: Vec::new(),
            cells_per_block: opts.cells_per_block,
            max_blocks: opts.max_blocks,
            live: 0,
        };
        arena.grow();
        arena
    }

    /// Allocate a cell. On exhaustion the value is handed back to the
    /// caller so it can run a collection and retry.
    pub fn alloc(&mut self, value: T) -> Result<u32, T> {
        let handle = if let Some(h) = self.free.pop() {
            h
        } else if self.blocks.last().map(|b| b.used).unwrap_or(self.cells_per_block)
            < self.cells_per_block
        {
            let block = (self.blocks.len() - 1) as u32;
            block * self.cells_per_block + self.blocks.last().unwrap().used
        } else if self.blocks.len() < self.max_blocks {
            self.grow();
            ((self.blocks.len() - 1) as u32) * self.cells_per_block
        } else {
            return Err(value);
        };
        let (block, slot) = self.split(handle);
        let b = &mut self.blocks[block];
        debug_assert!(b.cells[slot].is_none());
        b.cells[slot] = Some(value);
        if slot as u32 >= b.used {
            b.used = slot as u32 + 1;
        }
        self.live += 1;
        Ok(handle)
    }

    pub fn get(&self, handle: u32) -> &T {
        let (block, slot) = self.split(handle);
        self.blocks[block].cells[slot]
            .as_ref()
            .expect("cell was garbage collected")
    }

    pub fn get_mut(&mut self, handle: u32) -> &mut T {
        let (block, slot) = self.split(handle);
        self.blocks[block].cells[slot]
            .as_mut()
            .expect("cell was garbage collected")
    }

    pub fn contains(&self, handle: u32) -> bool {
        let (block, slot) = self.split(handle);
        self.blocks
            .get(block)
            .is_some_and(|b| b.cells.get(slot).is_some_and(|c| c.is_some()))
    }

    pub fn free(&mut self, handle: u32) {
        let (block, slot) = self.split(handle);
        let cell = &mut self.blocks[block].cells[slot];
        debug_assert!(cell.is_some());
        *cell = None;
        self.free.push(handle);
        self.live -= 1;
    }

    /// Iterate live handles.
    pub fn iter_handles(&self) -> impl Iterator<Item = u32> + '_ {
        let cells = self.cells_per_block;
        self.blocks.iter().enumerate().flat_map(move |(bi, b)| {
            b.cells[..b.used as usize]
                .iter()
                .enumerate()
                .filter(|(_, c)| c.is_some())
                .map(move |(si, _)| bi as u32 * cells + si as u32)
        })
    }

    /// Release wholly empty trailing-or-middle blocks after a full
    /// collection. The first block is always kept so the arena stays warm.
    pub fn release_empty_blocks(&mut self) {
        let cells = self.cells_per_block;
        let mut emptied: Vec<u32> = Vec::new();
        for (bi, b) in self.blocks.iter().enumerate().skip(1) {
            if b.cells.iter().all(|c| c.is_none()) {
                emptied.push(bi as u32);
            }
        }
        if emptied.is_empty() {
            return;
        }
        // Handles are positional, so blocks can only be dropped from the
        // tail; an interior empty block is kept but its cells return to
        // the free list lazily as usual.
        while let Some(&last) = emptied.last() {
            if last as usize == self.blocks.len() - 1 {
                self.blocks.pop();
                emptied.pop();
                let base = self.blocks.len() as u32 * cells;
                self.free.retain(|&h| h < base);
            } else {
                break;
            }
        }
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    pub fn cell_count(&self) -> usize {
        self.blocks.len() * self.cells_per_block as usize
    }

    pub fn cells_per_block(&self) -> u32 {
        self.cells_per_block
    }

    fn grow(&mut self) {
        self.blocks.push(Block::new(self.cells_per_block));
    }

    #[inline]
    fn split(&self, handle: u32) -> (usize, usize) {
        (
            (handle / self.cells_per_block) as usize,
            (handle % self.cells_per_block) as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(cells: u32, blocks: usize) -> ArenaOpts {
        ArenaOpts {
            cells_per_block: cells,
            max_blocks: blocks,
        }
    }

    #[test]
    fn alloc_reuses_freed_cells() {
        let mut a: Arena<u64> = Arena::new(&opts(4, 2));
        let h0 = a.alloc(10).unwrap();
        let h1 = a.alloc(11).unwrap();
        a.free(h0);
        let h2 = a.alloc(12).unwrap();
        assert_eq!(h0, h2);
        assert_eq!(*a.get(h1), 11);
        assert_eq!(*a.get(h2), 12);
        assert_eq!(a.live_count(), 2);
    }

    #[test]
    fn exhaustion_returns_value() {
        let mut a: Arena<u64> = Arena::new(&opts(2, 1));
        a.alloc(1).unwrap();
        a.alloc(2).unwrap();
        assert_eq!(a.alloc(3).unwrap_err(), 3);
    }

    #[test]
    fn grows_extra_blocks_then_releases_them() {
        let mut a: Arena<u64> = Arena::new(&opts(2, 3));
        let mut handles = Vec::new();
        for i in 0..6 {
            handles.push(a.alloc(i).unwrap());
        }
        assert_eq!(a.cell_count(), 6);
        for &h in &handles[2..] {
            a.free(h);
        }
        a.release_empty_blocks();
        assert_eq!(a.cell_count(), 2);
        assert_eq!(*a.get(handles[0]), 0);
    }
}
