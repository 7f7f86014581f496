//! Sector allocation for the container
//!
//! New chain links come from the free list first (smallest index wins, which
//! biases data toward the front of the file) and from growth at the end of
//! the container otherwise. Released chains are walked link by link and
//! every reclaimed sector gets its link reset to [`END_OF_CHAIN`].

pub mod free_list;

use crate::error::{Result, VfsError};
use crate::sector::{SectorIndex, SectorStore, END_OF_CHAIN};
use free_list::FreeSectorList;
use std::collections::HashSet;

/// How much of a chain [`Allocator::release_chain`] gives back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseMode {
    /// Keep the head sector and cut the chain after it (rewrite in place)
    Tail,
    /// Release every sector including the head (delete)
    Whole,
}

/// Free-list backed sector allocator
#[derive(Debug, Clone)]
pub struct Allocator {
    free: FreeSectorList,
    /// First index past every sector handed out so far
    end: SectorIndex,
}

impl Allocator {
    pub fn new(free: FreeSectorList, sector_count: u64) -> Self {
        Allocator {
            free,
            end: sector_count,
        }
    }

    /// Pick the sector for a new chain link
    ///
    /// Growth indices are handed out consecutively, so several sectors can
    /// be acquired before any of them is written.
    pub fn acquire_sector(&mut self) -> SectorIndex {
        match self.free.pop_first() {
            Some(sector) => sector,
            None => {
                let sector = self.end;
                self.end += 1;
                sector
            }
        }
    }

    /// Put a single sector back on the free list
    ///
    /// The caller is responsible for unlinking it from any live chain.
    pub fn release_sector(&mut self, sector: SectorIndex) {
        self.free.insert(sector);
    }

    /// Walk the chain at `start` and reclaim its sectors
    ///
    /// Returns the sectors added to the free list, in chain order.
    pub fn release_chain(
        &mut self,
        store: &mut SectorStore,
        start: SectorIndex,
        mode: ReleaseMode,
    ) -> Result<Vec<SectorIndex>> {
        let mut released = Vec::new();
        if start == END_OF_CHAIN {
            return Ok(released);
        }

        let mut current = start;
        let mut walked = HashSet::new();
        loop {
            if current >= self.end {
                return Err(VfsError::BrokenChain { sector: current });
            }
            if !walked.insert(current) {
                // Loop back into this chain: every sector is already reclaimed
                tracing::warn!(
                    "Chain at {} links back to sector {}, cutting the loop",
                    start,
                    current
                );
                break;
            }

            let next = store.read_next(current)?;
            if (current != start || mode == ReleaseMode::Whole) && self.free.insert(current) {
                released.push(current);
            }
            if next == END_OF_CHAIN {
                break;
            }
            store.write_next(current, END_OF_CHAIN)?;
            current = next;
        }

        tracing::debug!(
            "Released {} sectors from chain at {} ({:?})",
            released.len(),
            start,
            mode
        );

        Ok(released)
    }

    pub fn free_list(&self) -> &FreeSectorList {
        &self.free
    }

    pub fn free_sectors(&self) -> &[SectorIndex] {
        self.free.as_slice()
    }

    /// Sectors handed out or present in the container
    pub fn sector_count(&self) -> u64 {
        self.end
    }
}
