//! Sector chains
//!
//! A chain is the ordered list of sectors holding one virtual file (or the
//! header). Writes are planned first: the full list of sectors is settled
//! through the [`Allocator`], then every payload is written with the index
//! of the following sector as its link.

use crate::allocator::{Allocator, ReleaseMode};
use crate::error::{Result, VfsError};
use crate::sector::{SectorIndex, SectorStore, END_OF_CHAIN};

/// Follow the links from `start` and return every sector in chain order
///
/// `limit` is the number of sectors in the container; links at or past it
/// and chains longer than it are reported as broken.
pub fn collect(
    store: &mut SectorStore,
    start: SectorIndex,
    limit: u64,
) -> Result<Vec<SectorIndex>> {
    let mut sectors = Vec::new();
    let mut current = start;

    while current != END_OF_CHAIN {
        if current >= limit || sectors.len() as u64 >= limit {
            return Err(VfsError::BrokenChain { sector: current });
        }
        sectors.push(current);
        current = store.read_next(current)?;
    }

    Ok(sectors)
}

/// Read `len` payload bytes from the chain at `start`
pub fn read(
    store: &mut SectorStore,
    start: SectorIndex,
    len: u64,
    limit: u64,
) -> Result<Vec<u8>> {
    if len > limit.saturating_mul(store.payload_size() as u64) {
        return Err(VfsError::BrokenChain { sector: start });
    }

    let len = len as usize;
    let mut data = Vec::with_capacity(len);
    let mut current = start;
    let mut visited = 0u64;

    while data.len() < len {
        if current == END_OF_CHAIN || current >= limit || visited >= limit {
            return Err(VfsError::BrokenChain { sector: current });
        }
        visited += 1;

        let sector = store.read_sector(current)?;
        let take = (len - data.len()).min(sector.payload.len());
        data.extend_from_slice(&sector.payload[..take]);
        current = sector.next;
    }

    Ok(data)
}

/// Write `data` across `sectors`, linking each to the next and terminating
/// the last one
pub fn write(store: &mut SectorStore, sectors: &[SectorIndex], data: &[u8]) -> Result<()> {
    let payload_size = store.payload_size();
    if (sectors.len() as u64) < (data.len() as u64).div_ceil(payload_size as u64) {
        return Err(VfsError::BrokenChain {
            sector: sectors.last().copied().unwrap_or(END_OF_CHAIN),
        });
    }

    for (i, &sector) in sectors.iter().enumerate() {
        let begin = (i * payload_size).min(data.len());
        let end = ((i + 1) * payload_size).min(data.len());
        let next = sectors.get(i + 1).copied().unwrap_or(END_OF_CHAIN);
        store.write_sector(sector, &data[begin..end], next)?;
    }

    Ok(())
}

/// Append freshly acquired sectors until `chain` holds `needed` of them
pub fn extend(alloc: &mut Allocator, chain: &mut Vec<SectorIndex>, needed: u64) {
    while (chain.len() as u64) < needed {
        chain.push(alloc.acquire_sector());
    }
}

/// Settle the sectors for rewriting the chain at `start`
///
/// When the sector count changes, everything after the head goes back to
/// the free list and the chain is regrown from the head. When it stays the
/// same the existing links are reused as they are.
pub fn plan_rewrite(
    store: &mut SectorStore,
    alloc: &mut Allocator,
    start: SectorIndex,
    old_sectors: u64,
    needed: u64,
) -> Result<Vec<SectorIndex>> {
    if old_sectors != needed {
        alloc.release_chain(store, start, ReleaseMode::Tail)?;
        let mut chain = vec![start];
        extend(alloc, &mut chain, needed);
        return Ok(chain);
    }

    let chain = collect(store, start, alloc.sector_count())?;
    if chain.len() as u64 != needed {
        return Err(VfsError::BrokenChain {
            sector: chain.last().copied().unwrap_or(start),
        });
    }
    Ok(chain)
}
