//! Consistency check over the whole container
//!
//! Every sector should be in exactly one place: the header chain, one file
//! chain, or the free list. Anything else is reported, nothing is repaired.

use crate::allocator::free_list::FreeSectorList;
use crate::chain;
use crate::directory::Directory;
use crate::error::{Result, VfsError};
use crate::sector::{self, SectorIndex, SectorStore};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    /// Sectors on the header chain or a file chain
    pub live: u64,
    /// Entries on the free list
    pub free: u64,
    /// Sectors neither live nor free
    pub leaked: Vec<SectorIndex>,
    /// Sectors claimed twice (two chains, or a chain and the free list)
    pub conflicts: Vec<SectorIndex>,
    /// Free-list entries past the end of the container
    pub out_of_range: Vec<SectorIndex>,
    /// Files whose chain cannot be followed or is too short
    pub broken: Vec<u64>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.leaked.is_empty()
            && self.conflicts.is_empty()
            && self.out_of_range.is_empty()
            && self.broken.is_empty()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Claim {
    None,
    Live,
    Free,
}

pub fn check(
    store: &mut SectorStore,
    header_chain: &[SectorIndex],
    directory: &Directory,
    free: &FreeSectorList,
    sector_count: u64,
) -> Result<IntegrityReport> {
    let mut report = IntegrityReport::default();
    let mut claims = vec![Claim::None; sector_count as usize];

    let mut claim = |report: &mut IntegrityReport, sector: SectorIndex, kind: Claim| {
        match claims.get_mut(sector as usize) {
            Some(slot) if *slot == Claim::None => *slot = kind,
            Some(_) => report.conflicts.push(sector),
            None => report.out_of_range.push(sector),
        }
    };

    for &sector in header_chain {
        claim(&mut report, sector, Claim::Live);
        report.live += 1;
    }

    for entry in directory.entries().iter().filter(|e| !e.is_empty()) {
        let sectors = match chain::collect(store, entry.start_sector, sector_count) {
            Ok(sectors) => sectors,
            Err(VfsError::BrokenChain { .. }) => {
                report.broken.push(entry.hash);
                continue;
            }
            Err(e) => return Err(e),
        };

        if (sectors.len() as u64) < sector::sectors_for(entry.stored_size, store.sector_size()) {
            report.broken.push(entry.hash);
        }
        for sector in sectors {
            claim(&mut report, sector, Claim::Live);
            report.live += 1;
        }
    }

    for &sector in free.as_slice() {
        claim(&mut report, sector, Claim::Free);
        report.free += 1;
    }

    report.leaked = claims
        .iter()
        .enumerate()
        .filter(|(_, c)| **c == Claim::None)
        .map(|(i, _)| i as SectorIndex)
        .collect();
    report.conflicts.sort_unstable();
    report.conflicts.dedup();

    if !report.is_clean() {
        tracing::warn!(
            "Integrity check found {} leaked, {} conflicting, {} out-of-range sectors and {} broken files",
            report.leaked.len(),
            report.conflicts.len(),
            report.out_of_range.len(),
            report.broken.len()
        );
    }

    Ok(report)
}
