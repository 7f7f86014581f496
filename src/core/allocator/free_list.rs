//! Sorted set of reclaimed sectors
//!
//! Kept as an ascending, duplicate-free vector so it can be persisted in
//! order and handed out as a slice for introspection.

use crate::sector::SectorIndex;

/// Ascending list of sectors available for reuse
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreeSectorList {
    sectors: Vec<SectorIndex>,
}

impl FreeSectorList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a persisted sequence, returning `None` unless it is
    /// strictly ascending
    pub fn from_sorted(sectors: Vec<SectorIndex>) -> Option<Self> {
        if sectors.windows(2).all(|w| w[0] < w[1]) {
            Some(FreeSectorList { sectors })
        } else {
            None
        }
    }

    /// Sorted unique insert; returns false if the sector was already free
    pub fn insert(&mut self, sector: SectorIndex) -> bool {
        match self.sectors.binary_search(&sector) {
            Ok(_) => false,
            Err(pos) => {
                self.sectors.insert(pos, sector);
                true
            }
        }
    }

    /// Remove and return the smallest free sector
    pub fn pop_first(&mut self) -> Option<SectorIndex> {
        if self.sectors.is_empty() {
            None
        } else {
            Some(self.sectors.remove(0))
        }
    }

    pub fn contains(&self, sector: SectorIndex) -> bool {
        self.sectors.binary_search(&sector).is_ok()
    }

    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }

    pub fn as_slice(&self) -> &[SectorIndex] {
        &self.sectors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_order() {
        let mut list = FreeSectorList::new();
        for sector in [9, 3, 7, 1, 5] {
            assert!(list.insert(sector));
        }
        assert_eq!(list.as_slice(), &[1, 3, 5, 7, 9]);
    }

    #[test]
    fn test_duplicate_insert_ignored() {
        let mut list = FreeSectorList::new();
        assert!(list.insert(4));
        assert!(!list.insert(4));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_pop_returns_smallest() {
        let mut list = FreeSectorList::new();
        list.insert(12);
        list.insert(2);
        list.insert(8);

        assert_eq!(list.pop_first(), Some(2));
        assert_eq!(list.pop_first(), Some(8));
        assert_eq!(list.pop_first(), Some(12));
        assert_eq!(list.pop_first(), None);
        assert!(list.is_empty());
    }

    #[test]
    fn test_from_sorted_rejects_unordered() {
        assert!(FreeSectorList::from_sorted(vec![1, 2, 3]).is_some());
        assert!(FreeSectorList::from_sorted(vec![]).is_some());
        assert!(FreeSectorList::from_sorted(vec![3, 2]).is_none());
        assert!(FreeSectorList::from_sorted(vec![2, 2]).is_none());
    }
}
