//! Memory - Debuggee memory layout and the simulated byte store
//!
//! The memory map describes which ranges the debug client reported as
//! readable. The simulated memory caches whatever bytes were actually read
//! from the target so far.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use super::RelocatedAddress;

/// Memory model errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("IE00762: Invalid memory section: end {end} lies before start {start}")]
    InvalidSection {
        start: RelocatedAddress,
        end: RelocatedAddress,
    },

    #[error("IE00763: Memory sections overlap at {0}")]
    Overlap(RelocatedAddress),
}

/// A contiguous, currently readable address range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemorySection {
    start: RelocatedAddress,
    end: RelocatedAddress,
}

impl MemorySection {
    pub fn new(start: RelocatedAddress, end: RelocatedAddress) -> Result<Self, MemoryError> {
        if end < start {
            return Err(MemoryError::InvalidSection { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> RelocatedAddress {
        self.start
    }

    pub fn end(&self) -> RelocatedAddress {
        self.end
    }

    /// Number of bytes covered; `end` is inclusive.
    pub fn size(&self) -> u64 {
        (self.end.0 - self.start.0).saturating_add(1)
    }

    pub fn contains(&self, address: RelocatedAddress) -> bool {
        self.start <= address && address <= self.end
    }
}

impl fmt::Display for MemorySection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

/// Ordered, non-overlapping set of readable sections.
///
/// Always replaced wholesale when the debug client reports a new layout.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryMap {
    sections: Vec<MemorySection>,
}

impl MemoryMap {
    /// Builds a map from sections in any order.
    ///
    /// Overlap is a contract violation of the debug client and is rejected.
    pub fn new(mut sections: Vec<MemorySection>) -> Result<Self, MemoryError> {
        sections.sort_by_key(|s| s.start);
        for pair in sections.windows(2) {
            if pair[1].start <= pair[0].end {
                return Err(MemoryError::Overlap(pair[1].start));
            }
        }
        Ok(Self { sections })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn sections(&self) -> &[MemorySection] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// The section claiming `address`, if any.
    pub fn section(&self, address: RelocatedAddress) -> Option<&MemorySection> {
        let idx = self.sections.partition_point(|s| s.start <= address);
        idx.checked_sub(1)
            .map(|i| &self.sections[i])
            .filter(|s| s.contains(address))
    }
}

/// Sparse cache of debuggee bytes, keyed by chunk start address.
///
/// Chunks never overlap. Storing over existing bytes replaces them and a
/// chunk that ends exactly where the next one begins is merged with it.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    chunks: BTreeMap<u64, Vec<u8>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` at `address`, overwriting whatever was cached there.
    ///
    /// Chunk ends are exclusive, so bytes that would reach past the last
    /// address are cut off.
    pub fn store(&mut self, address: u64, data: &[u8]) {
        let room = usize::try_from(u64::MAX - address).unwrap_or(usize::MAX);
        let data = if data.len() > room {
            log::warn!(
                "Dropping {} bytes read at {:#x} past the end of the address space",
                data.len() - room,
                address
            );
            &data[..room]
        } else {
            data
        };
        if data.is_empty() {
            return;
        }
        self.remove(address, data.len() as u64);

        let mut start = address;
        let mut bytes = data.to_vec();

        // Join with a chunk ending exactly at `address`.
        if let Some((&prev_start, prev)) = self.chunks.range(..address).next_back() {
            if prev_start.checked_add(prev.len() as u64) == Some(address) {
                let mut joined = self.chunks.remove(&prev_start).unwrap_or_default();
                joined.extend_from_slice(&bytes);
                start = prev_start;
                bytes = joined;
            }
        }

        // Join with a chunk starting exactly at our end.
        let end = start.saturating_add(bytes.len() as u64);
        if let Some(next) = self.chunks.remove(&end) {
            bytes.extend_from_slice(&next);
        }

        self.chunks.insert(start, bytes);
    }

    /// Drop `length` cached bytes starting at `address`.
    pub fn remove(&mut self, address: u64, length: u64) {
        if length == 0 {
            return;
        }
        let end = address.saturating_add(length);

        let affected: Vec<u64> = self
            .chunks
            .range(..end)
            .filter(|(&start, data)| start.saturating_add(data.len() as u64) > address)
            .map(|(&start, _)| start)
            .collect();

        for start in affected {
            let Some(data) = self.chunks.remove(&start) else {
                continue;
            };
            let chunk_end = start.saturating_add(data.len() as u64);
            if start < address {
                let keep = (address - start) as usize;
                self.chunks.insert(start, data[..keep].to_vec());
            }
            if chunk_end > end {
                let skip = (end - start) as usize;
                self.chunks.insert(end, data[skip..].to_vec());
            }
        }
    }

    /// Cached bytes of `[address, address + length)`, only if all are known.
    pub fn data(&self, address: u64, length: usize) -> Option<Vec<u8>> {
        if length == 0 {
            return None;
        }
        let mut out = Vec::with_capacity(length);
        let mut cursor = address;
        while out.len() < length {
            let (&start, chunk) = self.chunks.range(..=cursor).next_back()?;
            let offset = (cursor - start) as usize;
            if offset >= chunk.len() {
                return None;
            }
            let take = (length - out.len()).min(chunk.len() - offset);
            out.extend_from_slice(&chunk[offset..offset + take]);
            cursor = cursor.checked_add(take as u64)?;
        }
        Some(out)
    }

    pub fn has_data(&self, address: u64, length: usize) -> bool {
        self.data(address, length).is_some()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    /// Total number of cached bytes.
    pub fn size(&self) -> usize {
        self.chunks.values().map(Vec::len).sum()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// `(start, length)` of every cached chunk in address order.
    pub fn chunks(&self) -> impl Iterator<Item = (u64, usize)> + '_ {
        self.chunks.iter().map(|(&start, data)| (start, data.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(start: u64, end: u64) -> MemorySection {
        MemorySection::new(start.into(), end.into()).unwrap()
    }

    #[test]
    fn section_rejects_inverted_range() {
        assert!(MemorySection::new(0x2000.into(), 0x1000.into()).is_err());
        assert_eq!(section(0x1000, 0x1000).size(), 1);
    }

    #[test]
    fn map_is_sorted_and_looks_up_sections() {
        let map = MemoryMap::new(vec![section(0x3000, 0x3fff), section(0x1000, 0x1fff)]).unwrap();
        assert_eq!(map.sections()[0].start(), RelocatedAddress(0x1000));
        assert_eq!(map.section(0x1800.into()), Some(&section(0x1000, 0x1fff)));
        assert_eq!(map.section(0x3fff.into()), Some(&section(0x3000, 0x3fff)));
        assert!(map.section(0x2000.into()).is_none());
        assert!(map.section(0x500.into()).is_none());
    }

    #[test]
    fn map_rejects_overlap() {
        let err = MemoryMap::new(vec![section(0x1000, 0x2000), section(0x2000, 0x3000)]).unwrap_err();
        assert_eq!(err, MemoryError::Overlap(RelocatedAddress(0x2000)));
    }

    #[test]
    fn store_and_read_back() {
        let mut memory = Memory::new();
        memory.store(0x100, &[1, 2, 3, 4]);
        assert_eq!(memory.data(0x101, 2), Some(vec![2, 3]));
        assert!(memory.data(0x102, 4).is_none());
        assert!(memory.has_data(0x100, 4));
        assert_eq!(memory.size(), 4);
    }

    #[test]
    fn adjacent_chunks_are_merged() {
        let mut memory = Memory::new();
        memory.store(0x104, &[5, 6]);
        memory.store(0x100, &[1, 2, 3, 4]);
        memory.store(0x106, &[7]);
        assert_eq!(memory.chunk_count(), 1);
        assert_eq!(memory.data(0x100, 7), Some(vec![1, 2, 3, 4, 5, 6, 7]));
    }

    #[test]
    fn overwrite_replaces_bytes_in_the_middle() {
        let mut memory = Memory::new();
        memory.store(0x100, &[0; 8]);
        memory.store(0x102, &[0xaa, 0xbb]);
        assert_eq!(memory.data(0x100, 8), Some(vec![0, 0, 0xaa, 0xbb, 0, 0, 0, 0]));
        assert_eq!(memory.size(), 8);
    }

    #[test]
    fn remove_splits_chunks() {
        let mut memory = Memory::new();
        memory.store(0x100, &[1, 2, 3, 4, 5, 6]);
        memory.remove(0x102, 2);
        assert_eq!(memory.chunk_count(), 2);
        assert_eq!(memory.data(0x100, 2), Some(vec![1, 2]));
        assert_eq!(memory.data(0x104, 2), Some(vec![5, 6]));
        assert!(!memory.has_data(0x102, 1));

        memory.clear();
        assert_eq!(memory.size(), 0);
    }

    #[test]
    fn store_is_cut_at_the_top_of_the_address_space() {
        let mut memory = Memory::new();
        memory.store(u64::MAX - 1, &[1, 2, 3, 4]);
        assert_eq!(memory.size(), 1);
        assert_eq!(memory.data(u64::MAX - 1, 1), Some(vec![1]));
        assert!(memory.data(u64::MAX - 1, 4).is_none());
        assert!(memory.data(u64::MAX, 1).is_none());

        memory.store(u64::MAX, &[5]);
        memory.store(u64::MAX - 2, &[9]);
        assert_eq!(memory.data(u64::MAX - 2, 2), Some(vec![9, 1]));
        memory.remove(u64::MAX - 3, u64::MAX);
        assert_eq!(memory.size(), 0);
    }

    #[test]
    fn gaps_are_not_bridged() {
        let mut memory = Memory::new();
        memory.store(0x100, &[1, 2]);
        memory.store(0x104, &[3, 4]);
        assert_eq!(memory.chunk_count(), 2);
        assert!(memory.data(0x100, 6).is_none());
    }
}
