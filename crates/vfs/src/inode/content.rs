//! Reference-counted content records.
//!
//! File content lives in an arena keyed by [`ContentId`]. Every name that
//! refers to a record (the original file and each hardlink alias) holds one
//! reference; the record is reclaimed when the last reference is released.

use std::collections::HashMap;

use crate::error::{VfsError, VfsResult};

/// Stable identifier of a content record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentId(u64);

impl ContentId {
    /// Raw numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// A growable byte buffer shared by every name that links to it.
#[derive(Debug, Default)]
pub struct ContentRecord {
    data: Vec<u8>,
    link_count: u32,
}

impl ContentRecord {
    /// Current content bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Content size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Number of names referencing this record.
    pub fn link_count(&self) -> u32 {
        self.link_count
    }

    /// Replace the whole content.
    pub fn replace(&mut self, data: Vec<u8>) {
        self.data = data;
    }

    /// Copy up to `size` bytes starting at `offset`.
    ///
    /// Reads at or past the end return an empty buffer; reads straddling the
    /// end are clamped.
    pub fn read_at(&self, offset: u64, size: usize) -> Vec<u8> {
        let len: u64 = self.size();
        if offset >= len {
            return Vec::new();
        }
        let start: usize = offset as usize;
        let end: usize = start + size.min((len - offset) as usize);
        self.data[start..end].to_vec()
    }

    /// Write `bytes` at `offset`, growing and zero-filling as needed.
    ///
    /// # Returns
    /// Number of bytes written (always `bytes.len()` on success).
    pub fn write_at(&mut self, offset: u64, bytes: &[u8]) -> VfsResult<usize> {
        let end: u64 = offset
            .checked_add(bytes.len() as u64)
            .ok_or(VfsError::OutOfMemory { requested: u64::MAX })?;
        if end > self.size() {
            self.resize(end)?;
        }
        let start: usize = offset as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(bytes.len())
    }

    /// Grow (zero-filled) or shrink the content to exactly `new_size` bytes.
    pub fn resize(&mut self, new_size: u64) -> VfsResult<()> {
        let target: usize = usize::try_from(new_size)
            .map_err(|_| VfsError::OutOfMemory { requested: new_size })?;
        if target > self.data.len() {
            self.data
                .try_reserve(target - self.data.len())
                .map_err(|_| VfsError::OutOfMemory { requested: new_size })?;
        }
        self.data.resize(target, 0);
        Ok(())
    }
}

/// Arena of content records.
#[derive(Debug, Default)]
pub struct ContentArena {
    next_id: u64,
    records: HashMap<ContentId, ContentRecord>,
}

impl ContentArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an empty record holding one reference.
    pub fn allocate(&mut self) -> ContentId {
        self.next_id += 1;
        let id: ContentId = ContentId(self.next_id);
        self.records.insert(
            id,
            ContentRecord {
                data: Vec::new(),
                link_count: 1,
            },
        );
        id
    }

    /// Look up a record.
    pub fn get(&self, id: ContentId) -> Option<&ContentRecord> {
        self.records.get(&id)
    }

    /// Look up a record for mutation.
    pub fn get_mut(&mut self, id: ContentId) -> Option<&mut ContentRecord> {
        self.records.get_mut(&id)
    }

    /// Add a reference to a record.
    ///
    /// # Returns
    /// The new link count, or `None` if the record does not exist.
    pub fn acquire(&mut self, id: ContentId) -> Option<u32> {
        let record: &mut ContentRecord = self.records.get_mut(&id)?;
        record.link_count += 1;
        Some(record.link_count)
    }

    /// Drop a reference, reclaiming the record when none remain.
    ///
    /// # Returns
    /// The remaining link count (0 when reclaimed), or `None` if unknown.
    pub fn release(&mut self, id: ContentId) -> Option<u32> {
        let record: &mut ContentRecord = self.records.get_mut(&id)?;
        record.link_count = record.link_count.saturating_sub(1);
        let remaining: u32 = record.link_count;
        if remaining == 0 {
            self.records.remove(&id);
        }
        Some(remaining)
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records are live.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total bytes held by live records.
    pub fn total_bytes(&self) -> u64 {
        self.records.values().map(ContentRecord::size).sum()
    }
}
